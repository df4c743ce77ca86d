//! Delivery behaviour through `AppService` with mock hardware.

use dosepump::app::commands::{Accepted, AppCommand};
use dosepump::app::events::{AppEvent, DeviceStatus, PulseSource};
use dosepump::dosing::persist::PersistRecord;
use dosepump::error::Rejection;

use crate::mock_hw::{Bench, HwCall, MockNvs};

/// A bench whose persisted record says `delivered` units are gone.
fn bench_with_delivered(delivered: f32) -> Bench {
    let mut nvs = MockNvs::new();
    let record = PersistRecord {
        delivered,
        remaining: 315.0 - delivered,
        ..PersistRecord::fresh(315.0)
    };
    record.save(&mut nvs).unwrap();
    Bench::with_store(nvs)
}

#[test]
fn bolus_pulses_once_per_second_then_beeps() {
    let mut b = Bench::new();
    let ok = b.cmd(AppCommand::Bolus { units: 2.0 }).unwrap();
    assert_eq!(ok, Accepted::Bolus { units_delivered: 2.0 });
    assert_eq!(b.app.status(), DeviceStatus::DeliveringBolus);

    b.run_to(990);
    assert_eq!(b.hw.forward_count(), 0, "first pulse waits one interval");

    b.run_to(3990);
    assert_eq!(b.sink.pulses(PulseSource::Bolus), 3);
    assert!(b.app.snapshot().pumping);

    b.run_to(4000);
    assert_eq!(b.sink.pulses(PulseSource::Bolus), 4);
    assert_eq!(b.app.status(), DeviceStatus::Idle);
    assert_eq!(b.app.snapshot().remaining, 313.0);
    assert_eq!(b.hw.tones(), vec![(1500, 150)]);
    assert_eq!(
        b.sink
            .count(|e| matches!(e, AppEvent::BolusComplete { units } if *units == 2.0)),
        1
    );
}

#[test]
fn five_unit_bolus_delivers_ten_pulses() {
    let mut b = Bench::new();
    assert_eq!(b.app.status(), DeviceStatus::Idle);
    b.cmd(AppCommand::Bolus { units: 5.0 }).unwrap();

    b.run_to(9_990);
    assert_eq!(b.sink.pulses(PulseSource::Bolus), 9);
    b.run_to(12_000);

    assert_eq!(b.sink.pulses(PulseSource::Bolus), 10);
    assert_eq!(b.hw.forward_count(), 10);
    assert_eq!(b.sink.pulses(PulseSource::Basal), 0);
    let snap = b.app.snapshot();
    assert_eq!(snap.delivered, 5.0);
    assert_eq!(snap.remaining, 310.0);
    assert!(!snap.pumping);
    assert_eq!(b.app.status(), DeviceStatus::Idle);
}

#[test]
fn each_pulse_is_forward_dwell_stop() {
    let mut b = Bench::new();
    assert_eq!(
        b.cmd(AppCommand::PrimeEdge),
        Ok(Accepted::Primed { delivered: true })
    );
    assert_eq!(
        b.hw.calls,
        vec![HwCall::Forward, HwCall::Dwell(55), HwCall::Stop]
    );
    assert_eq!(b.app.snapshot().delivered, 0.5);
    assert_eq!(b.app.status(), DeviceStatus::Idle);
}

#[test]
fn second_bolus_is_rejected_while_first_runs() {
    let mut b = Bench::new();
    b.cmd(AppCommand::Bolus { units: 3.0 }).unwrap();
    b.run_to(1500);
    assert_eq!(b.cmd(AppCommand::Bolus { units: 1.0 }), Err(Rejection::Busy));
    assert_eq!(b.cmd(AppCommand::PrimeEdge), Err(Rejection::Busy));
    assert_eq!(b.cmd(AppCommand::Reset), Err(Rejection::Busy));
    assert_eq!(b.app.snapshot().pending_units, 2.5);
}

#[test]
fn invalid_volumes_are_rejected() {
    let mut b = Bench::new();
    assert!(matches!(
        b.cmd(AppCommand::Bolus { units: 0.0 }),
        Err(Rejection::InvalidArgument(_))
    ));
    assert!(matches!(
        b.cmd(AppCommand::SetBasalRate { rate: -1.0 }),
        Err(Rejection::InvalidArgument(_))
    ));
    assert!(matches!(
        b.cmd(AppCommand::SetTempBasal {
            rate: 1.0,
            duration_minutes: -5
        }),
        Err(Rejection::InvalidArgument(_))
    ));
    assert_eq!(b.app.status(), DeviceStatus::Idle);
}

#[test]
fn suspend_cancels_bolus_and_blocks_delivery() {
    let mut b = Bench::new();
    b.cmd(AppCommand::SetBasalRate { rate: 36.0 }).unwrap();
    b.cmd(AppCommand::Bolus { units: 5.0 }).unwrap();
    b.run_to(2000);
    assert_eq!(b.sink.pulses(PulseSource::Bolus), 2);

    b.cmd(AppCommand::Suspend).unwrap();
    assert_eq!(b.app.status(), DeviceStatus::Suspended);
    assert_eq!(b.app.snapshot().pending_units, 0.0);

    assert_eq!(
        b.cmd(AppCommand::Bolus { units: 1.0 }),
        Err(Rejection::Suspended)
    );
    assert_eq!(b.cmd(AppCommand::PrimeEdge), Err(Rejection::Suspended));
    assert_eq!(b.cmd(AppCommand::Reset), Err(Rejection::Suspended));
    assert_eq!(b.cmd(AppCommand::Beep), Ok(Accepted::Ack {}));

    let before = b.hw.forward_count();
    b.run_to(120_000);
    assert_eq!(b.hw.forward_count(), before, "nothing moves while suspended");

    b.cmd(AppCommand::Resume).unwrap();
    assert_eq!(b.app.status(), DeviceStatus::DeliveringBasal);
    b.run_to(120_010);
    assert_eq!(
        b.sink.pulses(PulseSource::Basal),
        1,
        "overdue basal pulse goes out on resume"
    );
}

#[test]
fn basal_yields_to_a_recent_bolus_pulse() {
    let mut b = Bench::new();
    // 36 U/h at 0.5 U per pulse: one pulse every 50 s.
    b.cmd(AppCommand::SetBasalRate { rate: 36.0 }).unwrap();
    b.run_to(48_900);
    b.cmd(AppCommand::Bolus { units: 5.0 }).unwrap();

    // Bolus pulse at 49.9 s; basal is due at 50 s but must wait 200 ms.
    b.run_to(50_100);
    assert_eq!(b.sink.pulses(PulseSource::Bolus), 1);
    assert_eq!(b.sink.pulses(PulseSource::Basal), 0);

    b.run_to(50_110);
    assert_eq!(b.sink.pulses(PulseSource::Basal), 1);

    b.run_to(60_000);
    assert_eq!(b.sink.pulses(PulseSource::Bolus), 10);
    assert_eq!(b.sink.pulses(PulseSource::Basal), 1);
    assert_eq!(b.app.snapshot().delivered, 5.5);
}

#[test]
fn temp_basal_overrides_then_expires() {
    let mut b = Bench::new();
    b.cmd(AppCommand::SetTempBasal {
        rate: 36.0,
        duration_minutes: 1,
    })
    .unwrap();
    assert_eq!(b.app.status(), DeviceStatus::DeliveringBasal);
    assert!(b.app.snapshot().temp_basal_active);

    b.run_to(59_990);
    assert_eq!(b.sink.pulses(PulseSource::Basal), 1);

    b.run_to(60_000);
    assert_eq!(b.sink.count(|e| matches!(e, AppEvent::TempBasalExpired)), 1);
    assert_eq!(b.app.status(), DeviceStatus::Idle);

    b.run_to(200_000);
    assert_eq!(b.sink.pulses(PulseSource::Basal), 1, "base rate is zero");
}

#[test]
fn zero_minute_temp_basal_lapses_next_tick() {
    let mut b = Bench::new();
    b.cmd(AppCommand::SetBasalRate { rate: 1.0 }).unwrap();
    let ok = b
        .cmd(AppCommand::SetTempBasal {
            rate: 4.0,
            duration_minutes: 0,
        })
        .unwrap();
    assert_eq!(
        ok,
        Accepted::TempBasal {
            rate: 4.0,
            duration_minutes: 0
        }
    );
    b.run_to(10);
    assert!(!b.app.snapshot().temp_basal_active);
    assert_eq!(b.app.snapshot().active_basal_rate, 1.0);
}

#[test]
fn stop_clears_programs_but_not_rewind() {
    let mut b = bench_with_delivered(10.0);
    b.cmd(AppCommand::SetBasalRate { rate: 2.0 }).unwrap();
    let ok = b.cmd(AppCommand::Reset).unwrap();
    assert_eq!(
        ok,
        Accepted::Reset {
            device_status: DeviceStatus::Priming,
            estimated_rewind_duration_ms: 1100,
        }
    );

    assert_eq!(
        b.cmd(AppCommand::Stop),
        Ok(Accepted::Status {
            device_status: DeviceStatus::Idle
        })
    );
    let snap = b.app.snapshot();
    assert!(snap.rewinding, "stop leaves the rewind running");
    assert_eq!(snap.active_basal_rate, 0.0);
    assert_eq!(b.hw.last_motion(), Some(HwCall::Reverse));
}

#[test]
fn rewind_runs_for_delivered_volume_then_refills() {
    let mut b = bench_with_delivered(10.0);
    b.cmd(AppCommand::Reset).unwrap();
    assert_eq!(b.app.status(), DeviceStatus::Priming);
    assert!(
        b.sink
            .count(|e| matches!(e, AppEvent::RewindStarted { duration_ms: 1100 }))
            == 1
    );
    assert_eq!(b.cmd(AppCommand::Bolus { units: 1.0 }), Err(Rejection::Busy));

    b.run_to(1090);
    assert!(b.app.snapshot().rewinding);

    b.run_to(1100);
    let snap = b.app.snapshot();
    assert!(!snap.rewinding);
    assert_eq!(snap.remaining, 315.0);
    assert_eq!(snap.delivered, 0.0);
    assert_eq!(b.hw.last_motion(), Some(HwCall::Stop));
    assert_eq!(b.hw.tones(), vec![(1000, 500)]);
    assert_eq!(b.sink.count(|e| matches!(e, AppEvent::RewindComplete)), 1);
    assert_eq!(
        b.sink
            .count(|e| matches!(e, AppEvent::StateSaved { checkpoint: true })),
        1
    );
}

#[test]
fn reset_with_nothing_delivered_is_immediate() {
    let mut b = Bench::new();
    let ok = b.cmd(AppCommand::Reset).unwrap();
    assert_eq!(
        ok,
        Accepted::Reset {
            device_status: DeviceStatus::Priming,
            estimated_rewind_duration_ms: 0,
        }
    );
    assert!(!b.app.snapshot().rewinding);
    assert!(b.hw.calls.is_empty(), "no motor movement");
    assert_eq!(b.app.status(), DeviceStatus::Idle);
}

#[test]
fn bolus_stops_when_the_reservoir_runs_dry() {
    let mut b = bench_with_delivered(314.0);
    b.cmd(AppCommand::Bolus { units: 5.0 }).unwrap();
    b.run_to(10_000);

    assert_eq!(b.sink.pulses(PulseSource::Bolus), 2);
    assert_eq!(b.sink.count(|e| matches!(e, AppEvent::ReservoirEmpty)), 1);
    let snap = b.app.snapshot();
    assert!(snap.empty);
    assert_eq!(snap.remaining, 0.0);
    assert_eq!(snap.delivered, 315.0);
    assert_eq!(snap.status, DeviceStatus::Error);
    assert!(b.hw.tones().is_empty(), "abandoned bolus gets no completion tone");

    assert_eq!(b.cmd(AppCommand::Bolus { units: 1.0 }), Err(Rejection::Busy));
    assert_eq!(
        b.cmd(AppCommand::PrimeEdge),
        Ok(Accepted::Primed { delivered: false })
    );
    assert_eq!(b.sink.pulses(PulseSource::Prime), 0);
}

#[test]
fn reset_after_empty_restores_delivery() {
    let mut b = bench_with_delivered(315.0);
    assert!(b.app.snapshot().empty);

    assert_eq!(
        b.cmd(AppCommand::Reset),
        Ok(Accepted::Reset {
            device_status: DeviceStatus::Priming,
            estimated_rewind_duration_ms: 34_650,
        })
    );
    b.run_to(34_640);
    assert!(b.app.snapshot().rewinding);
    assert!(b.app.snapshot().empty);

    b.run_to(34_650);
    let snap = b.app.snapshot();
    assert!(!snap.rewinding);
    assert!(!snap.empty);
    assert_eq!(snap.remaining, 315.0);
    assert_eq!(b.app.status(), DeviceStatus::Idle);
    assert_eq!(
        b.cmd(AppCommand::Bolus { units: 0.5 }),
        Ok(Accepted::Bolus {
            units_delivered: 0.5
        })
    );
}

#[test]
fn keepalive_snapshots_are_emitted_while_idle() {
    let mut b = Bench::new();
    b.run_to(9_100);
    let snaps = b.sink.count(|e| matches!(e, AppEvent::Snapshot(_)));
    assert_eq!(snaps, 3);
}
