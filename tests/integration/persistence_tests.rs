//! Reservoir record persistence across reboots.

use dosepump::app::commands::AppCommand;
use dosepump::app::events::AppEvent;
use dosepump::dosing::persist::STATE_NAMESPACE;

use crate::mock_hw::Bench;

fn saves(b: &Bench) -> usize {
    b.sink
        .count(|e| matches!(e, AppEvent::StateSaved { checkpoint: false }))
}

#[test]
fn first_boot_starts_with_a_full_cartridge() {
    let b = Bench::new();
    let snap = b.app.snapshot();
    assert_eq!(snap.remaining, 315.0);
    assert_eq!(snap.delivered, 0.0);
    assert!(!snap.empty);
    assert!(matches!(b.sink.events.first(), Some(AppEvent::Started(_))));
}

#[test]
fn delivered_volume_survives_reboot_after_flush() {
    let mut b = Bench::new();
    b.cmd(AppCommand::Bolus { units: 1.0 }).unwrap();
    b.run_to(29_990);
    assert!(
        b.nvs.raw(STATE_NAMESPACE, "deliv").is_none(),
        "writes wait for the debounce window"
    );

    b.run_to(30_000);
    assert_eq!(saves(&b), 1);
    assert_eq!(b.nvs.f32_value(STATE_NAMESPACE, "deliv"), Some(1.0));
    assert_eq!(b.nvs.f32_value(STATE_NAMESPACE, "rem"), Some(314.0));
    assert_eq!(b.nvs.f32_value(STATE_NAMESPACE, "l_bolus"), Some(1.0));

    let b = b.reboot();
    let snap = b.app.snapshot();
    assert_eq!(snap.delivered, 1.0);
    assert_eq!(snap.remaining, 314.0);
    assert_eq!(snap.last_bolus_units, 1.0);
}

#[test]
fn unflushed_pulses_are_lost_on_reboot() {
    let mut b = Bench::new();
    b.cmd(AppCommand::Bolus { units: 2.0 }).unwrap();
    b.run_to(5_000);
    assert_eq!(b.app.snapshot().delivered, 2.0);

    let b = b.reboot();
    assert_eq!(b.app.snapshot().delivered, 0.0);
}

#[test]
fn clean_state_is_never_rewritten() {
    let mut b = Bench::new();
    b.run_to(120_000);
    assert_eq!(b.nvs.writes, 0);
    assert_eq!(saves(&b), 0);
}

#[test]
fn failed_flush_retries_one_window_later() {
    let mut b = Bench::new();
    b.cmd(AppCommand::SetBasalRate { rate: 0.5 }).unwrap();
    b.nvs.fail_writes = true;
    b.run_to(30_000);
    assert_eq!(saves(&b), 0);

    b.nvs.fail_writes = false;
    b.run_to(59_990);
    assert_eq!(saves(&b), 0, "retry waits for the next window");
    b.run_to(60_000);
    assert_eq!(saves(&b), 1);
    assert_eq!(b.nvs.f32_value(STATE_NAMESPACE, "basal"), Some(0.5));
}

#[test]
fn base_rate_persists_but_volatile_modes_do_not() {
    let mut b = Bench::new();
    b.cmd(AppCommand::SetBasalRate { rate: 1.5 }).unwrap();
    b.cmd(AppCommand::SetTempBasal {
        rate: 4.0,
        duration_minutes: 120,
    })
    .unwrap();
    b.cmd(AppCommand::Suspend).unwrap();
    b.run_to(30_000);
    assert_eq!(saves(&b), 1);

    let b = b.reboot();
    let snap = b.app.snapshot();
    assert_eq!(snap.active_basal_rate, 1.5);
    assert!(!snap.temp_basal_active);
    assert!(!snap.suspended);
}

#[test]
fn rewind_completion_checkpoints_immediately() {
    let mut b = Bench::new();
    b.cmd(AppCommand::Bolus { units: 1.0 }).unwrap();
    b.run_to(2_000);
    b.cmd(AppCommand::Reset).unwrap();
    // Two increments at 55 ms each.
    b.run_to(2_110);

    assert_eq!(
        b.sink
            .count(|e| matches!(e, AppEvent::StateSaved { checkpoint: true })),
        1
    );
    assert_eq!(b.nvs.f32_value(STATE_NAMESPACE, "deliv"), Some(0.0));
    assert_eq!(b.nvs.raw(STATE_NAMESPACE, "empty"), Some(&[0u8][..]));

    let b = b.reboot();
    assert_eq!(b.app.snapshot().remaining, 315.0);
}

#[test]
fn empty_latch_survives_reboot() {
    let mut b = Bench::new();
    for _ in 0..630 {
        b.cmd(AppCommand::PrimeEdge).unwrap();
    }
    assert!(b.app.snapshot().empty);
    b.run_to(30_000);

    let mut b = b.reboot();
    assert!(b.app.snapshot().empty);
    assert!(b.cmd(AppCommand::Bolus { units: 1.0 }).is_err());
}
