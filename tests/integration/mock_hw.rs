//! Mock hardware adapters for integration tests.
//!
//! Records every actuator and buzzer call so tests can assert on the full
//! command history without touching real GPIO/PWM registers.

use dosepump::app::commands::{AppCommand, CommandOutcome};
use dosepump::app::events::{AppEvent, PulseSource};
use dosepump::app::ports::{ActuatorPort, BuzzerPort, EventSink, StorageError, StoragePort};
use dosepump::app::service::AppService;
use dosepump::config::PumpConfig;
use std::collections::HashMap;

// ── Hardware call record ──────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwCall {
    Forward,
    Reverse,
    Stop,
    Dwell(u32),
    Tone { freq_hz: u32, duration_ms: u32 },
}

// ── MockHardware ──────────────────────────────────────────────

#[derive(Default)]
pub struct MockHardware {
    pub calls: Vec<HwCall>,
}

#[allow(dead_code)]
impl MockHardware {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of forward drive starts (one per delivered pulse).
    pub fn forward_count(&self) -> usize {
        self.calls.iter().filter(|c| **c == HwCall::Forward).count()
    }

    pub fn tones(&self) -> Vec<(u32, u32)> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                HwCall::Tone {
                    freq_hz,
                    duration_ms,
                } => Some((*freq_hz, *duration_ms)),
                _ => None,
            })
            .collect()
    }

    pub fn last_motion(&self) -> Option<HwCall> {
        self.calls
            .iter()
            .rev()
            .find(|c| matches!(c, HwCall::Forward | HwCall::Reverse | HwCall::Stop))
            .copied()
    }
}

impl ActuatorPort for MockHardware {
    fn forward(&mut self) {
        self.calls.push(HwCall::Forward);
    }

    fn reverse(&mut self) {
        self.calls.push(HwCall::Reverse);
    }

    fn stop(&mut self) {
        self.calls.push(HwCall::Stop);
    }

    fn dwell(&mut self, ms: u32) {
        self.calls.push(HwCall::Dwell(ms));
    }
}

impl BuzzerPort for MockHardware {
    fn tone(&mut self, freq_hz: u32, duration_ms: u32) {
        self.calls.push(HwCall::Tone {
            freq_hz,
            duration_ms,
        });
    }
}

// ── MockNvs ───────────────────────────────────────────────────

/// In-memory key/value store with write-failure injection.
#[derive(Default)]
pub struct MockNvs {
    store: HashMap<String, Vec<u8>>,
    pub fail_writes: bool,
    pub writes: usize,
}

#[allow(dead_code)]
impl MockNvs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raw(&self, namespace: &str, key: &str) -> Option<&[u8]> {
        self.store
            .get(&format!("{}::{}", namespace, key))
            .map(Vec::as_slice)
    }

    pub fn f32_value(&self, namespace: &str, key: &str) -> Option<f32> {
        let bytes: [u8; 4] = self.raw(namespace, key)?.try_into().ok()?;
        Some(f32::from_le_bytes(bytes))
    }
}

impl StoragePort for MockNvs {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        match self.raw(namespace, key) {
            Some(v) => {
                let n = v.len().min(buf.len());
                buf[..n].copy_from_slice(&v[..n]);
                Ok(n)
            }
            None => Err(StorageError::NotFound),
        }
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        if self.fail_writes {
            return Err(StorageError::IoError);
        }
        self.writes += 1;
        self.store
            .insert(format!("{}::{}", namespace, key), data.to_vec());
        Ok(())
    }
}

// ── CollectingSink ────────────────────────────────────────────

#[derive(Default)]
pub struct CollectingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl CollectingSink {
    pub fn pulses(&self, source: PulseSource) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, AppEvent::PulseDelivered { source: s, .. } if *s == source))
            .count()
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for CollectingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Bench: service + mocks + a 10 ms clock ────────────────────

pub struct Bench {
    pub app: AppService,
    pub hw: MockHardware,
    pub nvs: MockNvs,
    pub sink: CollectingSink,
    pub now: u64,
}

#[allow(dead_code)]
impl Bench {
    pub fn new() -> Self {
        Self::with_store(MockNvs::new())
    }

    /// Boot a service on top of an existing store.
    pub fn with_store(nvs: MockNvs) -> Self {
        let mut bench = Self {
            app: AppService::new(PumpConfig::default()),
            hw: MockHardware::new(),
            nvs,
            sink: CollectingSink::default(),
            now: 0,
        };
        bench.app.start(&bench.nvs, &mut bench.sink);
        bench
    }

    pub fn cmd(&mut self, cmd: AppCommand) -> CommandOutcome {
        self.app
            .handle_command(cmd, self.now, &mut self.hw, &mut self.nvs, &mut self.sink)
    }

    /// Tick every 10 ms up to and including `t`.
    pub fn run_to(&mut self, t: u64) {
        while self.now < t {
            self.now = (self.now + 10).min(t);
            self.app
                .tick(self.now, &mut self.hw, &mut self.nvs, &mut self.sink);
        }
    }

    /// Reboot: a fresh service over the same store.
    pub fn reboot(self) -> Self {
        Self::with_store(self.nvs)
    }
}
