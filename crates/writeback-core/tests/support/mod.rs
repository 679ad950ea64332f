#![allow(dead_code)]

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Duration;

use writeback_core::{BufferRelease, StoreChannel};

/// Something that happened to a channel or a pool, in global order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Write { channel: &'static str, offset: u64, len: usize },
    Release { pool: &'static str, len: usize },
}

pub type EventLog = Arc<Mutex<Vec<Event>>>;

pub fn event_log() -> EventLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn events(log: &EventLog) -> Vec<Event> {
    log.lock().expect("event log poisoned").clone()
}

/// Offsets written to `channel`, in the order the channel saw them.
pub fn write_offsets(log: &EventLog, channel: &str) -> Vec<u64> {
    events(log)
        .into_iter()
        .filter_map(|event| match event {
            Event::Write {
                channel: name,
                offset,
                ..
            } if name == channel => Some(offset),
            _ => None,
        })
        .collect()
}

/// Channel that records positioned writes and can be told to fail or stall.
pub struct RecordingChannel {
    name: &'static str,
    log: EventLog,
    delay: Duration,
    fail_at_offset: Option<u64>,
    panic_at_offset: Option<u64>,
    gate: Option<Arc<Gate>>,
}

impl RecordingChannel {
    pub fn new(name: &'static str, log: &EventLog) -> Self {
        Self {
            name,
            log: Arc::clone(log),
            delay: Duration::ZERO,
            fail_at_offset: None,
            panic_at_offset: None,
            gate: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing_at(mut self, offset: u64) -> Self {
        self.fail_at_offset = Some(offset);
        self
    }

    pub fn panicking_at(mut self, offset: u64) -> Self {
        self.panic_at_offset = Some(offset);
        self
    }

    /// Every write waits until `gate` is opened.
    pub fn gated(mut self, gate: &Arc<Gate>) -> Self {
        self.gate = Some(Arc::clone(gate));
        self
    }
}

impl StoreChannel for RecordingChannel {
    fn write_all_at(&self, buf: &[u8], offset: u64) -> io::Result<()> {
        if let Some(gate) = &self.gate {
            gate.wait();
        }
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        if self.panic_at_offset == Some(offset) {
            panic!("simulated channel panic at {offset}");
        }
        if self.fail_at_offset == Some(offset) {
            return Err(io::Error::other(format!("simulated failure at {offset}")));
        }

        self.log
            .lock()
            .expect("event log poisoned")
            .push(Event::Write {
                channel: self.name,
                offset,
                len: buf.len(),
            });
        Ok(())
    }
}

/// Buffer pool that records every release.
pub struct RecordingPool {
    name: &'static str,
    log: EventLog,
    released: AtomicUsize,
}

impl RecordingPool {
    pub fn new(name: &'static str, log: &EventLog) -> Arc<Self> {
        Arc::new(Self {
            name,
            log: Arc::clone(log),
            released: AtomicUsize::new(0),
        })
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::Acquire)
    }
}

impl BufferRelease for RecordingPool {
    fn release(&self, buffer: Vec<u8>) {
        self.released.fetch_add(1, Ordering::AcqRel);
        self.log
            .lock()
            .expect("event log poisoned")
            .push(Event::Release {
                pool: self.name,
                len: buffer.len(),
            });
    }
}

/// One-shot latch used to hold writes back until a test lets them go.
#[derive(Default)]
pub struct Gate {
    open: Mutex<bool>,
    opened: Condvar,
}

impl Gate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn open(&self) {
        *self.open.lock().expect("gate poisoned") = true;
        self.opened.notify_all();
    }

    pub fn wait(&self) {
        let open = self.open.lock().expect("gate poisoned");
        let _open = self
            .opened
            .wait_while(open, |open| !*open)
            .expect("gate poisoned");
    }
}

pub fn page(len: usize, fill: u8) -> Vec<u8> {
    vec![fill; len]
}
