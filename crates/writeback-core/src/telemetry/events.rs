use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, OnceLock};
use std::time::Duration;

/// A positioned write that failed on a worker thread.
#[derive(Debug, Clone)]
pub struct WriteFailedEvent {
    pub path: PathBuf,
    pub offset: u64,
    pub len: usize,
    pub message: String,
}

/// A drain barrier that returned, successfully or not.
#[derive(Debug, Clone)]
pub struct DrainCompletedEvent {
    pub elapsed: Duration,
    pub timed_out: bool,
    pub failed: bool,
}

#[derive(Debug, Clone)]
pub struct ProfileEvent {
    pub target: &'static str,
    pub op: &'static str,
    pub result: &'static str,
    pub elapsed_us: u64,
    pub tags: Vec<String>,
    pub message: &'static str,
}

#[derive(Debug, Clone)]
pub enum TelemetryEvent {
    WriteFailed(WriteFailedEvent),
    DrainCompleted(DrainCompletedEvent),
    Profile(ProfileEvent),
}

/// Process-wide observer of pipeline events, e.g. the importer's fatal-error reporter.
pub trait GlobalTelemetrySink: Send {
    fn on_event(&mut self, event: TelemetryEvent);
}

fn global_sink() -> &'static Mutex<Option<Box<dyn GlobalTelemetrySink>>> {
    static GLOBAL_SINK: OnceLock<Mutex<Option<Box<dyn GlobalTelemetrySink>>>> = OnceLock::new();
    GLOBAL_SINK.get_or_init(|| Mutex::new(None))
}

fn lock_sink() -> MutexGuard<'static, Option<Box<dyn GlobalTelemetrySink>>> {
    match global_sink().lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Registers a process-wide telemetry event sink; `None` removes the current one.
pub fn set_global_sink(sink: Option<Box<dyn GlobalTelemetrySink>>) {
    *lock_sink() = sink;
}

/// Emits an event to the process-wide sink when configured.
pub fn emit_global(event: TelemetryEvent) {
    if let Some(sink) = lock_sink().as_mut() {
        sink.on_event(event);
    }
}
