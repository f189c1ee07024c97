//! Screen-recording collaborator.
//!
//! Engines publish [`RecordingSignal`] values on a `tokio::sync::watch`
//! channel. The host drains the channel between input events and hands each
//! new value to the controller; engines never touch wizard state directly.

use crate::errors::GuidepostError;
use crate::logging::append_run_log;
use crate::runtime::{ProcessRequest, ProcessRunner, StopOutcome};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingSignal {
    pub active: bool,
    pub error: Option<String>,
    pub stopped: bool,
}

impl RecordingSignal {
    pub fn active() -> Self {
        Self {
            active: true,
            error: None,
            stopped: false,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            active: false,
            error: Some(message.into()),
            stopped: false,
        }
    }

    pub fn stopped(error: Option<String>) -> Self {
        Self {
            active: false,
            error,
            stopped: true,
        }
    }

    pub fn status_line(&self) -> String {
        if let Some(error) = &self.error {
            return format!("recording error: {error}");
        }
        if self.active {
            "recording".to_string()
        } else if self.stopped {
            "recording stopped, press r to reshare".to_string()
        } else {
            "not recording".to_string()
        }
    }
}

pub trait RecordingEngine: Send + Sync {
    /// Fire-and-forget start request. The outcome is always published on the
    /// signal channel; the returned error only mirrors it for logging.
    fn request_start(&self) -> Result<(), GuidepostError>;
    fn stop(&self) -> Result<(), GuidepostError>;
    /// Refreshes the published signal from the underlying capture, if any.
    fn poll(&self) -> Result<(), GuidepostError> {
        Ok(())
    }
    fn subscribe(&self) -> watch::Receiver<RecordingSignal>;
}

#[derive(Debug)]
pub struct SignalPublisher {
    tx: watch::Sender<RecordingSignal>,
}

impl SignalPublisher {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(RecordingSignal::default());
        Self { tx }
    }

    pub fn publish(&self, signal: RecordingSignal) {
        self.tx.send_replace(signal);
    }

    pub fn current(&self) -> RecordingSignal {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<RecordingSignal> {
        self.tx.subscribe()
    }
}

impl Default for SignalPublisher {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracks the previous `active` level so that only false -> true edges are
/// reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActiveEdge {
    last_active: bool,
}

impl ActiveEdge {
    pub fn observe(&mut self, active: bool) -> bool {
        let rose = active && !self.last_active;
        self.last_active = active;
        rose
    }

}

/// Runs an external capture command; the capture is active for as long as
/// the child process lives.
pub struct ProcessRecordingEngine {
    runner: Arc<dyn ProcessRunner>,
    request: ProcessRequest,
    stop_grace: Duration,
    handle: Mutex<Option<u64>>,
    publisher: SignalPublisher,
}

pub const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(5);

impl ProcessRecordingEngine {
    pub fn new(runner: Arc<dyn ProcessRunner>, request: ProcessRequest) -> Self {
        Self {
            runner,
            request,
            stop_grace: DEFAULT_STOP_GRACE,
            handle: Mutex::new(None),
            publisher: SignalPublisher::new(),
        }
    }

    /// How long `stop` waits for the capture to finish before killing it.
    pub fn with_stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace = grace;
        self
    }

    fn handle_slot(&self) -> Result<std::sync::MutexGuard<'_, Option<u64>>, GuidepostError> {
        self.handle
            .lock()
            .map_err(|_| GuidepostError::Recording("recorder lock poisoned".to_string()))
    }
}

impl RecordingEngine for ProcessRecordingEngine {
    fn request_start(&self) -> Result<(), GuidepostError> {
        self.poll()?;
        let mut slot = self.handle_slot()?;
        if slot.is_some() {
            self.publisher.publish(RecordingSignal::active());
            return Ok(());
        }
        match self.runner.spawn(self.request.clone()) {
            Ok(handle) => {
                *slot = Some(handle);
                append_run_log(
                    "info",
                    "recording.started",
                    json!({"program": self.request.program, "handle": handle}),
                );
                self.publisher.publish(RecordingSignal::active());
                Ok(())
            }
            Err(error) => {
                self.publisher.publish(RecordingSignal::failed(error.to_string()));
                Err(GuidepostError::Recording(error.to_string()))
            }
        }
    }

    fn stop(&self) -> Result<(), GuidepostError> {
        let handle = self.handle_slot()?.take();
        if let Some(handle) = handle {
            let outcome = self.runner.stop(handle, self.stop_grace)?;
            append_run_log(
                "info",
                "recording.stopped",
                json!({"handle": handle, "graceful": outcome == StopOutcome::Exited}),
            );
            self.publisher.publish(RecordingSignal::stopped(None));
        }
        Ok(())
    }

    fn poll(&self) -> Result<(), GuidepostError> {
        let mut slot = self.handle_slot()?;
        let Some(handle) = *slot else {
            return Ok(());
        };
        let Some(output) = self.runner.try_wait(handle)? else {
            return Ok(());
        };
        *slot = None;
        let error = if output.exit_code == 0 {
            None
        } else if output.stderr.trim().is_empty() {
            Some(format!("recorder exited with code {}", output.exit_code))
        } else {
            Some(output.stderr.trim().to_string())
        };
        append_run_log(
            "warn",
            "recording.exited",
            json!({"exit_code": output.exit_code, "error": error}),
        );
        self.publisher.publish(RecordingSignal::stopped(error));
        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<RecordingSignal> {
        self.publisher.subscribe()
    }
}

/// In-process engine for demos and tests. Starts succeed immediately unless
/// failures were queued with [`SimulatedRecordingEngine::failing_first`].
#[derive(Default)]
pub struct SimulatedRecordingEngine {
    publisher: SignalPublisher,
    pending_failures: AtomicUsize,
    start_requests: AtomicUsize,
}

impl SimulatedRecordingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_first(failures: usize) -> Self {
        let engine = Self::default();
        engine.pending_failures.store(failures, Ordering::SeqCst);
        engine
    }

    pub fn start_requests(&self) -> usize {
        self.start_requests.load(Ordering::SeqCst)
    }

    /// Simulates the participant ending the share from outside the wizard.
    pub fn end_share(&self) {
        self.publisher.publish(RecordingSignal::stopped(None));
    }

    pub fn publisher(&self) -> &SignalPublisher {
        &self.publisher
    }
}

impl RecordingEngine for SimulatedRecordingEngine {
    fn request_start(&self) -> Result<(), GuidepostError> {
        self.start_requests.fetch_add(1, Ordering::SeqCst);
        let failed = self
            .pending_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failed {
            let message = "screen share was denied".to_string();
            self.publisher.publish(RecordingSignal::failed(message.clone()));
            return Err(GuidepostError::Recording(message));
        }
        self.publisher.publish(RecordingSignal::active());
        Ok(())
    }

    fn stop(&self) -> Result<(), GuidepostError> {
        self.publisher.publish(RecordingSignal::stopped(None));
        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<RecordingSignal> {
        self.publisher.subscribe()
    }
}

/// Engine that accepts every request and never publishes anything. Replays
/// feed recorded signals to the controller instead.
#[derive(Default)]
pub struct InertRecordingEngine {
    publisher: SignalPublisher,
}

impl RecordingEngine for InertRecordingEngine {
    fn request_start(&self) -> Result<(), GuidepostError> {
        Ok(())
    }

    fn stop(&self) -> Result<(), GuidepostError> {
        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<RecordingSignal> {
        self.publisher.subscribe()
    }
}

/// Returns the latest signal if it changed since the receiver last looked.
pub fn take_changed(rx: &mut watch::Receiver<RecordingSignal>) -> Option<RecordingSignal> {
    match rx.has_changed() {
        Ok(true) => Some(rx.borrow_and_update().clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{FakeProcessRunner, ProcessOutput};

    fn capture_request() -> ProcessRequest {
        ProcessRequest {
            program: "screen-capture".to_string(),
            args: vec!["--display".to_string(), "0".to_string()],
            cwd: None,
            stop_input: Some("q\n".to_string()),
        }
    }

    #[test]
    fn edge_detector_fires_only_on_rising_edges() {
        let mut edge = ActiveEdge::default();
        assert!(!edge.observe(false));
        assert!(edge.observe(true));
        assert!(!edge.observe(true));
        assert!(!edge.observe(true));
        assert!(!edge.observe(false));
        assert!(edge.observe(true));
    }

    #[test]
    fn process_engine_publishes_active_and_is_idempotent() {
        let runner = Arc::new(FakeProcessRunner::default());
        let engine = ProcessRecordingEngine::new(runner.clone(), capture_request());
        let mut rx = engine.subscribe();

        engine.request_start().expect("start");
        assert_eq!(take_changed(&mut rx), Some(RecordingSignal::active()));

        engine.request_start().expect("second start");
        assert_eq!(runner.spawned().len(), 1);
    }

    #[test]
    fn process_engine_reports_spawn_failure_on_the_signal() {
        let runner = Arc::new(FakeProcessRunner::default());
        runner.fail_next_spawn(GuidepostError::Process("screen-capture: not found".to_string()));
        let engine = ProcessRecordingEngine::new(runner.clone(), capture_request());
        let mut rx = engine.subscribe();

        let err = engine.request_start().expect_err("spawn fails");
        assert!(matches!(err, GuidepostError::Recording(_)));
        let signal = take_changed(&mut rx).expect("published");
        assert!(!signal.active);
        assert!(signal.error.unwrap_or_default().contains("not found"));

        engine.request_start().expect("retry succeeds");
        assert_eq!(take_changed(&mut rx), Some(RecordingSignal::active()));
    }

    #[test]
    fn process_exit_is_reported_as_stopped() {
        let runner = Arc::new(FakeProcessRunner::default());
        let engine = ProcessRecordingEngine::new(runner.clone(), capture_request());
        let mut rx = engine.subscribe();
        engine.request_start().expect("start");
        let _ = take_changed(&mut rx);

        runner.exit(
            0,
            ProcessOutput {
                exit_code: 1,
                stdout: String::new(),
                stderr: "permission revoked\n".to_string(),
            },
        );
        engine.poll().expect("poll");
        let signal = take_changed(&mut rx).expect("published");
        assert!(signal.stopped);
        assert_eq!(signal.error.as_deref(), Some("permission revoked"));

        engine.request_start().expect("reshare");
        assert_eq!(runner.spawned().len(), 2);
    }

    #[test]
    fn stop_ends_the_capture_process() {
        let runner = Arc::new(FakeProcessRunner::default());
        let engine = ProcessRecordingEngine::new(runner.clone(), capture_request())
            .with_stop_grace(Duration::from_millis(250));
        engine.request_start().expect("start");
        engine.stop().expect("stop");
        assert_eq!(runner.stops(), vec![0]);
        assert!(engine.publisher.current().stopped);
        engine.stop().expect("second stop is a no-op");
        assert_eq!(runner.stops().len(), 1);
    }

    #[test]
    fn simulated_engine_fails_the_queued_number_of_times() {
        let engine = SimulatedRecordingEngine::failing_first(1);
        assert!(engine.request_start().is_err());
        assert!(engine.request_start().is_ok());
        assert_eq!(engine.start_requests(), 2);
        assert_eq!(engine.publisher().current(), RecordingSignal::active());
    }

    #[test]
    fn status_line_prefers_errors() {
        assert_eq!(RecordingSignal::failed("denied").status_line(), "recording error: denied");
        assert_eq!(RecordingSignal::active().status_line(), "recording");
        assert!(RecordingSignal::stopped(None).status_line().contains("reshare"));
    }
}
