//! Background tracking session.
//!
//! A session subscribes to a live location source and feeds every sample to
//! a shared [`PathRecorder`] from a worker thread. It outlives whatever UI
//! started it and is stopped explicitly (or on drop), which persists the walk.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, error, info};

use crate::recorder::{PathRecorder, PermissionGate};
use crate::store::lock;
use crate::{Coordinate, Result};

/// Source of live location readings.
pub trait LiveLocationSource: PermissionGate {
    /// One-shot reading of the current location.
    fn current(&self) -> Result<Coordinate>;

    /// Continuous readings at roughly `interval`. The stream ends when the
    /// sender is dropped.
    fn subscribe(&self, interval: Duration) -> Receiver<Coordinate>;
}

/// Timing for tracking sessions.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingConfig {
    /// Sampling interval requested from the location source.
    /// Default: 1000 ms
    pub sample_interval: Duration,

    /// Lower bound on the requested interval.
    /// Default: 500 ms
    pub min_sample_interval: Duration,

    /// How often the worker checks for shutdown while waiting for samples.
    /// Default: 100 ms
    pub poll_interval: Duration,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            sample_interval: Duration::from_millis(1000),
            min_sample_interval: Duration::from_millis(500),
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// A running recording fed by a location subscription.
pub struct TrackingSession {
    recorder: Arc<Mutex<PathRecorder>>,
    shutdown: Arc<AtomicBool>,
    worker: Option<JoinHandle<usize>>,
    stopped: bool,
}

impl TrackingSession {
    /// Start recording and spawn the worker.
    ///
    /// Fails with `PermissionDenied` (and spawns nothing) if the recorder
    /// cannot start.
    pub fn spawn(
        recorder: Arc<Mutex<PathRecorder>>,
        source: &dyn LiveLocationSource,
        config: &TrackingConfig,
    ) -> Result<Self> {
        lock(&recorder).start()?;

        let interval = config.sample_interval.max(config.min_sample_interval);
        let samples = source.subscribe(interval);
        let shutdown = Arc::new(AtomicBool::new(false));

        let worker = {
            let recorder = Arc::clone(&recorder);
            let shutdown = Arc::clone(&shutdown);
            let poll = config.poll_interval;
            thread::spawn(move || run_worker(samples, recorder, shutdown, poll))
        };

        info!(
            "[TrackingSession] Started, sampling every {} ms",
            interval.as_millis()
        );

        Ok(Self {
            recorder,
            shutdown,
            worker: Some(worker),
            stopped: false,
        })
    }

    /// Whether the worker is still consuming samples.
    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .map(|w| !w.is_finished())
            .unwrap_or(false)
    }

    /// Stop the worker and the recording.
    ///
    /// Returns the id of the persisted path, if one was written.
    pub fn stop(&mut self) -> Option<String> {
        if self.stopped {
            return None;
        }
        self.stopped = true;
        self.shutdown.store(true, Ordering::SeqCst);

        if let Some(worker) = self.worker.take() {
            match worker.join() {
                Ok(appended) => debug!("[TrackingSession] Worker appended {} samples", appended),
                Err(_) => error!("[TrackingSession] Worker panicked"),
            }
        }

        let id = lock(&self.recorder).stop();
        info!("[TrackingSession] Stopped");
        id
    }
}

impl Drop for TrackingSession {
    fn drop(&mut self) {
        if !self.stopped {
            self.stop();
        }
    }
}

fn run_worker(
    samples: Receiver<Coordinate>,
    recorder: Arc<Mutex<PathRecorder>>,
    shutdown: Arc<AtomicBool>,
    poll: Duration,
) -> usize {
    let mut appended = 0;

    while !shutdown.load(Ordering::SeqCst) {
        match samples.recv_timeout(poll) {
            Ok(coordinate) => {
                if lock(&recorder).append(coordinate) {
                    appended += 1;
                }
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                info!("[TrackingSession] Location stream closed");
                break;
            }
        }
    }

    // Samples delivered before stop() belong to the walk
    let mut recorder = lock(&recorder);
    while let Ok(coordinate) = samples.try_recv() {
        if recorder.append(coordinate) {
            appended += 1;
        }
    }

    appended
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, WriteRecord};
    use crate::PathMatchError;
    use std::sync::mpsc::{self, Sender};
    use std::time::Instant;

    /// Location source whose subscription is driven by the test.
    struct ScriptedSource {
        granted: bool,
        sender: Mutex<Option<Sender<Coordinate>>>,
    }

    impl ScriptedSource {
        fn new(granted: bool) -> Self {
            Self {
                granted,
                sender: Mutex::new(None),
            }
        }

        fn send(&self, c: Coordinate) {
            if let Some(tx) = self.sender.lock().unwrap().as_ref() {
                tx.send(c).unwrap();
            }
        }

        fn close(&self) {
            self.sender.lock().unwrap().take();
        }
    }

    impl PermissionGate for ScriptedSource {
        fn location_granted(&self) -> bool {
            self.granted
        }
    }

    impl LiveLocationSource for ScriptedSource {
        fn current(&self) -> Result<Coordinate> {
            Err(PathMatchError::LocationUnavailable)
        }

        fn subscribe(&self, _interval: Duration) -> Receiver<Coordinate> {
            let (tx, rx) = mpsc::channel();
            *self.sender.lock().unwrap() = Some(tx);
            rx
        }
    }

    fn fast_config() -> TrackingConfig {
        TrackingConfig {
            poll_interval: Duration::from_millis(5),
            ..TrackingConfig::default()
        }
    }

    fn wait_for_points(recorder: &Arc<Mutex<PathRecorder>>, count: usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while recorder.lock().unwrap().point_count() < count {
            assert!(Instant::now() < deadline, "timed out waiting for samples");
            thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn test_session_records_and_persists() {
        let store = Arc::new(MemoryStore::new());
        let source = ScriptedSource::new(true);
        let recorder = Arc::new(Mutex::new(PathRecorder::new(store.clone(), Arc::new(true))));

        let mut session = TrackingSession::spawn(recorder.clone(), &source, &fast_config()).unwrap();
        assert!(session.is_running());

        source.send(Coordinate::new(1.0, 1.0, 0.0));
        source.send(Coordinate::new(1.0, 1.00001, 0.0));
        wait_for_points(&recorder, 2);

        let id = session.stop().unwrap();
        assert!(!session.is_running());
        assert_eq!(
            store.writes(),
            vec![WriteRecord::Path { id, point_count: 2 }]
        );

        // Stopping twice writes nothing more
        assert_eq!(session.stop(), None);
        assert_eq!(store.writes().len(), 1);
    }

    #[test]
    fn test_stop_keeps_queued_samples() {
        for _ in 0..50 {
            let store = Arc::new(MemoryStore::new());
            let source = ScriptedSource::new(true);
            let recorder = Arc::new(Mutex::new(PathRecorder::new(store.clone(), Arc::new(true))));

            let mut session =
                TrackingSession::spawn(recorder.clone(), &source, &fast_config()).unwrap();
            for i in 0..3 {
                source.send(Coordinate::new(1.0, 1.0 + i as f64 * 0.00001, 0.0));
            }
            let id = session.stop().expect("queued samples should be persisted");

            assert_eq!(
                store.writes(),
                vec![WriteRecord::Path { id, point_count: 3 }]
            );
        }
    }

    #[test]
    fn test_session_requires_permission() {
        let store = Arc::new(MemoryStore::new());
        let source = ScriptedSource::new(false);
        let recorder = Arc::new(Mutex::new(PathRecorder::new(store.clone(), Arc::new(false))));

        let result = TrackingSession::spawn(recorder.clone(), &source, &fast_config());
        assert!(matches!(result, Err(PathMatchError::PermissionDenied)));
        assert!(!recorder.lock().unwrap().is_recording());
    }

    #[test]
    fn test_closed_stream_ends_worker_but_keeps_recording() {
        let store = Arc::new(MemoryStore::new());
        let source = ScriptedSource::new(true);
        let recorder = Arc::new(Mutex::new(PathRecorder::new(store.clone(), Arc::new(true))));

        let mut session = TrackingSession::spawn(recorder.clone(), &source, &fast_config()).unwrap();
        source.send(Coordinate::new(1.0, 1.0, 0.0));
        wait_for_points(&recorder, 1);
        source.close();

        let deadline = Instant::now() + Duration::from_secs(5);
        while session.is_running() {
            assert!(Instant::now() < deadline, "worker did not exit");
            thread::sleep(Duration::from_millis(2));
        }
        assert!(recorder.lock().unwrap().is_recording());

        assert!(session.stop().is_some());
        assert_eq!(store.path_count(), 1);
    }

    #[test]
    fn test_drop_stops_session() {
        let store = Arc::new(MemoryStore::new());
        let source = ScriptedSource::new(true);
        let recorder = Arc::new(Mutex::new(PathRecorder::new(store.clone(), Arc::new(true))));

        {
            let _session =
                TrackingSession::spawn(recorder.clone(), &source, &fast_config()).unwrap();
            source.send(Coordinate::new(1.0, 1.0, 0.0));
            wait_for_points(&recorder, 1);
        }

        assert!(!recorder.lock().unwrap().is_recording());
        assert_eq!(store.path_count(), 1);
    }
}
