use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use thiserror::Error;

use crate::capture::domain::display_surface::DisplaySurface;
use crate::capture::frame_source_adapter::{AdapterStats, FrameDisposition, FrameSourceAdapter};
use crate::identity::identity_match::ResultBatch;
use crate::overlay::overlay_manager::OverlayManager;
use crate::recognition::recognizer::Recognizer;
use crate::recognition::worker::{RecognitionWorker, WorkerStats};
use crate::shared::frame::Frame;
use crate::shared::settings::RecognitionSettings;
use crate::shared::threshold::SharedThreshold;

const FLUSH_POLL: Duration = Duration::from_millis(1);

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("still capture is only available in still mode")]
    WrongMode,
    #[error("no frame has been presented yet")]
    NoFrame,
    #[error("recognizer was lost after the worker thread panicked")]
    RecognizerLost,
    #[error("failed to start recognition worker: {0}")]
    Spawn(#[from] std::io::Error),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Stopped,
    Active,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CaptureMode {
    Still,
    #[default]
    Video,
}

/// Owns one capture session: the adapter, the overlay pool and the worker.
///
/// All methods are called from the UI thread. Results from the worker are
/// applied to the overlay only at UI scheduling points ([`present_frame`]
/// and [`pump_results`]), in the order the worker emitted them.
///
/// [`present_frame`]: SessionController::present_frame
/// [`pump_results`]: SessionController::pump_results
pub struct SessionController {
    adapter: FrameSourceAdapter,
    overlay: OverlayManager,
    threshold: SharedThreshold,
    recognizer: Option<Recognizer>,
    worker: Option<RecognitionWorker>,
    results: Option<Receiver<ResultBatch>>,
    mode: CaptureMode,
    last_frame: Option<Frame>,
}

impl SessionController {
    pub fn new(
        surface: Box<dyn DisplaySurface>,
        recognizer: Recognizer,
        settings: &RecognitionSettings,
    ) -> Self {
        let threshold = recognizer.threshold().clone();
        threshold.set(settings.threshold);
        Self {
            adapter: FrameSourceAdapter::new(surface, settings.detect_interval()),
            overlay: OverlayManager::new(settings.max_annotations),
            threshold,
            recognizer: Some(recognizer),
            worker: None,
            results: None,
            mode: CaptureMode::default(),
            last_frame: None,
        }
    }

    /// Spawns the worker and starts forwarding frames. No-op when active.
    pub fn start(&mut self) -> Result<(), SessionError> {
        if self.worker.is_some() {
            return Ok(());
        }
        let recognizer = self.recognizer.take().ok_or(SessionError::RecognizerLost)?;
        let identities = recognizer.database().len();
        let (worker, results) = RecognitionWorker::spawn(recognizer)?;
        self.adapter.attach(Box::new(worker.handle()));
        self.worker = Some(worker);
        self.results = Some(results);
        log::info!(
            "Session started ({} identities, threshold {:.2}, interval {:?}, {} slots)",
            identities,
            self.threshold.get(),
            self.adapter.detect_interval(),
            self.overlay.capacity()
        );
        Ok(())
    }

    /// Stops forwarding, discards undelivered results and joins the worker.
    ///
    /// The overlay is cleared. The recognizer is kept for a later [`start`].
    ///
    /// [`start`]: SessionController::start
    pub fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        self.adapter.detach();
        self.results = None;
        self.recognizer = worker.shutdown();
        self.overlay.clear();
        log::info!("Session stopped");
    }

    pub fn state(&self) -> SessionState {
        if self.worker.is_some() {
            SessionState::Active
        } else {
            SessionState::Stopped
        }
    }

    /// Handles one decoded frame from the video source.
    pub fn present_frame(&mut self, frame: Frame) -> FrameDisposition {
        self.pump_results();
        let disposition = self.adapter.present_frame(&frame, self.overlay.slots());
        self.last_frame = Some(frame);
        disposition
    }

    /// Applies every batch the worker has emitted so far, without blocking.
    pub fn pump_results(&mut self) -> usize {
        let Some(results) = self.results.as_ref() else {
            return 0;
        };
        let mut applied = 0;
        for batch in results.try_iter() {
            self.overlay.apply_results(&batch);
            applied += 1;
        }
        applied
    }

    /// Waits up to `timeout` for the frame in flight, then applies every
    /// pending batch. When anything was applied, the last presented frame is
    /// shown again so the surface reflects the final result.
    ///
    /// Returns the number of batches applied. Call before [`stop`] at the
    /// end of a finite source.
    ///
    /// [`stop`]: SessionController::stop
    pub fn flush(&mut self, timeout: Duration) -> usize {
        let Some(handle) = self.worker.as_ref().map(RecognitionWorker::handle) else {
            return 0;
        };
        let deadline = Instant::now() + timeout;
        while !handle.is_idle() {
            if Instant::now() >= deadline {
                log::warn!("Timed out after {timeout:?} waiting for the recognition worker");
                break;
            }
            std::thread::sleep(FLUSH_POLL);
        }

        let applied = self.pump_results();
        if applied > 0 {
            if let Some(frame) = &self.last_frame {
                self.adapter.refresh(frame, self.overlay.slots());
            }
        }
        applied
    }

    /// Applies threshold and detect interval at runtime.
    pub fn apply_settings(&mut self, settings: &RecognitionSettings) {
        self.threshold.set(settings.threshold);
        self.adapter.set_detect_interval(settings.detect_interval());
        if settings.max_annotations != self.overlay.capacity() {
            log::info!(
                "Annotation pool stays at {} slots until the next session",
                self.overlay.capacity()
            );
        }
    }

    pub fn set_capture_mode(&mut self, mode: CaptureMode) {
        self.mode = mode;
    }

    pub fn capture_mode(&self) -> CaptureMode {
        self.mode
    }

    /// Returns the most recently presented frame.
    pub fn capture_still(&self) -> Result<Frame, SessionError> {
        if self.mode != CaptureMode::Still {
            return Err(SessionError::WrongMode);
        }
        self.last_frame.clone().ok_or(SessionError::NoFrame)
    }

    pub fn threshold(&self) -> &SharedThreshold {
        &self.threshold
    }

    pub fn overlay(&self) -> &OverlayManager {
        &self.overlay
    }

    pub fn adapter_stats(&self) -> AdapterStats {
        self.adapter.stats()
    }

    /// Counters of the running worker; `None` while stopped.
    pub fn worker_stats(&self) -> Option<WorkerStats> {
        self.worker.as_ref().map(RecognitionWorker::stats)
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.stop();
    }
}
