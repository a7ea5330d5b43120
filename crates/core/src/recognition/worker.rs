use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};

use crate::capture::domain::frame_sink::{FrameRejected, FrameSink};
use crate::identity::identity_match::ResultBatch;
use crate::recognition::recognizer::Recognizer;
use crate::shared::frame::Frame;

const THREAD_NAME: &str = "recognition-worker";

/// Snapshot of the worker's counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WorkerStats {
    /// Frames taken off the channel and analysed.
    pub processed: u64,
    /// Frames that produced no batch because analysis failed.
    pub skipped: u64,
    /// Batches delivered to the result channel.
    pub emitted: u64,
    pub last_duration: Option<Duration>,
}

#[derive(Default)]
struct Shared {
    in_flight: AtomicBool,
    stopped: AtomicBool,
    processed: AtomicU64,
    skipped: AtomicU64,
    emitted: AtomicU64,
    /// Microseconds of the last analysis, plus one; zero means none yet.
    last_duration_us: AtomicU64,
}

impl Shared {
    fn stats(&self) -> WorkerStats {
        let last = self.last_duration_us.load(Ordering::Relaxed);
        WorkerStats {
            processed: self.processed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            emitted: self.emitted.load(Ordering::Relaxed),
            last_duration: last.checked_sub(1).map(Duration::from_micros),
        }
    }
}

/// Runs a [`Recognizer`] on a dedicated thread.
///
/// At most one frame is in flight at any time: [`WorkerHandle::submit`]
/// rejects frames while the previous one is still being analysed. Results
/// arrive on the receiver returned by [`RecognitionWorker::spawn`] in
/// submission order.
pub struct RecognitionWorker {
    handle: WorkerHandle,
    stop_tx: Sender<()>,
    join: Option<JoinHandle<Recognizer>>,
}

/// Cloneable submission side of a running worker.
#[derive(Clone)]
pub struct WorkerHandle {
    frame_tx: Sender<Frame>,
    shared: Arc<Shared>,
}

impl RecognitionWorker {
    pub fn spawn(recognizer: Recognizer) -> std::io::Result<(Self, Receiver<ResultBatch>)> {
        // The in-flight flag bounds the frame channel to one message.
        let (frame_tx, frame_rx) = crossbeam_channel::unbounded::<Frame>();
        let (result_tx, result_rx) = crossbeam_channel::unbounded::<ResultBatch>();
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        let shared = Arc::new(Shared::default());

        let join = std::thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn({
                let shared = Arc::clone(&shared);
                move || run_worker(recognizer, frame_rx, stop_rx, result_tx, shared)
            })?;

        log::debug!("Recognition worker started");

        let worker = Self {
            handle: WorkerHandle { frame_tx, shared },
            stop_tx,
            join: Some(join),
        };
        Ok((worker, result_rx))
    }

    pub fn handle(&self) -> WorkerHandle {
        self.handle.clone()
    }

    pub fn stats(&self) -> WorkerStats {
        self.handle.stats()
    }

    /// Stops the thread, waits for it and hands back the recognizer.
    ///
    /// Returns `None` only if the worker thread panicked.
    pub fn shutdown(mut self) -> Option<Recognizer> {
        self.stop_and_join()
    }

    fn stop_and_join(&mut self) -> Option<Recognizer> {
        let join = self.join.take()?;
        self.handle.shared.stopped.store(true, Ordering::Release);
        let _ = self.stop_tx.try_send(());
        match join.join() {
            Ok(recognizer) => {
                log::debug!("Recognition worker stopped");
                Some(recognizer)
            }
            Err(_) => {
                log::error!("Recognition worker thread panicked");
                None
            }
        }
    }
}

impl Drop for RecognitionWorker {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

impl WorkerHandle {
    pub fn is_busy(&self) -> bool {
        self.shared.in_flight.load(Ordering::Acquire)
    }

    /// True when no frame is in flight and every analysed frame has either
    /// been delivered to the result channel or skipped.
    pub fn is_idle(&self) -> bool {
        if self.is_busy() {
            return false;
        }
        let processed = self.shared.processed.load(Ordering::Acquire);
        let emitted = self.shared.emitted.load(Ordering::Acquire);
        let skipped = self.shared.skipped.load(Ordering::Acquire);
        emitted + skipped == processed
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.stopped.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> WorkerStats {
        self.shared.stats()
    }
}

impl FrameSink for WorkerHandle {
    fn submit(&self, frame: Frame) -> Result<(), FrameRejected> {
        if self.is_stopped() {
            return Err(FrameRejected::Detached);
        }
        if self
            .shared
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(FrameRejected::Busy);
        }
        if self.frame_tx.send(frame).is_err() {
            self.shared.in_flight.store(false, Ordering::Release);
            return Err(FrameRejected::Detached);
        }
        Ok(())
    }
}

fn run_worker(
    mut recognizer: Recognizer,
    frame_rx: Receiver<Frame>,
    stop_rx: Receiver<()>,
    result_tx: Sender<ResultBatch>,
    shared: Arc<Shared>,
) -> Recognizer {
    loop {
        let frame = crossbeam_channel::select! {
            recv(stop_rx) -> _ => break,
            recv(frame_rx) -> msg => match msg {
                Ok(frame) => frame,
                Err(_) => break,
            },
        };
        if shared.stopped.load(Ordering::Acquire) {
            break;
        }

        let started = Instant::now();
        let result = recognizer.recognize(&frame);
        let elapsed_us = started.elapsed().as_micros().min(u64::MAX as u128 - 1) as u64;
        shared.last_duration_us.store(elapsed_us + 1, Ordering::Relaxed);
        shared.processed.fetch_add(1, Ordering::Relaxed);

        // Cleared before emitting: whoever sees batch k may submit at once.
        shared.in_flight.store(false, Ordering::Release);

        match result {
            Ok(batch) => {
                if shared.stopped.load(Ordering::Acquire) {
                    break;
                }
                if result_tx.send(batch).is_err() {
                    log::debug!("Result receiver dropped; worker exiting");
                    break;
                }
                shared.emitted.fetch_add(1, Ordering::Release);
            }
            Err(e) => {
                shared.skipped.fetch_add(1, Ordering::Release);
                log::warn!("Skipping frame {}: {e}", frame.index());
            }
        }
    }
    recognizer
}
