use std::time::Duration;

use crate::capture::domain::display_surface::DisplaySurface;
use crate::capture::domain::frame_sink::{FrameRejected, FrameSink};
use crate::overlay::annotation_slot::AnnotationSlot;
use crate::shared::frame::Frame;

/// What happened to a presented frame on the analysis path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameDisposition {
    Forwarded,
    Rejected(FrameRejected),
}

impl FrameDisposition {
    pub fn is_forwarded(&self) -> bool {
        matches!(self, FrameDisposition::Forwarded)
    }
}

/// Per-outcome frame counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AdapterStats {
    pub presented: u64,
    pub forwarded: u64,
    pub busy: u64,
    pub throttled: u64,
    pub malformed: u64,
    pub detached: u64,
}

impl AdapterStats {
    fn record(&mut self, disposition: FrameDisposition) {
        let counter = match disposition {
            FrameDisposition::Forwarded => &mut self.forwarded,
            FrameDisposition::Rejected(FrameRejected::Busy) => &mut self.busy,
            FrameDisposition::Rejected(FrameRejected::Throttled) => &mut self.throttled,
            FrameDisposition::Rejected(FrameRejected::Malformed) => &mut self.malformed,
            FrameDisposition::Rejected(FrameRejected::Detached) => &mut self.detached,
        };
        *counter += 1;
    }
}

/// Sits between the frame source and the display on the UI thread.
///
/// Every frame is presented with the current annotations. Frames are
/// additionally forwarded to the attached sink, subject to the detect
/// interval (measured on capture timestamps) and the sink's own admission.
/// Rejected frames are dropped, never queued.
pub struct FrameSourceAdapter {
    surface: Box<dyn DisplaySurface>,
    sink: Option<Box<dyn FrameSink>>,
    detect_interval: Duration,
    last_accepted: Option<Duration>,
    stats: AdapterStats,
}

impl FrameSourceAdapter {
    pub fn new(surface: Box<dyn DisplaySurface>, detect_interval: Duration) -> Self {
        Self {
            surface,
            sink: None,
            detect_interval,
            last_accepted: None,
            stats: AdapterStats::default(),
        }
    }

    pub fn attach(&mut self, sink: Box<dyn FrameSink>) {
        self.sink = Some(sink);
        self.last_accepted = None;
    }

    pub fn detach(&mut self) -> Option<Box<dyn FrameSink>> {
        self.sink.take()
    }

    pub fn is_attached(&self) -> bool {
        self.sink.is_some()
    }

    pub fn set_detect_interval(&mut self, interval: Duration) {
        self.detect_interval = interval;
    }

    pub fn detect_interval(&self) -> Duration {
        self.detect_interval
    }

    pub fn stats(&self) -> AdapterStats {
        self.stats
    }

    pub fn present_frame(
        &mut self,
        frame: &Frame,
        annotations: &[AnnotationSlot],
    ) -> FrameDisposition {
        self.stats.presented += 1;
        if let Err(e) = self.surface.present(frame, annotations) {
            log::warn!("Failed to present frame {}: {e}", frame.index());
        }

        let disposition = match self.forward(frame) {
            Ok(()) => FrameDisposition::Forwarded,
            Err(reason) => {
                log::trace!("Frame {} not analysed: {reason}", frame.index());
                FrameDisposition::Rejected(reason)
            }
        };
        self.stats.record(disposition);
        disposition
    }

    /// Presents `frame` again with updated annotations.
    ///
    /// Nothing is forwarded and no counter changes.
    pub fn refresh(&mut self, frame: &Frame, annotations: &[AnnotationSlot]) {
        if let Err(e) = self.surface.present(frame, annotations) {
            log::warn!("Failed to refresh frame {}: {e}", frame.index());
        }
    }

    fn forward(&mut self, frame: &Frame) -> Result<(), FrameRejected> {
        if !frame.is_well_formed() {
            return Err(FrameRejected::Malformed);
        }
        let sink = self.sink.as_ref().ok_or(FrameRejected::Detached)?;

        let timestamp = frame.timestamp();
        if let Some(last) = self.last_accepted {
            if timestamp < last {
                log::debug!("Frame {} went back in time; throttle reset", frame.index());
            } else if timestamp - last < self.detect_interval {
                return Err(FrameRejected::Throttled);
            }
        }

        sink.submit(frame.clone())?;
        self.last_accepted = Some(timestamp);
        Ok(())
    }
}
