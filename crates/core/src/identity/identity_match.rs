use std::sync::Arc;
use std::time::Duration;

use crate::identity::identity_record::IdentityRecord;
use crate::shared::constants::UNKNOWN_LABEL;
use crate::shared::region::DetectionRegion;

/// Classification of one detected face.
///
/// Confidence only exists for identified faces.
#[derive(Clone, Debug, PartialEq)]
pub enum MatchOutcome {
    Identified {
        record: Arc<IdentityRecord>,
        confidence: f64,
    },
    Unknown,
}

#[derive(Clone, Debug, PartialEq)]
pub struct IdentityMatch {
    pub region: DetectionRegion,
    pub outcome: MatchOutcome,
}

impl IdentityMatch {
    pub fn identified(region: DetectionRegion, record: Arc<IdentityRecord>, confidence: f64) -> Self {
        Self {
            region,
            outcome: MatchOutcome::Identified { record, confidence },
        }
    }

    pub fn unknown(region: DetectionRegion) -> Self {
        Self {
            region,
            outcome: MatchOutcome::Unknown,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self.outcome, MatchOutcome::Unknown)
    }

    pub fn confidence(&self) -> Option<f64> {
        match self.outcome {
            MatchOutcome::Identified { confidence, .. } => Some(confidence),
            MatchOutcome::Unknown => None,
        }
    }

    pub fn display_string(&self) -> String {
        match &self.outcome {
            MatchOutcome::Identified { record, .. } => record.display_string(),
            MatchOutcome::Unknown => UNKNOWN_LABEL.to_string(),
        }
    }
}

/// All matches for one processed frame, in detector output order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResultBatch {
    pub frame_index: usize,
    pub timestamp: Duration,
    pub matches: Vec<IdentityMatch>,
}

impl ResultBatch {
    pub fn new(frame_index: usize, timestamp: Duration, matches: Vec<IdentityMatch>) -> Self {
        Self {
            frame_index,
            timestamp,
            matches,
        }
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }
}
