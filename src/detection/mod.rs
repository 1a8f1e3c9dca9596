use serde::Serialize;

use crate::analysis::{ela::ElaFindings, lsb::LsbResult};

/// Per-image verdict. Only the ELA signal decides `suspicious`; the LSB score
/// rides along for the report reader to interpret.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct SuspicionVerdict {
    pub suspicious: bool,
    pub ela_bright_fraction: Option<f64>,
    pub lsb_score: Option<f64>,
}

pub struct SuspicionAggregator;

impl SuspicionAggregator {
    /// A missing ELA result means the image is not flagged.
    pub fn combine(ela: Option<&ElaFindings>, lsb: Option<&LsbResult>) -> SuspicionVerdict {
        SuspicionVerdict {
            suspicious: ela.is_some_and(|e| e.suspicious),
            ela_bright_fraction: ela.map(|e| e.bright_fraction),
            lsb_score: lsb.map(|l| l.combined_score),
        }
    }
}
