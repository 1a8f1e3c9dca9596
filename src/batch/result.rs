use std::{
    fmt,
    path::{Path, PathBuf},
};

use serde::Serialize;

use crate::{
    analysis::{
        ela::ElaFindings, fingerprint::DigestSet, lsb::LsbResult, perceptual::PerceptualHashPair,
        statistics::ImageStatistics,
    },
    buffer::PixelBuffer,
    detection::SuspicionVerdict,
    error::ForensicsError,
    metadata::MetadataResult,
};

/// Lifecycle of one image: `Pending -> Decoding -> Analyzing -> Completed`,
/// with `Failed` reachable from every non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageState {
    Pending,
    Decoding,
    Analyzing,
    Completed,
    Failed,
}

impl ImageState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ImageState::Completed | ImageState::Failed)
    }

    pub fn can_advance_to(&self, next: ImageState) -> bool {
        use ImageState::*;

        matches!(
            (self, next),
            (Pending, Decoding)
                | (Decoding, Analyzing)
                | (Analyzing, Completed)
                | (Pending | Decoding | Analyzing, Failed)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Fingerprint,
    Metadata,
    Decode,
    Statistics,
    PerceptualHash,
    Ela,
    Lsb,
    Artifact,
    Pipeline,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Fingerprint => "fingerprint",
            Stage::Metadata => "metadata",
            Stage::Decode => "decode",
            Stage::Statistics => "statistics",
            Stage::PerceptualHash => "perceptual hash",
            Stage::Ela => "ela",
            Stage::Lsb => "lsb",
            Stage::Artifact => "artifact",
            Stage::Pipeline => "pipeline",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageFailure {
    pub stage: Stage,
    pub message: String,
}

/// Everything learned about one input image. Partially populated results
/// are valid: each stage that failed leaves its field empty and a
/// [`StageFailure`] behind.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub path: PathBuf,
    pub file_name: String,
    pub state: ImageState,
    pub digests: Option<DigestSet>,
    pub metadata: MetadataResult,
    pub dimensions: Option<(u32, u32)>,
    pub statistics: Option<ImageStatistics>,
    pub perceptual_hashes: Option<PerceptualHashPair>,
    pub ela: Option<ElaFindings>,
    pub ela_image_path: Option<PathBuf>,
    pub lsb: Option<LsbResult>,
    pub verdict: SuspicionVerdict,
    pub stage_failures: Vec<StageFailure>,
    /// Failure that ended the image's analysis early.
    pub error: Option<String>,
    #[serde(skip)]
    pub(crate) ela_difference: Option<PixelBuffer>,
}

impl AnalysisResult {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Self {
            path,
            file_name,
            state: ImageState::Pending,
            digests: None,
            metadata: MetadataResult::default(),
            dimensions: None,
            statistics: None,
            perceptual_hashes: None,
            ela: None,
            ela_image_path: None,
            lsb: None,
            verdict: SuspicionVerdict::default(),
            stage_failures: Vec::new(),
            error: None,
            ela_difference: None,
        }
    }

    pub fn advance(&mut self, next: ImageState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "invalid transition {:?} -> {:?}",
            self.state,
            next
        );
        log::debug!("{}: {:?} -> {:?}", self.path.display(), self.state, next);
        self.state = next;
    }

    pub fn record_stage_failure(&mut self, stage: Stage, err: &ForensicsError) {
        log::warn!("{}: {} stage failed: {}", self.path.display(), stage, err);
        self.stage_failures.push(StageFailure {
            stage,
            message: err.to_string(),
        });
    }

    /// Ends the analysis of this image. Fields populated so far are kept.
    pub fn fail(&mut self, stage: Stage, err: &ForensicsError) {
        log::warn!("{}: analysis failed at {} stage: {}", self.path.display(), stage, err);
        self.error = Some(err.to_string());
        if !self.state.is_terminal() {
            self.advance(ImageState::Failed);
        }
    }

    /// Shorthand for a result that never got past its first stage.
    pub fn failed<P: AsRef<Path>>(path: P, stage: Stage, err: &ForensicsError) -> Self {
        let mut result = Self::new(path);
        result.fail(stage, err);
        result
    }

    /// Hands the ELA difference image to the caller, leaving `None` behind.
    pub fn take_ela_difference(&mut self) -> Option<PixelBuffer> {
        self.ela_difference.take()
    }

    /// Whether the pixel stages ran, whatever each of them produced.
    pub fn was_analyzed(&self) -> bool {
        self.dimensions.is_some()
    }

    pub fn is_completed(&self) -> bool {
        self.state == ImageState::Completed
    }

    /// Fatal error followed by stage failures, `None` when everything ran.
    pub fn error_summary(&self) -> Option<String> {
        let mut parts = Vec::new();
        if let Some(err) = &self.error {
            parts.push(err.clone());
        }
        for failure in &self.stage_failures {
            parts.push(failure.message.clone());
        }

        (!parts.is_empty()).then(|| parts.join("; "))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub suspicious: usize,
}

impl BatchSummary {
    pub fn from_results(results: &[AnalysisResult]) -> Self {
        results.iter().fold(
            BatchSummary {
                total: results.len(),
                ..Default::default()
            },
            |mut summary, result| {
                match result.state {
                    ImageState::Completed => summary.completed += 1,
                    ImageState::Failed => summary.failed += 1,
                    _ => {}
                }
                if result.verdict.suspicious {
                    summary.suspicious += 1;
                }
                summary
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_transitions() {
        use ImageState::*;

        assert!(Pending.can_advance_to(Decoding));
        assert!(Decoding.can_advance_to(Analyzing));
        assert!(Analyzing.can_advance_to(Completed));
        assert!(Decoding.can_advance_to(Failed));
        assert!(Pending.can_advance_to(Failed));

        assert!(!Pending.can_advance_to(Completed));
        assert!(!Completed.can_advance_to(Failed));
        assert!(!Failed.can_advance_to(Analyzing));
    }

    #[test]
    fn test_failed_result_keeps_message() {
        let err = ForensicsError::DecodeFailed("bad header".into());
        let result = AnalysisResult::failed("/tmp/x.png", Stage::Decode, &err);

        assert_eq!(result.state, ImageState::Failed);
        assert_eq!(result.file_name, "x.png");
        assert_eq!(result.error_summary().unwrap(), "Decode error: bad header");
    }

    #[test]
    fn test_error_summary_joins_stage_failures() {
        let mut result = AnalysisResult::new("a.jpg");
        assert!(result.error_summary().is_none());

        result.record_stage_failure(Stage::Ela, &ForensicsError::Ela("encoder".into()));
        result.record_stage_failure(Stage::Lsb, &ForensicsError::EmptyImage);

        assert_eq!(
            result.error_summary().unwrap(),
            "ELA error: encoder; Image has no pixels"
        );
    }

    #[test]
    fn test_was_analyzed_tracks_pixel_stages() {
        let failed = AnalysisResult::failed("b.png", Stage::Decode, &ForensicsError::EmptyImage);
        assert!(!failed.was_analyzed());

        let mut analyzed = AnalysisResult::new("a.png");
        analyzed.dimensions = Some((4, 4));
        assert!(analyzed.was_analyzed());
    }

    #[test]
    fn test_summary_counts() {
        let mut ok = AnalysisResult::new("a.png");
        ok.advance(ImageState::Decoding);
        ok.advance(ImageState::Analyzing);
        ok.advance(ImageState::Completed);
        ok.verdict.suspicious = true;

        let bad = AnalysisResult::failed("b.png", Stage::Decode, &ForensicsError::EmptyImage);

        let summary = BatchSummary::from_results(&[ok, bad]);
        assert_eq!(
            summary,
            BatchSummary {
                total: 2,
                completed: 1,
                failed: 1,
                suspicious: 1
            }
        );
    }
}
