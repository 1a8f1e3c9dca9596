use std::path::{Path, PathBuf};

use image::DynamicImage;

use crate::{
    analysis::{
        ela::{ElaAnalyzer, ElaResult},
        lsb::{LsbAnalyzer, LsbResult},
        perceptual::{PerceptualHashPair, PerceptualHasher},
        statistics::{ImageStatistics, PixelStatistics},
    },
    batch::{
        pipeline::{ImageAnalyzer, ImageCrateDecoder, ImageDecoder},
        result::{AnalysisResult, ImageState, Stage},
    },
    error::{ForensicsError, Result},
    metadata::{MetadataResult, exif::ExifExtractor},
};

pub mod analysis;
pub mod batch;
pub mod buffer;
pub mod config;
pub mod detection;
pub mod error;
pub mod image_utils;
pub mod metadata;
pub mod report;

pub use crate::{
    batch::{BatchOrchestrator, discovery::find_images, result::BatchSummary},
    buffer::{ColorChannel, PixelBuffer},
    config::AnalysisConfig,
    detection::SuspicionVerdict,
};

/// Single-image entry point. Decodes once and runs individual stages or the
/// whole per-image transform on demand.
pub struct ForensicsAnalyzer {
    original: PixelBuffer,
    config: AnalysisConfig,
    path: Option<PathBuf>,
}

impl ForensicsAnalyzer {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let original = ImageCrateDecoder.decode(path)?;

        Ok(Self {
            original,
            config: AnalysisConfig::default(),
            path: Some(path.to_path_buf()),
        })
    }

    pub fn from_image(image: DynamicImage) -> Self {
        Self {
            original: PixelBuffer::from_dynamic(image),
            config: AnalysisConfig::default(),
            path: None,
        }
    }

    pub fn with_config(mut self, config: AnalysisConfig) -> Self {
        self.config = config;
        self
    }

    pub fn buffer(&self) -> &PixelBuffer {
        &self.original
    }

    pub fn ela(&self) -> Result<ElaResult> {
        ElaAnalyzer::from_config(&self.config.ela, self.config.suspicion).analyze(&self.original)
    }

    pub fn perceptual_hashes(&self) -> Result<PerceptualHashPair> {
        PerceptualHasher::hash_pair(&self.original)
    }

    pub fn lsb(&self) -> Result<LsbResult> {
        LsbAnalyzer::analyze(&self.original)
    }

    pub fn statistics(&self) -> Option<ImageStatistics> {
        PixelStatistics::compute(&self.original)
    }

    pub fn extract_metadata(&self) -> Result<MetadataResult> {
        match &self.path {
            Some(path) => ExifExtractor::extract(path),
            None => Err(ForensicsError::Metadata(
                "No file path available for metadata extraction".into(),
            )),
        }
    }

    /// Runs every stage. Digests and metadata are only available when the
    /// analyzer was built from a file.
    pub fn full_analysis(&self) -> Result<AnalysisResult> {
        self.config.validate()?;

        let analyzer = ImageAnalyzer::new(&self.config);
        let mut result = match &self.path {
            Some(path) => {
                let mut result = AnalysisResult::new(path);
                match analyzer.fingerprint().compute_file(path) {
                    Ok(digests) => result.digests = Some(digests),
                    Err(e) => result.record_stage_failure(Stage::Fingerprint, &e),
                }
                match self.extract_metadata() {
                    Ok(metadata) => result.metadata = metadata,
                    Err(e) => log::warn!("{}: using empty metadata: {}", path.display(), e),
                }
                result
            }
            None => AnalysisResult::new("<memory>"),
        };

        result.advance(ImageState::Decoding);
        result.advance(ImageState::Analyzing);
        analyzer.analyze(&self.original, &mut result);
        result.advance(ImageState::Completed);

        Ok(result)
    }
}
