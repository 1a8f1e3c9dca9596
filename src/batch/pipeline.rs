use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Instant,
};

use image::ImageReader;

use crate::{
    analysis::{
        ela::{ElaAnalyzer, save_difference_image},
        fingerprint::FingerprintComputer, lsb::LsbAnalyzer,
        perceptual::PerceptualHasher, statistics::PixelStatistics,
    },
    batch::result::{AnalysisResult, ImageState, Stage},
    buffer::PixelBuffer,
    config::AnalysisConfig,
    detection::SuspicionAggregator,
    error::{ErrorKind, ForensicsError, Result},
    metadata::{MetadataResult, exif::ExifExtractor},
};

/// Turns a file into an 8-bit pixel buffer.
pub trait ImageDecoder: Send + Sync {
    fn decode(&self, path: &Path) -> Result<PixelBuffer>;
}

/// Reads embedded metadata. Failures are never fatal to an image.
pub trait MetadataSource: Send + Sync {
    fn read(&self, path: &Path) -> Result<MetadataResult>;
}

/// Decoder backed by the `image` crate, sniffing the format from content
/// before falling back to the extension.
pub struct ImageCrateDecoder;

impl ImageDecoder for ImageCrateDecoder {
    fn decode(&self, path: &Path) -> Result<PixelBuffer> {
        let image = ImageReader::open(path)?.with_guessed_format()?.decode()?;
        Ok(PixelBuffer::from_dynamic(image))
    }
}

impl MetadataSource for ExifExtractor {
    fn read(&self, path: &Path) -> Result<MetadataResult> {
        ExifExtractor::extract(path)
    }
}

/// Stateless per-image transform over an already decoded buffer.
pub struct ImageAnalyzer {
    fingerprint: FingerprintComputer,
    ela: ElaAnalyzer,
}

impl ImageAnalyzer {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            fingerprint: FingerprintComputer::new(&config.digests)
                .with_block_size(config.read_block_size),
            ela: ElaAnalyzer::from_config(&config.ela, config.suspicion),
        }
    }

    pub fn fingerprint(&self) -> &FingerprintComputer {
        &self.fingerprint
    }

    /// Runs every pixel stage and fills in `result`. ELA runs alongside the
    /// cheaper stages; a failing stage is recorded without touching the rest.
    pub fn analyze(&self, buffer: &PixelBuffer, result: &mut AnalysisResult) {
        let started = Instant::now();
        result.dimensions = Some(buffer.dimensions());

        let (ela, (statistics, (hashes, lsb))) = rayon::join(
            || self.ela.analyze(buffer),
            || {
                (
                    PixelStatistics::compute(buffer),
                    rayon::join(
                        || PerceptualHasher::hash_pair(buffer),
                        || LsbAnalyzer::analyze(buffer),
                    ),
                )
            },
        );

        match statistics {
            Some(statistics) => result.statistics = Some(statistics),
            None => result.record_stage_failure(Stage::Statistics, &ForensicsError::EmptyImage),
        }

        match hashes {
            Ok(hashes) => result.perceptual_hashes = Some(hashes),
            Err(e) => result.record_stage_failure(Stage::PerceptualHash, &e),
        }

        match ela {
            Ok(ela) => {
                let (difference, findings) = ela.into_parts();
                result.ela = Some(findings);
                result.ela_difference = Some(difference);
            }
            Err(e) => result.record_stage_failure(Stage::Ela, &e),
        }

        match lsb {
            Ok(lsb) => result.lsb = Some(lsb),
            Err(e) => result.record_stage_failure(Stage::Lsb, &e),
        }

        result.verdict = SuspicionAggregator::combine(result.ela.as_ref(), result.lsb.as_ref());

        log::debug!(
            "{}: pixel stages finished in {:?}",
            result.path.display(),
            started.elapsed()
        );
    }
}

/// One unit of work: a source image and the file name its ELA image gets.
#[derive(Debug, Clone)]
pub struct ImageJob {
    pub path: PathBuf,
    pub artifact_name: String,
}

/// Full per-image pass: fingerprint, metadata, decode, pixel stages and
/// artifact persistence.
pub struct ImagePipeline {
    pub(crate) analyzer: ImageAnalyzer,
    pub(crate) decoder: Arc<dyn ImageDecoder>,
    pub(crate) metadata: Arc<dyn MetadataSource>,
    pub(crate) artifact_dir: Option<PathBuf>,
}

impl ImagePipeline {
    pub fn process(&self, job: &ImageJob) -> AnalysisResult {
        let mut result = AnalysisResult::new(&job.path);

        match self.analyzer.fingerprint().compute_file(&job.path) {
            Ok(digests) => result.digests = Some(digests),
            Err(e) => {
                result.fail(Stage::Fingerprint, &e);
                return result;
            }
        }

        match self.metadata.read(&job.path) {
            Ok(metadata) => result.metadata = metadata,
            // absent or malformed tags are expected; anything else is worth reporting
            Err(e) if e.kind() == ErrorKind::Metadata => {
                log::warn!("{}: using empty metadata: {}", job.path.display(), e)
            }
            Err(e) => result.record_stage_failure(Stage::Metadata, &e),
        }

        result.advance(ImageState::Decoding);
        let buffer = match self.decoder.decode(&job.path) {
            Ok(buffer) => buffer,
            Err(e) => {
                result.fail(Stage::Decode, &e);
                return result;
            }
        };

        result.advance(ImageState::Analyzing);
        self.analyzer.analyze(&buffer, &mut result);
        drop(buffer);

        if let (Some(difference), Some(dir)) = (result.take_ela_difference(), &self.artifact_dir) {
            let target = dir.join(&job.artifact_name);
            if let Err(e) = save_difference_image(&difference, &target) {
                result.fail(Stage::Artifact, &e);
                return result;
            }
            result.ela_image_path = Some(target);
        }

        result.advance(ImageState::Completed);
        log::info!(
            "Analyzed {} (suspicious: {})",
            job.path.display(),
            result.verdict.suspicious
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use image::{GrayImage, Luma, Rgb, RgbImage};

    use super::*;
    use crate::report::ReportRow;

    // wider than a JPEG frame header can describe
    fn too_wide_for_jpeg() -> PixelBuffer {
        PixelBuffer::from(GrayImage::from_fn(70_000, 1, |x, _| Luma([(x % 251) as u8])))
    }

    struct FixedDecoder(PixelBuffer);

    impl ImageDecoder for FixedDecoder {
        fn decode(&self, _path: &Path) -> Result<PixelBuffer> {
            Ok(self.0.clone())
        }
    }

    struct UnreadableMetadata;

    impl MetadataSource for UnreadableMetadata {
        fn read(&self, _path: &Path) -> Result<MetadataResult> {
            Err(ForensicsError::Io(std::io::Error::other("device unplugged")))
        }
    }

    fn pipeline(decoder: Arc<dyn ImageDecoder>, metadata: Arc<dyn MetadataSource>) -> ImagePipeline {
        ImagePipeline {
            analyzer: ImageAnalyzer::new(&AnalysisConfig::default()),
            decoder,
            metadata,
            artifact_dir: None,
        }
    }

    fn job(dir: &Path) -> ImageJob {
        let path = dir.join("source.png");
        RgbImage::from_pixel(4, 4, Rgb([10, 20, 30])).save(&path).unwrap();
        ImageJob {
            path,
            artifact_name: "ela_source.png".into(),
        }
    }

    #[test]
    fn test_failed_ela_keeps_other_stages() {
        let mut result = AnalysisResult::new("wide.png");
        ImageAnalyzer::new(&AnalysisConfig::default()).analyze(&too_wide_for_jpeg(), &mut result);

        assert!(result.ela.is_none());
        assert_eq!(result.stage_failures.len(), 1);
        assert_eq!(result.stage_failures[0].stage, Stage::Ela);

        assert!(result.statistics.is_some());
        assert!(result.perceptual_hashes.is_some());
        assert!(result.lsb.is_some());
        assert!(!result.verdict.suspicious);
    }

    #[test]
    fn test_failed_ela_still_completes_the_image() {
        let dir = tempfile::tempdir().unwrap();
        let result = pipeline(Arc::new(FixedDecoder(too_wide_for_jpeg())), Arc::new(ExifExtractor))
            .process(&job(dir.path()));

        assert_eq!(result.state, ImageState::Completed);
        assert!(result.ela_image_path.is_none());
        assert!(result.error.is_none());
        assert!(result.error_summary().unwrap().starts_with("ELA error"));

        let row = ReportRow::from(&result);
        assert_eq!(row.ela_suspicious, Some(false));
    }

    #[test]
    fn test_non_metadata_errors_are_recorded_as_stage_failures() {
        let dir = tempfile::tempdir().unwrap();
        let buffer = PixelBuffer::from(RgbImage::from_pixel(16, 16, Rgb([90, 90, 90])));
        let result = pipeline(Arc::new(FixedDecoder(buffer)), Arc::new(UnreadableMetadata))
            .process(&job(dir.path()));

        assert!(result.is_completed());
        assert!(result.metadata.is_empty());
        assert_eq!(result.stage_failures[0].stage, Stage::Metadata);
    }

    #[test]
    fn test_empty_buffer_records_statistics_failure() {
        let mut result = AnalysisResult::new("empty.png");
        ImageAnalyzer::new(&AnalysisConfig::default())
            .analyze(&PixelBuffer::from(GrayImage::new(0, 0)), &mut result);

        let stages = result.stage_failures.iter().map(|f| f.stage).collect::<Vec<_>>();
        assert!(stages.contains(&Stage::Statistics));
        assert!(stages.contains(&Stage::Ela));
        assert!(result.statistics.is_none());
    }
}
