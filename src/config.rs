use std::{fs, path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    analysis::fingerprint::DigestAlgorithm,
    error::{ForensicsError, Result},
};

pub const MIN_READ_BLOCK_SIZE: usize = 4096;

/// Recompression settings for error level analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElaConfig {
    pub quality: u8,
    pub visualization_scale: f64,
}

impl Default for ElaConfig {
    fn default() -> Self {
        Self {
            quality: 90,
            visualization_scale: 10.0,
        }
    }
}

/// Policy constants behind the ELA suspicion flag. The defaults define the
/// documented heuristic and should not drift.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuspicionPolicy {
    /// Scaled luminance above which an ELA pixel counts as bright.
    pub brightness_threshold: u8,
    /// Fraction of bright pixels above which the image is flagged.
    pub bright_fraction_threshold: f64,
}

impl Default for SuspicionPolicy {
    fn default() -> Self {
        Self {
            brightness_threshold: 30,
            bright_fraction_threshold: 0.01,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub digests: Vec<DigestAlgorithm>,
    pub read_block_size: usize,
    pub ela: ElaConfig,
    pub suspicion: SuspicionPolicy,
    /// Worker threads; 0 lets rayon size the pool to the hardware.
    pub threads: usize,
    pub image_timeout_secs: Option<u64>,
    pub persist_ela: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            digests: DigestAlgorithm::ALL.to_vec(),
            read_block_size: 8192,
            ela: ElaConfig::default(),
            suspicion: SuspicionPolicy::default(),
            threads: 0,
            image_timeout_secs: None,
            persist_ela: true,
        }
    }
}

impl AnalysisConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = fs::read_to_string(&path)?;
        let config: AnalysisConfig = serde_json::from_str(&raw).map_err(|e| {
            ForensicsError::Configuration(format!(
                "cannot parse {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_ela_quality(mut self, quality: u8) -> Self {
        self.ela.quality = quality;
        self
    }

    pub fn with_visualization_scale(mut self, scale: f64) -> Self {
        self.ela.visualization_scale = scale;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.image_timeout_secs = timeout.map(|t| t.as_secs().max(1));
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.image_timeout_secs.map(Duration::from_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=100).contains(&self.ela.quality) {
            return Err(ForensicsError::InvalidParameter(format!(
                "ELA quality must be within 1..=100, got {}",
                self.ela.quality
            )));
        }

        let scale = self.ela.visualization_scale;
        if !scale.is_finite() || scale <= 0.0 {
            return Err(ForensicsError::InvalidParameter(format!(
                "visualization scale must be positive, got {}",
                scale
            )));
        }

        let fraction = self.suspicion.bright_fraction_threshold;
        if !(0.0..=1.0).contains(&fraction) {
            return Err(ForensicsError::InvalidParameter(format!(
                "bright fraction threshold must be within [0, 1], got {}",
                fraction
            )));
        }

        if self.read_block_size < MIN_READ_BLOCK_SIZE {
            return Err(ForensicsError::InvalidParameter(format!(
                "read block size must be at least {} bytes",
                MIN_READ_BLOCK_SIZE
            )));
        }

        if self.digests.is_empty() {
            return Err(ForensicsError::Configuration(
                "at least one digest algorithm is required".into(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_defaults_match_documented_policy() {
        let config = AnalysisConfig::default();
        assert_eq!(config.ela.quality, 90);
        assert_eq!(config.ela.visualization_scale, 10.0);
        assert_eq!(config.suspicion.brightness_threshold, 30);
        assert_eq!(config.suspicion.bright_fraction_threshold, 0.01);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_out_of_range_quality() {
        let config = AnalysisConfig::default().with_ela_quality(0);
        assert!(matches!(config.validate(), Err(ForensicsError::InvalidParameter(_))));

        let config = AnalysisConfig::default().with_ela_quality(101);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_non_positive_scale() {
        let config = AnalysisConfig::default().with_visualization_scale(0.0);
        assert!(config.validate().is_err());

        let config = AnalysisConfig::default().with_visualization_scale(f64::NAN);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_falls_back_to_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "ela": {{ "quality": 75 }}, "digests": ["sha256"] }}"#).unwrap();

        let config = AnalysisConfig::from_file(file.path()).unwrap();
        assert_eq!(config.ela.quality, 75);
        assert_eq!(config.ela.visualization_scale, 10.0);
        assert_eq!(config.digests, vec![DigestAlgorithm::Sha256]);
        assert!(config.persist_ela);
    }
}
