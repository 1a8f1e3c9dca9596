use std::{
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

use serde::Serialize;

use crate::{
    analysis::{
        fingerprint::{DigestAlgorithm, DigestSet},
        lsb::LsbResult,
        perceptual::PerceptualHashPair,
        statistics::ImageStatistics,
    },
    batch::result::AnalysisResult,
    error::Result,
    metadata::MetadataResult,
};

pub const CSV_REPORT_NAME: &str = "report.csv";
pub const JSON_REPORT_NAME: &str = "report.json";

/// Flattened view of one [`AnalysisResult`], shared by both report formats.
#[derive(Debug, Clone, Serialize)]
pub struct ReportRow {
    pub file: String,
    pub path: String,
    #[serde(flatten)]
    pub digests: DigestSet,
    pub exif: MetadataResult,
    pub phashes: Option<PerceptualHashPair>,
    pub stats: Option<ImageStatistics>,
    pub lsb: Option<LsbResult>,
    pub ela_image: Option<String>,
    pub ela_bright_fraction: Option<f64>,
    pub ela_suspicious: Option<bool>,
    pub error: Option<String>,
}

impl From<&AnalysisResult> for ReportRow {
    fn from(result: &AnalysisResult) -> Self {
        Self {
            file: result.file_name.clone(),
            path: result.path.display().to_string(),
            digests: result.digests.clone().unwrap_or_default(),
            exif: result.metadata.clone(),
            phashes: result.perceptual_hashes,
            stats: result.statistics.clone(),
            lsb: result.lsb.clone(),
            ela_image: result.ela_image_path.as_ref().map(|p| p.display().to_string()),
            ela_bright_fraction: result.ela.map(|e| e.bright_fraction),
            ela_suspicious: result.was_analyzed().then_some(result.verdict.suspicious),
            error: result.error_summary(),
        }
    }
}

/// One row per image. Structured fields are embedded as JSON text so each
/// image stays on a single line.
pub struct CsvReport {
    digests: Vec<DigestAlgorithm>,
}

impl CsvReport {
    pub fn new(digests: &[DigestAlgorithm]) -> Self {
        let mut digests = digests.to_vec();
        digests.sort();
        digests.dedup();
        Self { digests }
    }

    pub fn header(&self) -> Vec<String> {
        let mut header = vec!["file".to_string(), "path".to_string()];
        header.extend(self.digests.iter().map(|d| d.name().to_string()));
        header.extend(
            [
                "exif",
                "phashes",
                "stats",
                "lsb",
                "ela_image",
                "ela_bright_fraction",
                "ela_suspicious",
                "error",
            ]
            .iter()
            .map(|s| s.to_string()),
        );
        header
    }

    pub fn write<W: Write>(&self, writer: W, rows: &[ReportRow]) -> Result<()> {
        let mut csv = csv::Writer::from_writer(writer);
        csv.write_record(self.header())?;

        for row in rows {
            csv.write_record(self.record(row)?)?;
        }

        csv.flush()?;
        Ok(())
    }

    pub fn write_file<P: AsRef<Path>>(&self, path: P, rows: &[ReportRow]) -> Result<()> {
        self.write(File::create(path)?, rows)
    }

    fn record(&self, row: &ReportRow) -> Result<Vec<String>> {
        let mut record = vec![row.file.clone(), row.path.clone()];
        record.extend(
            self.digests
                .iter()
                .map(|d| row.digests.get(*d).unwrap_or_default().to_string()),
        );

        record.push(serde_json::to_string(&row.exif)?);
        record.push(json_cell(&row.phashes)?);
        record.push(json_cell(&row.stats)?);
        record.push(json_cell(&row.lsb)?);
        record.push(row.ela_image.clone().unwrap_or_default());
        record.push(
            row.ela_bright_fraction
                .map(|f| f.to_string())
                .unwrap_or_default(),
        );
        record.push(row.ela_suspicious.map(|s| s.to_string()).unwrap_or_default());
        record.push(row.error.clone().unwrap_or_default());

        Ok(record)
    }
}

fn json_cell<T: Serialize>(value: &Option<T>) -> Result<String> {
    match value {
        Some(value) => Ok(serde_json::to_string(value)?),
        None => Ok(String::new()),
    }
}

#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct JsonReport {
    pub rows: Vec<ReportRow>,
}

impl JsonReport {
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl From<&[AnalysisResult]> for JsonReport {
    fn from(results: &[AnalysisResult]) -> Self {
        Self {
            rows: results.iter().map(ReportRow::from).collect(),
        }
    }
}

/// Where [`write_reports`] put its files.
#[derive(Debug, Clone)]
pub struct ReportPaths {
    pub csv: PathBuf,
    pub json: PathBuf,
}

/// Writes `report.csv` and `report.json` into `out_dir`, creating it if needed.
pub fn write_reports<P: AsRef<Path>>(
    out_dir: P,
    results: &[AnalysisResult],
    digests: &[DigestAlgorithm],
) -> Result<ReportPaths> {
    let out_dir = out_dir.as_ref();
    fs::create_dir_all(out_dir)?;

    let report = JsonReport::from(results);
    let paths = ReportPaths {
        csv: out_dir.join(CSV_REPORT_NAME),
        json: out_dir.join(JSON_REPORT_NAME),
    };

    CsvReport::new(digests).write_file(&paths.csv, &report.rows)?;
    fs::write(&paths.json, report.to_json()?)?;

    log::info!(
        "Wrote {} report row(s) to {}",
        report.rows.len(),
        out_dir.display()
    );
    Ok(paths)
}
