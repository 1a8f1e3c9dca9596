use std::{fs, path::Path, process::Command};

use image::{Rgb, RgbImage};

use forensic_lens::{
    AnalysisConfig, BatchOrchestrator, BatchSummary, ColorChannel, find_images,
    analysis::fingerprint::DigestAlgorithm,
    batch::result::ImageState,
    report::{CSV_REPORT_NAME, JSON_REPORT_NAME, write_reports},
};

fn write_gradient(path: &Path) {
    RgbImage::from_fn(40, 30, |x, y| Rgb([(x * 6) as u8, (y * 8) as u8, 64]))
        .save(path)
        .unwrap();
}

#[test]
fn test_corrupt_file_does_not_abort_batch() {
    let dir = tempfile::tempdir().unwrap();
    write_gradient(&dir.path().join("a.png"));
    fs::write(dir.path().join("b.png"), b"definitely not a png").unwrap();
    write_gradient(&dir.path().join("c.png"));

    let images = find_images(dir.path()).unwrap();
    assert_eq!(images.len(), 3);

    let results = BatchOrchestrator::new(AnalysisConfig::default())
        .unwrap()
        .with_output_dir(dir.path().join("out"))
        .run(&images)
        .unwrap();

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].file_name, "a.png");
    assert_eq!(results[1].file_name, "b.png");
    assert_eq!(results[2].file_name, "c.png");

    assert_eq!(results[1].state, ImageState::Failed);
    assert!(results[1].error.as_deref().unwrap().starts_with("Decode error"));
    // bytes were still readable, so the file was fingerprinted
    assert!(results[1].digests.is_some());

    for ok in [&results[0], &results[2]] {
        assert!(ok.is_completed());
        assert!(ok.statistics.is_some());
        assert!(ok.perceptual_hashes.is_some());
        assert!(ok.lsb.is_some());
        assert!(ok.ela.is_some());
        assert!(ok.ela_image_path.as_ref().unwrap().exists());
    }

    assert_eq!(
        BatchSummary::from_results(&results),
        BatchSummary {
            total: 3,
            completed: 2,
            failed: 1,
            suspicious: results.iter().filter(|r| r.verdict.suspicious).count(),
        }
    );
}

#[test]
fn test_white_2x2_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("white.png");
    RgbImage::from_pixel(2, 2, Rgb([255, 255, 255]))
        .save(&path)
        .unwrap();

    let results = BatchOrchestrator::new(AnalysisConfig::default())
        .unwrap()
        .run(&[path])
        .unwrap();
    let result = &results[0];
    assert!(result.is_completed());

    let stats = result.statistics.as_ref().unwrap();
    for channel in ColorChannel::RGB {
        let channel_stats = &stats[&channel];
        assert_eq!(channel_stats.mean, 255.0);
        assert_eq!(channel_stats.variance, 0.0);
        assert_eq!(channel_stats.histogram_peak_bin, 255);
    }

    let lsb = result.lsb.as_ref().unwrap();
    for channel in lsb.per_channel.values() {
        assert_eq!(channel.ones_proportion, 1.0);
        assert_eq!(channel.entropy_bits, 0.0);
        assert_eq!(channel.variance, 0.0);
    }

    let hashes = result.perceptual_hashes.unwrap();
    assert_eq!(hashes.average_hash.0, u64::MAX);
    assert_eq!(hashes.average_hash.to_string(), "ffffffffffffffff");
}

#[test]
fn test_reports_list_every_image() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input");
    fs::create_dir_all(input.join("nested")).unwrap();
    write_gradient(&input.join("one.png"));
    write_gradient(&input.join("nested/two.PNG"));
    fs::write(input.join("notes.txt"), "ignored").unwrap();

    let images = find_images(&input).unwrap();
    let results = BatchOrchestrator::new(AnalysisConfig::default())
        .unwrap()
        .run(&images)
        .unwrap();

    let out = dir.path().join("out");
    let paths = write_reports(&out, &results, &DigestAlgorithm::ALL).unwrap();

    let mut reader = csv::Reader::from_path(&paths.csv).unwrap();
    assert_eq!(reader.records().count(), 2);

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&paths.json).unwrap()).unwrap();
    assert_eq!(json.as_array().unwrap().len(), 2);
}

#[test]
fn test_cli_writes_reports() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input");
    fs::create_dir_all(&input).unwrap();
    write_gradient(&input.join("photo.png"));
    let out = dir.path().join("results");

    let status = Command::new(env!("CARGO_BIN_EXE_forensic-lens"))
        .arg("--input")
        .arg(&input)
        .arg("--out")
        .arg(&out)
        .status()
        .unwrap();

    assert!(status.success());
    assert!(out.join(CSV_REPORT_NAME).exists());
    assert!(out.join(JSON_REPORT_NAME).exists());
    assert!(out.join("ela_photo.png").exists());
}

#[test]
fn test_cli_fails_without_images() {
    let dir = tempfile::tempdir().unwrap();

    let status = Command::new(env!("CARGO_BIN_EXE_forensic-lens"))
        .arg("--input")
        .arg(dir.path())
        .arg("--out")
        .arg(dir.path().join("results"))
        .status()
        .unwrap();

    assert_eq!(status.code(), Some(1));
}

#[test]
fn test_cli_fails_on_missing_input() {
    let dir = tempfile::tempdir().unwrap();

    let status = Command::new(env!("CARGO_BIN_EXE_forensic-lens"))
        .arg("--input")
        .arg(dir.path().join("missing"))
        .status()
        .unwrap();

    assert_eq!(status.code(), Some(1));
}
