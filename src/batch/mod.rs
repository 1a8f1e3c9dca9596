pub mod discovery;
pub mod pipeline;
pub mod result;

use std::{
    collections::HashMap,
    fs,
    panic::{self, AssertUnwindSafe},
    path::{Path, PathBuf},
    sync::{Arc, mpsc},
    time::{Duration, Instant},
};

use parking_lot::Mutex;
use rayon::{ThreadPool, prelude::*};

use crate::{
    batch::{
        pipeline::{ImageAnalyzer, ImageCrateDecoder, ImageDecoder, ImageJob, ImagePipeline, MetadataSource},
        result::{AnalysisResult, BatchSummary, Stage},
    },
    config::AnalysisConfig,
    error::{ForensicsError, Result},
    metadata::exif::ExifExtractor,
};

/// Runs the per-image pipeline over many files on a bounded worker pool.
///
/// Failures stay inside the image they belong to; only invalid configuration
/// or an unusable output directory stop the run.
pub struct BatchOrchestrator {
    config: AnalysisConfig,
    decoder: Arc<dyn ImageDecoder>,
    metadata: Arc<dyn MetadataSource>,
    output_dir: Option<PathBuf>,
}

impl BatchOrchestrator {
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            config,
            decoder: Arc::new(ImageCrateDecoder),
            metadata: Arc::new(ExifExtractor),
            output_dir: None,
        })
    }

    pub fn with_decoder(mut self, decoder: Arc<dyn ImageDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn with_metadata_source(mut self, metadata: Arc<dyn MetadataSource>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Directory for ELA difference images. Without one nothing is written.
    pub fn with_output_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.output_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Analyzes every path and returns one result per path, in input order.
    pub fn run(&self, images: &[PathBuf]) -> Result<Vec<AnalysisResult>> {
        let started = Instant::now();

        let artifact_dir = match (&self.output_dir, self.config.persist_ela) {
            (Some(dir), true) => {
                fs::create_dir_all(dir)?;
                Some(dir.clone())
            }
            _ => None,
        };

        let pipeline = Arc::new(ImagePipeline {
            analyzer: ImageAnalyzer::new(&self.config),
            decoder: Arc::clone(&self.decoder),
            metadata: Arc::clone(&self.metadata),
            artifact_dir,
        });

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.threads)
            .thread_name(|i| format!("forensics-worker-{}", i))
            .build()
            .map_err(|e| ForensicsError::Configuration(format!("cannot build worker pool: {}", e)))?;

        log::info!(
            "Analyzing {} image(s) on {} worker(s)",
            images.len(),
            pool.current_num_threads()
        );

        let jobs = images
            .iter()
            .cloned()
            .zip(artifact_names(images))
            .map(|(path, artifact_name)| ImageJob {
                path,
                artifact_name,
            })
            .collect::<Vec<_>>();

        let results = match self.config.timeout() {
            None => run_unbounded(&pool, &pipeline, &jobs),
            Some(limit) => run_with_deadline(&pool, &pipeline, jobs, limit),
        };

        let summary = BatchSummary::from_results(&results);
        log::info!(
            "Batch finished in {:?}: {} completed, {} failed, {} suspicious",
            started.elapsed(),
            summary.completed,
            summary.failed,
            summary.suspicious
        );

        Ok(results)
    }
}

fn run_unbounded(
    pool: &ThreadPool,
    pipeline: &Arc<ImagePipeline>,
    jobs: &[ImageJob],
) -> Vec<AnalysisResult> {
    let collected = Mutex::new(Vec::with_capacity(jobs.len()));

    pool.install(|| {
        jobs.par_iter().enumerate().for_each(|(index, job)| {
            let result = process_guarded(pipeline, job);
            collected.lock().push((index, result));
        });
    });

    let mut collected = collected.into_inner();
    collected.sort_by_key(|(index, _)| *index);
    collected.into_iter().map(|(_, result)| result).collect()
}

enum JobEvent {
    Started(usize, Instant),
    Finished(usize, AnalysisResult),
}

/// Every image runs as a task on `pool`, so `threads` bounds CPU use here as
/// well. The calling thread only waits: an image whose task has been running
/// longer than `limit` is reported as timed out and its late result dropped.
/// An abandoned task keeps its worker until it returns.
fn run_with_deadline(
    pool: &ThreadPool,
    pipeline: &Arc<ImagePipeline>,
    jobs: Vec<ImageJob>,
    limit: Duration,
) -> Vec<AnalysisResult> {
    let (tx, rx) = mpsc::channel();
    let paths = jobs.iter().map(|job| job.path.clone()).collect::<Vec<_>>();

    for (index, job) in jobs.into_iter().enumerate() {
        let tx = tx.clone();
        let pipeline = Arc::clone(pipeline);
        pool.spawn(move || {
            // receiver may already have given up
            let _ = tx.send(JobEvent::Started(index, Instant::now()));
            let _ = tx.send(JobEvent::Finished(index, process_guarded(&pipeline, &job)));
        });
    }
    drop(tx);

    let mut results = paths.iter().map(|_| None).collect::<Vec<Option<AnalysisResult>>>();
    let mut running: HashMap<usize, Instant> = HashMap::new();
    let mut pending = paths.len();

    while pending > 0 {
        let next_deadline = running.values().map(|started| *started + limit).min();
        let event = match next_deadline {
            Some(deadline) => rx.recv_timeout(deadline.saturating_duration_since(Instant::now())),
            None => rx.recv().map_err(|_| mpsc::RecvTimeoutError::Disconnected),
        };

        match event {
            Ok(JobEvent::Started(index, started)) => {
                running.insert(index, started);
            }
            Ok(JobEvent::Finished(index, result)) => {
                if running.remove(&index).is_some() {
                    results[index] = Some(result);
                    pending -= 1;
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                let now = Instant::now();
                let expired = running
                    .iter()
                    .filter(|(_, started)| now.duration_since(**started) >= limit)
                    .map(|(index, _)| *index)
                    .collect::<Vec<_>>();

                for index in expired {
                    running.remove(&index);
                    results[index] = Some(AnalysisResult::failed(
                        &paths[index],
                        Stage::Pipeline,
                        &ForensicsError::Timeout(limit),
                    ));
                    pending -= 1;
                }
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    results
        .into_iter()
        .zip(&paths)
        .map(|(result, path)| {
            result.unwrap_or_else(|| {
                AnalysisResult::failed(
                    path,
                    Stage::Pipeline,
                    &ForensicsError::AnalysisFailed("worker exited without a result".into()),
                )
            })
        })
        .collect()
}

/// Converts a panic in any stage into a failed result for that image.
fn process_guarded(pipeline: &ImagePipeline, job: &ImageJob) -> AnalysisResult {
    match panic::catch_unwind(AssertUnwindSafe(|| pipeline.process(job))) {
        Ok(result) => result,
        Err(payload) => {
            let message = if let Some(s) = payload.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = payload.downcast_ref::<String>() {
                s.clone()
            } else {
                "unknown panic".to_string()
            };

            AnalysisResult::failed(
                &job.path,
                Stage::Pipeline,
                &ForensicsError::AnalysisFailed(format!("panic: {}", message)),
            )
        }
    }
}

/// `ela_<stem>.png` per image. Repeated stems get `_2`, `_3`, ... in input
/// order so parallel writers never share a file.
pub fn artifact_names(images: &[PathBuf]) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();

    images
        .iter()
        .map(|path| {
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "image".to_string());

            let count = seen.entry(stem.clone()).or_insert(0);
            *count += 1;

            if *count == 1 {
                format!("ela_{}.png", stem)
            } else {
                format!("ela_{}_{}.png", stem, count)
            }
        })
        .collect()
}
