// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! Batch conversion of per-ticker daily CSVs into per-date universe files
//! keyed by durable security identifiers.
//!
//! Two bulk-parallel phases with a hard barrier between them: every source
//! file is transformed into date-keyed lines first, then every date is
//! merged into its universe file. Per-unit failures are collected rather
//! than aborting the run, so independent units always complete.

mod buckets;
mod errors;
mod scanner;
mod transform;
mod writer;

pub use buckets::DateBuckets;
pub use errors::ConvertError;
pub use scanner::list_source_files;
pub use transform::{transform_file, FileOutcome};
pub use writer::merge_universe_file;

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use core_types::config::AppConfig;
use log::{info, warn};
use map_files::InstrumentResolver;
use tokio::sync::Semaphore;

/// One failed unit of work: a source file or an output date.
#[derive(Debug)]
pub struct UnitFailure {
    pub unit: String,
    pub error: ConvertError,
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub files_processed: usize,
    pub dates_written: usize,
    pub rows_emitted: u64,
    pub rows_dropped: u64,
    pub failures: Vec<UnitFailure>,
}

impl RunReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct UniverseConverter {
    source_dir: PathBuf,
    universe_dir: PathBuf,
    resolver: Option<Arc<dyn InstrumentResolver>>,
    concurrent_files: usize,
    concurrent_dates: usize,
}

impl std::fmt::Debug for UniverseConverter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UniverseConverter")
            .field("source_dir", &self.source_dir)
            .field("universe_dir", &self.universe_dir)
            .field("resolver", &self.resolver.as_ref().map(|_| "<resolver>"))
            .field("concurrent_files", &self.concurrent_files)
            .field("concurrent_dates", &self.concurrent_dates)
            .finish()
    }
}

impl UniverseConverter {
    /// Validates the directory layout and creates the universe output
    /// folder. A missing source folder is fatal before any work starts.
    pub fn new(
        config: &AppConfig,
        resolver: Option<Arc<dyn InstrumentResolver>>,
    ) -> Result<Self, ConvertError> {
        let source_dir = config.destination_folder.clone();
        if !source_dir.is_dir() {
            return Err(ConvertError::Config(format!(
                "destination folder {} does not exist",
                source_dir.display()
            )));
        }
        let universe_dir = config.universe_folder();
        std::fs::create_dir_all(&universe_dir)?;
        Ok(Self {
            source_dir,
            universe_dir,
            resolver,
            concurrent_files: config.concurrent_files.max(1),
            concurrent_dates: config.concurrent_dates.max(1),
        })
    }

    pub async fn run(&self) -> Result<RunReport, ConvertError> {
        let files = list_source_files(&self.source_dir)?;
        if self.resolver.is_none() {
            warn!("ticker mapping dataset unavailable; no universe files will be produced");
        }
        info!(
            "converting {} source files from {}",
            files.len(),
            self.source_dir.display()
        );

        let buckets = Arc::new(DateBuckets::new());
        let mut report = RunReport::default();
        self.transform_phase(files, &buckets, &mut report).await;
        // Hard barrier: every transform task was joined above, so each
        // bucket now holds its complete line set for the run.
        self.merge_phase(buckets.drain(), &mut report).await;
        Ok(report)
    }

    async fn transform_phase(
        &self,
        files: Vec<PathBuf>,
        buckets: &Arc<DateBuckets>,
        report: &mut RunReport,
    ) {
        let semaphore = Arc::new(Semaphore::new(self.concurrent_files));
        let mut handles = Vec::with_capacity(files.len());
        for path in files {
            let permit = semaphore.clone().acquire_owned().await.unwrap();
            let resolver = self.resolver.clone();
            let buckets = buckets.clone();
            let unit = path.display().to_string();
            handles.push((
                unit,
                tokio::spawn(async move {
                    let _permit = permit;
                    transform_file(&path, resolver.as_ref(), &buckets).await
                }),
            ));
        }
        for (unit, handle) in handles {
            match handle.await {
                Ok(Ok(outcome)) => {
                    report.files_processed += 1;
                    report.rows_emitted += outcome.rows_emitted;
                    report.rows_dropped += outcome.rows_dropped;
                }
                Ok(Err(error)) => report.failures.push(UnitFailure { unit, error }),
                Err(join_err) => report.failures.push(UnitFailure {
                    unit,
                    error: ConvertError::Config(format!("transform worker panicked: {join_err}")),
                }),
            }
        }
    }

    async fn merge_phase(
        &self,
        pending: std::collections::HashMap<String, Vec<String>>,
        report: &mut RunReport,
    ) {
        let semaphore = Arc::new(Semaphore::new(self.concurrent_dates));
        let mut handles = Vec::with_capacity(pending.len());
        for (date_key, lines) in pending {
            let permit = semaphore.clone().acquire_owned().await.unwrap();
            let universe_dir = self.universe_dir.clone();
            handles.push((
                date_key.clone(),
                tokio::spawn(async move {
                    let _permit = permit;
                    merge_universe_file(&universe_dir, &date_key, lines).await
                }),
            ));
        }
        for (unit, handle) in handles {
            match handle.await {
                Ok(Ok(())) => report.dates_written += 1,
                Ok(Err(error)) => report.failures.push(UnitFailure { unit, error }),
                Err(join_err) => report.failures.push(UnitFailure {
                    unit,
                    error: ConvertError::Config(format!("merge worker panicked: {join_err}")),
                }),
            }
        }
    }

    pub fn universe_dir(&self) -> &Path {
        &self.universe_dir
    }
}
