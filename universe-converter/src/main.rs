// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! Batch entry point: load config, bootstrap the map-file resolver when
//! the mapping dataset is present, run the two-phase conversion, report.

use std::{process, sync::Arc};

use core_types::config::AppConfig;
use log::{error, info, warn};
use map_files::{InstrumentResolver, MapFileStore};
use universe_engine::{ConvertError, UniverseConverter};

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        error!("universe conversion failed: {err}");
        process::exit(1);
    }
}

fn run() -> Result<(), ConvertError> {
    let config = AppConfig::load().map_err(|err| ConvertError::Config(err.to_string()))?;
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let map_dir = config.map_files_folder();
        let resolver: Option<Arc<dyn InstrumentResolver>> = match MapFileStore::load(&map_dir)
            .await
            .map_err(|err| ConvertError::Config(format!("loading map files: {err}")))?
        {
            Some(store) => {
                info!(
                    "loaded {} map files from {}",
                    store.len(),
                    map_dir.display()
                );
                Some(Arc::new(store))
            }
            None => {
                warn!(
                    "map file folder {} missing; universe files will not be produced",
                    map_dir.display()
                );
                None
            }
        };

        let converter = UniverseConverter::new(&config, resolver)?;
        let report = converter.run().await?;
        info!(
            "processed {} source files into {} universe dates ({} rows emitted, {} dropped)",
            report.files_processed, report.dates_written, report.rows_emitted, report.rows_dropped
        );
        if !report.is_clean() {
            for failure in &report.failures {
                error!("unit {} failed: {}", failure.unit, failure.error);
            }
            return Err(ConvertError::Config(format!(
                "{} units failed",
                report.failures.len()
            )));
        }
        Ok(())
    })
}
