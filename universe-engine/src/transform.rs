// Copyright (c) James Kassemi, SC, US. All rights reserved.

use std::{path::Path, sync::Arc};

use chrono::NaiveDate;
use core_types::types::{SourceRecord, UniverseRow, DATE_KEY_FORMAT};
use csv_async::AsyncReaderBuilder;
use futures::StreamExt;
use log::warn;
use map_files::{InstrumentResolver, Market};
use tokio::{fs::File, io::BufReader};

use crate::{buckets::DateBuckets, errors::ConvertError};

#[derive(Debug, Default, Clone, Copy)]
pub struct FileOutcome {
    pub rows_emitted: u64,
    pub rows_dropped: u64,
}

/// Ticker is the upper-cased base name of the source file.
pub fn ticker_from_path(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(|stem| stem.to_uppercase())
}

/// Transforms one per-ticker source file into universe lines, inserting
/// each into the aggregator under its date key.
///
/// A malformed date is fatal for this file: the row cannot be bucketed
/// safely. A resolution gap only drops the row, with a counter and a warn
/// log for operator visibility. With no resolver at all, rows are still
/// date-validated but nothing is emitted.
pub async fn transform_file(
    path: &Path,
    resolver: Option<&Arc<dyn InstrumentResolver>>,
    buckets: &DateBuckets,
) -> Result<FileOutcome, ConvertError> {
    let ticker = ticker_from_path(path).ok_or_else(|| {
        ConvertError::Config(format!("source file {} has no base name", path.display()))
    })?;
    let file = File::open(path).await?;
    let mut reader = AsyncReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .create_reader(BufReader::new(file));
    let mut records = reader.records();
    let mut outcome = FileOutcome::default();
    let mut row_no = 0usize;
    while let Some(record) = records.next().await {
        let record = record?;
        row_no += 1;
        let raw_date = record.get(0).unwrap_or_default();
        let date = NaiveDate::parse_from_str(raw_date, DATE_KEY_FORMAT).map_err(|_| {
            ConvertError::Parse {
                file: path.to_path_buf(),
                row: row_no,
                value: raw_date.to_string(),
            }
        })?;
        let Some(resolver) = resolver else {
            continue;
        };
        let source = SourceRecord {
            date,
            ticker: ticker.clone(),
            fields: record.iter().skip(1).map(|f| f.to_string()).collect(),
        };
        let sid = match resolver.resolve(&ticker, Market::Usa, date, true) {
            Ok(sid) => sid,
            Err(err) => {
                warn!("dropping {} row {row_no}: {err}", path.display());
                outcome.rows_dropped += 1;
                continue;
            }
        };
        let Some(row) = UniverseRow::project(sid, &source) else {
            warn!(
                "dropping {} row {row_no}: too few fields to project",
                path.display()
            );
            outcome.rows_dropped += 1;
            continue;
        };
        buckets.insert(&source.date_key(), row.to_line());
        outcome.rows_emitted += 1;
    }
    Ok(outcome)
}
