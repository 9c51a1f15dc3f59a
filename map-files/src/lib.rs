// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! Map-file backed resolution of tickers to durable security identifiers.
//!
//! A map file records one entity's ticker history as `yyyyMMdd,symbol`
//! rows: the symbol in effect up to and including that date. The first row
//! carries the listing date and original symbol, the last row the delisting
//! date. The durable identifier is derived from the original symbol and
//! listing date, so it survives renames.

use std::{collections::BTreeMap, path::Path};

use chrono::{Datelike, NaiveDate};
use csv_async::AsyncReaderBuilder;
use futures::StreamExt;
use log::warn;
use thiserror::Error;
use tokio::{fs, io::BufReader};

const MAP_DATE_FORMAT: &str = "%Y%m%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Market {
    Usa,
}

impl Market {
    fn code(self) -> u64 {
        match self {
            Market::Usa => 1,
        }
    }
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("no mapping covers ticker {ticker} on {date}")]
    UnknownTicker { ticker: String, date: NaiveDate },
}

#[derive(Debug, Error)]
pub enum MapFileError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv_async::Error),
    #[error("map file {file} row {row}: bad date {value:?}")]
    BadDate {
        file: String,
        row: usize,
        value: String,
    },
}

/// Read-only ticker-to-identifier resolution, safe for concurrent callers.
pub trait InstrumentResolver: Send + Sync {
    fn resolve(
        &self,
        ticker: &str,
        market: Market,
        date: NaiveDate,
        allow_rename_lookahead: bool,
    ) -> Result<String, ResolveError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct MapEntry {
    date: NaiveDate,
    symbol: String,
}

#[derive(Debug, Clone)]
struct MapFile {
    entries: Vec<MapEntry>,
}

impl MapFile {
    fn listing(&self) -> &MapEntry {
        &self.entries[0]
    }

    fn delist_date(&self) -> NaiveDate {
        self.entries[self.entries.len() - 1].date
    }

    /// Symbol in effect on `date`: the first entry at or after it.
    fn symbol_on(&self, date: NaiveDate) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.date >= date)
            .map(|entry| entry.symbol.as_str())
    }

    fn covers(&self, date: NaiveDate) -> bool {
        date >= self.listing().date && date <= self.delist_date()
    }
}

/// In-memory store of every map file under one directory.
#[derive(Debug)]
pub struct MapFileStore {
    files: Vec<MapFile>,
}

impl MapFileStore {
    /// Loads all `*.csv` map files under `dir`. Returns `Ok(None)` when the
    /// directory does not exist, which callers treat as "resolution
    /// unavailable".
    pub async fn load(dir: impl AsRef<Path>) -> Result<Option<Self>, MapFileError> {
        let dir = dir.as_ref();
        if !fs::try_exists(dir).await? {
            return Ok(None);
        }
        let mut files = Vec::new();
        let mut entries = fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("csv") {
                continue;
            }
            match read_map_file(&path).await? {
                Some(file) => files.push(file),
                None => warn!("skipping empty map file {}", path.display()),
            }
        }
        Ok(Some(Self { files }))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

async fn read_map_file(path: &Path) -> Result<Option<MapFile>, MapFileError> {
    let file = fs::File::open(path).await?;
    let mut reader = AsyncReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .create_reader(BufReader::new(file));
    let mut records = reader.records();
    // BTreeMap orders entries by date regardless of row order on disk.
    let mut by_date = BTreeMap::new();
    let mut row = 0usize;
    while let Some(record) = records.next().await {
        let record = record?;
        row += 1;
        let raw_date = record.get(0).unwrap_or_default();
        let symbol = match record.get(1) {
            Some(symbol) if !symbol.is_empty() => symbol.to_uppercase(),
            _ => continue,
        };
        let date =
            NaiveDate::parse_from_str(raw_date, MAP_DATE_FORMAT).map_err(|_| {
                MapFileError::BadDate {
                    file: path.display().to_string(),
                    row,
                    value: raw_date.to_string(),
                }
            })?;
        by_date.insert(date, symbol);
    }
    if by_date.is_empty() {
        return Ok(None);
    }
    let entries = by_date
        .into_iter()
        .map(|(date, symbol)| MapEntry { date, symbol })
        .collect();
    Ok(Some(MapFile { entries }))
}

/// Durable identifier: original symbol plus a base-36 encoding of the
/// listing date and market, e.g. `SPY 1A2B3C`.
fn security_id(listing: &MapEntry, market: Market) -> String {
    let days = listing.date.num_days_from_ce() as u64;
    format!("{} {}", listing.symbol, base36(days * 100 + market.code()))
}

fn base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).expect("base36 digits are ascii")
}

impl InstrumentResolver for MapFileStore {
    fn resolve(
        &self,
        ticker: &str,
        market: Market,
        date: NaiveDate,
        allow_rename_lookahead: bool,
    ) -> Result<String, ResolveError> {
        let ticker = ticker.to_uppercase();
        // An entity whose history has `ticker` in effect on `date`.
        if let Some(file) = self
            .files
            .iter()
            .find(|file| file.covers(date) && file.symbol_on(date) == Some(ticker.as_str()))
        {
            return Ok(security_id(file.listing(), market));
        }
        if allow_rename_lookahead {
            // Dates outside the listed range still resolve against the
            // entity that first carried this symbol; earliest listing wins
            // when the symbol was reused.
            if let Some(file) = self
                .files
                .iter()
                .filter(|file| file.listing().symbol == ticker)
                .min_by_key(|file| file.listing().date)
            {
                return Ok(security_id(file.listing(), market));
            }
        }
        Err(ResolveError::UnknownTicker {
            ticker,
            date,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn store_with(files: &[(&str, &str)]) -> (tempfile::TempDir, MapFileStore) {
        let dir = tempdir().unwrap();
        for (name, contents) in files {
            std::fs::write(dir.path().join(name), contents).unwrap();
        }
        let store = MapFileStore::load(dir.path()).await.unwrap().unwrap();
        (dir, store)
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn renamed_ticker_resolves_to_same_identifier() {
        let (_dir, store) = store_with(&[(
            "spy.csv",
            "19980102,XYZ\n20100101,XYZ\n20500101,SPY\n",
        )])
        .await;
        let old = store
            .resolve("XYZ", Market::Usa, day(2005, 6, 1), true)
            .unwrap();
        let new = store
            .resolve("SPY", Market::Usa, day(2020, 6, 1), true)
            .unwrap();
        assert_eq!(old, new);
        assert!(old.starts_with("XYZ "));
    }

    #[tokio::test]
    async fn unknown_ticker_is_an_error() {
        let (_dir, store) =
            store_with(&[("spy.csv", "19980102,SPY\n20500101,SPY\n")]).await;
        let err = store
            .resolve("ZZZT", Market::Usa, day(2020, 1, 1), true)
            .unwrap_err();
        assert!(matches!(err, ResolveError::UnknownTicker { .. }));
    }

    #[tokio::test]
    async fn lookahead_resolves_dates_before_listing() {
        let (_dir, store) =
            store_with(&[("aapl.csv", "19801212,AAPL\n20500101,AAPL\n")]).await;
        let pre_listing = day(1970, 1, 1);
        assert!(store
            .resolve("AAPL", Market::Usa, pre_listing, true)
            .is_ok());
        assert!(store
            .resolve("AAPL", Market::Usa, pre_listing, false)
            .is_err());
    }

    #[tokio::test]
    async fn reused_symbol_resolves_by_date() {
        // Two entities carried "ABC": the first until 2010, the second from
        // 2015 on.
        let (_dir, store) = store_with(&[
            ("abc-1.csv", "19900101,ABC\n20100101,ABC\n"),
            ("abc-2.csv", "20150101,ABC\n20500101,ABC\n"),
        ])
        .await;
        let first = store
            .resolve("ABC", Market::Usa, day(2005, 1, 1), true)
            .unwrap();
        let second = store
            .resolve("ABC", Market::Usa, day(2020, 1, 1), true)
            .unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn missing_directory_means_unavailable() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("map_files");
        assert!(MapFileStore::load(&missing).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn bad_map_date_is_fatal() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("bad.csv"), "2020-01-01,ABC\n").unwrap();
        let err = MapFileStore::load(dir.path()).await.unwrap_err();
        assert!(matches!(err, MapFileError::BadDate { .. }));
    }

    #[test]
    fn base36_round_values() {
        assert_eq!(base36(0), "0");
        assert_eq!(base36(35), "Z");
        assert_eq!(base36(36), "10");
    }
}
