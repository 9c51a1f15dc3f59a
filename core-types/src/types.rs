// Copyright (c) James Kassemi, SC, US. All rights reserved.

use chrono::NaiveDate;

/// Date format used for source rows, bucket keys, and universe file names.
pub const DATE_KEY_FORMAT: &str = "%Y%m%d";

/// One parsed line from a per-ticker source file. Ephemeral: lives only
/// while its line is transformed.
#[derive(Debug, Clone)]
pub struct SourceRecord {
    pub date: NaiveDate,
    pub ticker: String,
    /// Raw row fields after the leading date column, in order.
    pub fields: Vec<String>,
}

impl SourceRecord {
    pub fn date_key(&self) -> String {
        self.date.format(DATE_KEY_FORMAT).to_string()
    }

    /// Universe projection: five fields starting at column 2 of the raw
    /// row. Returns `None` when the row is too short to project.
    pub fn universe_fields(&self) -> Option<[String; 5]> {
        let slice = self.fields.get(1..6)?;
        let fields: [String; 5] = slice.to_vec().try_into().ok()?;
        Some(fields)
    }
}

/// One resolved universe entry. Serialized form is the unit of
/// deduplication and storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniverseRow {
    pub sid: String,
    pub ticker: String,
    pub fields: [String; 5],
}

impl UniverseRow {
    pub fn project(sid: String, record: &SourceRecord) -> Option<Self> {
        Some(Self {
            sid,
            ticker: record.ticker.clone(),
            fields: record.universe_fields()?,
        })
    }

    pub fn to_line(&self) -> String {
        format!("{},{},{}", self.sid, self.ticker, self.fields.join(","))
    }
}
