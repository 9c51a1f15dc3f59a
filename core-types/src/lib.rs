// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! Shared config and record types for the universe converter.

pub mod config;
pub mod types;

pub use config::AppConfig;
pub use types::{SourceRecord, UniverseRow, DATE_KEY_FORMAT};
