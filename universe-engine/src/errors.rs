use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("{file} row {row}: unparseable date {value:?}")]
    Parse {
        file: PathBuf,
        row: usize,
        value: String,
    },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv_async::Error),
}
