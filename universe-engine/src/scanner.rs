use std::path::{Path, PathBuf};

use crate::errors::ConvertError;

pub const SOURCE_EXTENSION: &str = "csv";

/// Non-recursive listing of the per-ticker source files. Order is not
/// meaningful; every file is processed independently.
pub fn list_source_files(dir: &Path) -> Result<Vec<PathBuf>, ConvertError> {
    let entries = std::fs::read_dir(dir).map_err(|err| {
        ConvertError::Config(format!(
            "cannot read source folder {}: {err}",
            dir.display()
        ))
    })?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some(SOURCE_EXTENSION) {
            files.push(path);
        }
    }
    Ok(files)
}
