use std::path::PathBuf;

use config::{Config, ConfigError};
use serde::{Deserialize, Serialize};

/// Config structure with the converter's directory layout and worker bounds.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Folder holding the per-ticker source CSVs; universe output lands in
    /// a `universe/` subfolder of this directory.
    pub destination_folder: PathBuf,
    /// Root of the reference data tree. Map files are expected at
    /// `<data_folder>/equity/usa/map_files`.
    pub data_folder: PathBuf,
    #[serde(default = "default_workers")]
    pub concurrent_files: usize,
    #[serde(default = "default_workers")]
    pub concurrent_dates: usize,
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(config::File::with_name("config.toml").required(false))
            .add_source(config::Environment::with_prefix("UNIVERSE"))
            .build()?;
        let config: Self = settings.try_deserialize()?;
        if config.destination_folder.as_os_str().is_empty() {
            return Err(ConfigError::Message(
                "DESTINATION_FOLDER is required".to_string(),
            ));
        }
        if config.data_folder.as_os_str().is_empty() {
            return Err(ConfigError::Message("DATA_FOLDER is required".to_string()));
        }
        Ok(config)
    }

    /// Location of the historical ticker mapping dataset. Its absence
    /// disables universe-file production entirely.
    pub fn map_files_folder(&self) -> PathBuf {
        self.data_folder
            .join("equity")
            .join("usa")
            .join("map_files")
    }

    pub fn universe_folder(&self) -> PathBuf {
        self.destination_folder.join("universe")
    }
}
