use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::Deserialize;
use tracing::Level;

use crate::error::AppError;

const CONFIG_FILE: &str = "dancegrade";
const ENV_PREFIX: &str = "DANCEGRADE";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub port: u16,
    pub database_path: String,
    pub references_folder: String,
    pub sidecar_addr: String,
    pub analysis_sample_rate: u32,
    pub frame_buffer_size: usize,
    pub max_frame_bytes: usize,
    pub log_level: String,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            port: 5000,
            database_path: "instance/database.sqlite".to_string(),
            references_folder: "instance/references".to_string(),
            sidecar_addr: "127.0.0.1:7878".to_string(),
            analysis_sample_rate: 44_100,
            frame_buffer_size: 16,
            max_frame_bytes: 16 * 1024 * 1024,
            log_level: "info".to_string(),
        }
    }
}

impl Configuration {
    /// Layers `dancegrade.toml` (optional) and `DANCEGRADE_*` variables over the defaults.
    pub fn load() -> Result<Self, AppError> {
        let settings = Config::builder()
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX))
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    pub fn log_level(&self) -> Level {
        self.log_level.parse().unwrap_or(Level::INFO)
    }

    /// Resolves a reference video that is not found as given inside the references folder.
    pub fn reference_path(&self, video: &Path) -> PathBuf {
        if video.exists() || video.is_absolute() {
            return video.to_path_buf();
        }
        let candidate = Path::new(&self.references_folder).join(video);
        if candidate.exists() {
            candidate
        } else {
            video.to_path_buf()
        }
    }
}

pub struct ConfigurationBuilder {
    configuration: Configuration,
}

impl ConfigurationBuilder {
    pub fn new(configuration: Configuration) -> Self {
        Self { configuration }
    }

    // Sets the listening port, this will override the loaded configuration.
    pub fn port(mut self, port: u16) -> Self {
        self.configuration.port = port;
        self
    }

    // Points storage at another database file.
    pub fn database_path(mut self, database_path: impl Into<String>) -> Self {
        self.configuration.database_path = database_path.into();
        self
    }

    pub fn sidecar_addr(mut self, sidecar_addr: impl Into<String>) -> Self {
        self.configuration.sidecar_addr = sidecar_addr.into();
        self
    }

    pub fn build(self) -> Configuration {
        self.configuration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_original_layout() {
        let configuration = Configuration::default();
        assert_eq!(configuration.port, 5000);
        assert_eq!(configuration.analysis_sample_rate, 44_100);
        assert_eq!(configuration.log_level(), Level::INFO);
    }

    #[test]
    fn builder_overrides_fields() {
        let configuration = ConfigurationBuilder::new(Configuration::default())
            .port(9000)
            .database_path(":memory:")
            .sidecar_addr("10.0.0.2:7000")
            .build();
        assert_eq!(configuration.port, 9000);
        assert_eq!(configuration.database_path, ":memory:");
        assert_eq!(configuration.sidecar_addr, "10.0.0.2:7000");
        assert_eq!(configuration.analysis_sample_rate, 44_100);
    }

    #[test]
    fn bare_video_names_resolve_into_the_references_folder() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path();
        std::fs::write(folder.join("rumba.mp4"), b"").unwrap();
        let configuration = Configuration {
            references_folder: folder.to_string_lossy().into_owned(),
            ..Configuration::default()
        };

        assert_eq!(
            configuration.reference_path(Path::new("rumba.mp4")),
            folder.join("rumba.mp4")
        );
        assert_eq!(
            configuration.reference_path(Path::new("missing.mp4")),
            PathBuf::from("missing.mp4")
        );
    }

    #[test]
    fn unknown_log_level_falls_back_to_info() {
        let configuration = Configuration {
            log_level: "loud".to_string(),
            ..Configuration::default()
        };
        assert_eq!(configuration.log_level(), Level::INFO);
    }
}
