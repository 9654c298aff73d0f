//! Server configuration.
//!
//! Supports loading from YAML files with environment variable overrides.

use std::path::Path;

use anyhow::{Context, Result};
use radiocast_core::{Radio, RendererDevice};
use serde::Deserialize;

/// Server configuration loaded from YAML with environment overrides.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port to bind the HTTP server to (0 = pick a free one).
    /// Override: `RADIOCAST_BIND_PORT`
    pub bind_port: u16,

    /// Volume change per raise/lower command.
    /// Override: `RADIOCAST_VOLUME_STEP`
    pub volume_step: u8,

    /// Number of stream titles kept in the playlist history.
    /// Override: `RADIOCAST_PLAYLIST_CAPACITY`
    pub playlist_capacity: usize,

    /// Connect timeout for radio streams played locally (seconds).
    pub stream_connect_timeout_secs: u64,

    /// Radio catalog.
    pub radios: Vec<Radio>,

    /// Renderers known without discovery.
    pub renderers: Vec<RendererDevice>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let core = radiocast_core::Config::default();
        Self {
            bind_port: 49500,
            volume_step: core.volume_step,
            playlist_capacity: core.playlist_capacity,
            stream_connect_timeout_secs: core.stream_connect_timeout_secs,
            radios: Vec::new(),
            renderers: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from a YAML file, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = path {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Self::default()
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Applies overrides looked up through `var`; unparsable values are ignored.
    fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(port) = var("RADIOCAST_BIND_PORT").and_then(|v| v.parse().ok()) {
            self.bind_port = port;
        }
        if let Some(step) = var("RADIOCAST_VOLUME_STEP").and_then(|v| v.parse().ok()) {
            self.volume_step = step;
        }
        if let Some(capacity) = var("RADIOCAST_PLAYLIST_CAPACITY").and_then(|v| v.parse().ok()) {
            self.playlist_capacity = capacity;
        }
    }

    /// Converts to radiocast-core's Config type.
    pub fn to_core_config(&self) -> radiocast_core::Config {
        radiocast_core::Config {
            preferred_port: self.bind_port,
            volume_step: self.volume_step,
            playlist_capacity: self.playlist_capacity,
            stream_connect_timeout_secs: self.stream_connect_timeout_secs,
            radios: self.radios.clone(),
            renderers: self.renderers.clone(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const YAML: &str = r#"
bind_port: 8080
volume_step: 10
radios:
  - id: "7"
    name: Jazz
    url: http://radio.example.com/jazz
    iconUrl: http://radio.example.com/jazz.png
renderers:
  - id: "uuid:kitchen"
    name: Kitchen
    controlUrls:
      avTransport: http://192.168.1.40:49152/AVTransport/control
      renderingControl: http://192.168.1.40:49152/RenderingControl/control
      connectionManager: http://192.168.1.40:49152/ConnectionManager/control
"#;

    #[test]
    fn loads_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(YAML.as_bytes()).unwrap();

        let config = ServerConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.bind_port, 8080);
        assert_eq!(config.volume_step, 10);
        assert_eq!(config.playlist_capacity, 50);
        assert_eq!(config.radios[0].name, "Jazz");
        assert_eq!(config.renderers[0].name, "Kitchen");

        let core = config.to_core_config();
        assert_eq!(core.preferred_port, 8080);
        assert!(core.validate().is_ok());
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ServerConfig::load(Some(&dir.path().join("nope.yaml"))).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn invalid_yaml_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"bind_port: [not a port").unwrap();
        assert!(ServerConfig::load(Some(file.path())).is_err());
    }

    #[test]
    fn env_overrides_apply_and_ignore_garbage() {
        let mut config = ServerConfig::default();
        config.apply_env_overrides(|key| match key {
            "RADIOCAST_BIND_PORT" => Some("9000".into()),
            "RADIOCAST_VOLUME_STEP" => Some("loud".into()),
            "RADIOCAST_PLAYLIST_CAPACITY" => Some("5".into()),
            _ => None,
        });
        assert_eq!(config.bind_port, 9000);
        assert_eq!(config.volume_step, 5);
        assert_eq!(config.playlist_capacity, 5);
    }
}
