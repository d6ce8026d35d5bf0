use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::models::Coordinate;

pub const MAP_KEY_ENV: &str = "MAPTILER_API_KEY";
pub const GEO_KEY_ENV: &str = "GEOLOCATION_API_KEY";
pub const TIMEZONE_KEY_ENV: &str = "API_NINJAS_KEY";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Config {
    pub api: ApiConfig,
    pub map: MapConfig,
    pub ui: UiConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ApiConfig {
    pub geo_endpoint: String,
    pub timezone_endpoint: String,
    pub request_timeout_seconds: u64,
    // Keys normally come from the environment; the file values are a fallback.
    #[serde(default)]
    pub geo_api_key: Option<String>,
    #[serde(default)]
    pub timezone_api_key: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MapConfig {
    pub home_lat: f64, // Map center before any lookup succeeds
    pub home_lon: f64,
    pub tile_url_template: String, // {z}/{x}/{y} and {key} are substituted
    #[serde(default)]
    pub map_api_key: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UiConfig {
    pub tick_rate_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api: ApiConfig {
                geo_endpoint: "https://geo.ipify.org/api/v2/country,city".to_string(),
                timezone_endpoint: "https://api.api-ninjas.com/v1/timezone".to_string(),
                request_timeout_seconds: 10,
                geo_api_key: None,
                timezone_api_key: None,
            },
            map: MapConfig {
                home_lat: 51.505,
                home_lon: -0.09,
                tile_url_template:
                    "https://api.maptiler.com/maps/streets-v2/{z}/{x}/{y}.png?key={key}"
                        .to_string(),
                map_api_key: None,
            },
            ui: UiConfig { tick_rate_ms: 150 },
        }
    }
}

impl Config {
    /// Loads config.toml from the working directory, creating a default one
    /// if it doesn't exist, then layers API keys from the environment on top.
    pub fn load() -> Self {
        let mut config = Self::load_from(Path::new("config.toml"));
        config.apply_env(|name| std::env::var(name).ok());
        config.warn_missing_keys();
        config
    }

    /// Reads a config file without touching the environment.
    pub fn load_from(path: &Path) -> Self {
        if let Ok(content) = fs::read_to_string(path) {
            match toml::from_str(&content) {
                Ok(config) => return config,
                Err(e) => warn!("Failed to parse {}: {}. Using defaults.", path.display(), e),
            }
            return Config::default();
        }

        let default_config = Config::default();

        // Save default config to disk for the user to edit later
        match toml::to_string_pretty(&default_config) {
            Ok(toml_string) => {
                if fs::write(path, toml_string).is_err() {
                    warn!("Could not write default {} to disk.", path.display());
                }
            }
            Err(e) => warn!("Could not serialize default config: {}", e),
        }

        info!("Loaded default configuration.");
        default_config
    }

    /// Overrides keys with non-empty environment values. `lookup` is
    /// `std::env::var` in production.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(key) = read(MAP_KEY_ENV) {
            self.map.map_api_key = Some(key);
        }
        if let Some(key) = read(GEO_KEY_ENV) {
            self.api.geo_api_key = Some(key);
        }
        if let Some(key) = read(TIMEZONE_KEY_ENV) {
            self.api.timezone_api_key = Some(key);
        }
    }

    pub fn home(&self) -> Coordinate {
        let home = Coordinate::new(self.map.home_lat, self.map.home_lon);
        if home.is_valid() {
            home
        } else {
            warn!("Configured home {:?} is not a valid coordinate, using default.", home);
            Coordinate::default()
        }
    }

    fn warn_missing_keys(&self) {
        if self.map.map_api_key.is_none() {
            warn!("{} not set; map tiles will not load.", MAP_KEY_ENV);
        }
        if self.api.geo_api_key.is_none() {
            warn!("{} not set; geolocation lookups will fail.", GEO_KEY_ENV);
        }
        if self.api.timezone_api_key.is_none() {
            warn!("{} not set; timezone lookups will fail.", TIMEZONE_KEY_ENV);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_writes_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let config = Config::load_from(&path);
        assert_eq!(config, Config::default());
        assert!(path.exists());

        // Second load reads back what was written.
        assert_eq!(Config::load_from(&path), Config::default());
    }

    #[test]
    fn test_unparsable_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "this is = = not toml").unwrap();

        assert_eq!(Config::load_from(&path), Config::default());
    }

    #[test]
    fn test_env_overrides_file_keys() {
        let mut config = Config::default();
        config.api.geo_api_key = Some("from-file".to_string());

        let env: HashMap<&str, &str> = [
            (GEO_KEY_ENV, "geo-env"),
            (TIMEZONE_KEY_ENV, "tz-env"),
            (MAP_KEY_ENV, "   "),
        ]
        .into_iter()
        .collect();
        config.apply_env(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(config.api.geo_api_key.as_deref(), Some("geo-env"));
        assert_eq!(config.api.timezone_api_key.as_deref(), Some("tz-env"));
        // Blank values do not count as set.
        assert_eq!(config.map.map_api_key, None);
    }

    #[test]
    fn test_invalid_home_uses_default() {
        let mut config = Config::default();
        config.map.home_lat = 123.0;
        assert_eq!(config.home(), Coordinate::default());
    }
}
