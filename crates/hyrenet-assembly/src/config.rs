//! Build configuration.
//!
//! ```yaml
//! data_root: data/hybrid_grid
//! snapshots:
//!   start: "2024-10-01 00:00:00"
//!   periods: 168
//!   step_minutes: 60
//! profiles:
//!   load_profile_type: load_profiles
//! ```
//!
//! Every section except `data_root` is optional. Relative data roots are
//! resolved against the directory of the configuration file.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::Duration;
use hyrenet_core::time::{parse_timestamp, DEFAULT_INDEX_NAME};
use hyrenet_core::{Carrier, NetworkError, NetworkResult, Snapshots};
use serde::{Deserialize, Serialize};

pub const DEFAULT_VOLTAGE_TOLERANCE_KV: f64 = 1e-3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    pub data_root: PathBuf,
    #[serde(default)]
    pub snapshots: SnapshotConfig,
    /// Replaces the built-in carrier list when given
    #[serde(default)]
    pub carriers: Option<Vec<Carrier>>,
    #[serde(default)]
    pub profiles: ProfileConfig,
    #[serde(default = "default_voltage_tolerance")]
    pub voltage_tolerance_kv: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    #[serde(default = "default_start")]
    pub start: String,
    #[serde(default = "default_periods")]
    pub periods: usize,
    #[serde(default = "default_step_minutes")]
    pub step_minutes: i64,
    #[serde(default = "default_index_name")]
    pub name: String,
    #[serde(default)]
    pub weights: Option<Vec<f64>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileConfig {
    #[serde(default = "default_load_profile_type")]
    pub load_profile_type: String,
    #[serde(default = "default_generator_profile_type")]
    pub generator_profile_type: String,
}

fn default_voltage_tolerance() -> f64 {
    DEFAULT_VOLTAGE_TOLERANCE_KV
}

fn default_start() -> String {
    "2024-10-01 00:00:00".to_string()
}

fn default_periods() -> usize {
    24
}

fn default_step_minutes() -> i64 {
    60
}

fn default_index_name() -> String {
    DEFAULT_INDEX_NAME.to_string()
}

fn default_load_profile_type() -> String {
    "load_profiles".to_string()
}

fn default_generator_profile_type() -> String {
    "generator_profiles".to_string()
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            start: default_start(),
            periods: default_periods(),
            step_minutes: default_step_minutes(),
            name: default_index_name(),
            weights: None,
        }
    }
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            load_profile_type: default_load_profile_type(),
            generator_profile_type: default_generator_profile_type(),
        }
    }
}

impl SnapshotConfig {
    /// The configured horizon as a snapshot index
    pub fn build(&self) -> NetworkResult<Snapshots> {
        let start = parse_timestamp(&self.start).ok_or_else(|| {
            NetworkError::InvalidConfig(format!("unreadable snapshot start '{}'", self.start))
        })?;
        if self.step_minutes <= 0 {
            return Err(NetworkError::InvalidConfig(format!(
                "snapshot step must be positive, got {} minutes",
                self.step_minutes
            )));
        }
        let step = Duration::try_minutes(self.step_minutes).ok_or_else(|| {
            NetworkError::InvalidConfig(format!(
                "snapshot step of {} minutes is out of range",
                self.step_minutes
            ))
        })?;
        let snapshots = Snapshots::range(start, self.periods, step)?.with_name(self.name.clone());
        match &self.weights {
            Some(weights) => snapshots.with_weights(weights.clone()),
            None => Ok(snapshots),
        }
    }
}

impl BuildConfig {
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
            snapshots: SnapshotConfig::default(),
            carriers: None,
            profiles: ProfileConfig::default(),
            voltage_tolerance_kv: DEFAULT_VOLTAGE_TOLERANCE_KV,
        }
    }

    pub fn with_snapshots(mut self, snapshots: SnapshotConfig) -> Self {
        self.snapshots = snapshots;
        self
    }

    /// Load from YAML or JSON, chosen by extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading build config '{}'", path.display()))?;
        let mut config: BuildConfig = match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                serde_yaml::from_str(&data).context("parsing build config yaml")?
            }
            Some(ext) if ext.eq_ignore_ascii_case("json") => {
                serde_json::from_str(&data).context("parsing build config json")?
            }
            _ => serde_yaml::from_str(&data)
                .or_else(|_| serde_json::from_str(&data))
                .context("parsing build config")?,
        };
        if config.data_root.is_relative() {
            if let Some(parent) = path.parent() {
                config.data_root = parent.join(&config.data_root);
            }
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.data_root.as_os_str().is_empty() {
            return Err(anyhow!("data_root cannot be empty"));
        }
        if self.voltage_tolerance_kv.is_nan() || self.voltage_tolerance_kv < 0.0 {
            return Err(anyhow!(
                "voltage_tolerance_kv must be non-negative, got {}",
                self.voltage_tolerance_kv
            ));
        }
        self.snapshots
            .build()
            .context("validating snapshot horizon")?;
        Ok(())
    }

    /// Carriers registered before any metadata override
    pub fn base_carriers(&self) -> Vec<Carrier> {
        self.carriers.clone().unwrap_or_else(Carrier::defaults)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyrenet_core::ErrorKind;
    use tempfile::tempdir;

    #[test]
    fn test_yaml_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("build.yaml");
        fs::write(&path, "data_root: grid\n").unwrap();

        let config = BuildConfig::from_path(&path).unwrap();
        assert_eq!(config.data_root, dir.path().join("grid"));
        assert_eq!(config.snapshots.periods, 24);
        assert_eq!(config.profiles.load_profile_type, "load_profiles");
        assert_eq!(config.voltage_tolerance_kv, DEFAULT_VOLTAGE_TOLERANCE_KV);
        assert_eq!(config.base_carriers().len(), 8);
    }

    #[test]
    fn test_json_with_overrides() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("build.json");
        fs::write(
            &path,
            r#"{
                "data_root": "/srv/grid",
                "snapshots": {"start": "2024-01-01", "periods": 168},
                "carriers": [{"name": "AC"}, {"name": "solar", "co2_emissions": 0.0}]
            }"#,
        )
        .unwrap();

        let config = BuildConfig::from_path(&path).unwrap();
        assert_eq!(config.data_root, PathBuf::from("/srv/grid"));
        let snapshots = config.snapshots.build().unwrap();
        assert_eq!(snapshots.len(), 168);
        assert_eq!(config.base_carriers().len(), 2);
    }

    #[test]
    fn test_invalid_horizon_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("build.yml");
        fs::write(&path, "data_root: grid\nsnapshots:\n  start: someday\n").unwrap();
        assert!(BuildConfig::from_path(&path).is_err());

        fs::write(&path, "data_root: grid\nsnapshots:\n  step_minutes: 0\n").unwrap();
        assert!(BuildConfig::from_path(&path).is_err());
    }

    #[test]
    fn test_weights_must_match() {
        let snapshots = SnapshotConfig {
            periods: 3,
            weights: Some(vec![1.0, 2.0]),
            ..SnapshotConfig::default()
        };
        assert!(snapshots.build().is_err());
    }

    #[test]
    fn test_overflowing_horizon_is_config_error() {
        let huge_step = SnapshotConfig {
            step_minutes: 60 * 24 * 365 * 1_000_000,
            periods: 2,
            ..SnapshotConfig::default()
        };
        let err = huge_step.build().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);

        let long_horizon = SnapshotConfig {
            step_minutes: 60 * 24 * 365,
            periods: 1_000_000,
            ..SnapshotConfig::default()
        };
        assert_eq!(long_horizon.build().unwrap_err().kind(), ErrorKind::InvalidConfig);

        let unrepresentable = SnapshotConfig {
            step_minutes: i64::MAX,
            ..SnapshotConfig::default()
        };
        assert_eq!(unrepresentable.build().unwrap_err().kind(), ErrorKind::InvalidConfig);
    }

    #[test]
    fn test_negative_weight_rejected() {
        let snapshots = SnapshotConfig {
            periods: 2,
            weights: Some(vec![1.0, -1.0]),
            ..SnapshotConfig::default()
        };
        assert_eq!(snapshots.build().unwrap_err().kind(), ErrorKind::InvalidConfig);
    }

    #[test]
    fn test_missing_file() {
        let err = BuildConfig::from_path(Path::new("/nonexistent/build.yaml")).unwrap_err();
        assert!(err.to_string().contains("reading build config"));
    }
}
