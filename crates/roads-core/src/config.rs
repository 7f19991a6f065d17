//! Configuration for the road map: index seeding and capacity limits.
//!
//! Load order: `.roads/config.toml` → environment variables → defaults.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level road map configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    pub index: IndexConfig,
    pub limits: LimitsConfig,
}

/// Ordered index configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Seed for the treap priority generators. Equal seeds and equal command
    /// sequences produce identical index shapes.
    pub seed: u64,
}

/// Capacity limits. Unset means unlimited. Hitting a limit fails the
/// operation with an allocation error and leaves the map untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum number of cities.
    pub max_cities: Option<usize>,
    /// Maximum number of roads (edge pairs).
    pub max_roads: Option<usize>,
    /// Maximum number of roads touching a single city.
    pub max_degree: Option<usize>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self { seed: 42 }
    }
}

/// Helper to parse an env var and apply it to a config field.
fn env_override<T: std::str::FromStr>(var: &str, target: &mut T) {
    if let Ok(v) = std::env::var(var)
        && let Ok(n) = v.parse()
    {
        *target = n;
    }
}

/// Like [`env_override`], for optional limits.
fn env_override_limit(var: &str, target: &mut Option<usize>) {
    if let Ok(v) = std::env::var(var)
        && let Ok(n) = v.parse()
    {
        *target = Some(n);
    }
}

impl MapConfig {
    /// Load config from `.roads/config.toml` in the project root, with env var
    /// overrides. Falls back to defaults if no config file exists.
    pub fn load(project_root: &Path) -> Result<Self> {
        let config_path = project_root.join(".roads").join("config.toml");

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Self::default()
        };

        env_override("ROADS_SEED", &mut config.index.seed);
        env_override_limit("ROADS_MAX_CITIES", &mut config.limits.max_cities);
        env_override_limit("ROADS_MAX_ROADS", &mut config.limits.max_roads);
        env_override_limit("ROADS_MAX_DEGREE", &mut config.limits.max_degree);

        config.validate()?;
        Ok(config)
    }

    /// Reject limits that would make every insertion fail.
    pub fn validate(&self) -> Result<()> {
        let limits = [
            ("max_cities", self.limits.max_cities),
            ("max_roads", self.limits.max_roads),
            ("max_degree", self.limits.max_degree),
        ];
        for (name, limit) in limits {
            if limit == Some(0) {
                anyhow::bail!("limits.{name} must be positive when set");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MapConfig::default();
        assert_eq!(config.index.seed, 42);
        assert!(config.limits.max_cities.is_none());
        assert!(config.limits.max_roads.is_none());
        assert!(config.limits.max_degree.is_none());
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
[index]
seed = 7

[limits]
max_cities = 100
"#;
        let config: MapConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.index.seed, 7);
        assert_eq!(config.limits.max_cities, Some(100));
        // Defaults for unspecified fields
        assert!(config.limits.max_roads.is_none());
    }

    #[test]
    fn test_config_load_nonexistent() {
        let config = MapConfig::load(Path::new("/nonexistent/path")).unwrap();
        assert!(config.limits.max_degree.is_none());
    }

    #[test]
    fn test_load_reads_project_file() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join(".roads");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("config.toml"),
            r#"
[limits]
max_roads = 3
max_degree = 2
"#,
        )
        .unwrap();

        let config = MapConfig::load(tmp.path()).unwrap();
        assert_eq!(config.limits.max_roads, Some(3));
        assert_eq!(config.limits.max_degree, Some(2));
    }

    #[test]
    fn test_load_rejects_zero_limit() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join(".roads");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("config.toml"), "[limits]\nmax_cities = 0\n").unwrap();

        let err = MapConfig::load(tmp.path()).unwrap_err();
        assert!(err.to_string().contains("max_cities"));
    }
}
