//! Configuration for the memnet store.
//!
//! Maps directly to `memnet.toml`. Every field has a default, so an empty
//! file (or no file) yields the reference behaviour.

use serde::{Deserialize, Serialize};

use crate::error::{MemnetError, Result};

/// Top-level memnet configuration, loadable from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemnetConfig {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,
    /// Store capacity, association and eviction tuning.
    #[serde(default)]
    pub network: NetworkConfig,
    /// Persistence / save settings.
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

impl MemnetConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `MemnetError::Config` if the TOML is invalid or a value is
    /// out of range.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(toml_str).map_err(|e| MemnetError::Config(e.to_string()))?;
        config.network.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// General system settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level hint for the embedding application: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Store-wide behaviour: capacity, association discovery, eviction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Maximum number of records retained after the capacity manager runs.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// An edge is created only when strength is strictly above this value.
    #[serde(default = "default_0_3")]
    pub association_threshold: f64,
    /// Default `threshold` for `get_associated`.
    #[serde(default = "default_0_3")]
    pub default_strength_threshold: f64,
    /// Default `max_results` for `get_associated`.
    #[serde(default = "default_10_usize")]
    pub default_max_associated: usize,
    /// Association strength weights.
    #[serde(default)]
    pub association: AssociationConfig,
    /// Eviction score weights.
    #[serde(default)]
    pub eviction: EvictionConfig,
    /// Dimension index discretization.
    #[serde(default)]
    pub index: IndexConfig,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            association_threshold: 0.3,
            default_strength_threshold: 0.3,
            default_max_associated: 10,
            association: AssociationConfig::default(),
            eviction: EvictionConfig::default(),
            index: IndexConfig::default(),
        }
    }
}

impl NetworkConfig {
    /// Config with the given capacity and every other field at its default.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    /// Check value ranges.
    ///
    /// # Errors
    /// Returns `MemnetError::Config` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(MemnetError::Config("network.capacity must be at least 1".into()));
        }
        if self.index.time_bucket_secs <= 0 {
            return Err(MemnetError::Config(
                "network.index.time_bucket_secs must be positive".into(),
            ));
        }
        if !(self.index.valence_step > 0.0) {
            return Err(MemnetError::Config(
                "network.index.valence_step must be positive".into(),
            ));
        }
        if !(self.association.temporal_scale_secs > 0.0) {
            return Err(MemnetError::Config(
                "network.association.temporal_scale_secs must be positive".into(),
            ));
        }
        if self.eviction.usage_saturation == 0 {
            return Err(MemnetError::Config(
                "network.eviction.usage_saturation must be at least 1".into(),
            ));
        }
        let a = &self.association;
        let e = &self.eviction;
        let weights = [
            ("association.context", a.context),
            ("association.tags", a.tags),
            ("association.temporal", a.temporal),
            ("association.emotional", a.emotional),
            ("eviction.importance", e.importance),
            ("eviction.recency", e.recency),
            ("eviction.usage", e.usage),
        ];
        if let Some((name, _)) = weights.iter().find(|(_, w)| !(*w >= 0.0)) {
            return Err(MemnetError::Config(format!(
                "network.{name} must be a non-negative weight"
            )));
        }
        Ok(())
    }
}

/// Association strength weights. They sum to 1.0 by default.
///
/// ```text
/// strength = context·C + tags·T + temporal·P + emotional·E
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssociationConfig {
    /// Weight for shared context pairs.
    #[serde(default = "default_0_3")]
    pub context: f64,
    /// Weight for shared tags.
    #[serde(default = "default_0_3")]
    pub tags: f64,
    /// Weight for temporal proximity.
    #[serde(default = "default_0_2")]
    pub temporal: f64,
    /// Weight for emotional similarity.
    #[serde(default = "default_0_2")]
    pub emotional: f64,
    /// Characteristic time scale of temporal similarity, in seconds.
    #[serde(default = "default_3600_f64")]
    pub temporal_scale_secs: f64,
}

impl Default for AssociationConfig {
    fn default() -> Self {
        Self {
            context: 0.3,
            tags: 0.3,
            temporal: 0.2,
            emotional: 0.2,
            temporal_scale_secs: 3600.0,
        }
    }
}

/// Capacity-manager score weights.
///
/// ```text
/// score = importance·I + recency·R + usage·min(retrievals, saturation)/saturation
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvictionConfig {
    /// Weight for externally supplied importance.
    #[serde(default = "default_0_4")]
    pub importance: f64,
    /// Weight for `1 / (1 + seconds_since_creation)`.
    #[serde(default = "default_0_3")]
    pub recency: f64,
    /// Weight for the saturated retrieval count.
    #[serde(default = "default_0_3")]
    pub usage: f64,
    /// Retrieval count at which the usage factor reaches 1.0.
    #[serde(default = "default_10_u32")]
    pub usage_saturation: u32,
}

impl Default for EvictionConfig {
    fn default() -> Self {
        Self {
            importance: 0.4,
            recency: 0.3,
            usage: 0.3,
            usage_saturation: 10,
        }
    }
}

/// Discretization of the temporal and emotional dimension indices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Width of a temporal bucket in seconds (one hour by default).
    #[serde(default = "default_3600_i64")]
    pub time_bucket_secs: i64,
    /// Width of an emotional-valence bucket.
    #[serde(default = "default_0_1")]
    pub valence_step: f64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            time_bucket_secs: 3600,
            valence_step: 0.1,
        }
    }
}

/// Persistence / save configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Use WAL mode for concurrent reads.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
    /// Detect save corruption via checksums.
    #[serde(default = "default_true")]
    pub checksum_enabled: bool,
    /// Number of save backups to keep.
    #[serde(default = "default_3")]
    pub backup_count: u32,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            wal_mode: true,
            checksum_enabled: true,
            backup_count: 3,
        }
    }
}

// ---------------------------------------------------------------------------
// Serde default helpers
// ---------------------------------------------------------------------------

fn default_true() -> bool { true }
fn default_log_level() -> String { "info".to_string() }
fn default_0_1() -> f64 { 0.1 }
fn default_0_2() -> f64 { 0.2 }
fn default_0_3() -> f64 { 0.3 }
fn default_0_4() -> f64 { 0.4 }
fn default_3() -> u32 { 3 }
fn default_10_u32() -> u32 { 10 }
fn default_10_usize() -> usize { 10 }
fn default_capacity() -> usize { 10_000 }
fn default_3600_f64() -> f64 { 3600.0 }
fn default_3600_i64() -> i64 { 3600 }
