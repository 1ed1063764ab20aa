/*!
 * Runtime Configuration
 *
 * Pool sizing, container defaults and deferred deletion
 */

use super::errors::{RuntimeError, RuntimeResult};
use serde::{Deserialize, Serialize};

/// Free-list parameters attached to an object type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolParameters {
    /// Maximum number of unused blocks kept for reuse
    pub max_count: usize,
}

impl PoolParameters {
    pub const fn new(max_count: usize) -> Self {
        Self { max_count }
    }
}

/// Substrate configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Pool applied to object types registered without explicit parameters
    pub default_pool: Option<PoolParameters>,
    /// Initial slot-list capacity
    pub slot_list_capacity: usize,
    /// Initial hashtable capacity
    pub hashtable_capacity: usize,
    /// Spawn the background worker for deferred deletion
    pub deferred_delete: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            default_pool: Some(PoolParameters::new(64)),
            slot_list_capacity: 16,
            hashtable_capacity: 16,
            deferred_delete: true,
        }
    }
}

impl RuntimeConfig {
    /// Minimal footprint, no pooling
    pub const fn low_memory() -> Self {
        Self {
            default_pool: None,
            slot_list_capacity: 1,
            hashtable_capacity: 1,
            deferred_delete: false,
        }
    }

    /// Large pools for allocation-heavy providers
    pub const fn high_throughput() -> Self {
        Self {
            default_pool: Some(PoolParameters::new(1024)),
            slot_list_capacity: 256,
            hashtable_capacity: 256,
            deferred_delete: true,
        }
    }

    /// Parse a JSON document; missing fields take their defaults
    pub fn from_json(json: &str) -> RuntimeResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by environment variables
    ///
    /// - REFCORE_DEFAULT_POOL: max pooled blocks per type (0 disables)
    /// - REFCORE_SLOT_LIST_CAPACITY / REFCORE_HASHTABLE_CAPACITY
    /// - REFCORE_DEFERRED_DELETE: 1/true/0/false
    pub fn from_env() -> RuntimeResult<Self> {
        let mut config = Self::default();

        if let Some(count) = env_usize("REFCORE_DEFAULT_POOL")? {
            config.default_pool = (count > 0).then(|| PoolParameters::new(count));
        }
        if let Some(capacity) = env_usize("REFCORE_SLOT_LIST_CAPACITY")? {
            config.slot_list_capacity = capacity;
        }
        if let Some(capacity) = env_usize("REFCORE_HASHTABLE_CAPACITY")? {
            config.hashtable_capacity = capacity;
        }
        if let Ok(value) = std::env::var("REFCORE_DEFERRED_DELETE") {
            config.deferred_delete = match value.as_str() {
                "1" | "true" => true,
                "0" | "false" => false,
                other => {
                    return Err(RuntimeError::Configuration(format!(
                        "REFCORE_DEFERRED_DELETE: expected boolean, got '{}'",
                        other
                    )))
                }
            };
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> RuntimeResult<()> {
        if self.slot_list_capacity == 0 {
            return Err(RuntimeError::Configuration(
                "slot_list_capacity must be non-zero".into(),
            ));
        }
        if self.hashtable_capacity == 0 {
            return Err(RuntimeError::Configuration(
                "hashtable_capacity must be non-zero".into(),
            ));
        }
        if matches!(self.default_pool, Some(p) if p.max_count == 0) {
            return Err(RuntimeError::Configuration(
                "default_pool: max_count must be non-zero, omit the pool to disable it".into(),
            ));
        }
        Ok(())
    }
}

fn env_usize(key: &str) -> RuntimeResult<Option<usize>> {
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| RuntimeError::Configuration(format!("{}: {}", key, e))),
        Err(_) => Ok(None),
    }
}
