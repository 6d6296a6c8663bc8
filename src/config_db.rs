use std::{path::Path, str::FromStr};

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

use crate::{
    error::{Error, Result},
    fusion::ScoringConfig,
    search::{DEFAULT_THRESHOLD, DEFAULT_TOP_K},
};

const SETTINGS: TableDefinition<&str, &str> = TableDefinition::new("settings");

pub const TOP_K: &str = "top_k";
pub const THRESHOLD: &str = "threshold";
pub const KEYWORD_BONUS: &str = "keyword_bonus";
pub const DIRECT_CUTOFF: &str = "direct_cutoff";
pub const RESCUE_FACTOR: &str = "rescue_factor";
pub const DISTANCE_SCALE: &str = "distance_scale";
pub const POOL_FACTOR: &str = "pool_factor";

/// Every key accepted by [`ConfigDb::set_setting`].
pub const SETTING_KEYS: &[&str] = &[
    TOP_K,
    THRESHOLD,
    KEYWORD_BONUS,
    DIRECT_CUTOFF,
    RESCUE_FACTOR,
    DISTANCE_SCALE,
    POOL_FACTOR,
];

/// Per-query defaults, overridable from the command line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryDefaults {
    pub top_k: usize,
    pub threshold: f32,
}

/// Persistent string settings with typed accessors.
pub struct ConfigDb {
    db: Database,
}

impl ConfigDb {
    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::create(path)?;

        let txn = db.begin_write()?;
        txn.open_table(SETTINGS)?;
        txn.commit()?;

        Ok(Self { db })
    }

    /// Store a setting after checking the key is known and the value
    /// parses for it.
    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        validate_setting(key, value)?;

        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(SETTINGS)?;
            table.insert(key, value.trim())?;
        }
        txn.commit()?;
        Ok(())
    }

    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(SETTINGS)?;
        Ok(table.get(key)?.map(|v| v.value().to_string()))
    }

    pub fn remove_setting(&self, key: &str) -> Result<bool> {
        let txn = self.db.begin_write()?;
        let removed = {
            let mut table = txn.open_table(SETTINGS)?;
            table.remove(key)?.is_some()
        };
        txn.commit()?;
        Ok(removed)
    }

    pub fn list_settings(&self) -> Result<Vec<(String, String)>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(SETTINGS)?;
        let mut result = Vec::new();
        for entry in table.iter()? {
            let (k, v) = entry?;
            result.push((k.value().to_string(), v.value().to_string()));
        }
        Ok(result)
    }

    /// Scoring constants with stored overrides applied.
    pub fn scoring_config(&self) -> Result<ScoringConfig> {
        let defaults = ScoringConfig::default();
        Ok(ScoringConfig {
            keyword_bonus: self.parsed(KEYWORD_BONUS, defaults.keyword_bonus)?,
            direct_cutoff: self.parsed(DIRECT_CUTOFF, defaults.direct_cutoff)?,
            rescue_factor: self.parsed(RESCUE_FACTOR, defaults.rescue_factor)?,
            distance_scale: self
                .parsed(DISTANCE_SCALE, defaults.distance_scale)?,
            pool_factor: self.parsed(POOL_FACTOR, defaults.pool_factor)?,
        })
    }

    pub fn query_defaults(&self) -> Result<QueryDefaults> {
        Ok(QueryDefaults {
            top_k: self.parsed(TOP_K, DEFAULT_TOP_K)?,
            threshold: self.parsed(THRESHOLD, DEFAULT_THRESHOLD)?,
        })
    }

    /// Every known key with its effective value and whether it is stored.
    pub fn effective_settings(
        &self,
    ) -> Result<Vec<(&'static str, String, bool)>> {
        let scoring = self.scoring_config()?;
        let query = self.query_defaults()?;
        let stored = self.list_settings()?;

        Ok(SETTING_KEYS
            .iter()
            .map(|&key| {
                let value = match key {
                    TOP_K => query.top_k.to_string(),
                    THRESHOLD => query.threshold.to_string(),
                    KEYWORD_BONUS => scoring.keyword_bonus.to_string(),
                    DIRECT_CUTOFF => scoring.direct_cutoff.to_string(),
                    RESCUE_FACTOR => scoring.rescue_factor.to_string(),
                    DISTANCE_SCALE => scoring.distance_scale.to_string(),
                    _ => scoring.pool_factor.to_string(),
                };
                let is_set = stored.iter().any(|(k, _)| k == key);
                (key, value, is_set)
            })
            .collect())
    }

    fn parsed<T: FromStr>(&self, key: &str, default: T) -> Result<T>
    where
        T::Err: std::fmt::Display,
    {
        match self.get_setting(key)? {
            Some(raw) => raw.parse().map_err(|e| {
                Error::Config(format!("invalid value '{raw}' for {key}: {e}"))
            }),
            None => Ok(default),
        }
    }
}

impl std::fmt::Debug for ConfigDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigDb").finish_non_exhaustive()
    }
}

/// Reject unknown keys and values that would break ranking.
pub fn validate_setting(key: &str, value: &str) -> Result<()> {
    let value = value.trim();
    let invalid = |reason: &str| {
        Err(Error::Config(format!(
            "invalid value '{value}' for {key}: {reason}"
        )))
    };

    match key {
        TOP_K | POOL_FACTOR => match value.parse::<usize>() {
            Ok(0) => invalid("must be at least 1"),
            Ok(_) => Ok(()),
            Err(e) => invalid(&e.to_string()),
        },
        THRESHOLD | KEYWORD_BONUS | DIRECT_CUTOFF | RESCUE_FACTOR
        | DISTANCE_SCALE => match value.parse::<f32>() {
            Ok(v) if !v.is_finite() => invalid("must be finite"),
            Ok(v) if v < 0.0 => invalid("must not be negative"),
            Ok(v) if key == DISTANCE_SCALE && v == 0.0 => {
                invalid("must be positive")
            }
            Ok(_) => Ok(()),
            Err(e) => invalid(&e.to_string()),
        },
        _ => validate_setting_key(key),
    }
}

/// Reject keys that are not in [`SETTING_KEYS`].
pub fn validate_setting_key(key: &str) -> Result<()> {
    if SETTING_KEYS.iter().any(|k| *k == key) {
        return Ok(());
    }
    Err(Error::Config(format!(
        "unknown setting '{key}' (expected one of: {})",
        SETTING_KEYS.join(", ")
    )))
}
