// ==========================================
// FieldOps stock engine - configuration manager
// ==========================================
// Storage: config_kv table (key-value, scope 'global')
// Malformed values fall back to defaults with a warning
// ==========================================

use crate::config::supply_config_trait::{ConfigResult, SupplyConfigReader};
use crate::domain::types::{Sku, SkuCounts};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

// ==========================================
// ConfigManager
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// Share an existing connection
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        let conn = self.conn.lock().map_err(|e| format!("lock failed: {}", e))?;
        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn get_config_or_default(&self, key: &str, default: &str) -> ConfigResult<String> {
        Ok(self
            .get_config_value(key)?
            .unwrap_or_else(|| default.to_string()))
    }

    /// Upsert a global value
    pub fn set_config_value(&self, key: &str, value: &str) -> ConfigResult<()> {
        let conn = self.conn.lock().map_err(|e| format!("lock failed: {}", e))?;
        conn.execute(
            r#"
            INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
            ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')
            "#,
            params![key, value],
        )?;
        tracing::info!(config_key = key, value = value, "config updated");
        Ok(())
    }

    /// All global values as a JSON object string
    pub fn get_config_snapshot(&self) -> ConfigResult<String> {
        let conn = self.conn.lock().map_err(|e| format!("lock failed: {}", e))?;
        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }
        Ok(serde_json::to_string(&config_map)?)
    }

    /// Restore global values from a snapshot; returns the number of rows written
    pub fn restore_config_from_snapshot(&self, snapshot_json: &str) -> ConfigResult<usize> {
        let config_map: HashMap<String, String> = serde_json::from_str(snapshot_json)?;

        let mut conn = self.conn.lock().map_err(|e| format!("lock failed: {}", e))?;
        let tx = conn.transaction()?;
        let mut count = 0;
        for (key, value) in config_map.iter() {
            count += tx.execute(
                "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
                 ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2",
                params![key, value],
            )?;
        }
        tx.commit()?;
        Ok(count)
    }
}

/// Parse `{"ONT": 15, ...}`; unknown SKUs are ignored
fn parse_objective(raw: &str) -> Option<SkuCounts> {
    let parsed: HashMap<String, u32> = serde_json::from_str(raw).ok()?;
    Some(
        parsed
            .into_iter()
            .filter_map(|(k, v)| Sku::parse(&k).map(|sku| (sku, v)))
            .collect(),
    )
}

pub fn default_supply_objective() -> SkuCounts {
    [(Sku::Ont, 15), (Sku::Mesh, 5), (Sku::Fono, 2), (Sku::Box, 1)]
        .into_iter()
        .collect()
}

pub fn default_excluded_keywords() -> Vec<String> {
    defaults::WAREHOUSE_EXCLUDED_KEYWORDS
        .split(',')
        .map(|s| s.to_string())
        .collect()
}

// ==========================================
// SupplyConfigReader implementation
// ==========================================
#[async_trait]
impl SupplyConfigReader for ConfigManager {
    async fn get_supply_objective(&self) -> ConfigResult<SkuCounts> {
        let Some(raw) = self.get_config_value(config_keys::SUPPLY_OBJECTIVE)? else {
            return Ok(default_supply_objective());
        };
        match parse_objective(&raw) {
            Some(objective) => Ok(objective),
            None => {
                tracing::warn!(
                    config_key = config_keys::SUPPLY_OBJECTIVE,
                    raw_value = %raw,
                    "malformed supply objective, using defaults"
                );
                Ok(default_supply_objective())
            }
        }
    }

    async fn get_warehouse_excluded_keywords(&self) -> ConfigResult<Vec<String>> {
        let value = self.get_config_or_default(
            config_keys::WAREHOUSE_EXCLUDED_KEYWORDS,
            defaults::WAREHOUSE_EXCLUDED_KEYWORDS,
        )?;
        let keywords: Vec<String> = value
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();

        if keywords.is_empty() {
            Ok(default_excluded_keywords())
        } else {
            Ok(keywords)
        }
    }

    async fn get_warehouse_critical_threshold(&self) -> ConfigResult<u32> {
        let value = self.get_config_or_default(
            config_keys::WAREHOUSE_CRITICAL_THRESHOLD,
            defaults::WAREHOUSE_CRITICAL_THRESHOLD,
        )?;
        match value.trim().parse::<u32>() {
            Ok(threshold) => Ok(threshold),
            Err(_) => {
                tracing::warn!(
                    config_key = config_keys::WAREHOUSE_CRITICAL_THRESHOLD,
                    raw_value = %value,
                    "malformed critical threshold, using default"
                );
                Ok(defaults::WAREHOUSE_CRITICAL_THRESHOLD.parse().unwrap_or(10))
            }
        }
    }

    async fn get_allow_replenish_on_decrease(&self) -> ConfigResult<bool> {
        let value = self.get_config_or_default(config_keys::ALLOW_REPLENISH_ON_DECREASE, "false")?;
        Ok(matches!(
            value.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ))
    }
}

// ==========================================
// Config keys
// ==========================================
pub mod config_keys {
    // resupply
    pub const SUPPLY_OBJECTIVE: &str = "supply_objective"; // JSON SKU -> count
    pub const WAREHOUSE_EXCLUDED_KEYWORDS: &str = "warehouse_excluded_keywords";
    pub const WAREHOUSE_CRITICAL_THRESHOLD: &str = "warehouse_critical_threshold";

    // liquidation
    pub const ALLOW_REPLENISH_ON_DECREASE: &str = "allow_replenish_on_decrease";
}

mod defaults {
    pub const WAREHOUSE_EXCLUDED_KEYWORDS: &str =
        "robo,robado,pérdida,perdida,avería,averia,garantía,garantia";
    pub const WAREHOUSE_CRITICAL_THRESHOLD: &str = "10";
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;

    fn setup() -> ConfigManager {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn)))
    }

    #[tokio::test]
    async fn test_defaults_when_unset() {
        let config = setup();
        let objective = config.get_supply_objective().await.unwrap();
        assert_eq!(objective.get(Sku::Ont), 15);
        assert_eq!(objective.get(Sku::Box), 1);
        assert!(!config.get_allow_replenish_on_decrease().await.unwrap());
        assert_eq!(config.get_warehouse_excluded_keywords().await.unwrap().len(), 8);
        assert_eq!(config.get_warehouse_critical_threshold().await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_overrides_and_malformed_values() {
        let config = setup();
        config
            .set_config_value(config_keys::SUPPLY_OBJECTIVE, r#"{"ont": 10, "router": 3}"#)
            .unwrap();
        config
            .set_config_value(config_keys::ALLOW_REPLENISH_ON_DECREASE, "TRUE")
            .unwrap();
        let objective = config.get_supply_objective().await.unwrap();
        assert_eq!(objective.get(Sku::Ont), 10);
        assert_eq!(objective.get(Sku::Mesh), 0);
        assert!(config.get_allow_replenish_on_decrease().await.unwrap());

        config
            .set_config_value(config_keys::SUPPLY_OBJECTIVE, "not json")
            .unwrap();
        assert_eq!(config.get_supply_objective().await.unwrap().get(Sku::Ont), 15);

        config
            .set_config_value(config_keys::WAREHOUSE_CRITICAL_THRESHOLD, "4")
            .unwrap();
        assert_eq!(config.get_warehouse_critical_threshold().await.unwrap(), 4);
        config
            .set_config_value(config_keys::WAREHOUSE_CRITICAL_THRESHOLD, "-1")
            .unwrap();
        assert_eq!(config.get_warehouse_critical_threshold().await.unwrap(), 10);
    }

    #[test]
    fn test_snapshot_restore() {
        let config = setup();
        config.set_config_value("a", "1").unwrap();
        config.set_config_value("b", "2").unwrap();
        let snapshot = config.get_config_snapshot().unwrap();

        config.set_config_value("a", "changed").unwrap();
        assert_eq!(config.restore_config_from_snapshot(&snapshot).unwrap(), 2);
        assert_eq!(config.get_config_value("a").unwrap().as_deref(), Some("1"));
    }
}
