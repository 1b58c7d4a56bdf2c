// ==========================================
// FieldOps stock engine - configuration layer
// ==========================================
// Storage: config_kv table
// ==========================================

pub mod config_manager;
pub mod supply_config_trait;

pub use config_manager::{
    config_keys, default_excluded_keywords, default_supply_objective, ConfigManager,
};
pub use supply_config_trait::{ConfigResult, SupplyConfigReader};
