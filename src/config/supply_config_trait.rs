// ==========================================
// FieldOps stock engine - supply config reader trait
// ==========================================
// Read-only configuration interface used by the supply and
// liquidation flows; implemented by ConfigManager (config_kv table)
// ==========================================

use crate::domain::types::SkuCounts;
use async_trait::async_trait;
use std::error::Error;

pub type ConfigResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

#[async_trait]
pub trait SupplyConfigReader: Send + Sync {
    /// Global per-crew equipment objective
    ///
    /// # Default
    /// - ONT 15, MESH 5, FONO 2, BOX 1
    async fn get_supply_objective(&self) -> ConfigResult<SkuCounts>;

    /// Location keywords that disqualify warehouse equipment
    ///
    /// # Default
    /// - robo, robado, pérdida, perdida, avería, averia, garantía, garantia
    async fn get_warehouse_excluded_keywords(&self) -> ConfigResult<Vec<String>>;

    /// Warehouse stock below this flags the SKU as critical
    ///
    /// # Default
    /// - 10
    async fn get_warehouse_critical_threshold(&self) -> ConfigResult<u32>;

    /// Whether lowering a liquidated quantity returns material to crew stock
    ///
    /// # Default
    /// - false (consumed material is not returned)
    async fn get_allow_replenish_on_decrease(&self) -> ConfigResult<bool>;
}
