// ==========================================
// FieldOps stock engine - domain layer
// ==========================================
// Entities and types only: no data access, no engine rules
// ==========================================

pub mod crew;
pub mod liquidation;
pub mod types;

pub use crew::{Crew, CrewMaterialStock, EquipmentItem};
pub use liquidation::{LiquidationEdit, LiquidationRecord, MaterialQuantities, StockMovement};
pub use types::{
    from_hundredths, round_quantity, to_hundredths, EquipmentStatus, InstallationKind,
    LiquidationState, Sku, SkuCounts, Unit, QUANTITY_SCALE,
};
