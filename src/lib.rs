// ==========================================
// FieldOps stock engine - core library
// ==========================================
// Crew resupply (proportional allocation of scarce warehouse
// equipment) and material liquidation (differential stock
// consumption) over SQLite
// ==========================================

rust_i18n::i18n!("locales", fallback = "es");

// domain - entities and types
pub mod domain;

// repository - data access
pub mod repository;

// engine - business rules
pub mod engine;

// importer - equipment inventory files
pub mod importer;

// config - config_kv settings
pub mod config;

// sqlite connection setup and schema
pub mod db;

pub mod logging;

pub mod i18n;

// api - validated entry points
pub mod api;

// app - state wiring
pub mod app;

// ==========================================
// Re-exports
// ==========================================

pub use domain::{
    Crew, CrewMaterialStock, EquipmentItem, EquipmentStatus, InstallationKind, LiquidationEdit,
    LiquidationRecord, LiquidationState, MaterialQuantities, Sku, SkuCounts, StockMovement,
};

pub use engine::{
    CrewFilter, DemandCalculator, DifferentialStockMutator, InventorySnapshotLoader,
    LiquidationDiff, MutationPolicy, ScarcityAllocator,
};

pub use api::{ApiError, ApiResult, ImportApi, LiquidationApi, SupplyApi};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
