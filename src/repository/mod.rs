// ==========================================
// FieldOps stock engine - repository layer
// ==========================================
// Data access only, parameterized SQL throughout
// ==========================================

pub mod crew_repo;
pub mod equipment_repo;
pub mod error;
pub mod liquidation_repo;
pub mod stock_ledger;

pub use crew_repo::CrewRepository;
pub use equipment_repo::EquipmentRepository;
pub use error::{RepositoryError, RepositoryResult, StockShortage};
pub use liquidation_repo::LiquidationRepository;
pub use stock_ledger::{SqliteStockLedger, StockLedger, StockTransaction};
