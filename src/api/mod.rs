// ==========================================
// FieldOps stock engine - API layer
// ==========================================
// Validated entry points over the engine and repositories
// ==========================================

pub mod equipment_api;
pub mod error;
pub mod import_api;
pub mod liquidation_api;
pub mod supply_api;

pub use equipment_api::EquipmentApi;
pub use error::{ApiError, ApiResult};
pub use import_api::ImportApi;
pub use liquidation_api::LiquidationApi;
pub use supply_api::{
    export_file_name, export_rows, write_export_csv, DispatchExportRow, SortOrder, SupplyApi,
    SupplyRequest, SupplyResponse, SupplyRow,
};
