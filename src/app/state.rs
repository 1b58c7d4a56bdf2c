// ==========================================
// FieldOps stock engine - application state
// ==========================================
// Wires one shared SQLite connection through repositories,
// engines and APIs
// ==========================================

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::api::{EquipmentApi, ImportApi, LiquidationApi, SupplyApi};
use crate::config::{ConfigManager, SupplyConfigReader};
use crate::db::{init_schema, open_sqlite_connection};
use crate::engine::InventorySnapshotLoader;
use crate::importer::EquipmentImporter;
use crate::repository::{
    CrewRepository, EquipmentRepository, LiquidationRepository, SqliteStockLedger,
};

/// Shared application state
pub struct AppState {
    pub db_path: String,

    pub config_manager: Arc<ConfigManager>,
    pub crew_repo: Arc<CrewRepository>,
    pub equipment_repo: Arc<EquipmentRepository>,
    pub liquidation_repo: Arc<LiquidationRepository>,

    pub supply_api: Arc<SupplyApi>,
    pub liquidation_api: Arc<LiquidationApi<SqliteStockLedger>>,
    pub import_api: Arc<ImportApi>,
    pub equipment_api: Arc<EquipmentApi>,
}

impl AppState {
    /// Open (or create) the database at `db_path` and build every layer on top of it
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!(db_path = %db_path, "initializing app state");

        let conn = open_sqlite_connection(&db_path)
            .map_err(|e| format!("cannot open database {}: {}", db_path, e))?;
        init_schema(&conn).map_err(|e| format!("schema initialization failed: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        // repositories
        let crew_repo = Arc::new(CrewRepository::new(conn.clone()));
        let equipment_repo = Arc::new(EquipmentRepository::new(conn.clone()));
        let liquidation_repo = Arc::new(LiquidationRepository::new(conn.clone()));
        let ledger = Arc::new(SqliteStockLedger::new(conn.clone()));
        let config_manager = Arc::new(ConfigManager::from_connection(conn));
        let config_reader: Arc<dyn SupplyConfigReader> = config_manager.clone();

        // engines
        let loader = Arc::new(InventorySnapshotLoader::new(
            crew_repo.clone(),
            equipment_repo.clone(),
        ));
        let importer = Arc::new(EquipmentImporter::new(
            crew_repo.clone(),
            equipment_repo.clone(),
        ));

        // apis
        let supply_api = Arc::new(SupplyApi::new(
            loader,
            liquidation_repo.clone(),
            config_reader.clone(),
        ));
        let liquidation_api = Arc::new(LiquidationApi::new(
            ledger,
            liquidation_repo.clone(),
            crew_repo.clone(),
            config_reader.clone(),
        ));
        let import_api = Arc::new(ImportApi::new(importer, config_reader.clone()));
        let equipment_api = Arc::new(EquipmentApi::new(
            crew_repo.clone(),
            equipment_repo.clone(),
            config_reader,
        ));

        tracing::info!("app state ready");
        Ok(Self {
            db_path,
            config_manager,
            crew_repo,
            equipment_repo,
            liquidation_repo,
            supply_api,
            liquidation_api,
            import_api,
            equipment_api,
        })
    }
}

/// Database path: `FIELDOPS_STOCK_DB_PATH`, else the user data directory
pub fn get_default_db_path() -> String {
    if let Ok(path) = std::env::var("FIELDOPS_STOCK_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./fieldops_stock.db");
    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("fieldops-stock");
        // fall back to the working directory when the data dir is not writable
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("fieldops_stock.db");
        }
    }
    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_state_on_fresh_database() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path().to_string_lossy().to_string();
        let state = AppState::new(path.clone()).unwrap();
        assert_eq!(state.db_path, path);
        assert!(state.crew_repo.list(false).unwrap().is_empty());
    }
}
