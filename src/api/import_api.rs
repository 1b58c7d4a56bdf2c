// ==========================================
// FieldOps stock engine - equipment import API
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::SupplyConfigReader;
use crate::importer::{EquipmentImportReport, EquipmentImporter};
use std::path::Path;
use std::sync::Arc;

pub struct ImportApi {
    importer: Arc<EquipmentImporter>,
    config: Arc<dyn SupplyConfigReader>,
}

impl ImportApi {
    pub fn new(importer: Arc<EquipmentImporter>, config: Arc<dyn SupplyConfigReader>) -> Self {
        Self { importer, config }
    }

    /// Import an equipment inventory file (.csv / .xlsx / .xls)
    pub async fn import_equipment(&self, file_path: &Path) -> ApiResult<EquipmentImportReport> {
        let excluded = self
            .config
            .get_warehouse_excluded_keywords()
            .await
            .map_err(|e| ApiError::InternalError(format!("failed to read excluded keywords: {}", e)))?;
        Ok(self.importer.import_file(file_path, &excluded)?)
    }
}
