// ==========================================
// FieldOps stock engine - equipment location API
// ==========================================
// Moves single units between the warehouse, crews and the
// exclusion locations (robo, garantía, avería, pérdida)
// A unit moved onto a crew goes to CAMPO; every other
// accepted location keeps it in ALMACEN
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::SupplyConfigReader;
use crate::domain::crew::EquipmentItem;
use crate::domain::types::EquipmentStatus;
use crate::importer::equipment_importer::resolve_known_location;
use crate::repository::crew_repo::CrewRepository;
use crate::repository::equipment_repo::EquipmentRepository;
use std::sync::Arc;

pub struct EquipmentApi {
    crew_repo: Arc<CrewRepository>,
    equipment_repo: Arc<EquipmentRepository>,
    config: Arc<dyn SupplyConfigReader>,
}

impl EquipmentApi {
    pub fn new(
        crew_repo: Arc<CrewRepository>,
        equipment_repo: Arc<EquipmentRepository>,
        config: Arc<dyn SupplyConfigReader>,
    ) -> Self {
        Self {
            crew_repo,
            equipment_repo,
            config,
        }
    }

    /// Move a unit to `location`: a crew name, `almacen`, `instalado`
    /// or one of the warehouse exclusion tags.
    ///
    /// # Errors
    /// - ValidationError: blank serial or unrecognized location
    /// - NotFound: unknown serial
    pub async fn relocate(&self, serial: &str, location: &str) -> ApiResult<EquipmentItem> {
        let serial = serial.trim();
        if serial.is_empty() {
            return Err(ApiError::ValidationError("serial is required".to_string()));
        }
        let excluded = self
            .config
            .get_warehouse_excluded_keywords()
            .await
            .map_err(|e| ApiError::InternalError(format!("failed to read excluded keywords: {}", e)))?;

        let crews = self.crew_repo.name_index()?;
        let (status, stored_location) = resolve_known_location(location, &crews, &excluded)
            .ok_or_else(|| {
                ApiError::ValidationError(format!(
                    "unknown location '{}': expected a crew, almacen, instalado or one of {}",
                    location.trim(),
                    excluded.join(", ")
                ))
            })?;

        let previous = self
            .equipment_repo
            .find_by_serial(serial)?
            .ok_or_else(|| ApiError::NotFound(format!("equipment {}", serial)))?;
        self.equipment_repo
            .update_location(serial, &status, &stored_location)?;

        tracing::info!(
            serial,
            from = %previous.location,
            to = %stored_location,
            status = %status,
            "equipment relocated"
        );
        Ok(EquipmentItem {
            status,
            location: stored_location,
            ..previous
        })
    }

    pub fn list_by_status(&self, status: &EquipmentStatus) -> ApiResult<Vec<EquipmentItem>> {
        Ok(self.equipment_repo.list_by_status(status)?)
    }
}
