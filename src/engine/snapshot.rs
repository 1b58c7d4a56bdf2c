// ==========================================
// FieldOps stock engine - inventory snapshot loader
// ==========================================
// One read of the inventory, shaped for the demand calculator:
// - warehouse: ALMACEN equipment, disqualified locations excluded
// - per crew: CAMPO equipment whose location is the crew name
// Display read, not transactional
// ==========================================

use crate::domain::crew::Crew;
use crate::domain::types::SkuCounts;
use crate::engine::demand::CrewDemandInput;
use crate::repository::crew_repo::CrewRepository;
use crate::repository::equipment_repo::EquipmentRepository;
use crate::repository::error::RepositoryResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::instrument;

/// Minimum length for the crew name search to apply
const MIN_NAME_QUERY_LEN: usize = 2;

/// Crew selection for a resupply run; empty filter = all active crews
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrewFilter {
    pub coordinators: BTreeSet<String>,
    pub name_query: Option<String>,
}

impl CrewFilter {
    pub fn matches(&self, crew: &Crew) -> bool {
        if !self.coordinators.is_empty() {
            match &crew.coordinator {
                Some(c) if self.coordinators.contains(c) => {}
                _ => return false,
            }
        }
        match self.name_query.as_deref().map(str::trim) {
            Some(q) if q.chars().count() >= MIN_NAME_QUERY_LEN => {
                crew.name.to_lowercase().contains(&q.to_lowercase())
            }
            _ => true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrewStockSnapshot {
    pub crew: Crew,
    pub current: SkuCounts,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InventorySnapshot {
    pub crews: Vec<CrewStockSnapshot>,
    pub warehouse: SkuCounts,
}

impl InventorySnapshot {
    /// Demand inputs against a global objective (crew overrides win)
    pub fn demand_inputs(&self, objective: &SkuCounts) -> Vec<CrewDemandInput> {
        self.crews
            .iter()
            .map(|c| CrewDemandInput {
                crew_id: c.crew.crew_id.clone(),
                target: c.crew.effective_target(objective).clone(),
                current: c.current.clone(),
            })
            .collect()
    }
}

pub struct InventorySnapshotLoader {
    crew_repo: Arc<CrewRepository>,
    equipment_repo: Arc<EquipmentRepository>,
}

impl InventorySnapshotLoader {
    pub fn new(crew_repo: Arc<CrewRepository>, equipment_repo: Arc<EquipmentRepository>) -> Self {
        Self {
            crew_repo,
            equipment_repo,
        }
    }

    #[instrument(skip(self, excluded_keywords))]
    pub fn load(
        &self,
        filter: &CrewFilter,
        excluded_keywords: &[String],
    ) -> RepositoryResult<InventorySnapshot> {
        let warehouse = self.equipment_repo.count_warehouse_stock(excluded_keywords)?;
        let mut field = self.equipment_repo.count_field_stock_by_location()?;

        let crews: Vec<CrewStockSnapshot> = self
            .crew_repo
            .list(true)?
            .into_iter()
            .filter(|c| filter.matches(c))
            .map(|crew| {
                let current = field.remove(&crew.location_key()).unwrap_or_default();
                CrewStockSnapshot { crew, current }
            })
            .collect();

        tracing::debug!(
            crews = crews.len(),
            warehouse_units = warehouse.total(),
            "inventory snapshot loaded"
        );
        Ok(InventorySnapshot { crews, warehouse })
    }
}
