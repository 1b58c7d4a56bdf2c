// ==========================================
// FieldOps stock engine - material liquidation API
// ==========================================
// Entry points for installation liquidation and crew material stock
// Mutations go through DifferentialStockMutator (one IMMEDIATE transaction)
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::SupplyConfigReader;
use crate::domain::crew::CrewMaterialStock;
use crate::domain::liquidation::{LiquidationEdit, LiquidationRecord, StockMovement};
use crate::domain::types::{InstallationKind, LiquidationState, Sku};
use crate::engine::liquidation::{DifferentialStockMutator, LiquidationOutcome, MutationPolicy};
use crate::repository::crew_repo::CrewRepository;
use crate::repository::liquidation_repo::LiquidationRepository;
use crate::repository::stock_ledger::StockLedger;
use std::sync::Arc;

pub struct LiquidationApi<L: StockLedger> {
    mutator: DifferentialStockMutator<L>,
    liquidation_repo: Arc<LiquidationRepository>,
    crew_repo: Arc<CrewRepository>,
    config: Arc<dyn SupplyConfigReader>,
}

impl<L: StockLedger> LiquidationApi<L> {
    pub fn new(
        ledger: Arc<L>,
        liquidation_repo: Arc<LiquidationRepository>,
        crew_repo: Arc<CrewRepository>,
        config: Arc<dyn SupplyConfigReader>,
    ) -> Self {
        Self {
            mutator: DifferentialStockMutator::new(ledger),
            liquidation_repo,
            crew_repo,
            config,
        }
    }

    /// Apply a liquidation edit.
    ///
    /// Only the increase over the stored quantities is taken from crew stock;
    /// the edit is rejected as a whole when any material falls short.
    pub async fn liquidate(&self, edit: LiquidationEdit) -> ApiResult<LiquidationOutcome> {
        let allow_replenish_on_decrease = self
            .config
            .get_allow_replenish_on_decrease()
            .await
            .map_err(|e| ApiError::InternalError(format!("failed to read liquidation policy: {}", e)))?;

        let policy = MutationPolicy {
            allow_replenish_on_decrease,
        };
        let now = chrono::Local::now().naive_local();
        Ok(self.mutator.apply(&edit, policy, now)?)
    }

    /// Register an installation awaiting liquidation; false if it already exists
    pub fn register_installation(
        &self,
        installation_code: &str,
        crew_id: &str,
        kind: InstallationKind,
    ) -> ApiResult<bool> {
        if installation_code.trim().is_empty() {
            return Err(ApiError::ValidationError(
                "installation code is required".to_string(),
            ));
        }
        self.require_crew(crew_id)?;
        let record = LiquidationRecord::unliquidated(installation_code.trim(), crew_id, kind);
        Ok(self.liquidation_repo.register_installation(&record)?)
    }

    pub fn get_record(&self, installation_code: &str) -> ApiResult<LiquidationRecord> {
        self.liquidation_repo
            .find_by_code(installation_code)?
            .ok_or_else(|| ApiError::NotFound(format!("installation {}", installation_code)))
    }

    /// Installations of a crew still waiting for liquidation
    pub fn list_pending(&self, crew_id: &str) -> ApiResult<Vec<LiquidationRecord>> {
        self.require_crew(crew_id)?;
        Ok(self
            .liquidation_repo
            .list_by_crew(crew_id, Some(LiquidationState::Unliquidated))?)
    }

    pub fn list_liquidated(&self, crew_id: &str) -> ApiResult<Vec<LiquidationRecord>> {
        self.require_crew(crew_id)?;
        Ok(self
            .liquidation_repo
            .list_by_crew(crew_id, Some(LiquidationState::Liquidated))?)
    }

    pub fn list_movements(&self, installation_code: &str) -> ApiResult<Vec<StockMovement>> {
        Ok(self.liquidation_repo.list_movements(installation_code)?)
    }

    /// Consumable stock rows held by a crew
    pub fn crew_material_stock(&self, crew_id: &str) -> ApiResult<Vec<CrewMaterialStock>> {
        self.require_crew(crew_id)?;
        Ok(self.crew_repo.list_material_stock(crew_id)?)
    }

    /// Set a crew's stock of one consumable material (intake or count adjustment)
    pub fn set_crew_material_stock(
        &self,
        crew_id: &str,
        material: Sku,
        quantity: f64,
        actor: &str,
    ) -> ApiResult<()> {
        if material.is_equipment() {
            return Err(ApiError::ValidationError(format!(
                "{} is serialized equipment, not a consumable material",
                material
            )));
        }
        self.require_crew(crew_id)?;
        let now = chrono::Local::now().naive_local();
        self.crew_repo
            .set_material_stock(crew_id, material, quantity, actor, now)?;
        tracing::info!(crew_id, material = %material, quantity, actor, "crew material stock set");
        Ok(())
    }

    fn require_crew(&self, crew_id: &str) -> ApiResult<()> {
        match self.crew_repo.find_by_id(crew_id)? {
            Some(_) => Ok(()),
            None => Err(ApiError::NotFound(format!("crew (id={})", crew_id))),
        }
    }
}
