// ==========================================
// FieldOps stock engine - crew resupply API
// ==========================================
// Flow: snapshot -> demand -> scarce allocation -> manual overrides
// Per crew: stock status against objective, equipment installed
// over the last Wednesday-to-Wednesday cycle
// Export: one row per crew, sorted by coordinator, written as CSV
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::SupplyConfigReader;
use crate::domain::types::{Sku, SkuCounts};
use crate::engine::allocator::{final_quantity, ManualOverrides, ScarcityAllocator, SkuAllocationSummary};
use crate::engine::consumption::ConsumptionWindow;
use crate::engine::demand::{critical_skus, CrewStockStatus, DemandCalculator};
use crate::engine::snapshot::{CrewFilter, InventorySnapshotLoader};
use crate::repository::liquidation_repo::LiquidationRepository;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Resupply request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SupplyRequest {
    pub filter: CrewFilter,
    pub omitted_crews: BTreeSet<String>, // crew ids left out of this dispatch
    pub overrides: ManualOverrides,
    pub residential_reels: BTreeMap<String, u32>, // crew id -> residential cable reels to send
    pub condo_rolls: BTreeSet<String>,             // crew ids receiving a condominium roll
    pub anchor: Option<NaiveDate>,                 // consumption cycle date; today when absent
}

/// Resupply view of one crew
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplyRow {
    pub crew_id: String,
    pub crew_name: String,
    pub coordinator: Option<String>,
    pub current: SkuCounts,
    pub target: SkuCounts,
    pub shortfall: SkuCounts,
    pub suggested: SkuCounts,
    pub final_quantities: SkuCounts, // suggested, or the manual value clamped to warehouse stock
    pub stock_status: CrewStockStatus,
    pub weekly_consumption: SkuCounts,
    pub residential_reels: u32,
    pub condo_roll: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplyResponse {
    pub rows: Vec<SupplyRow>,
    pub warehouse: SkuCounts,
    pub critical_skus: Vec<Sku>, // warehouse stock below the critical threshold
    pub summary: Vec<SkuAllocationSummary>,
    pub consumption_window: ConsumptionWindow,
    pub consumption_total: SkuCounts,
    pub generated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// Flat export row; field names are the CSV headers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchExportRow {
    #[serde(rename = "Coordinador")]
    pub coordinator: String,
    #[serde(rename = "Cuadrilla")]
    pub crew: String,
    #[serde(rename = "Sug ONT")]
    pub ont: u32,
    #[serde(rename = "Sug MESH")]
    pub mesh: u32,
    #[serde(rename = "Sug FONO")]
    pub fono: u32,
    #[serde(rename = "Sug BOX")]
    pub box_units: u32,
    #[serde(rename = "Bobinas (Resi)")]
    pub residential_reels: u32,
    #[serde(rename = "Condo (rollo)")]
    pub condo_roll: String, // Sí / No
}

pub struct SupplyApi {
    loader: Arc<InventorySnapshotLoader>,
    liquidation_repo: Arc<LiquidationRepository>,
    config: Arc<dyn SupplyConfigReader>,
}

impl SupplyApi {
    pub fn new(
        loader: Arc<InventorySnapshotLoader>,
        liquidation_repo: Arc<LiquidationRepository>,
        config: Arc<dyn SupplyConfigReader>,
    ) -> Self {
        Self {
            loader,
            liquidation_repo,
            config,
        }
    }

    /// Compute suggested and final dispatch quantities for the selected crews
    pub async fn compute_resupply(&self, request: &SupplyRequest) -> ApiResult<SupplyResponse> {
        let objective = self
            .config
            .get_supply_objective()
            .await
            .map_err(|e| ApiError::InternalError(format!("failed to read supply objective: {}", e)))?;
        let excluded = self
            .config
            .get_warehouse_excluded_keywords()
            .await
            .map_err(|e| ApiError::InternalError(format!("failed to read excluded keywords: {}", e)))?;
        let critical_threshold = self
            .config
            .get_warehouse_critical_threshold()
            .await
            .map_err(|e| ApiError::InternalError(format!("failed to read critical threshold: {}", e)))?;

        let generated_at = chrono::Local::now().naive_local();
        let window = ConsumptionWindow::for_anchor(request.anchor.unwrap_or(generated_at.date()));
        let mut consumption = self
            .liquidation_repo
            .consumption_by_crew(window.start(), window.end())?;

        let mut snapshot = self.loader.load(&request.filter, &excluded)?;
        snapshot
            .crews
            .retain(|c| !request.omitted_crews.contains(&c.crew.crew_id));

        let inputs = snapshot.demand_inputs(&objective);
        let calculator = DemandCalculator::new();
        let demand = calculator.calculate(&inputs);
        let plan = ScarcityAllocator::new().allocate(&demand, &snapshot.warehouse);

        let rows = snapshot
            .crews
            .into_iter()
            .zip(inputs)
            .map(|(crew_stock, input)| {
                let crew_id = crew_stock.crew.crew_id.clone();
                let shortfall = demand.get(&crew_id).cloned().unwrap_or_default();
                let suggested = plan.per_crew.get(&crew_id).cloned().unwrap_or_default();
                let final_quantities: SkuCounts = Sku::EQUIPMENT
                    .iter()
                    .map(|&sku| {
                        (
                            sku,
                            final_quantity(&plan, &request.overrides, &snapshot.warehouse, &crew_id, sku),
                        )
                    })
                    .collect();
                SupplyRow {
                    stock_status: CrewStockStatus::classify(&input.target, &crew_stock.current),
                    weekly_consumption: consumption.remove(&crew_id).unwrap_or_default(),
                    residential_reels: request.residential_reels.get(&crew_id).copied().unwrap_or(0),
                    condo_roll: request.condo_rolls.contains(&crew_id),
                    crew_id,
                    crew_name: crew_stock.crew.name,
                    coordinator: crew_stock.crew.coordinator,
                    current: crew_stock.current,
                    target: input.target,
                    shortfall,
                    suggested,
                    final_quantities,
                }
            })
            .collect::<Vec<_>>();

        let mut consumption_total = SkuCounts::new();
        for row in &rows {
            for (sku, n) in row.weekly_consumption.iter() {
                consumption_total.add(sku, n);
            }
        }
        let critical = critical_skus(&snapshot.warehouse, critical_threshold);
        if !critical.is_empty() {
            tracing::warn!(skus = ?critical, threshold = critical_threshold, "warehouse stock critical");
        }

        tracing::info!(
            crews = rows.len(),
            omitted = request.omitted_crews.len(),
            overrides = request.overrides.len(),
            "resupply computed"
        );
        Ok(SupplyResponse {
            rows,
            warehouse: snapshot.warehouse,
            critical_skus: critical,
            summary: plan.summary,
            consumption_window: window,
            consumption_total,
            generated_at,
        })
    }

    /// Compute and write `DESPACHO-YYYYMMDD.csv` into `dir`; returns the file path
    pub async fn export_to_dir(
        &self,
        request: &SupplyRequest,
        order: SortOrder,
        dir: &Path,
    ) -> ApiResult<PathBuf> {
        let response = self.compute_resupply(request).await?;
        let path = dir.join(export_file_name(response.generated_at.date()));
        let file = std::fs::File::create(&path)
            .map_err(|e| ApiError::InternalError(format!("cannot create {}: {}", path.display(), e)))?;
        write_export_csv(&export_rows(&response, order), file)?;
        tracing::info!(path = %path.display(), "dispatch export written");
        Ok(path)
    }
}

/// Rows ordered by coordinator, ties kept in crew-name order
pub fn export_rows(response: &SupplyResponse, order: SortOrder) -> Vec<DispatchExportRow> {
    let mut rows: Vec<DispatchExportRow> = response
        .rows
        .iter()
        .map(|r| DispatchExportRow {
            coordinator: r.coordinator.clone().unwrap_or_default(),
            crew: r.crew_name.clone(),
            ont: r.final_quantities.get(Sku::Ont),
            mesh: r.final_quantities.get(Sku::Mesh),
            fono: r.final_quantities.get(Sku::Fono),
            box_units: r.final_quantities.get(Sku::Box),
            residential_reels: r.residential_reels,
            condo_roll: if r.condo_roll { "Sí" } else { "No" }.to_string(),
        })
        .collect();

    rows.sort_by(|a, b| a.crew.cmp(&b.crew));
    match order {
        SortOrder::Ascending => rows.sort_by(|a, b| a.coordinator.cmp(&b.coordinator)),
        SortOrder::Descending => rows.sort_by(|a, b| b.coordinator.cmp(&a.coordinator)),
    }
    rows
}

pub fn write_export_csv<W: Write>(rows: &[DispatchExportRow], writer: W) -> ApiResult<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for row in rows {
        csv_writer
            .serialize(row)
            .map_err(|e| ApiError::InternalError(format!("csv write failed: {}", e)))?;
    }
    csv_writer
        .flush()
        .map_err(|e| ApiError::InternalError(format!("csv flush failed: {}", e)))?;
    Ok(())
}

pub fn export_file_name(date: NaiveDate) -> String {
    format!("DESPACHO-{}.csv", date.format("%Y%m%d"))
}
