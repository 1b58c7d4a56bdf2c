// ==========================================
// FieldOps stock engine - differential stock mutator
// ==========================================
// Liquidation edits only ever consume the increase over the last
// recorded quantity:
// - delta = new - previous, per tracked material
// - delta > 0: decremented from crew stock, stock must cover it
// - delta <= 0: no stock change (unless replenish-on-decrease is enabled)
// - all stock writes, movements and the record update commit together
// ==========================================

use crate::domain::liquidation::{
    normalize_acta, LiquidationEdit, LiquidationRecord, MaterialQuantities, StockMovement,
};
use crate::domain::types::{
    from_hundredths, round_quantity, to_hundredths, InstallationKind, LiquidationState, Sku,
    SkuCounts,
};
use crate::repository::error::{RepositoryError, RepositoryResult, StockShortage};
use crate::repository::stock_ledger::{StockLedger, StockTransaction};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;

// ==========================================
// LiquidationDiff - pure part
// ==========================================

/// Change of one tracked material between the stored and the new record
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaterialDelta {
    pub material: Sku,
    pub previous: f64,
    pub next: f64,
}

impl MaterialDelta {
    /// Rounded to the quantity scale
    pub fn delta(&self) -> f64 {
        from_hundredths(to_hundredths(self.next) - to_hundredths(self.previous))
    }
}

/// A stock change the mutator will apply (negative = consumed)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StockMutation {
    pub material: Sku,
    pub change: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidationDiff {
    pub kind: InstallationKind,
    pub acta: String,
    pub rotulo: String,
    pub previous: MaterialQuantities,
    pub next: MaterialQuantities,
    pub deltas: Vec<MaterialDelta>, // tracked materials whose value changed
    pub equipment: SkuCounts,
}

impl LiquidationDiff {
    /// Merge `edit` over `previous` (absent record = all zeros).
    ///
    /// Fails with ValidationError on missing/malformed identifying fields or
    /// invalid quantities; never touches stock.
    pub fn compute(
        previous: Option<&LiquidationRecord>,
        edit: &LiquidationEdit,
    ) -> RepositoryResult<Self> {
        let kind = match (previous, edit.kind) {
            (Some(prev), Some(kind)) if kind != prev.kind => {
                return Err(validation(format!(
                    "installation {} is {}, not {}",
                    prev.installation_code,
                    prev.kind.to_db_str(),
                    kind.to_db_str()
                )))
            }
            (Some(prev), _) => prev.kind,
            (None, Some(kind)) => kind,
            (None, None) => {
                return Err(validation(format!(
                    "installation {} has no record yet; its kind (RESIDENCIAL/CONDOMINIO) is required",
                    edit.installation_code
                )))
            }
        };

        let acta = match edit.acta.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => {
                let acta = normalize_acta(raw);
                if acta.is_empty() {
                    return Err(validation(format!("malformed acta code '{}'", raw)));
                }
                acta
            }
            None => previous
                .and_then(|p| p.acta.clone())
                .filter(|s| !s.trim().is_empty())
                .ok_or_else(|| validation("acta code is required".to_string()))?,
        };

        let rotulo = edit
            .rotulo
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .or_else(|| previous.and_then(|p| p.rotulo.clone()))
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| validation("rótulo NAP/CTO is required".to_string()))?;

        let prev_q = previous
            .map(|p| p.quantities.restricted_to(kind))
            .unwrap_or_default();

        let metraje = match edit.metraje_instalado {
            Some(v) if !v.is_finite() || v < 0.0 => {
                return Err(validation(format!(
                    "metraje_instalado must be a non-negative number, got {}",
                    v
                )))
            }
            Some(v) => round_quantity(v),
            None => prev_q.metraje_instalado,
        };
        let next_q = MaterialQuantities {
            metraje_instalado: metraje,
            templadores: count_or_previous("templadores", edit.templadores, prev_q.templadores)?,
            hebillas: count_or_previous("hebillas", edit.hebillas, prev_q.hebillas)?,
            clevis: count_or_previous("clevis", edit.clevis, prev_q.clevis)?,
        }
        .restricted_to(kind);

        let equipment = match &edit.equipment {
            Some(counts) => {
                if let Some((sku, _)) = counts.iter().find(|(sku, _)| !sku.is_equipment()) {
                    return Err(validation(format!(
                        "{} is a material, not installed equipment",
                        sku
                    )));
                }
                counts.iter().filter(|(_, n)| *n > 0).collect()
            }
            None => previous.map(|p| p.equipment.clone()).unwrap_or_default(),
        };

        let deltas = kind
            .tracked_materials()
            .iter()
            .map(|&material| MaterialDelta {
                material,
                previous: prev_q.get(material),
                next: next_q.get(material),
            })
            .filter(|d| d.delta() != 0.0)
            .collect();

        Ok(Self {
            kind,
            acta,
            rotulo,
            previous: prev_q,
            next: next_q,
            deltas,
            equipment,
        })
    }

    /// Stock changes implied by the deltas under the given policy
    pub fn stock_mutations(&self, allow_replenish_on_decrease: bool) -> Vec<StockMutation> {
        self.deltas
            .iter()
            .filter_map(|d| {
                let delta = d.delta();
                if delta > 0.0 {
                    Some(StockMutation {
                        material: d.material,
                        change: -delta,
                    })
                } else if delta < 0.0 && allow_replenish_on_decrease {
                    Some(StockMutation {
                        material: d.material,
                        change: -delta,
                    })
                } else {
                    None
                }
            })
            .collect()
    }
}

fn validation(msg: String) -> RepositoryError {
    RepositoryError::ValidationError(msg)
}

fn count_or_previous(field: &str, value: Option<i64>, previous: u32) -> RepositoryResult<u32> {
    match value {
        None => Ok(previous),
        Some(v) => u32::try_from(v).map_err(|_| {
            validation(format!("{} must be a non-negative whole number, got {}", field, v))
        }),
    }
}

// ==========================================
// DifferentialStockMutator - transactional part
// ==========================================

#[derive(Debug, Clone, Copy, Default)]
pub struct MutationPolicy {
    pub allow_replenish_on_decrease: bool,
}

/// What a successful liquidation edit did
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidationOutcome {
    pub record: LiquidationRecord,
    pub applied: Vec<StockMutation>,
    pub first_liquidation: bool, // UNLIQUIDATED -> LIQUIDATED
    pub changed: bool,           // false for an edit identical to the stored record
}

pub struct DifferentialStockMutator<L: StockLedger> {
    ledger: Arc<L>,
}

impl<L: StockLedger> DifferentialStockMutator<L> {
    pub fn new(ledger: Arc<L>) -> Self {
        Self { ledger }
    }

    /// Apply one liquidation edit atomically
    ///
    /// # Errors
    /// - ValidationError: bad identifying fields or quantities (before any stock read)
    /// - NotFound: crew, or a crew stock row touched by the edit, does not exist
    /// - InsufficientStock: every material whose stock cannot cover its delta
    /// - OptimisticLockFailure / Conflict: concurrent modification
    #[instrument(skip(self, edit), fields(installation = %edit.installation_code, crew = %edit.crew_id))]
    pub fn apply(
        &self,
        edit: &LiquidationEdit,
        policy: MutationPolicy,
        now: NaiveDateTime,
    ) -> RepositoryResult<LiquidationOutcome> {
        if edit.installation_code.trim().is_empty() {
            return Err(validation("installation code is required".to_string()));
        }

        let result = self
            .ledger
            .in_transaction(|tx| apply_in_transaction(tx, edit, policy, now));

        match &result {
            Ok(outcome) if outcome.changed => tracing::info!(
                state = %outcome.record.state,
                revision = outcome.record.revision,
                mutations = outcome.applied.len(),
                first = outcome.first_liquidation,
                "liquidation committed"
            ),
            Ok(_) => tracing::debug!("liquidation edit is a no-op"),
            Err(e) => tracing::warn!(error = %e, "liquidation rejected"),
        }
        result
    }
}

fn apply_in_transaction(
    tx: &dyn StockTransaction,
    edit: &LiquidationEdit,
    policy: MutationPolicy,
    now: NaiveDateTime,
) -> RepositoryResult<LiquidationOutcome> {
    let previous = tx.load_record(&edit.installation_code)?;

    let crew_id = match &previous {
        Some(prev) => {
            if !edit.crew_id.trim().is_empty() && edit.crew_id != prev.crew_id {
                return Err(validation(format!(
                    "installation {} belongs to crew {}, not {}",
                    prev.installation_code, prev.crew_id, edit.crew_id
                )));
            }
            prev.crew_id.clone()
        }
        None => {
            if edit.crew_id.trim().is_empty() {
                return Err(validation("crew is required".to_string()));
            }
            edit.crew_id.clone()
        }
    };

    if let (Some(expected), Some(prev)) = (edit.expected_revision, &previous) {
        if expected != prev.revision {
            return Err(RepositoryError::OptimisticLockFailure {
                entity: "liquidation_record".to_string(),
                id: prev.installation_code.clone(),
                expected,
                actual: prev.revision,
            });
        }
    }

    let diff = LiquidationDiff::compute(previous.as_ref(), edit)?;

    let unchanged = previous.as_ref().filter(|p| {
        p.is_liquidated()
            && diff.deltas.is_empty()
            && p.acta.as_deref() == Some(diff.acta.as_str())
            && p.rotulo.as_deref() == Some(diff.rotulo.as_str())
            && p.equipment == diff.equipment
    });
    if let Some(prev) = unchanged {
        return Ok(LiquidationOutcome {
            record: prev.clone(),
            applied: Vec::new(),
            first_liquidation: false,
            changed: false,
        });
    }

    if !tx.crew_exists(&crew_id)? {
        return Err(RepositoryError::NotFound {
            entity: "crew".to_string(),
            id: crew_id,
        });
    }

    // check every mutation against one snapshot before writing anything
    let mutations = diff.stock_mutations(policy.allow_replenish_on_decrease);
    let mut shortages = Vec::new();
    for m in &mutations {
        let available = tx
            .read_stock(&crew_id, m.material)?
            .ok_or_else(|| RepositoryError::NotFound {
                entity: format!("crew_material_stock[{}]", m.material),
                id: crew_id.clone(),
            })?;
        if m.change < 0.0 && to_hundredths(available) < to_hundredths(-m.change) {
            shortages.push(StockShortage {
                material: m.material,
                available,
                requested: -m.change,
            });
        }
    }
    if !shortages.is_empty() {
        return Err(RepositoryError::InsufficientStock { shortages });
    }

    let actor = if edit.actor.trim().is_empty() {
        "Sistema"
    } else {
        edit.actor.trim()
    };

    for m in &mutations {
        let quantity_after = tx.apply_delta(&crew_id, m.material, m.change, actor, now)?;
        tx.append_movement(&StockMovement {
            movement_id: uuid::Uuid::new_v4().to_string(),
            crew_id: crew_id.clone(),
            material: m.material,
            delta: m.change,
            quantity_after,
            installation_code: edit.installation_code.clone(),
            actor: actor.to_string(),
            created_at: now,
        })?;
    }

    let first_liquidation = !previous.as_ref().is_some_and(|p| p.is_liquidated());
    let record = LiquidationRecord {
        installation_code: edit.installation_code.clone(),
        crew_id,
        kind: diff.kind,
        acta: Some(diff.acta),
        rotulo: Some(diff.rotulo),
        quantities: diff.next,
        equipment: diff.equipment,
        state: LiquidationState::Liquidated,
        revision: previous.as_ref().map(|p| p.revision + 1).unwrap_or(1),
        liquidated_by: Some(actor.to_string()),
        liquidated_at: Some(now),
    };
    tx.save_record(&record, previous.as_ref().map(|p| p.revision))?;

    Ok(LiquidationOutcome {
        record,
        applied: mutations,
        first_liquidation,
        changed: true,
    })
}
