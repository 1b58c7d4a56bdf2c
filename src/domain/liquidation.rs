// ==========================================
// FieldOps stock engine - material liquidation model
// ==========================================
// LiquidationRecord: recorded consumption per installation
// LiquidationEdit: operator input, only provided fields override
// StockMovement: audit row per applied stock delta
// ==========================================

use crate::domain::types::{InstallationKind, LiquidationState, Sku, SkuCounts};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// MaterialQuantities
// ==========================================
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MaterialQuantities {
    pub metraje_instalado: f64, // meters of drop cable (BOBINA)
    pub templadores: u32,
    pub hebillas: u32,
    pub clevis: u32,
}

impl MaterialQuantities {
    pub fn get(&self, material: Sku) -> f64 {
        match material {
            Sku::Bobina => self.metraje_instalado,
            Sku::Templadores => self.templadores as f64,
            Sku::Hebillas => self.hebillas as f64,
            Sku::Clevis => self.clevis as f64,
            _ => 0.0,
        }
    }

    /// Zero every material the installation kind does not track.
    pub fn restricted_to(self, kind: InstallationKind) -> Self {
        match kind {
            InstallationKind::Residencial => self,
            InstallationKind::Condominio => MaterialQuantities {
                metraje_instalado: self.metraje_instalado,
                ..Default::default()
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        self.metraje_instalado == 0.0
            && self.templadores == 0
            && self.hebillas == 0
            && self.clevis == 0
    }
}

// ==========================================
// LiquidationRecord
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidationRecord {
    pub installation_code: String,
    pub crew_id: String,
    pub kind: InstallationKind,
    pub acta: Option<String>,
    pub rotulo: Option<String>, // NAP/CTO label
    pub quantities: MaterialQuantities,
    pub equipment: SkuCounts, // ONT/MESH/FONO/BOX installed; no stock effect
    pub state: LiquidationState,
    pub revision: i64,
    pub liquidated_by: Option<String>,
    pub liquidated_at: Option<NaiveDateTime>,
}

impl LiquidationRecord {
    /// Blank record for an installation that has not been liquidated yet.
    pub fn unliquidated(
        installation_code: impl Into<String>,
        crew_id: impl Into<String>,
        kind: InstallationKind,
    ) -> Self {
        Self {
            installation_code: installation_code.into(),
            crew_id: crew_id.into(),
            kind,
            acta: None,
            rotulo: None,
            quantities: MaterialQuantities::default(),
            equipment: SkuCounts::new(),
            state: LiquidationState::Unliquidated,
            revision: 0,
            liquidated_by: None,
            liquidated_at: None,
        }
    }

    pub fn is_liquidated(&self) -> bool {
        self.state == LiquidationState::Liquidated
    }
}

// ==========================================
// LiquidationEdit - operator input
// ==========================================
// Counts are signed so that negative input can be rejected rather than wrapped.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LiquidationEdit {
    pub installation_code: String,
    pub crew_id: String,
    pub kind: Option<InstallationKind>, // required only when no record exists yet
    pub acta: Option<String>,
    pub rotulo: Option<String>,
    pub metraje_instalado: Option<f64>,
    pub templadores: Option<i64>,
    pub hebillas: Option<i64>,
    pub clevis: Option<i64>,
    pub equipment: Option<SkuCounts>, // replaces the installed equipment counts as a whole
    pub expected_revision: Option<i64>,
    pub actor: String,
}

impl LiquidationEdit {
    pub fn new(installation_code: impl Into<String>, crew_id: impl Into<String>) -> Self {
        Self {
            installation_code: installation_code.into(),
            crew_id: crew_id.into(),
            ..Default::default()
        }
    }
}

/// Keep digits only and insert a dash after the third one (scanner format `NNN-NNNN`).
pub fn normalize_acta(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() <= 3 {
        digits
    } else {
        format!("{}-{}", &digits[..3], &digits[3..])
    }
}

// ==========================================
// StockMovement - audit ledger row
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockMovement {
    pub movement_id: String,
    pub crew_id: String,
    pub material: Sku,
    pub delta: f64, // negative = consumed, positive = returned
    pub quantity_after: f64,
    pub installation_code: String,
    pub actor: String,
    pub created_at: NaiveDateTime,
}
