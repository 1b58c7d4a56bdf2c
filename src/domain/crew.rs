// ==========================================
// FieldOps stock engine - crews and equipment
// ==========================================
// Crew (cuadrilla): stock-holding field team
// EquipmentItem: serialized unit, located in the warehouse or with a crew
// ==========================================

use crate::domain::types::{EquipmentStatus, Sku, SkuCounts};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ==========================================
// Crew
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Crew {
    pub crew_id: String,
    pub name: String,                // location tag carried by equipment in the field
    pub coordinator: Option<String>, // coordinator display name
    pub active: bool,
    pub target_override: Option<SkuCounts>, // per-crew objective, falls back to the global one
}

impl Crew {
    pub fn new(crew_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            crew_id: crew_id.into(),
            name: name.into(),
            coordinator: None,
            active: true,
            target_override: None,
        }
    }

    pub fn with_coordinator(mut self, coordinator: impl Into<String>) -> Self {
        self.coordinator = Some(coordinator.into());
        self
    }

    /// Key used to match equipment locations against this crew.
    pub fn location_key(&self) -> String {
        normalize_location(&self.name)
    }

    /// Effective objective: override first, global objective otherwise.
    pub fn effective_target<'a>(&'a self, global: &'a SkuCounts) -> &'a SkuCounts {
        self.target_override.as_ref().unwrap_or(global)
    }
}

/// Trimmed, upper-cased location used for crew matching.
pub fn normalize_location(raw: &str) -> String {
    raw.trim().to_uppercase()
}

// ==========================================
// CrewMaterialStock - consumable stock row
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrewMaterialStock {
    pub crew_id: String,
    pub material: Sku,
    pub quantity: f64,
    pub updated_by: Option<String>,
    pub updated_at: Option<NaiveDateTime>,
}

// ==========================================
// EquipmentItem
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquipmentItem {
    pub serial: String,
    pub sku: Sku,
    pub status: EquipmentStatus,
    pub location: String,
    pub description: String,
    pub received_on: Option<NaiveDate>,
}

impl EquipmentItem {
    /// True when the location marks the unit as stolen, lost, damaged or under warranty.
    pub fn is_disqualified(&self, excluded_keywords: &[String]) -> bool {
        location_is_excluded(&self.location, excluded_keywords)
    }
}

/// Case-insensitive substring match of a location against exclusion keywords.
pub fn location_is_excluded(location: &str, excluded_keywords: &[String]) -> bool {
    let loc = location.to_lowercase();
    excluded_keywords
        .iter()
        .any(|k| !k.trim().is_empty() && loc.contains(&k.trim().to_lowercase()))
}

/// Detect the equipment SKU from a free-text supplier description.
pub fn detect_sku_from_description(description: &str) -> Option<Sku> {
    let desc = description.to_uppercase();
    if desc.contains("ONT HUAWEI") {
        Some(Sku::Ont)
    } else if desc.contains("K562E") {
        Some(Sku::Mesh)
    } else if desc.contains("TELÉFONO") || desc.contains("TELEFONO") {
        Some(Sku::Fono)
    } else if desc.contains("BOX") {
        Some(Sku::Box)
    } else {
        None
    }
}
