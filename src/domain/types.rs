// ==========================================
// FieldOps stock engine - domain types
// ==========================================
// SKU catalogue, units, equipment status and liquidation state
// Serialization: SCREAMING_SNAKE_CASE (matches the database)
// ==========================================

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ==========================================
// Unit
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Unit {
    Count,  // pieces
    Meters, // cable reels
}

// ==========================================
// Quantity scale
// ==========================================
// Material quantities are kept to centimetre (0.01) precision.
// Comparisons and stock arithmetic run on whole hundredths so
// repeated fractional liquidations never leave float residue.

/// Hundredths per unit of quantity
pub const QUANTITY_SCALE: f64 = 100.0;

/// Quantity as a whole number of hundredths
pub fn to_hundredths(value: f64) -> i64 {
    (value * QUANTITY_SCALE).round() as i64
}

pub fn from_hundredths(hundredths: i64) -> f64 {
    hundredths as f64 / QUANTITY_SCALE
}

/// Round a quantity to the declared scale
pub fn round_quantity(value: f64) -> f64 {
    from_hundredths(to_hundredths(value))
}

// ==========================================
// Sku - trackable equipment / material type
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Sku {
    // ===== equipment (one serial per unit) =====
    Ont,
    Mesh,
    Fono,
    Box,
    // ===== consumables spent on liquidation =====
    Bobina,
    Templadores,
    Hebillas,
    Clevis,
}

impl Sku {
    /// Equipment dispatched during a resupply run, in export column order.
    pub const EQUIPMENT: [Sku; 4] = [Sku::Ont, Sku::Mesh, Sku::Fono, Sku::Box];

    /// Materials whose consumption is recorded on liquidation.
    pub const LIQUIDATION_MATERIALS: [Sku; 4] =
        [Sku::Bobina, Sku::Templadores, Sku::Hebillas, Sku::Clevis];

    pub fn unit(&self) -> Unit {
        match self {
            Sku::Bobina => Unit::Meters,
            _ => Unit::Count,
        }
    }

    pub fn is_equipment(&self) -> bool {
        Self::EQUIPMENT.contains(self)
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            Sku::Ont => "ONT",
            Sku::Mesh => "MESH",
            Sku::Fono => "FONO",
            Sku::Box => "BOX",
            Sku::Bobina => "BOBINA",
            Sku::Templadores => "TEMPLADORES",
            Sku::Hebillas => "HEBILLAS",
            Sku::Clevis => "CLEVIS",
        }
    }

    /// Case-insensitive parse; unknown values yield None.
    pub fn parse(raw: &str) -> Option<Sku> {
        match raw.trim().to_uppercase().as_str() {
            "ONT" => Some(Sku::Ont),
            "MESH" => Some(Sku::Mesh),
            "FONO" => Some(Sku::Fono),
            "BOX" => Some(Sku::Box),
            "BOBINA" => Some(Sku::Bobina),
            "TEMPLADORES" => Some(Sku::Templadores),
            "HEBILLAS" => Some(Sku::Hebillas),
            "CLEVIS" => Some(Sku::Clevis),
            _ => None,
        }
    }
}

impl fmt::Display for Sku {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// SkuCounts - integer counts per SKU
// ==========================================
// Missing SKUs read as 0.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkuCounts(BTreeMap<Sku, u32>);

impl SkuCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, sku: Sku) -> u32 {
        self.0.get(&sku).copied().unwrap_or(0)
    }

    pub fn set(&mut self, sku: Sku, value: u32) {
        self.0.insert(sku, value);
    }

    pub fn add(&mut self, sku: Sku, value: u32) {
        *self.0.entry(sku).or_insert(0) += value;
    }

    pub fn iter(&self) -> impl Iterator<Item = (Sku, u32)> + '_ {
        self.0.iter().map(|(k, v)| (*k, *v))
    }

    pub fn total(&self) -> u64 {
        self.0.values().map(|v| *v as u64).sum()
    }
}

impl FromIterator<(Sku, u32)> for SkuCounts {
    fn from_iter<T: IntoIterator<Item = (Sku, u32)>>(iter: T) -> Self {
        let mut counts = SkuCounts::new();
        for (sku, value) in iter {
            counts.set(sku, value);
        }
        counts
    }
}

// ==========================================
// EquipmentStatus
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EquipmentStatus {
    Almacen,   // in the warehouse
    Campo,     // carried by a crew
    Instalado, // installed at a customer
    Other(String),
}

impl EquipmentStatus {
    pub fn to_db_str(&self) -> &str {
        match self {
            EquipmentStatus::Almacen => "ALMACEN",
            EquipmentStatus::Campo => "CAMPO",
            EquipmentStatus::Instalado => "INSTALADO",
            EquipmentStatus::Other(s) => s.as_str(),
        }
    }

    pub fn from_db_str(raw: &str) -> Self {
        match raw.trim().to_uppercase().as_str() {
            "ALMACEN" => EquipmentStatus::Almacen,
            "CAMPO" => EquipmentStatus::Campo,
            "INSTALADO" => EquipmentStatus::Instalado,
            other => EquipmentStatus::Other(other.to_string()),
        }
    }
}

impl fmt::Display for EquipmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// InstallationKind
// ==========================================
// Condominium jobs only consume cable; residential jobs also consume hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstallationKind {
    Residencial,
    Condominio,
}

impl InstallationKind {
    pub fn tracked_materials(&self) -> &'static [Sku] {
        match self {
            InstallationKind::Residencial => &Sku::LIQUIDATION_MATERIALS,
            InstallationKind::Condominio => &[Sku::Bobina],
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            InstallationKind::Residencial => "RESIDENCIAL",
            InstallationKind::Condominio => "CONDOMINIO",
        }
    }

    /// Anything that is not explicitly residential is treated as condominium.
    pub fn from_db_str(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("RESIDENCIAL") {
            InstallationKind::Residencial
        } else {
            InstallationKind::Condominio
        }
    }
}

// ==========================================
// LiquidationState
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LiquidationState {
    Unliquidated,
    Liquidated,
}

impl LiquidationState {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            LiquidationState::Unliquidated => "UNLIQUIDATED",
            LiquidationState::Liquidated => "LIQUIDATED",
        }
    }

    pub fn from_db_str(raw: &str) -> Self {
        match raw {
            "LIQUIDATED" => LiquidationState::Liquidated,
            _ => LiquidationState::Unliquidated,
        }
    }
}

impl fmt::Display for LiquidationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sku_parse_is_case_insensitive() {
        assert_eq!(Sku::parse(" ont "), Some(Sku::Ont));
        assert_eq!(Sku::parse("Bobina"), Some(Sku::Bobina));
        assert_eq!(Sku::parse("router"), None);
    }

    #[test]
    fn test_sku_units() {
        assert_eq!(Sku::Bobina.unit(), Unit::Meters);
        assert_eq!(Sku::Clevis.unit(), Unit::Count);
        assert!(Sku::Box.is_equipment());
        assert!(!Sku::Hebillas.is_equipment());
    }

    #[test]
    fn test_sku_counts_default_to_zero() {
        let mut counts = SkuCounts::new();
        assert_eq!(counts.get(Sku::Mesh), 0);
        counts.add(Sku::Mesh, 2);
        counts.add(Sku::Mesh, 1);
        assert_eq!(counts.get(Sku::Mesh), 3);
        assert_eq!(counts.total(), 3);
    }

    #[test]
    fn test_quantity_scale() {
        assert_eq!(to_hundredths(0.1 + 0.2), 30);
        assert_eq!(to_hundredths(0.3) - 3 * to_hundredths(0.1), 0);
        assert_eq!(round_quantity(0.1 + 0.2), 0.3);
        assert_eq!(round_quantity(12.345_6), 12.35);
        assert_eq!(from_hundredths(-250), -2.5);
    }

    #[test]
    fn test_condominio_tracks_only_cable() {
        assert_eq!(InstallationKind::Condominio.tracked_materials(), &[Sku::Bobina]);
        assert_eq!(InstallationKind::Residencial.tracked_materials().len(), 4);
        assert_eq!(InstallationKind::from_db_str("residencial"), InstallationKind::Residencial);
        assert_eq!(InstallationKind::from_db_str(""), InstallationKind::Condominio);
    }
}
