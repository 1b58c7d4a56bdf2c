// ==========================================
// FieldOps stock engine - equipment inventory importer
// ==========================================
// Columns: SN, equipo, descripcion, ubicacion, f_ingreso
// Location rules:
// - "instalado"        -> INSTALADO
// - known crew name    -> CAMPO, location = crew's canonical name
// - blank / "almacen"  -> ALMACEN
// - exclusion keyword  -> ALMACEN, location kept as written (robo, garantía...)
// - anything else      -> ALMACEN, counted as invalid location
// Serials already stored or repeated in the file are skipped
// ==========================================

use crate::domain::crew::{
    detect_sku_from_description, location_is_excluded, normalize_location, Crew, EquipmentItem,
};
use crate::domain::types::{EquipmentStatus, Sku};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::file_parser::{RawRow, UniversalFileParser};
use crate::repository::crew_repo::CrewRepository;
use crate::repository::equipment_repo::EquipmentRepository;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

const COL_SERIAL: &str = "sn";
const COL_SKU: &str = "equipo";
const COL_DESCRIPTION: &str = "descripcion";
const COL_LOCATION: &str = "ubicacion";
const COL_RECEIVED: &str = "f_ingreso";

const WAREHOUSE_LOCATION: &str = "almacen";
const INSTALLED_LOCATION: &str = "instalado";

/// Why a row was not imported
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    MissingSerial,
    UnknownSku(String),
    DuplicateInFile,
    AlreadyStored,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedRow {
    pub row: usize, // 1-based data row (header excluded)
    pub serial: Option<String>,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EquipmentImportReport {
    pub total_rows: usize,
    pub imported: usize,
    pub invalid_locations: Vec<String>, // serials whose location was unrecognized
    pub skipped: Vec<SkippedRow>,
    pub elapsed_ms: u128,
}

pub struct EquipmentImporter {
    crew_repo: Arc<CrewRepository>,
    equipment_repo: Arc<EquipmentRepository>,
}

impl EquipmentImporter {
    pub fn new(crew_repo: Arc<CrewRepository>, equipment_repo: Arc<EquipmentRepository>) -> Self {
        Self {
            crew_repo,
            equipment_repo,
        }
    }

    /// Parse `file_path` and insert every new unit in one batch
    ///
    /// `excluded_keywords` are the warehouse exclusion tags; locations matching
    /// one are stored as written so the unit stays out of warehouse supply.
    pub fn import_file<P: AsRef<Path>>(
        &self,
        file_path: P,
        excluded_keywords: &[String],
    ) -> ImportResult<EquipmentImportReport> {
        let started = Instant::now();
        let path = file_path.as_ref();
        tracing::info!(file = %path.display(), "equipment import started");

        let rows = UniversalFileParser.parse(path)?;
        if let Some(first) = rows.first() {
            if !first.contains_key(COL_SERIAL) {
                return Err(ImportError::MissingColumn(COL_SERIAL.to_string()));
            }
        }

        let crews = self.crew_repo.name_index()?;
        let stored = self.equipment_repo.existing_serials()?;
        let (items, mut report) = classify_rows(&rows, &crews, &stored, excluded_keywords);

        report.imported = self.equipment_repo.insert_batch(&items)?;
        report.elapsed_ms = started.elapsed().as_millis();

        if !report.invalid_locations.is_empty() {
            tracing::warn!(
                count = report.invalid_locations.len(),
                "equipment with unrecognized location imported into the warehouse"
            );
        }
        tracing::info!(
            total = report.total_rows,
            imported = report.imported,
            skipped = report.skipped.len(),
            elapsed_ms = report.elapsed_ms as u64,
            "equipment import finished"
        );
        Ok(report)
    }
}

/// Turn parsed rows into new equipment items; pure, no storage access
pub fn classify_rows(
    rows: &[RawRow],
    crews: &BTreeMap<String, Crew>,
    stored: &HashSet<String>,
    excluded_keywords: &[String],
) -> (Vec<EquipmentItem>, EquipmentImportReport) {
    let mut report = EquipmentImportReport {
        total_rows: rows.len(),
        ..Default::default()
    };
    let mut seen: HashSet<String> = HashSet::new();
    let mut items = Vec::new();

    for (idx, row) in rows.iter().enumerate() {
        let line = idx + 1;
        let field = |name: &str| row.get(name).map(|v| v.trim()).unwrap_or("");

        let serial = field(COL_SERIAL).to_string();
        if serial.is_empty() {
            report.skipped.push(SkippedRow {
                row: line,
                serial: None,
                reason: SkipReason::MissingSerial,
            });
            continue;
        }

        let skip = |reason| SkippedRow {
            row: line,
            serial: Some(serial.clone()),
            reason,
        };

        if stored.contains(&serial) {
            report.skipped.push(skip(SkipReason::AlreadyStored));
            continue;
        }
        if !seen.insert(serial.clone()) {
            report.skipped.push(skip(SkipReason::DuplicateInFile));
            continue;
        }

        let description = field(COL_DESCRIPTION).to_string();
        let sku = match Sku::parse(field(COL_SKU)).or_else(|| detect_sku_from_description(&description)) {
            Some(sku) if sku.is_equipment() => sku,
            _ => {
                report
                    .skipped
                    .push(skip(SkipReason::UnknownSku(field(COL_SKU).to_string())));
                continue;
            }
        };

        let (status, location) =
            match resolve_known_location(field(COL_LOCATION), crews, excluded_keywords) {
                Some(resolved) => resolved,
                None => {
                    report.invalid_locations.push(serial.clone());
                    (EquipmentStatus::Almacen, WAREHOUSE_LOCATION.to_string())
                }
            };

        items.push(EquipmentItem {
            serial,
            sku,
            status,
            location,
            description,
            received_on: parse_received_on(field(COL_RECEIVED)),
        });
    }
    (items, report)
}

fn is_warehouse_tag(raw: &str) -> bool {
    let loc = raw.trim().to_lowercase();
    loc.is_empty() || loc == WAREHOUSE_LOCATION
}

/// Status and stored location for a raw `ubicacion` value; None when unrecognized
pub fn resolve_known_location(
    raw: &str,
    crews: &BTreeMap<String, Crew>,
    excluded_keywords: &[String],
) -> Option<(EquipmentStatus, String)> {
    let trimmed = raw.trim();
    if trimmed.to_lowercase() == INSTALLED_LOCATION {
        return Some((EquipmentStatus::Instalado, INSTALLED_LOCATION.to_string()));
    }
    if let Some(crew) = crews.get(&normalize_location(trimmed)) {
        return Some((EquipmentStatus::Campo, crew.name.clone()));
    }
    if is_warehouse_tag(trimmed) {
        return Some((EquipmentStatus::Almacen, WAREHOUSE_LOCATION.to_string()));
    }
    if location_is_excluded(trimmed, excluded_keywords) {
        return Some((EquipmentStatus::Almacen, trimmed.to_string()));
    }
    None
}

/// Like `resolve_known_location`, falling back to the plain warehouse
pub fn resolve_location(
    raw: &str,
    crews: &BTreeMap<String, Crew>,
    excluded_keywords: &[String],
) -> (EquipmentStatus, String) {
    resolve_known_location(raw, crews, excluded_keywords)
        .unwrap_or((EquipmentStatus::Almacen, WAREHOUSE_LOCATION.to_string()))
}

/// Accepts ISO, day-first and Excel serial dates
pub fn parse_received_on(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    for fmt in ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%Y/%m/%d"] {
        if let Ok(d) = NaiveDate::parse_from_str(raw, fmt) {
            return Some(d);
        }
    }
    // Excel serial day numbers count from 1899-12-30
    let serial: f64 = raw.parse().ok()?;
    if !(1.0..=2_958_465.0).contains(&serial) {
        return None;
    }
    NaiveDate::from_ymd_opt(1899, 12, 30)?.checked_add_signed(Duration::days(serial.trunc() as i64))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> RawRow {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn crews() -> BTreeMap<String, Crew> {
        let k1 = Crew::new("C1", "K1 Norte");
        BTreeMap::from([(k1.location_key(), k1)])
    }

    fn excluded() -> Vec<String> {
        vec!["robo".to_string(), "garantía".to_string()]
    }

    #[test]
    fn test_location_rules() {
        let crews = crews();
        let excluded = excluded();
        assert_eq!(
            resolve_location("k1 norte ", &crews, &excluded),
            (EquipmentStatus::Campo, "K1 Norte".to_string())
        );
        assert_eq!(
            resolve_location("Instalado", &crews, &excluded).0,
            EquipmentStatus::Instalado
        );
        assert_eq!(
            resolve_location("", &crews, &excluded),
            (EquipmentStatus::Almacen, "almacen".to_string())
        );
        assert_eq!(
            resolve_location(" Garantía ", &crews, &excluded),
            (EquipmentStatus::Almacen, "Garantía".to_string())
        );
        assert_eq!(resolve_known_location("bodega 3", &crews, &excluded), None);
        assert_eq!(
            resolve_location("bodega 3", &crews, &excluded),
            (EquipmentStatus::Almacen, "almacen".to_string())
        );
    }

    #[test]
    fn test_classify_rows() {
        let rows = vec![
            row(&[("sn", "S1"), ("equipo", "ONT"), ("ubicacion", "almacen")]),
            row(&[("sn", "S2"), ("descripcion", "MESH K562E"), ("ubicacion", "K1 NORTE")]),
            row(&[("sn", "S1"), ("equipo", "ONT")]),
            row(&[("sn", "S3"), ("equipo", "ONT"), ("ubicacion", "bodega 3")]),
            row(&[("sn", "S9"), ("equipo", "ONT")]),
            row(&[("sn", ""), ("equipo", "ONT")]),
            row(&[("sn", "S4"), ("equipo", "router")]),
            row(&[("sn", "S5"), ("equipo", "ONT"), ("ubicacion", "robo")]),
        ];
        let stored: HashSet<String> = ["S9".to_string()].into_iter().collect();

        let (items, report) = classify_rows(&rows, &crews(), &stored, &excluded());
        assert_eq!(items.len(), 4);
        assert_eq!(items[3].location, "robo");
        assert!(items[3].is_disqualified(&excluded()));
        assert_eq!(items[1].sku, Sku::Mesh);
        assert_eq!(items[1].status, EquipmentStatus::Campo);
        assert_eq!(report.invalid_locations, vec!["S3".to_string()]);

        let reasons: Vec<&SkipReason> = report.skipped.iter().map(|s| &s.reason).collect();
        assert_eq!(
            reasons,
            vec![
                &SkipReason::DuplicateInFile,
                &SkipReason::AlreadyStored,
                &SkipReason::MissingSerial,
                &SkipReason::UnknownSku("router".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_received_on() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 5);
        assert_eq!(parse_received_on("2024-03-05"), d);
        assert_eq!(parse_received_on("05/03/2024"), d);
        assert_eq!(parse_received_on("45356"), d);
        assert_eq!(parse_received_on("ayer"), None);
        assert_eq!(parse_received_on(""), None);
    }
}
