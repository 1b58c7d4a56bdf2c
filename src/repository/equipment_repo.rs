// ==========================================
// FieldOps stock engine - equipment repository
// ==========================================
// Table: equipment (one row per serial)
// Provides the raw counts behind warehouse and crew equipment stock
// ==========================================

use crate::domain::crew::{normalize_location, EquipmentItem};
use crate::domain::types::{EquipmentStatus, Sku, SkuCounts};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

pub struct EquipmentRepository {
    conn: Arc<Mutex<Connection>>,
}

impl EquipmentRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// Insert new items in one transaction; returns the number inserted.
    ///
    /// Existing serials are left untouched (INSERT OR IGNORE).
    pub fn insert_batch(&self, items: &[EquipmentItem]) -> RepositoryResult<usize> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT OR IGNORE INTO equipment (serial, sku, status, location, description, received_on)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )?;
            for item in items {
                inserted += stmt.execute(params![
                    item.serial,
                    item.sku.to_db_str(),
                    item.status.to_db_str(),
                    item.location,
                    item.description,
                    item.received_on.map(|d| d.to_string()),
                ])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    pub fn existing_serials(&self) -> RepositoryResult<HashSet<String>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare("SELECT serial FROM equipment")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut out = HashSet::new();
        for row in rows {
            out.insert(row?);
        }
        Ok(out)
    }

    pub fn list_by_status(&self, status: &EquipmentStatus) -> RepositoryResult<Vec<EquipmentItem>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT serial, sku, status, location, description, received_on
            FROM equipment WHERE status = ?1 ORDER BY serial
            "#,
        )?;
        let rows = stmt.query_map(params![status.to_db_str()], map_equipment_row)?;

        let mut items = Vec::new();
        for row in rows {
            // rows whose sku is not a known SKU are not stock
            if let Some(item) = row? {
                items.push(item);
            }
        }
        Ok(items)
    }

    pub fn find_by_serial(&self, serial: &str) -> RepositoryResult<Option<EquipmentItem>> {
        let conn = self.get_conn()?;
        let item = conn
            .query_row(
                r#"
                SELECT serial, sku, status, location, description, received_on
                FROM equipment WHERE serial = ?1
                "#,
                params![serial],
                map_equipment_row,
            )
            .optional()?;
        Ok(item.flatten())
    }

    /// Move one unit to a new status/location
    ///
    /// # Errors
    /// - NotFound: no unit with that serial
    pub fn update_location(
        &self,
        serial: &str,
        status: &EquipmentStatus,
        location: &str,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "UPDATE equipment SET status = ?2, location = ?3 WHERE serial = ?1",
            params![serial, status.to_db_str(), location],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "equipment".to_string(),
                id: serial.to_string(),
            });
        }
        Ok(())
    }

    /// Warehouse equipment per SKU, skipping disqualified locations
    pub fn count_warehouse_stock(&self, excluded_keywords: &[String]) -> RepositoryResult<SkuCounts> {
        let mut counts = SkuCounts::new();
        for item in self.list_by_status(&EquipmentStatus::Almacen)? {
            if !item.sku.is_equipment() || item.is_disqualified(excluded_keywords) {
                continue;
            }
            counts.add(item.sku, 1);
        }
        Ok(counts)
    }

    /// Field equipment per crew location key (upper-cased crew name)
    pub fn count_field_stock_by_location(&self) -> RepositoryResult<BTreeMap<String, SkuCounts>> {
        let mut out: BTreeMap<String, SkuCounts> = BTreeMap::new();
        for item in self.list_by_status(&EquipmentStatus::Campo)? {
            if !item.sku.is_equipment() {
                continue;
            }
            out.entry(normalize_location(&item.location))
                .or_default()
                .add(item.sku, 1);
        }
        Ok(out)
    }
}

fn map_equipment_row(row: &Row) -> rusqlite::Result<Option<EquipmentItem>> {
    let sku: String = row.get(1)?;
    let Some(sku) = Sku::parse(&sku) else {
        return Ok(None);
    };
    let status: String = row.get(2)?;
    let received_on: Option<String> = row.get(5)?;
    Ok(Some(EquipmentItem {
        serial: row.get(0)?,
        sku,
        status: EquipmentStatus::from_db_str(&status),
        location: row.get(3)?,
        description: row.get(4)?,
        received_on: received_on.and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;

    fn item(serial: &str, sku: Sku, status: EquipmentStatus, location: &str) -> EquipmentItem {
        EquipmentItem {
            serial: serial.to_string(),
            sku,
            status,
            location: location.to_string(),
            description: String::new(),
            received_on: None,
        }
    }

    fn setup() -> EquipmentRepository {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        EquipmentRepository::new(Arc::new(Mutex::new(conn)))
    }

    #[test]
    fn test_warehouse_count_excludes_flagged_locations() {
        let repo = setup();
        repo.insert_batch(&[
            item("S1", Sku::Ont, EquipmentStatus::Almacen, "almacen"),
            item("S2", Sku::Ont, EquipmentStatus::Almacen, "ROBO"),
            item("S3", Sku::Mesh, EquipmentStatus::Almacen, "almacen"),
            item("S4", Sku::Ont, EquipmentStatus::Campo, "K1"),
        ])
        .unwrap();

        let counts = repo.count_warehouse_stock(&["robo".to_string()]).unwrap();
        assert_eq!(counts.get(Sku::Ont), 1);
        assert_eq!(counts.get(Sku::Mesh), 1);
        assert_eq!(counts.get(Sku::Box), 0);
    }

    #[test]
    fn test_relocated_unit_leaves_warehouse_stock() {
        let repo = setup();
        repo.insert_batch(&[
            item("S1", Sku::Ont, EquipmentStatus::Almacen, "almacen"),
            item("S2", Sku::Ont, EquipmentStatus::Almacen, "almacen"),
        ])
        .unwrap();
        let excluded = vec!["robo".to_string()];

        repo.update_location("S2", &EquipmentStatus::Almacen, "robo")
            .unwrap();
        assert_eq!(repo.count_warehouse_stock(&excluded).unwrap().get(Sku::Ont), 1);
        assert_eq!(repo.find_by_serial("S2").unwrap().unwrap().location, "robo");

        let err = repo
            .update_location("S404", &EquipmentStatus::Almacen, "almacen")
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { .. }));
        assert!(repo.find_by_serial("S404").unwrap().is_none());
    }

    #[test]
    fn test_field_count_groups_by_location() {
        let repo = setup();
        repo.insert_batch(&[
            item("S1", Sku::Ont, EquipmentStatus::Campo, "k1 residencial"),
            item("S2", Sku::Ont, EquipmentStatus::Campo, "K1 RESIDENCIAL"),
            item("S3", Sku::Fono, EquipmentStatus::Campo, "K2"),
        ])
        .unwrap();

        let by_loc = repo.count_field_stock_by_location().unwrap();
        assert_eq!(by_loc["K1 RESIDENCIAL"].get(Sku::Ont), 2);
        assert_eq!(by_loc["K2"].get(Sku::Fono), 1);
    }

    #[test]
    fn test_insert_batch_ignores_existing_serials() {
        let repo = setup();
        let first = repo
            .insert_batch(&[item("S1", Sku::Box, EquipmentStatus::Almacen, "almacen")])
            .unwrap();
        let second = repo
            .insert_batch(&[
                item("S1", Sku::Box, EquipmentStatus::Almacen, "almacen"),
                item("S2", Sku::Box, EquipmentStatus::Almacen, "almacen"),
            ])
            .unwrap();
        assert_eq!(first, 1);
        assert_eq!(second, 1);
        assert_eq!(repo.existing_serials().unwrap().len(), 2);
    }
}
