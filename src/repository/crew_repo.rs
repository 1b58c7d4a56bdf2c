// ==========================================
// FieldOps stock engine - crew repository
// ==========================================
// Tables: crew, crew_material_stock
// No business rules here, data access only
// ==========================================

use crate::domain::crew::{normalize_location, Crew, CrewMaterialStock};
use crate::domain::types::{round_quantity, Sku, SkuCounts};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ==========================================
// CrewRepository
// ==========================================
pub struct CrewRepository {
    conn: Arc<Mutex<Connection>>,
}

impl CrewRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// Insert or replace a crew
    pub fn upsert(&self, crew: &Crew) -> RepositoryResult<()> {
        let target_json = match &crew.target_override {
            Some(t) => Some(serde_json::to_string(t).map_err(anyhow::Error::from)?),
            None => None,
        };
        let name = crew.name.trim();
        if name.is_empty() {
            return Err(RepositoryError::ValidationError(format!(
                "crew {} needs a name",
                crew.crew_id
            )));
        }

        let conn = self.get_conn()?;
        // names double as equipment locations, so they must not collide once normalized
        let key = normalize_location(name);
        let mut stmt = conn.prepare("SELECT crew_id, name FROM crew WHERE crew_id <> ?1")?;
        let others = stmt.query_map(params![crew.crew_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        for other in others {
            let (other_id, other_name) = other?;
            if normalize_location(&other_name) == key {
                return Err(RepositoryError::UniqueConstraintViolation(format!(
                    "crew name '{}' is already used by crew {} ('{}')",
                    name, other_id, other_name
                )));
            }
        }
        drop(stmt);

        conn.execute(
            r#"
            INSERT INTO crew (crew_id, name, coordinator, active, target_json)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(crew_id) DO UPDATE SET
                name = excluded.name,
                coordinator = excluded.coordinator,
                active = excluded.active,
                target_json = excluded.target_json
            "#,
            params![
                crew.crew_id,
                name,
                crew.coordinator,
                crew.active as i32,
                target_json,
            ],
        )?;
        Ok(())
    }

    pub fn find_by_id(&self, crew_id: &str) -> RepositoryResult<Option<Crew>> {
        let conn = self.get_conn()?;
        let crew = conn
            .query_row(
                "SELECT crew_id, name, coordinator, active, target_json FROM crew WHERE crew_id = ?1",
                params![crew_id],
                map_crew_row,
            )
            .optional()?;
        Ok(crew)
    }

    /// Crews ordered by name; `active_only` drops inactive ones
    pub fn list(&self, active_only: bool) -> RepositoryResult<Vec<Crew>> {
        let conn = self.get_conn()?;
        let sql = if active_only {
            "SELECT crew_id, name, coordinator, active, target_json FROM crew WHERE active = 1 ORDER BY name"
        } else {
            "SELECT crew_id, name, coordinator, active, target_json FROM crew ORDER BY name"
        };
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map([], map_crew_row)?;
        let mut crews = Vec::new();
        for row in rows {
            crews.push(row?);
        }
        Ok(crews)
    }

    // ===== material stock =====

    /// Set the absolute quantity of a material held by a crew (stock intake / adjustments)
    pub fn set_material_stock(
        &self,
        crew_id: &str,
        material: Sku,
        quantity: f64,
        actor: &str,
        at: NaiveDateTime,
    ) -> RepositoryResult<()> {
        if !quantity.is_finite() || quantity < 0.0 {
            return Err(RepositoryError::ValidationError(format!(
                "stock quantity for {} must be a non-negative number, got {}",
                material, quantity
            )));
        }
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO crew_material_stock (crew_id, material, quantity, updated_by, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(crew_id, material) DO UPDATE SET
                quantity = excluded.quantity,
                updated_by = excluded.updated_by,
                updated_at = excluded.updated_at
            "#,
            params![
                crew_id,
                material.to_db_str(),
                round_quantity(quantity),
                actor,
                at.format(TS_FORMAT).to_string(),
            ],
        )?;
        Ok(())
    }

    pub fn get_material_stock(
        &self,
        crew_id: &str,
        material: Sku,
    ) -> RepositoryResult<Option<CrewMaterialStock>> {
        let conn = self.get_conn()?;
        let stock = conn
            .query_row(
                r#"
                SELECT crew_id, material, quantity, updated_by, updated_at
                FROM crew_material_stock WHERE crew_id = ?1 AND material = ?2
                "#,
                params![crew_id, material.to_db_str()],
                map_stock_row,
            )
            .optional()?;
        Ok(stock.flatten())
    }

    pub fn list_material_stock(&self, crew_id: &str) -> RepositoryResult<Vec<CrewMaterialStock>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT crew_id, material, quantity, updated_by, updated_at
            FROM crew_material_stock WHERE crew_id = ?1 ORDER BY material
            "#,
        )?;
        let rows = stmt.query_map(params![crew_id], map_stock_row)?;
        let mut out = Vec::new();
        for row in rows {
            if let Some(stock) = row? {
                out.push(stock);
            }
        }
        Ok(out)
    }

    /// Crew name (upper-cased) → crew id, used to resolve equipment locations
    pub fn name_index(&self) -> RepositoryResult<BTreeMap<String, Crew>> {
        Ok(self
            .list(false)?
            .into_iter()
            .map(|c| (c.location_key(), c))
            .collect())
    }
}

fn map_crew_row(row: &Row<'_>) -> rusqlite::Result<Crew> {
    let target_json: Option<String> = row.get(4)?;
    let target_override = target_json.and_then(|raw| {
        serde_json::from_str::<SkuCounts>(&raw)
            .map_err(|e| {
                tracing::warn!(raw = %raw, error = %e, "malformed crew target_json, ignoring override");
            })
            .ok()
    });
    Ok(Crew {
        crew_id: row.get(0)?,
        name: row.get(1)?,
        coordinator: row.get(2)?,
        active: row.get::<_, i32>(3)? != 0,
        target_override,
    })
}

/// Rows with an unknown material code are skipped (None)
fn map_stock_row(row: &Row<'_>) -> rusqlite::Result<Option<CrewMaterialStock>> {
    let material_raw: String = row.get(1)?;
    let Some(material) = Sku::parse(&material_raw) else {
        return Ok(None);
    };
    Ok(Some(CrewMaterialStock {
        crew_id: row.get(0)?,
        material,
        quantity: row.get(2)?,
        updated_by: row.get(3)?,
        updated_at: row
            .get::<_, Option<String>>(4)?
            .and_then(|s| NaiveDateTime::parse_from_str(&s, TS_FORMAT).ok()),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;

    fn setup() -> CrewRepository {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        CrewRepository::new(Arc::new(Mutex::new(conn)))
    }

    fn now() -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }

    #[test]
    fn test_upsert_and_list_active() {
        let repo = setup();
        let mut k2 = Crew::new("C2", "K2 CONDOMINIO").with_coordinator("Ana");
        k2.target_override = Some([(Sku::Ont, 6)].into_iter().collect());
        repo.upsert(&Crew::new("C1", "K1 RESIDENCIAL")).unwrap();
        repo.upsert(&k2).unwrap();
        let mut inactive = Crew::new("C3", "K3 RESIDENCIAL");
        inactive.active = false;
        repo.upsert(&inactive).unwrap();

        let active = repo.list(true).unwrap();
        assert_eq!(active.len(), 2);
        assert_eq!(active[0].crew_id, "C1");
        assert_eq!(active[1].coordinator.as_deref(), Some("Ana"));
        assert_eq!(active[1].target_override.as_ref().unwrap().get(Sku::Ont), 6);
        assert_eq!(repo.list(false).unwrap().len(), 3);
    }

    #[test]
    fn test_crew_names_unique_ignoring_case() {
        let repo = setup();
        repo.upsert(&Crew::new("C1", "K1")).unwrap();

        let err = repo.upsert(&Crew::new("C2", "k1 ")).unwrap_err();
        assert!(matches!(err, RepositoryError::UniqueConstraintViolation(_)));

        // renaming a crew onto its own key is fine; the name is stored trimmed
        repo.upsert(&Crew::new("C1", " k1")).unwrap();
        assert_eq!(repo.find_by_id("C1").unwrap().unwrap().name, "k1");

        let err = repo.upsert(&Crew::new("C3", "  ")).unwrap_err();
        assert!(matches!(err, RepositoryError::ValidationError(_)));
    }

    #[test]
    fn test_material_stock_roundtrip_and_missing_row() {
        let repo = setup();
        repo.upsert(&Crew::new("C1", "K1")).unwrap();

        assert!(repo.get_material_stock("C1", Sku::Bobina).unwrap().is_none());

        repo.set_material_stock("C1", Sku::Bobina, 40.0, "almacen", now())
            .unwrap();
        let stock = repo.get_material_stock("C1", Sku::Bobina).unwrap().unwrap();
        assert_eq!(stock.quantity, 40.0);
        assert_eq!(stock.updated_by.as_deref(), Some("almacen"));
        assert_eq!(repo.list_material_stock("C1").unwrap().len(), 1);
    }

    #[test]
    fn test_negative_stock_is_rejected() {
        let repo = setup();
        repo.upsert(&Crew::new("C1", "K1")).unwrap();
        let result = repo.set_material_stock("C1", Sku::Clevis, -1.0, "almacen", now());
        assert!(matches!(result, Err(RepositoryError::ValidationError(_))));
    }
}
