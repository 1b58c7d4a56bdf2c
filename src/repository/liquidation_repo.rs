// ==========================================
// FieldOps stock engine - liquidation repository (reads)
// ==========================================
// Tables: liquidation_record, stock_movement
// Writes go through the stock ledger so they share one transaction
// ==========================================

use crate::domain::liquidation::{LiquidationRecord, MaterialQuantities, StockMovement};
use crate::domain::types::{InstallationKind, LiquidationState, Sku, SkuCounts};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

pub(crate) const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub(crate) const RECORD_COLUMNS: &str = r#"
    installation_code, crew_id, kind, acta, rotulo,
    metraje_instalado, templadores, hebillas, clevis,
    state, revision, liquidated_by, liquidated_at,
    ont_count, mesh_count, fono_count, box_count
"#;

pub(crate) fn map_record_row(row: &Row<'_>) -> rusqlite::Result<LiquidationRecord> {
    Ok(LiquidationRecord {
        installation_code: row.get(0)?,
        crew_id: row.get(1)?,
        kind: InstallationKind::from_db_str(&row.get::<_, String>(2)?),
        acta: row.get(3)?,
        rotulo: row.get(4)?,
        quantities: MaterialQuantities {
            metraje_instalado: row.get(5)?,
            templadores: row.get(6)?,
            hebillas: row.get(7)?,
            clevis: row.get(8)?,
        },
        state: LiquidationState::from_db_str(&row.get::<_, String>(9)?),
        revision: row.get(10)?,
        liquidated_by: row.get(11)?,
        liquidated_at: row
            .get::<_, Option<String>>(12)?
            .and_then(|s| NaiveDateTime::parse_from_str(&s, TS_FORMAT).ok()),
        equipment: [
            (Sku::Ont, row.get::<_, u32>(13)?),
            (Sku::Mesh, row.get::<_, u32>(14)?),
            (Sku::Fono, row.get::<_, u32>(15)?),
            (Sku::Box, row.get::<_, u32>(16)?),
        ]
        .into_iter()
        .filter(|(_, count)| *count > 0)
        .collect(),
    })
}

pub struct LiquidationRepository {
    conn: Arc<Mutex<Connection>>,
}

impl LiquidationRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// Register an installation awaiting liquidation (no-op if it already exists)
    pub fn register_installation(&self, record: &LiquidationRecord) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            r#"
            INSERT OR IGNORE INTO liquidation_record (installation_code, crew_id, kind, state, revision)
            VALUES (?1, ?2, ?3, 'UNLIQUIDATED', 0)
            "#,
            params![
                record.installation_code,
                record.crew_id,
                record.kind.to_db_str()
            ],
        )?;
        Ok(affected > 0)
    }

    pub fn find_by_code(&self, installation_code: &str) -> RepositoryResult<Option<LiquidationRecord>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM liquidation_record WHERE installation_code = ?1",
            RECORD_COLUMNS
        );
        Ok(conn
            .query_row(&sql, params![installation_code], map_record_row)
            .optional()?)
    }

    /// Records of a crew, optionally filtered by state
    pub fn list_by_crew(
        &self,
        crew_id: &str,
        state: Option<LiquidationState>,
    ) -> RepositoryResult<Vec<LiquidationRecord>> {
        let conn = self.get_conn()?;
        let mut records = Vec::new();
        match state {
            Some(state) => {
                let sql = format!(
                    "SELECT {} FROM liquidation_record WHERE crew_id = ?1 AND state = ?2 ORDER BY installation_code",
                    RECORD_COLUMNS
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(params![crew_id, state.to_db_str()], map_record_row)?;
                for row in rows {
                    records.push(row?);
                }
            }
            None => {
                let sql = format!(
                    "SELECT {} FROM liquidation_record WHERE crew_id = ?1 ORDER BY installation_code",
                    RECORD_COLUMNS
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(params![crew_id], map_record_row)?;
                for row in rows {
                    records.push(row?);
                }
            }
        }
        Ok(records)
    }

    /// Installed equipment per crew over liquidations in `[from, to]`
    pub fn consumption_by_crew(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> RepositoryResult<BTreeMap<String, SkuCounts>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT crew_id,
                   SUM(ont_count), SUM(mesh_count), SUM(fono_count), SUM(box_count)
            FROM liquidation_record
            WHERE state = 'LIQUIDATED' AND liquidated_at BETWEEN ?1 AND ?2
            GROUP BY crew_id
            "#,
        )?;
        let rows = stmt.query_map(
            params![
                from.format(TS_FORMAT).to_string(),
                to.format(TS_FORMAT).to_string()
            ],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    [
                        (Sku::Ont, row.get::<_, i64>(1)?),
                        (Sku::Mesh, row.get::<_, i64>(2)?),
                        (Sku::Fono, row.get::<_, i64>(3)?),
                        (Sku::Box, row.get::<_, i64>(4)?),
                    ],
                ))
            },
        )?;

        let mut out = BTreeMap::new();
        for row in rows {
            let (crew_id, sums) = row?;
            let counts: SkuCounts = sums
                .into_iter()
                .map(|(sku, n)| (sku, u32::try_from(n).unwrap_or(u32::MAX)))
                .collect();
            out.insert(crew_id, counts);
        }
        Ok(out)
    }

    /// Stock movements caused by one installation, oldest first
    pub fn list_movements(&self, installation_code: &str) -> RepositoryResult<Vec<StockMovement>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT movement_id, crew_id, material, delta, quantity_after,
                   installation_code, actor, created_at
            FROM stock_movement
            WHERE installation_code = ?1
            ORDER BY created_at, rowid
            "#,
        )?;
        let rows = stmt.query_map(params![installation_code], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, f64>(3)?,
                row.get::<_, f64>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, String>(7)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (movement_id, crew_id, material, delta, quantity_after, code, actor, created_at) =
                row?;
            let Some(material) = Sku::parse(&material) else {
                continue;
            };
            let created_at = NaiveDateTime::parse_from_str(&created_at, TS_FORMAT)
                .map_err(|e| RepositoryError::DatabaseQueryError(e.to_string()))?;
            out.push(StockMovement {
                movement_id,
                crew_id,
                material,
                delta,
                quantity_after,
                installation_code: code,
                actor,
                created_at,
            });
        }
        Ok(out)
    }
}
