// ==========================================
// FieldOps stock engine - transactional stock ledger
// ==========================================
// Read-check-write over crew stock and liquidation records
// runs inside one BEGIN IMMEDIATE transaction:
// - the write lock is taken before the first read, so concurrent
//   mutators serialize on the database instead of racing
// - any error inside the closure rolls everything back
// ==========================================

use crate::domain::liquidation::{LiquidationRecord, StockMovement};
use crate::domain::types::{from_hundredths, to_hundredths, Sku};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::liquidation_repo::{map_record_row, RECORD_COLUMNS, TS_FORMAT};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use std::sync::{Arc, Mutex};

// ==========================================
// StockTransaction - operations visible inside one transaction
// ==========================================
pub trait StockTransaction {
    fn crew_exists(&self, crew_id: &str) -> RepositoryResult<bool>;

    fn load_record(&self, installation_code: &str) -> RepositoryResult<Option<LiquidationRecord>>;

    /// None when the crew has no stock row for the material
    fn read_stock(&self, crew_id: &str, material: Sku) -> RepositoryResult<Option<f64>>;

    /// Apply `delta` to an existing stock row; the precondition is that the
    /// result stays non-negative. Returns the new quantity.
    fn apply_delta(
        &self,
        crew_id: &str,
        material: Sku,
        delta: f64,
        actor: &str,
        at: NaiveDateTime,
    ) -> RepositoryResult<f64>;

    /// Insert or update the record; updates require `previous_revision` to still match.
    fn save_record(
        &self,
        record: &LiquidationRecord,
        previous_revision: Option<i64>,
    ) -> RepositoryResult<()>;

    fn append_movement(&self, movement: &StockMovement) -> RepositoryResult<()>;
}

// ==========================================
// StockLedger - transaction boundary
// ==========================================
pub trait StockLedger: Send + Sync {
    fn in_transaction<T, F>(&self, f: F) -> RepositoryResult<T>
    where
        F: FnOnce(&dyn StockTransaction) -> RepositoryResult<T>;
}

// ==========================================
// SqliteStockLedger
// ==========================================
pub struct SqliteStockLedger {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStockLedger {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }
}

impl StockLedger for SqliteStockLedger {
    fn in_transaction<T, F>(&self, f: F) -> RepositoryResult<T>
    where
        F: FnOnce(&dyn StockTransaction) -> RepositoryResult<T>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let value = f(&SqliteStockTransaction { tx: &tx })?;

        tx.commit()
            .map_err(|e| match RepositoryError::from(e) {
                conflict @ RepositoryError::Conflict(_) => conflict,
                other => RepositoryError::DatabaseTransactionError(other.to_string()),
            })?;
        Ok(value)
    }
}

struct SqliteStockTransaction<'a> {
    tx: &'a Transaction<'a>,
}

impl StockTransaction for SqliteStockTransaction<'_> {
    fn crew_exists(&self, crew_id: &str) -> RepositoryResult<bool> {
        let found = self
            .tx
            .query_row(
                "SELECT 1 FROM crew WHERE crew_id = ?1",
                params![crew_id],
                |_row| Ok(true),
            )
            .optional()?;
        Ok(found.unwrap_or(false))
    }

    fn load_record(&self, installation_code: &str) -> RepositoryResult<Option<LiquidationRecord>> {
        let sql = format!(
            "SELECT {} FROM liquidation_record WHERE installation_code = ?1",
            RECORD_COLUMNS
        );
        Ok(self
            .tx
            .query_row(&sql, params![installation_code], map_record_row)
            .optional()?)
    }

    fn read_stock(&self, crew_id: &str, material: Sku) -> RepositoryResult<Option<f64>> {
        Ok(self
            .tx
            .query_row(
                "SELECT quantity FROM crew_material_stock WHERE crew_id = ?1 AND material = ?2",
                params![crew_id, material.to_db_str()],
                |row| row.get::<_, f64>(0),
            )
            .optional()?)
    }

    fn apply_delta(
        &self,
        crew_id: &str,
        material: Sku,
        delta: f64,
        actor: &str,
        at: NaiveDateTime,
    ) -> RepositoryResult<f64> {
        let current = self
            .read_stock(crew_id, material)?
            .ok_or_else(|| RepositoryError::NotFound {
                entity: format!("crew_material_stock[{}]", material),
                id: crew_id.to_string(),
            })?;

        // whole hundredths so an exact drain lands on 0
        let next_hundredths = to_hundredths(current) + to_hundredths(delta);
        if next_hundredths < 0 {
            return Err(RepositoryError::InsufficientStock {
                shortages: vec![crate::repository::error::StockShortage {
                    material,
                    available: current,
                    requested: -delta,
                }],
            });
        }
        let next = from_hundredths(next_hundredths);

        self.tx.execute(
            r#"
            UPDATE crew_material_stock
               SET quantity = ?3, updated_by = ?4, updated_at = ?5
             WHERE crew_id = ?1 AND material = ?2
            "#,
            params![
                crew_id,
                material.to_db_str(),
                next,
                actor,
                at.format(TS_FORMAT).to_string()
            ],
        )?;
        Ok(next)
    }

    fn save_record(
        &self,
        record: &LiquidationRecord,
        previous_revision: Option<i64>,
    ) -> RepositoryResult<()> {
        let liquidated_at = record
            .liquidated_at
            .map(|t| t.format(TS_FORMAT).to_string());
        let q = &record.quantities;
        let eq = &record.equipment;

        match previous_revision {
            None => {
                self.tx.execute(
                    &format!(
                        "INSERT INTO liquidation_record ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
                        RECORD_COLUMNS
                    ),
                    params![
                        record.installation_code,
                        record.crew_id,
                        record.kind.to_db_str(),
                        record.acta,
                        record.rotulo,
                        q.metraje_instalado,
                        q.templadores,
                        q.hebillas,
                        q.clevis,
                        record.state.to_db_str(),
                        record.revision,
                        record.liquidated_by,
                        liquidated_at,
                        eq.get(Sku::Ont),
                        eq.get(Sku::Mesh),
                        eq.get(Sku::Fono),
                        eq.get(Sku::Box),
                    ],
                )?;
            }
            Some(expected) => {
                let affected = self.tx.execute(
                    r#"
                    UPDATE liquidation_record
                       SET crew_id = ?2, kind = ?3, acta = ?4, rotulo = ?5,
                           metraje_instalado = ?6, templadores = ?7, hebillas = ?8, clevis = ?9,
                           state = ?10, revision = ?11, liquidated_by = ?12, liquidated_at = ?13,
                           ont_count = ?14, mesh_count = ?15, fono_count = ?16, box_count = ?17
                     WHERE installation_code = ?1 AND revision = ?18
                    "#,
                    params![
                        record.installation_code,
                        record.crew_id,
                        record.kind.to_db_str(),
                        record.acta,
                        record.rotulo,
                        q.metraje_instalado,
                        q.templadores,
                        q.hebillas,
                        q.clevis,
                        record.state.to_db_str(),
                        record.revision,
                        record.liquidated_by,
                        liquidated_at,
                        eq.get(Sku::Ont),
                        eq.get(Sku::Mesh),
                        eq.get(Sku::Fono),
                        eq.get(Sku::Box),
                        expected,
                    ],
                )?;
                if affected == 0 {
                    let actual: Option<i64> = self
                        .tx
                        .query_row(
                            "SELECT revision FROM liquidation_record WHERE installation_code = ?1",
                            params![record.installation_code],
                            |row| row.get(0),
                        )
                        .optional()?;
                    return Err(match actual {
                        Some(actual) => RepositoryError::OptimisticLockFailure {
                            entity: "liquidation_record".to_string(),
                            id: record.installation_code.clone(),
                            expected,
                            actual,
                        },
                        None => RepositoryError::NotFound {
                            entity: "liquidation_record".to_string(),
                            id: record.installation_code.clone(),
                        },
                    });
                }
            }
        }
        Ok(())
    }

    fn append_movement(&self, movement: &StockMovement) -> RepositoryResult<()> {
        self.tx.execute(
            r#"
            INSERT INTO stock_movement (
                movement_id, crew_id, material, delta, quantity_after,
                installation_code, actor, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                movement.movement_id,
                movement.crew_id,
                movement.material.to_db_str(),
                movement.delta,
                movement.quantity_after,
                movement.installation_code,
                movement.actor,
                movement.created_at.format(TS_FORMAT).to_string(),
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;

    fn setup() -> SqliteStockLedger {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn.execute_batch(
            r#"
            INSERT INTO crew (crew_id, name) VALUES ('C1', 'K1');
            INSERT INTO crew_material_stock (crew_id, material, quantity) VALUES ('C1', 'BOBINA', 40);
            "#,
        )
        .unwrap();
        SqliteStockLedger::new(Arc::new(Mutex::new(conn)))
    }

    fn now() -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }

    #[test]
    fn test_error_inside_closure_rolls_back() {
        let ledger = setup();
        let result: RepositoryResult<()> = ledger.in_transaction(|tx| {
            tx.apply_delta("C1", Sku::Bobina, -30.0, "tester", now())?;
            Err(RepositoryError::ValidationError("abort".to_string()))
        });
        assert!(result.is_err());

        let stock = ledger
            .in_transaction(|tx| tx.read_stock("C1", Sku::Bobina))
            .unwrap();
        assert_eq!(stock, Some(40.0));
    }

    #[test]
    fn test_apply_delta_precondition() {
        let ledger = setup();
        let after = ledger
            .in_transaction(|tx| tx.apply_delta("C1", Sku::Bobina, -40.0, "tester", now()))
            .unwrap();
        assert_eq!(after, 0.0);

        let err = ledger
            .in_transaction(|tx| tx.apply_delta("C1", Sku::Bobina, -1.0, "tester", now()))
            .unwrap_err();
        assert!(matches!(err, RepositoryError::InsufficientStock { .. }));

        let err = ledger
            .in_transaction(|tx| tx.apply_delta("C1", Sku::Clevis, -1.0, "tester", now()))
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { .. }));
    }

    #[test]
    fn test_fractional_drain_reaches_exact_zero() {
        let ledger = setup();
        ledger
            .in_transaction(|tx| tx.apply_delta("C1", Sku::Bobina, -39.7, "tester", now()))
            .unwrap();
        for _ in 0..3 {
            ledger
                .in_transaction(|tx| tx.apply_delta("C1", Sku::Bobina, -0.1, "tester", now()))
                .unwrap();
        }
        let stock = ledger
            .in_transaction(|tx| tx.read_stock("C1", Sku::Bobina))
            .unwrap();
        assert_eq!(stock, Some(0.0));
    }
}
