// ==========================================
// FieldOps stock engine - API errors
// ==========================================
// Converts repository/importer errors into the errors callers see
// Every stock error names the material and its shortfall
// ==========================================

use crate::i18n::t_with_args;
use crate::importer::error::ImportError;
use crate::repository::error::{RepositoryError, StockShortage};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    // ===== input =====
    #[error("validation failed: {0}")]
    ValidationError(String),

    // ===== stock =====
    #[error("insufficient stock: {}", describe_shortages(.shortages))]
    InsufficientStock { shortages: Vec<StockShortage> },

    // ===== concurrency =====
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    // ===== data access =====
    #[error("database error: {0}")]
    DatabaseError(String),

    #[error("database transaction failed: {0}")]
    DatabaseTransactionError(String),

    #[error("import failed: {0}")]
    ImportError(String),

    // ===== generic =====
    #[error("internal error: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn describe_shortages(shortages: &[StockShortage]) -> String {
    shortages
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(" | ")
}

impl ApiError {
    /// Localized message for operators (current rust-i18n locale)
    pub fn user_message(&self) -> String {
        match self {
            ApiError::ValidationError(detail) => {
                t_with_args("errors.validation", &[("detail", detail.as_str())])
            }
            ApiError::InsufficientStock { shortages } => {
                let lines: Vec<String> = shortages.iter().map(shortage_line).collect();
                let detail = lines.join("; ");
                t_with_args("errors.insufficient_stock", &[("detail", detail.as_str())])
            }
            ApiError::Conflict(detail) => {
                t_with_args("errors.conflict", &[("detail", detail.as_str())])
            }
            ApiError::NotFound(detail) => {
                t_with_args("errors.not_found", &[("detail", detail.as_str())])
            }
            ApiError::DatabaseError(detail) | ApiError::DatabaseTransactionError(detail) => {
                t_with_args("errors.database", &[("detail", detail.as_str())])
            }
            ApiError::ImportError(detail) => {
                t_with_args("errors.import", &[("detail", detail.as_str())])
            }
            ApiError::InternalError(detail) => {
                t_with_args("errors.internal", &[("detail", detail.as_str())])
            }
            ApiError::Other(err) => {
                let detail = err.to_string();
                t_with_args("errors.internal", &[("detail", detail.as_str())])
            }
        }
    }
}

fn shortage_line(s: &StockShortage) -> String {
    let material = s.material.to_string();
    let available = fmt_qty(s.available);
    let requested = fmt_qty(s.requested);
    let shortfall = fmt_qty(s.shortfall());
    t_with_args(
        "errors.shortage_line",
        &[
            ("material", material.as_str()),
            ("available", available.as_str()),
            ("requested", requested.as_str()),
            ("shortfall", shortfall.as_str()),
        ],
    )
}

/// Whole numbers print without decimals
fn fmt_qty(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{:.2}", value)
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::InsufficientStock { shortages } => {
                ApiError::InsufficientStock { shortages }
            }
            RepositoryError::Conflict(msg) => ApiError::Conflict(msg),
            e @ RepositoryError::OptimisticLockFailure { .. } => ApiError::Conflict(e.to_string()),
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{} (id={})", entity, id))
            }
            RepositoryError::ValidationError(msg) => ApiError::ValidationError(msg),
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseError(format!("connection lock failed: {}", msg))
            }
            RepositoryError::DatabaseTransactionError(msg) => ApiError::DatabaseTransactionError(msg),
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => ApiError::Conflict(msg),
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::Repository(repo) => repo.into(),
            other => ApiError::ImportError(other.to_string()),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::Sku;

    #[test]
    fn test_repository_error_conversion() {
        let api: ApiError = RepositoryError::OptimisticLockFailure {
            entity: "liquidation_record".to_string(),
            id: "INST-1".to_string(),
            expected: 1,
            actual: 2,
        }
        .into();
        assert!(matches!(api, ApiError::Conflict(ref m) if m.contains("INST-1")));

        let api: ApiError = RepositoryError::NotFound {
            entity: "crew".to_string(),
            id: "C9".to_string(),
        }
        .into();
        assert!(matches!(api, ApiError::NotFound(ref m) if m.contains("C9")));
    }

    #[test]
    fn test_insufficient_stock_keeps_every_shortage() {
        let api: ApiError = RepositoryError::InsufficientStock {
            shortages: vec![StockShortage {
                material: Sku::Bobina,
                available: 40.0,
                requested: 50.0,
            }],
        }
        .into();
        match &api {
            ApiError::InsufficientStock { shortages } => {
                assert_eq!(shortages[0].shortfall(), 10.0);
            }
            other => panic!("expected InsufficientStock, got {:?}", other),
        }
        assert!(api.to_string().contains("BOBINA"));
    }

    #[test]
    fn test_fmt_qty() {
        assert_eq!(fmt_qty(10.0), "10");
        assert_eq!(fmt_qty(2.5), "2.50");
    }
}
