//! Per-user storage accounting.
//!
//! Aggregates are computed live against the catalog; trashed records stop
//! counting even though their bytes stay on disk.

use serde::Serialize;

use crate::db::Database;
use crate::error::{AppError, Result};

/// Quota endpoint payload
#[derive(Debug, Clone, Serialize)]
pub struct QuotaStatus {
    pub quota: i64,
    pub usage: i64,
    /// Negative when over quota; deliberately not clamped
    pub remaining: i64,
    pub percentage_used: f64,
}

/// Usage accountant service
pub struct UsageAccountant;

impl UsageAccountant {
    /// Total bytes of non-trashed records owned by `owner_id`
    pub async fn usage(db: &Database, owner_id: &str) -> Result<i64> {
        let total: (i64,) = sqlx::query_as(
            "SELECT COALESCE(SUM(size_bytes), 0) FROM files WHERE owner_id = ? AND trashed = 0",
        )
        .bind(owner_id)
        .fetch_one(db.pool())
        .await?;

        Ok(total.0)
    }

    /// Quota status against a configured quota. A non-positive quota is a
    /// configuration error, surfaced instead of dividing by zero.
    pub async fn quota_status(db: &Database, owner_id: &str, quota: i64) -> Result<QuotaStatus> {
        if quota <= 0 {
            return Err(AppError::InvalidQuota(format!(
                "quota must be positive, got {}",
                quota
            )));
        }

        let usage = Self::usage(db, owner_id).await?;

        Ok(QuotaStatus {
            quota,
            usage,
            remaining: quota - usage,
            percentage_used: usage as f64 / quota as f64 * 100.0,
        })
    }
}
