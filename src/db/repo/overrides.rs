//! Admin override audit record operations.

use super::{fmt_datetime, parse_datetime, Repository};
use crate::domain::{AdminId, AdminOverride, OverrideAction, TargetType};
use sqlx::Row;
use tracing::warn;

impl Repository {
    pub async fn insert_admin_override(
        &self,
        record: &AdminOverride,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO admin_overrides
            (id, admin_id, target_type, target_id, action, previous_value, new_value,
             reason, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(record.admin_id.as_str())
        .bind(record.target_type.as_str())
        .bind(&record.target_id)
        .bind(record.action.as_str())
        .bind(record.previous_value.to_string())
        .bind(record.new_value.to_string())
        .bind(&record.reason)
        .bind(fmt_datetime(record.created_at))
        .execute(self.pool())
        .await?;

        Ok(())
    }

    /// Audit trail for one target, newest first.
    pub async fn query_admin_overrides(
        &self,
        target_type: TargetType,
        target_id: &str,
    ) -> Result<Vec<AdminOverride>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM admin_overrides
            WHERE target_type = ? AND target_id = ?
            ORDER BY created_at DESC, id ASC
            "#,
        )
        .bind(target_type.as_str())
        .bind(target_id)
        .fetch_all(self.pool())
        .await?;

        Ok(rows.iter().map(map_override_row).collect())
    }
}

fn map_override_row(row: &sqlx::sqlite::SqliteRow) -> AdminOverride {
    let target_str: String = row.get("target_type");
    let target_type = TargetType::parse(&target_str).unwrap_or_else(|| {
        warn!(value = %target_str, "Unknown override target type, defaulting to seller");
        TargetType::Seller
    });
    let action_str: String = row.get("action");
    let action = OverrideAction::parse(&action_str).unwrap_or_else(|| {
        warn!(value = %action_str, "Unknown override action, defaulting to account_status");
        OverrideAction::AccountStatus
    });

    let parse_json = |col: &str| -> serde_json::Value {
        let raw: String = row.get(col);
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!(column = col, error = %e, "Failed to parse override snapshot, using null");
            serde_json::Value::Null
        })
    };

    AdminOverride {
        id: row.get("id"),
        admin_id: AdminId::new(row.get::<String, _>("admin_id")),
        target_type,
        target_id: row.get("target_id"),
        action,
        previous_value: parse_json("previous_value"),
        new_value: parse_json("new_value"),
        reason: row.get("reason"),
        created_at: parse_datetime(
            &row.get::<String, _>("created_at"),
            "admin_overrides.created_at",
        ),
    }
}
