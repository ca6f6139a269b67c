use std::time::Duration;

use axum::{extract::State, Json};
use chrono::Utc;
use serde_json::{json, Value};

use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let db = match &state.db_pool {
        Some(pool) => {
            match tokio::time::timeout(
                Duration::from_secs(3),
                sqlx::query("SELECT 1").fetch_one(pool),
            )
            .await
            {
                Ok(Ok(_)) => "ok",
                Ok(Err(e)) => {
                    tracing::error!(error = %e, "Health check DB query failed");
                    "error"
                }
                Err(_) => {
                    tracing::error!("Health check DB query timed out (3s)");
                    "error"
                }
            }
        }
        None => "not_configured",
    };

    let status = if db == "error" { "degraded" } else { "ok" };
    Json(json!({
        "status": status,
        "app": state.config.app_name,
        "now": Utc::now().to_rfc3339(),
        "db": db,
        "towers": state.cam_catalog.len(),
    }))
}
