use axum::{extract::State, Json};

use crate::scheduler::{SharedTickSummary, TickSummary};

/// Summary of the most recent completed tick, `null` before the first one.
pub async fn scheduler_status(State(last_tick): State<SharedTickSummary>) -> Json<Option<TickSummary>> {
    Json(last_tick.read().await.clone())
}
