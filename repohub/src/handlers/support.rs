use axum::{extract::State, response::Json};
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct SupportStatus {
    pub cryptomus_enabled: bool,
}

pub async fn support_status(State(state): State<AppState>) -> Json<SupportStatus> {
    Json(SupportStatus {
        cryptomus_enabled: state.config.cryptomus_enabled,
    })
}
