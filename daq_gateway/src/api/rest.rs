use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::config::settings::Settings;
use crate::drivers::traits::EquipmentDriver;
use crate::sender::statistics::FilterStatistics;
use crate::sender::Dispatcher;
use crate::tags::engine::TagEngine;
use crate::tags::structures::TagId;

#[derive(Clone)]
pub struct SharedAppState {
    pub tag_engine: Arc<TagEngine>,
    pub dispatcher: Arc<Dispatcher>,
    pub filter_stats: Arc<FilterStatistics>,
    pub start_time: tokio::time::Instant,
    pub settings: Arc<RwLock<Settings>>,
    pub drivers: Arc<HashMap<String, Arc<dyn EquipmentDriver>>>,
}

#[derive(Serialize)]
pub struct EquipmentInfo {
    pub id: String,
    pub name: String,
    pub scan_rate_ms: u64,
    pub connected: bool,
    pub driver_type: String,
}

pub fn create_api_routes() -> Router<SharedAppState> {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/stats", get(stats))
        .route("/api/tags", get(get_tags))
        .route("/api/tags/:tag_id", get(get_tag))
        .route("/api/tags/:tag_id/flush", post(flush_tag))
        .route("/api/filtered", get(get_filtered))
        .route("/api/equipment", get(get_equipment))
        .route("/api/config", get(get_config))
}

// Simple health check endpoint
async fn health() -> &'static str {
    "DAQ Gateway Running"
}

async fn stats(State(state): State<SharedAppState>) -> impl IntoResponse {
    let dispatch = state.dispatcher.stats();
    Json(json!({
        "uptime_seconds": state.start_time.elapsed().as_secs(),
        "tag_count": state.tag_engine.len(),
        "equipment_count": state.drivers.len(),
        "dispatch": dispatch,
    }))
}

async fn get_tags(State(state): State<SharedAppState>) -> impl IntoResponse {
    Json(state.tag_engine.all_snapshots())
}

async fn get_tag(State(state): State<SharedAppState>, Path(tag_id): Path<TagId>) -> impl IntoResponse {
    match state.tag_engine.snapshot(tag_id) {
        Some(tag) => (StatusCode::OK, Json(json!(tag))),
        None => {
            warn!("Tag not found: #{}", tag_id);
            (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": format!("Tag #{} not found", tag_id) })),
            )
        }
    }
}

async fn flush_tag(State(state): State<SharedAppState>, Path(tag_id): Path<TagId>) -> StatusCode {
    if state.tag_engine.get_cell(tag_id).is_none() {
        return StatusCode::NOT_FOUND;
    }
    if state.dispatcher.flush(tag_id) {
        info!("Forced time deadband flush of tag #{}", tag_id);
    }
    StatusCode::NO_CONTENT
}

async fn get_filtered(State(state): State<SharedAppState>) -> impl IntoResponse {
    Json(state.filter_stats.report())
}

async fn get_equipment(State(state): State<SharedAppState>) -> impl IntoResponse {
    let mut equipment = Vec::new();
    for (id, driver) in state.drivers.iter() {
        let connected = driver.check_status().await.is_ok();
        let config = driver.config();
        equipment.push(EquipmentInfo {
            id: id.clone(),
            name: config.name.clone(),
            scan_rate_ms: config.scan_rate_ms,
            connected,
            driver_type: driver.kind().to_string(),
        });
    }
    equipment.sort_by(|a, b| a.id.cmp(&b.id));
    Json(equipment)
}

async fn get_config(State(state): State<SharedAppState>) -> impl IntoResponse {
    let cfg = state.settings.read().await.clone();
    Json(cfg)
}
