//! Canonical part catalogue

use axum::{routing::get, Json, Router};
use meateye_common::parts::{CanonicalPart, Species};
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct PartView {
    pub id: &'static str,
    pub display_name: &'static str,
    pub species: Species,
}

/// GET /api/v1/parts
pub async fn list_parts() -> Json<Vec<PartView>> {
    Json(
        CanonicalPart::ALL
            .iter()
            .map(|part| PartView {
                id: part.as_str(),
                display_name: part.display_name(),
                species: part.species(),
            })
            .collect(),
    )
}

pub fn part_routes() -> Router<AppState> {
    Router::new().route("/api/v1/parts", get(list_parts))
}
