use axum::{
    Json,
    extract::{Query, State, rejection::JsonRejection, rejection::QueryRejection},
};
use serde::Serialize;

use crate::{
    application::render::RenderOutput,
    domain::formula::{FormulaQuery, FormulaRequest},
};

use super::{HttpState, error::ApiError};

pub async fn render_from_query(
    State(state): State<HttpState>,
    query: Result<Query<FormulaQuery>, QueryRejection>,
) -> Result<Json<RenderOutput>, ApiError> {
    let Query(query) = query?;
    render(&state, query).await
}

pub async fn render_from_json(
    State(state): State<HttpState>,
    body: Result<Json<FormulaQuery>, JsonRejection>,
) -> Result<Json<RenderOutput>, ApiError> {
    let Json(query) = body?;
    render(&state, query).await
}

async fn render(state: &HttpState, query: FormulaQuery) -> Result<Json<RenderOutput>, ApiError> {
    let request = FormulaRequest::try_from(query)?;
    let output = state.service.render(&request).await?;
    Ok(Json(output))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub output_types: Vec<&'static str>,
}

pub async fn health(State(state): State<HttpState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        output_types: state
            .service
            .registry()
            .output_types()
            .map(|output_type| output_type.as_str())
            .collect(),
    })
}
