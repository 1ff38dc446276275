//! JSON prediction API

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::Serialize;
use validator::Validate;

use crate::logic::model::ModelInfo;
use crate::models::{FeatureSpec, PredictRequest, PredictResponse};
use crate::{AppResult, AppState};

#[derive(Debug, Serialize)]
pub struct SchemaResponse {
    pub version: u8,
    /// CRC32 of the column layout, hex encoded
    pub layout_hash: String,
    pub features: Vec<FeatureSpec>,
}

/// Predict one record and return its SHAP attribution
pub async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> AppResult<Json<PredictResponse>> {
    let Json(req) = payload?;
    req.validate()?;

    let (record, clamped) = state.service.schema().resolve(&req.values)?;
    let explanation = state.service.explain(&record)?;

    Ok(Json(PredictResponse { explanation, clamped }))
}

/// Feature schema the form is built from
pub async fn schema(State(state): State<AppState>) -> Json<SchemaResponse> {
    let schema = state.service.schema();
    Json(SchemaResponse {
        version: schema.version(),
        layout_hash: format!("{:08x}", state.service.layout_hash()),
        features: schema.features().to_vec(),
    })
}

/// Metadata of the loaded model
pub async fn model(State(state): State<AppState>) -> Json<ModelInfo> {
    Json(state.model_info.as_ref().clone())
}
