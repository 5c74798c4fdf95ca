//! AI flow endpoints. Backend failures answer 200 with a fallback outcome;
//! invalid input answers 400.

use axum::extract::State;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::flows::{
    FlowOutcome, SymptomCheckFlow, SymptomCheckInput, SymptomCheckOutput, WellnessTipFlow,
    WellnessTipInput, WellnessTipOutput,
};

/// `POST /api/flows/symptom-check`
pub async fn symptom_check(
    State(ctx): State<ApiContext>,
    Json(input): Json<SymptomCheckInput>,
) -> Result<Json<FlowOutcome<SymptomCheckOutput>>, ApiError> {
    let outcome = ctx
        .core
        .flows()
        .run_or_fallback(&SymptomCheckFlow, &input)
        .await?;
    Ok(Json(outcome))
}

/// `POST /api/flows/wellness-tip`: served from the flow cache when possible.
pub async fn wellness_tip(
    State(ctx): State<ApiContext>,
    Json(input): Json<WellnessTipInput>,
) -> Result<Json<FlowOutcome<WellnessTipOutput>>, ApiError> {
    let outcome = ctx
        .core
        .flows()
        .run_cached(&WellnessTipFlow, &input)
        .await?;
    Ok(Json(outcome))
}
