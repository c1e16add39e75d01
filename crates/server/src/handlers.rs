//! Request handlers for API endpoints.

use std::time::Instant;

use axum::extract::{Json, State};
use llamaserve_llm::LlmRequest;
use llamaserve_prompt::build_input_prompt;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::state::SharedState;

/// Request body for `POST /llama`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputText {
    pub text: String,
}

/// Response body for `POST /llama`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
}

/// `GET /`
pub async fn test_connection() -> Result<Json<Value>, ApiError> {
    Ok(Json(json!({ "message": "Connection successful" })))
}

/// `POST /llama`: answer a question with the loaded model.
pub async fn get_answer(
    State(state): State<SharedState>,
    Json(input): Json<InputText>,
) -> Result<Json<Answer>, ApiError> {
    let start = Instant::now();
    tracing::info!("Generating answer using {}", state.llm.model_name());

    let prompt = build_input_prompt(&state.prompt, &input.text)?;

    let request = LlmRequest::new(prompt.text)
        .with_max_tokens(state.generation.max_new_tokens)
        .with_temperature(state.generation.temperature)
        .with_seed(state.generation.next_seed());

    let response = state.llm.complete(&request).await?;
    tracing::info!("Response from {}: {}", response.model, response.content);
    tracing::info!(
        "Time elapsed: {:.3} seconds",
        start.elapsed().as_secs_f64()
    );

    Ok(Json(Answer {
        answer: response.content,
    }))
}
