use crate::errors::AppError;
use crate::models::{LeadCreatedResponse, LeadRecord, LeadSubmission};
use crate::storage::{LeadStore, TableStatus};
use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    http::StatusCode,
    Json,
};
use chrono::{SecondsFormat, Utc};
use serde_json::json;
use std::sync::Arc;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Lead table, or `None` when no usable storage connection is configured.
    pub store: Option<Arc<dyn LeadStore>>,
    /// Whether a connection string was supplied, even if it failed to parse.
    pub has_connection_string: bool,
    /// Deployment environment reported by the status check.
    pub environment: String,
}

impl AppState {
    /// State backed by `store`, as if it had been configured from a connection string.
    pub fn with_store(store: Arc<dyn LeadStore>, environment: impl Into<String>) -> Self {
        Self {
            store: Some(store),
            has_connection_string: true,
            environment: environment.into(),
        }
    }

    /// State with no storage configured.
    pub fn unconfigured(environment: impl Into<String>) -> Self {
        Self {
            store: None,
            has_connection_string: false,
            environment: environment.into(),
        }
    }
}

fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// OPTIONS /api/storeLeads
///
/// CORS preflight. Responds 200 with an empty body; the CORS headers are
/// added by the router for every response.
pub async fn lead_preflight() -> StatusCode {
    StatusCode::OK
}

/// GET /api/storeLeads
///
/// Status check. Always 200: callers inspect `hasConnectionString` and
/// `tableConnected` rather than the status code. Never writes lead data.
pub async fn lead_api_status(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<serde_json::Value>) {
    let table_connected = match &state.store {
        Some(store) => match store.ensure_table().await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("Table connection test failed: {}", e);
                false
            }
        },
        None => false,
    };

    (
        StatusCode::OK,
        Json(json!({
            "message": "Integral Exterior Leads API is working",
            "timestamp": now_iso(),
            "hasConnectionString": state.has_connection_string,
            "tableConnected": table_connected,
            "environment": state.environment,
        })),
    )
}

/// POST /api/storeLeads
///
/// Flow:
/// 1. Require a configured store.
/// 2. Read the body (at most `MAX_BODY_BYTES`) and decode it as a lead submission.
/// 3. Check the required contact fields.
/// 4. Ensure the lead table exists.
/// 5. Build the record with a fresh row key.
/// 6. Write it with a single create call.
///
/// Each storage call is attempted once; failures surface as 500.
pub async fn store_lead(
    State(state): State<Arc<AppState>>,
    body: Result<Bytes, BytesRejection>,
) -> Result<(StatusCode, Json<LeadCreatedResponse>), AppError> {
    let store = state.store.as_ref().ok_or(AppError::StorageNotConfigured)?;

    let body = body.map_err(|rejection| AppError::InvalidBody(rejection.body_text()))?;
    let submission: LeadSubmission = serde_json::from_slice(&body)?;
    tracing::info!(
        "Received lead submission: service={:?}, budget={:?}",
        submission.service,
        submission.budget
    );

    let lead = submission.validate()?;

    match store
        .ensure_table()
        .await
        .map_err(AppError::TableProvisioning)?
    {
        TableStatus::Created => tracing::info!("Lead table created"),
        TableStatus::AlreadyExisted => tracing::debug!("Lead table already exists"),
    }

    let record = LeadRecord::new(lead, Utc::now(), &mut rand::thread_rng());
    tracing::debug!(
        row_key = %record.row_key,
        priority = ?record.priority,
        estimated_value = record.estimated_value,
        "Storing lead"
    );

    store
        .insert_lead(&record)
        .await
        .map_err(AppError::Storage)?;

    tracing::info!("✅ Lead stored: {}", record.row_key);

    Ok((
        StatusCode::OK,
        Json(LeadCreatedResponse {
            success: true,
            message: "Lead stored successfully".to_string(),
            lead_id: record.row_key,
            timestamp: record.date_created,
        }),
    ))
}

/// Any other method on /api/storeLeads.
pub async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}

/// GET /api/test
///
/// Liveness stub.
pub async fn hello() -> Json<serde_json::Value> {
    Json(json!({ "message": "Hello from Azure Functions!" }))
}
