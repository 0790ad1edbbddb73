//! Transactional email endpoint.
//!
//! Keeps the `camelCase` request contract used by the checkout pages:
//! `{to | customerEmail | attendeeEmails | adminEmail, orderId, orderDetails,
//! emailType, subject?, html?}`.
//!
//! The endpoint is unauthenticated and sends caller-supplied HTML to any
//! recipient with the server's provider key, so it can act as an open relay.
//! It sits behind the stricter per-IP email limiter (burst of 5, one request
//! every 6 seconds) and every send is recorded in the email log for review.

use axum::{Json, extract::State};
use serde::Serialize;
use tracing::instrument;

use ticket_booth_core::EmailRequest;

use crate::error::{AppError, Result};
use crate::routes::JsonBody;
use crate::services::notifications;
use crate::state::AppState;

/// Provider result returned to the caller.
#[derive(Debug, Serialize)]
pub struct SentEmail {
    pub id: String,
}

/// `{success: true, data: {id}}`.
#[derive(Debug, Serialize)]
pub struct SendEmailResponse {
    pub success: bool,
    pub data: SentEmail,
}

/// Send an email and record the attempt in the email log.
///
/// Returns `400` when no valid recipient is supplied, `503` when email is not
/// configured and `500` when the provider fails.
#[instrument(skip(state, request), fields(email_type = %request.email_type))]
pub async fn send_email_confirmation(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<EmailRequest>,
) -> Result<Json<SendEmailResponse>> {
    let email = request.into_outgoing()?;

    let client = state
        .email()
        .ok_or_else(|| AppError::ServiceUnavailable("Email".to_string()))?;

    let id = notifications::send_and_record(state.pool(), client, &email).await?;

    Ok(Json(SendEmailResponse {
        success: true,
        data: SentEmail { id },
    }))
}
