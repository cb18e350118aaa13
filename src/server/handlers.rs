//! Ingestion and mailbox handlers.

use super::AppState;
use crate::error::PitError;
use crate::ingest::{parse_resend_request, parse_ses_v1, parse_ses_v2, SesAction};
use crate::types::CapturedEmail;
use axum::{
    body::Bytes,
    extract::{rejection::FormRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Form, Json,
};
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

const SES_XMLNS: &str = "http://ses.amazonaws.com/doc/2010-12-01/";

/// Resend-style validation error body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ValidationBody {
    status_code: u16,
    message: String,
    name: String,
}

/// `POST /emails`
#[instrument(skip_all)]
pub async fn create_email(State(state): State<AppState>, body: Bytes) -> Response {
    match parse_resend_request(&body) {
        Ok(email) => {
            let email = capture(&state, email);
            Json(json!({ "id": email.id })).into_response()
        }
        Err(err) => resend_error(err),
    }
}

/// `GET /emails`, newest first.
pub async fn list_emails(State(state): State<AppState>) -> Json<Vec<Arc<CapturedEmail>>> {
    Json(state.store.snapshot())
}

/// `GET /api/emails`, wrapped for the viewer.
pub async fn list_emails_envelope(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({ "emails": state.store.snapshot() }))
}

/// `DELETE /emails` and `DELETE /api/emails`
pub async fn clear_emails(State(state): State<AppState>) -> Json<serde_json::Value> {
    state.store.clear();
    info!("Mailbox cleared");
    Json(json!({ "success": true }))
}

/// `POST /v2/email/outbound-emails`
#[instrument(skip_all)]
pub async fn ses_v2_email(State(state): State<AppState>, body: Bytes) -> Response {
    match parse_ses_v2(&body) {
        Ok(email) => {
            let email = capture(&state, email);
            Json(json!({ "MessageId": email.id })).into_response()
        }
        Err(PitError::Validation {
            status,
            message,
            kind,
        }) => (
            status_code(status),
            Json(json!({ "__type": kind, "message": message })),
        )
            .into_response(),
        Err(err) => internal_error(err),
    }
}

/// `POST /` with a form-encoded SES v1 query request.
#[instrument(skip_all)]
pub async fn ses_v1_email(
    State(state): State<AppState>,
    form: Result<Form<HashMap<String, String>>, FormRejection>,
) -> Response {
    let Ok(Form(form)) = form else {
        return ses_v1_error(
            StatusCode::BAD_REQUEST,
            "InvalidParameterValue",
            "Failed to parse form body",
        );
    };

    match parse_ses_v1(&form) {
        Ok(submission) => {
            let email = capture(&state, submission.email);
            ses_v1_response(submission.action, &email.id.to_string())
        }
        Err(PitError::Validation {
            status,
            message,
            kind,
        }) => ses_v1_error(status_code(status), &kind, &message),
        Err(err) => internal_error(err),
    }
}

fn capture(state: &AppState, email: CapturedEmail) -> Arc<CapturedEmail> {
    let email = state.store.append(email);
    info!(
        id = %email.id,
        provider = ?email.provider,
        subject = %email.subject,
        "Email received"
    );
    email
}

fn resend_error(err: PitError) -> Response {
    match err {
        PitError::Validation {
            status,
            message,
            kind,
        } => {
            debug!(%message, "Rejected submission");
            (
                status_code(status),
                Json(ValidationBody {
                    status_code: status,
                    message,
                    name: kind,
                }),
            )
                .into_response()
        }
        other => internal_error(other),
    }
}

fn ses_v1_response(action: SesAction, message_id: &str) -> Response {
    let name = action.name();
    let body = format!(
        r#"<{name}Response xmlns="{xmlns}">
  <{name}Result>
    <MessageId>{message_id}</MessageId>
  </{name}Result>
  <ResponseMetadata>
    <RequestId>{request_id}</RequestId>
  </ResponseMetadata>
</{name}Response>"#,
        xmlns = SES_XMLNS,
        request_id = Uuid::new_v4(),
    );
    ([(header::CONTENT_TYPE, "text/xml")], body).into_response()
}

fn ses_v1_error(status: StatusCode, code: &str, message: &str) -> Response {
    debug!(code, message, "Rejected SES v1 submission");
    let body = format!(
        r#"<ErrorResponse xmlns="{xmlns}">
  <Error>
    <Type>Sender</Type>
    <Code>{code}</Code>
    <Message>{message}</Message>
  </Error>
  <RequestId>{request_id}</RequestId>
</ErrorResponse>"#,
        xmlns = SES_XMLNS,
        message = xml_escape(message),
        request_id = Uuid::new_v4(),
    );
    (status, [(header::CONTENT_TYPE, "text/xml")], body).into_response()
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn status_code(status: u16) -> StatusCode {
    StatusCode::from_u16(status).unwrap_or(StatusCode::UNPROCESSABLE_ENTITY)
}

fn internal_error(err: PitError) -> Response {
    tracing::error!(error = %err, "Unexpected ingestion failure");
    (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
}
