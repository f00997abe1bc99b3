use crate::http::ack::acknowledgment;
use crate::http::types::ChallengeResponse;
use crate::http::HttpState;
use crate::slack::url_verification_challenge;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::Value;
use tracing::debug;

pub async fn health() -> &'static str {
    "LegalBot running ✅"
}

/// Slack Events API endpoint.
///
/// The handshake is answered inline. Everything else is acknowledged with a bare 200 and
/// handed to the relay, which filters and replies on its own task once that response has
/// been written, so Slack never waits on the completion and posting calls.
pub async fn slack_events(State(state): State<HttpState>, Json(body): Json<Value>) -> Response {
    if let Some(challenge) = url_verification_challenge(&body) {
        debug!("Answering Slack URL verification challenge");
        return Json(ChallengeResponse { challenge }).into_response();
    }

    let (response, acknowledged) = acknowledgment();

    // The task starts once the response body is done and outlives this request.
    drop(state.relay.dispatch(body, acknowledged));
    response
}
