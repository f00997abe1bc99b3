use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Serialize)]
pub struct ChallengeResponse {
    pub challenge: Value,
}
