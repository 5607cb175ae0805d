use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

use crate::commands::{self, Reply};
use crate::service::Service;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<Service>,
}

#[derive(Deserialize)]
pub struct CommandRequest {
    /// Command name as parsed by the host (without its prefix).
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_user")]
    pub user: String,
    /// Host destination id of the conversation the command came from.
    pub destination: String,
}

fn default_user() -> String {
    "anonymous".into()
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReplySegment {
    Text { text: String },
    Image { image_base64: String },
}

impl From<Reply> for ReplySegment {
    fn from(reply: Reply) -> Self {
        match reply {
            Reply::Text(text) => Self::Text { text },
            Reply::Image(png) => Self::Image {
                image_base64: BASE64.encode(png),
            },
        }
    }
}

#[derive(Serialize)]
pub struct CommandResponse {
    pub replies: Vec<ReplySegment>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/command", post(handle_command))
        .route("/health", get(handle_health))
        .with_state(state)
}

/// Commands never fail the HTTP exchange; handler errors come back as
/// text segments the host shows in the chat.
async fn handle_command(
    State(state): State<AppState>,
    Json(req): Json<CommandRequest>,
) -> impl IntoResponse {
    let replies = commands::dispatch(
        &state.service,
        &req.command,
        &req.args,
        &req.user,
        &req.destination,
    )
    .await;
    Json(CommandResponse {
        replies: replies.into_iter().map(ReplySegment::from).collect(),
    })
}

async fn handle_health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "words": state.service.bank.len(),
        "destinations": state.service.registry.len(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_segment_wire_shape() {
        let text = serde_json::to_value(ReplySegment::from(Reply::Text("hi".into()))).unwrap();
        assert_eq!(text["type"], "text");
        assert_eq!(text["text"], "hi");

        let image = serde_json::to_value(ReplySegment::from(Reply::Image(vec![1, 2, 3]))).unwrap();
        assert_eq!(image["type"], "image");
        assert_eq!(image["image_base64"], "AQID");
    }

    #[test]
    fn test_command_request_defaults() {
        let req: CommandRequest =
            serde_json::from_str(r#"{"command": "vocab", "destination": "group:1"}"#).unwrap();
        assert_eq!(req.user, "anonymous");
        assert!(req.args.is_empty());
    }
}
