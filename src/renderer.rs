//! Optional presentation hook.
//!
//! A renderer is told what the appliance is doing; it never influences the
//! state machine.

use serde::Serialize;
use tracing::info;

use crate::query::Reply;
use crate::state::ErrorKind;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RendererEvent {
    Idle,
    Listening,
    Recognizing,
    Recognized { text: String },
    Speaking { reply: Reply },
    Error { kind: Option<ErrorKind> },
}

pub trait Renderer: Send + Sync {
    fn notify(&self, event: &RendererEvent);
}

/// Writes every event to the log as JSON.
#[derive(Debug, Default)]
pub struct TracingRenderer;

impl Renderer for TracingRenderer {
    fn notify(&self, event: &RendererEvent) {
        match serde_json::to_string(event) {
            Ok(json) => info!(target: "hark::renderer", "{}", json),
            Err(e) => info!(target: "hark::renderer", ?event, "unserializable event: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_tags() {
        let json = serde_json::to_value(RendererEvent::Listening).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "listening" }));

        let json = serde_json::to_value(RendererEvent::Recognized {
            text: "what is the time".to_string(),
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "type": "recognized", "text": "what is the time" })
        );

        let json = serde_json::to_value(RendererEvent::Error {
            kind: Some(ErrorKind::Connection),
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({ "type": "error", "kind": "connection" }));
    }

    #[test]
    fn test_speaking_carries_reply() {
        let event = RendererEvent::Speaking {
            reply: Reply {
                answer: Some("3 o'clock".to_string()),
                ..Default::default()
            },
        };
        let json = serde_json::to_value(event).unwrap();
        assert_eq!(json["type"], "speaking");
        assert_eq!(json["reply"]["answer"], "3 o'clock");
        assert!(json["reply"]["table"].is_null());
    }
}
