/*!
shared.rs - helpers used by several subcommands.

  - runtime(): short-lived Tokio runtime; commands are synchronous and
    `block_on` the async bridge client / helper launcher
  - Aborted: marker error for failures whose message was already printed
  - require_ok(): turn a bridge reply into its JSON body or an abort
*/

use anyhow::{Context, Result};
use serde_json::Value;
use thiserror::Error;

use crate::bridge::{BridgeClient, BridgeReply};
use crate::config::Settings;

/// The command failed and has already told the user why. `main` exits
/// non-zero without printing anything else.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("command aborted")]
pub struct Aborted;

pub fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create Tokio runtime")
}

pub fn bridge_client(settings: &Settings) -> Result<BridgeClient> {
    BridgeClient::new(settings.bridge_url.clone()).context("Failed to build HTTP client")
}

/// Accept only a 200 reply. Unavailable replies were reported by the client;
/// other statuses are printed here with their body.
pub fn require_ok(reply: BridgeReply) -> Result<Option<Value>> {
    if reply.is_unavailable() {
        return Err(Aborted.into());
    }
    if !reply.is_ok() {
        eprintln!(
            "Error: ShadowBridge responded with status {}: {}",
            reply.status,
            reply.body_text()
        );
        return Err(Aborted.into());
    }
    Ok(reply.data)
}

/// `success: false` in a 200 body is still a failure; return its error text.
pub fn reported_failure(data: &Value) -> Option<String> {
    if data.get("success").and_then(Value::as_bool) == Some(false) {
        let msg = data
            .get("error")
            .or_else(|| data.get("message"))
            .and_then(Value::as_str)
            .unwrap_or("Unknown error");
        return Some(msg.to_string());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn require_ok_passes_body() {
        let reply = BridgeReply {
            status: 200,
            data: Some(json!({"a": 1})),
        };
        assert_eq!(require_ok(reply).unwrap(), Some(json!({"a": 1})));
    }

    #[test]
    fn require_ok_aborts_on_sentinel_and_errors() {
        let err = require_ok(BridgeReply::unavailable()).unwrap_err();
        assert!(err.downcast_ref::<Aborted>().is_some());

        let err = require_ok(BridgeReply {
            status: 500,
            data: Some(json!("boom")),
        })
        .unwrap_err();
        assert!(err.downcast_ref::<Aborted>().is_some());
    }

    #[test]
    fn success_false_is_reported() {
        assert_eq!(
            reported_failure(&json!({"success": false, "error": "no agents"})),
            Some("no agents".to_string())
        );
        assert_eq!(
            reported_failure(&json!({"success": false})),
            Some("Unknown error".to_string())
        );
        assert_eq!(reported_failure(&json!({"success": true})), None);
        assert_eq!(reported_failure(&json!({"message": "ok"})), None);
    }
}
