/*!
`bridge.rs`

  shadow bridge start   launch the ShadowBridge GUI detached
  shadow bridge status  GET /status + GET /devices
  shadow ping           GET /status with a 2 s probe timeout

The bridge lives in `<root>/shadow-bridge/shadow_bridge_gui.py`. This tool
only launches it; it does not supervise it.
*/

use anyhow::Result;
use clap::{Args, Subcommand};
use serde_json::{Value, json};

use crate::bridge::types::parse_devices;
use crate::bridge::{BridgeClient, BridgeError, DeviceInfo, Method, PROBE_TIMEOUT};
use crate::cmd::format::{
    Role, StyleOptions, TableOpts, box_header, color, emoji_prefix, table,
};
use crate::cmd::shared::{Aborted, bridge_client, runtime};
use crate::config::Settings;
use crate::helper::{self, HelperCommand};

pub const BRIDGE_GUI_SCRIPT: &str = "shadow_bridge_gui.py";

#[derive(Args, Debug)]
pub struct BridgeArgs {
    #[command(subcommand)]
    pub command: BridgeCommand,
}

#[derive(Subcommand, Debug)]
pub enum BridgeCommand {
    /// Start the ShadowBridge GUI/service
    Start,
    /// Check whether ShadowBridge is running and list connected devices
    Status {
        /// Output JSON instead of human-readable text
        #[arg(long)]
        json: bool,
    },
}

pub fn execute_bridge(args: BridgeArgs, settings: &Settings) -> Result<()> {
    match args.command {
        BridgeCommand::Start => start_bridge(settings),
        BridgeCommand::Status { json } => bridge_status(settings, json),
    }
}

/* ---- start ---- */

fn start_bridge(settings: &Settings) -> Result<()> {
    println!("Starting ShadowBridge...");
    let bridge_dir = settings.bridge_dir();
    let script = bridge_dir.join(BRIDGE_GUI_SCRIPT);
    helper::require_script(&script, "ShadowBridge")?;

    let cmd = HelperCommand::new(&settings.python)
        .arg(script.display().to_string())
        .current_dir(&bridge_dir);
    let pid = helper::spawn_detached(&cmd)?;

    if cfg!(windows) {
        println!("ShadowBridge launched in a new console.");
    } else {
        println!("ShadowBridge launched in the background (pid {pid}).");
    }
    Ok(())
}

/* ---- status ---- */

#[derive(Debug)]
pub enum BridgeState {
    Running {
        info: Option<Value>,
        devices: Vec<DeviceInfo>,
    },
    /// Something answered on the port, but not with 200.
    Degraded { status: u16, body: String },
    NotRunning { reason: BridgeError },
}

pub async fn probe_status(client: &BridgeClient) -> BridgeState {
    let reply = match client.try_get("/status").await {
        Ok(r) => r,
        Err(reason) => return BridgeState::NotRunning { reason },
    };
    if !reply.is_ok() {
        return BridgeState::Degraded {
            status: reply.status,
            body: reply.body_text(),
        };
    }

    // Device listing is best effort; an older bridge may not have it.
    let devices = match client.try_get("/devices").await {
        Ok(d) if d.is_ok() => d.data.as_ref().map(parse_devices).unwrap_or_default(),
        Ok(d) => {
            tracing::warn!(status = d.status, "device listing unavailable");
            Vec::new()
        }
        Err(e) => {
            tracing::warn!("device listing failed: {e}");
            Vec::new()
        }
    };

    BridgeState::Running {
        info: reply.data,
        devices,
    }
}

fn bridge_status(settings: &Settings, json_out: bool) -> Result<()> {
    let client = bridge_client(settings)?;
    let state = runtime()?.block_on(probe_status(&client));
    let url = client.base_url().as_str();

    if json_out {
        let out = match &state {
            BridgeState::Running { info, devices } => json!({
                "running": true, "url": url, "status": info, "devices": devices
            }),
            BridgeState::Degraded { status, body } => json!({
                "running": false, "url": url, "http_status": status, "body": body
            }),
            BridgeState::NotRunning { reason } => json!({
                "running": false, "url": url, "error": reason.to_string()
            }),
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&out).unwrap_or_else(|_| out.to_string())
        );
    } else {
        println!("{}", render_state(&state, url, &StyleOptions::detect()));
    }

    match state {
        BridgeState::Running { .. } => Ok(()),
        _ => Err(Aborted.into()),
    }
}

pub fn render_state(state: &BridgeState, url: &str, style: &StyleOptions) -> String {
    match state {
        BridgeState::NotRunning { reason } => format!(
            "{}ShadowBridge is {} ({reason})",
            emoji_prefix("error", style),
            color(Role::Error, "NOT running", style)
        ),
        BridgeState::Degraded { status, body } => format!(
            "{}ShadowBridge responded with status {status}: {body}",
            emoji_prefix("warn", style)
        ),
        BridgeState::Running { info, devices } => {
            let mut out = vec![box_header(
                format!("{}ShadowBridge", emoji_prefix("rocket", style)),
                Some(url),
                style,
            )];
            out.push(format!(
                "ShadowBridge is currently {}.",
                color(Role::Success, "RUNNING", style)
            ));
            if let Some(version) = info
                .as_ref()
                .and_then(|i| i.get("version"))
                .and_then(Value::as_str)
            {
                out.push(format!("Version: {version}"));
            }
            out.push(String::new());
            out.push(color(
                Role::Accent,
                format!("{}Connected devices ({})", emoji_prefix("phone", style), devices.len()),
                style,
            ));
            if devices.is_empty() {
                out.push(color(Role::Dim, "(none)", style));
            } else {
                let rows: Vec<Vec<String>> = devices
                    .iter()
                    .map(|d| {
                        vec![
                            d.id.clone(),
                            d.name.clone(),
                            d.platform.clone().unwrap_or_else(|| "-".into()),
                            match d.connected {
                                Some(true) => "yes".into(),
                                Some(false) => "no".into(),
                                None => "-".into(),
                            },
                        ]
                    })
                    .collect();
                out.push(table(
                    &["ID", "NAME", "PLATFORM", "CONNECTED"],
                    &rows,
                    TableOpts::default(),
                    style,
                ));
            }
            out.join("\n")
        }
    }
}

/* ---- ping ---- */

#[derive(Debug)]
pub enum PingResult {
    Connected,
    Status(u16),
    Unreachable(BridgeError),
}

pub async fn ping_bridge(client: &BridgeClient) -> PingResult {
    match client
        .try_request(Method::Get, "/status", None, PROBE_TIMEOUT)
        .await
    {
        Ok(reply) if reply.is_ok() => PingResult::Connected,
        Ok(reply) => PingResult::Status(reply.status),
        Err(e) => PingResult::Unreachable(e),
    }
}

pub fn execute_ping(settings: &Settings) -> Result<()> {
    let client = bridge_client(settings)?;
    let result = runtime()?.block_on(ping_bridge(&client));
    let style = StyleOptions::detect();

    match result {
        PingResult::Connected => {
            println!(
                "{}{}",
                emoji_prefix("success", &style),
                color(Role::Success, "Successfully connected to ShadowBridge.", &style)
            );
            Ok(())
        }
        PingResult::Status(code) => {
            eprintln!("ShadowBridge responded with status {code}.");
            Err(Aborted.into())
        }
        PingResult::Unreachable(e) => {
            eprintln!("{}", ping_failure_line(&e, client.base_url().as_str()));
            Err(Aborted.into())
        }
    }
}

/// Refused connections name the base URL; timeouts and other transport
/// failures keep their own wording.
fn ping_failure_line(err: &BridgeError, base: &str) -> String {
    tracing::debug!("ping failed: {err}");
    if err.is_unreachable() {
        format!("Error: Cannot reach ShadowBridge at {base}. Is it running?")
    } else {
        format!("Error: {err}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::test_support::{client_for, unreachable_client};
    use clap::Parser;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Parser, Debug)]
    struct TestCli {
        #[command(subcommand)]
        cmd: TestSub,
    }

    #[derive(clap::Subcommand, Debug)]
    enum TestSub {
        Bridge(BridgeArgs),
    }

    #[test]
    fn clap_parses_bridge_subcommands() {
        let cli = TestCli::try_parse_from(["t", "bridge", "status", "--json"]).unwrap();
        let TestSub::Bridge(args) = cli.cmd;
        assert!(matches!(args.command, BridgeCommand::Status { json: true }));

        let cli = TestCli::try_parse_from(["t", "bridge", "start"]).unwrap();
        let TestSub::Bridge(args) = cli.cmd;
        assert!(matches!(args.command, BridgeCommand::Start));
    }

    #[tokio::test]
    async fn status_lists_devices() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"version": "2.3.0"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/devices"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "devices": [{"id": "pixel-8", "name": "Pixel 8", "platform": "android", "connected": true}]
            })))
            .mount(&server)
            .await;

        let state = probe_status(&client_for(&server.uri())).await;
        let text = render_state(&state, "http://x/api", &StyleOptions::plain());
        assert!(text.contains("currently RUNNING"));
        assert!(text.contains("Version: 2.3.0"));
        assert!(text.contains("Connected devices (1)"));
        assert!(text.lines().any(|l| l.starts_with("pixel-8") && l.contains("android") && l.contains("yes")));
    }

    #[tokio::test]
    async fn status_survives_missing_device_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let state = probe_status(&client_for(&server.uri())).await;
        let BridgeState::Running { devices, .. } = state else {
            panic!("expected running");
        };
        assert!(devices.is_empty());
    }

    #[tokio::test]
    async fn status_when_unreachable() {
        let state = probe_status(&unreachable_client()).await;
        let text = render_state(&state, "http://x/api", &StyleOptions::plain());
        assert!(text.contains("NOT running"));
        assert!(text.contains("Cannot reach ShadowBridge"));
    }

    #[tokio::test]
    async fn ping_outcomes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/status"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        assert!(matches!(
            ping_bridge(&client_for(&server.uri())).await,
            PingResult::Connected
        ));

        let broken = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/status"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&broken)
            .await;
        assert!(matches!(
            ping_bridge(&client_for(&broken.uri())).await,
            PingResult::Status(500)
        ));

        let PingResult::Unreachable(e) = ping_bridge(&unreachable_client()).await else {
            panic!("expected unreachable");
        };
        assert_eq!(
            ping_failure_line(&e, "http://localhost:6767/api"),
            "Error: Cannot reach ShadowBridge at http://localhost:6767/api. Is it running?"
        );
        let timeout = BridgeError::Timeout {
            url: "http://localhost:6767/api/status".into(),
            secs: 2,
        };
        assert!(ping_failure_line(&timeout, "x").contains("timed out after 2s"));
    }

    #[test]
    fn start_without_bridge_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let settings = crate::config::resolve(crate::config::RawSettings {
            root: Some(dir.path().to_path_buf()),
            ..Default::default()
        })
        .unwrap();
        let err = start_bridge(&settings).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("ShadowBridge"));
        assert!(msg.contains(BRIDGE_GUI_SCRIPT));
    }
}
