/*!
`agent.rs`

Implements `shadow agent <start|stop|status|scan|pause|resume>`.

Every action is a `POST /autonomous/<action>` against the bridge.

  - status : decodes an `AgentStatusReport` and renders it (state line,
             uptime, cycle count, agent table, queue counts, last 5 builds)
  - others : print the reply's `message`, or a generic acknowledgement
  - --json : print the raw reply body instead

A reply with `success: false` is reported and exits non-zero.
*/

use anyhow::{Context, Result};
use clap::Args;
use serde_json::Value;

use crate::bridge::{AgentStatusReport, BridgeClient};
use crate::cmd::action::AgentAction;
use crate::cmd::format::{
    Role, StyleOptions, TableOpts, box_header, color, emoji_prefix, format_duration, table,
};
use crate::cmd::shared::{Aborted, bridge_client, reported_failure, require_ok, runtime};
use crate::config::Settings;

/// Number of build history entries shown by `agent status`.
pub const RECENT_BUILDS: usize = 5;

#[derive(Args, Debug)]
pub struct AgentArgs {
    /// Action to perform
    pub action: AgentAction,

    /// Print the raw JSON reply
    #[arg(long)]
    pub json: bool,
}

pub fn execute_agent(args: AgentArgs, settings: &Settings) -> Result<()> {
    let client = bridge_client(settings)?;
    let data = runtime()?.block_on(run_action(&client, args.action))?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&data).unwrap_or_else(|_| data.to_string())
        );
        return match reported_failure(&data) {
            Some(_) => Err(Aborted.into()),
            None => Ok(()),
        };
    }

    let style = StyleOptions::detect();
    if let Some(err) = reported_failure(&data) {
        eprintln!(
            "{}{}",
            emoji_prefix("error", &style),
            color(Role::Error, format!("Agent {} failed: {err}", args.action), &style)
        );
        return Err(Aborted.into());
    }

    if args.action.is_report() {
        let report = decode_report(&data)?;
        println!("{}", render_agent_status(&report, &style));
    } else {
        println!("{}", render_ack(args.action, &data, &style));
    }
    Ok(())
}

/// Issue the action and return the 200 body (`null` when empty).
pub async fn run_action(client: &BridgeClient, action: AgentAction) -> Result<Value> {
    let reply = client.post(&action.endpoint(), None).await;
    Ok(require_ok(reply)?.unwrap_or(Value::Null))
}

pub fn decode_report(data: &Value) -> Result<AgentStatusReport> {
    // Some bridge builds wrap the report as {"status": {...}}.
    let body = match data.get("status") {
        Some(inner @ Value::Object(_)) => inner,
        _ => data,
    };
    serde_json::from_value(body.clone()).context("Unexpected agent status reply from ShadowBridge")
}

fn render_ack(action: AgentAction, data: &Value, style: &StyleOptions) -> String {
    let text = data
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("Autonomous agents: {action} request accepted"));
    format!("{}{}", emoji_prefix("success", style), color(Role::Success, text, style))
}

fn state_role(report: &AgentStatusReport) -> Role {
    match report.state_label() {
        "RUNNING" => Role::Success,
        "PAUSED" => Role::Warning,
        _ => Role::Dim,
    }
}

/// Human rendering of an agent status report.
pub fn render_agent_status(report: &AgentStatusReport, style: &StyleOptions) -> String {
    let mut out: Vec<String> = Vec::new();
    let state = report.state_label();

    out.push(box_header(
        format!("{}Autonomous Agents", emoji_prefix("robot", style)),
        Some(state),
        style,
    ));
    out.push(format!("Status:  {}", color(state_role(report), state, style)));
    out.push(format!("Uptime:  {}", report.uptime.as_deref().unwrap_or("N/A")));
    out.push(format!("Cycles:  {}", report.cycle_count));
    out.push(String::new());

    out.push(color(Role::Accent, format!("Agents ({})", report.agents.len()), style));
    if report.agents.is_empty() {
        out.push(color(Role::Dim, "(no agents registered)", style));
    } else {
        let rows: Vec<Vec<String>> = report
            .agents
            .iter()
            .map(|(id, a)| {
                vec![
                    id.clone(),
                    a.name.clone(),
                    a.role.clone(),
                    a.provider.clone(),
                    a.status.clone(),
                    a.tasks_completed.to_string(),
                ]
            })
            .collect();
        out.push(table(
            &["ID", "NAME", "ROLE", "PROVIDER", "STATUS", "TASKS"],
            &rows,
            TableOpts {
                max_col_width: 24,
                ..Default::default()
            },
            style,
        ));
    }
    out.push(String::new());

    out.push(format!(
        "Task queue:  pending {} | in progress {} | completed {} | failed {}",
        report.tasks_pending, report.tasks_in_progress, report.tasks_completed, report.tasks_failed
    ));
    out.push(String::new());

    out.push(color(
        Role::Accent,
        format!("Recent builds (last {RECENT_BUILDS})"),
        style,
    ));
    let builds = report.recent_builds(RECENT_BUILDS);
    if builds.is_empty() {
        out.push(color(Role::Dim, "(no builds yet)", style));
    }
    for b in builds {
        let mark = match (b.success, style.use_emoji) {
            (true, true) => color(Role::Success, "✔", style),
            (false, true) => color(Role::Error, "✖", style),
            (true, false) => color(Role::Success, "[ok]  ", style),
            (false, false) => color(Role::Error, "[fail]", style),
        };
        out.push(format!(
            "  {mark} {:<12} {:>8}  {}",
            b.build_type,
            format_duration(b.duration_seconds),
            b.timestamp
        ));
    }

    out.join("\n")
}
