use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

mod bridge;
mod cmd;
mod config;
mod helper;
mod utils;

use cmd::{
    Aborted, AgentArgs, AudioArgs, BridgeArgs, GeminiArgs, ImageArgs, PullArgs, PushArgs,
    VideoArgs,
};
use cmd::format::{Role, StyleOptions, color};

/// ShadowAI unified CLI.
///
/// Command layout:
///   shadow bridge <start|status> [--json]
///   shadow image generate <prompt> [--model M] [--steps N]
///   shadow audio <synth|convert> ...
///   shadow video generate <prompt> [--model M] [--duration S]
///   shadow gemini [ARGS...]            (passed through to gemini.ps1)
///   shadow ping
///   shadow push <path> [--device ID]
///   shadow pull <file_id> [-o PATH] [--yes]
///   shadow agent <start|stop|status|scan|pause|resume> [--json]
///
/// Global flags / env:
///   -v / -vv        Increase verbosity (RUST_LOG overrides)
///   -q / --quiet    Errors only
///   --bridge-url    Bridge API base (or SHADOW_BRIDGE_URL)
///   --root          Install root (or SHADOW_ROOT)
///   --config        Settings file (or SHADOW_CONFIG)
///
/// Exit codes: 0 success, 1 command failure, 2 usage/config error; `gemini`
/// exits with the wrapper's own code.
#[derive(Parser, Debug)]
#[command(
    name = "shadow",
    version,
    author,
    about = "ShadowAI Unified CLI - Control your AI ecosystem from the terminal.",
    propagate_version = true,
    disable_help_subcommand = true
)]
pub struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Silence all non-error output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// ShadowBridge API base URL
    #[arg(long, global = true, value_name = "URL")]
    bridge_url: Option<String>,

    /// ShadowAI install root (contains shadow-bridge/ and gemini.ps1)
    #[arg(long, global = true, value_name = "DIR")]
    root: Option<PathBuf>,

    /// Settings file (YAML or JSON)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage ShadowBridge
    Bridge(BridgeArgs),

    /// Image generation
    Image(ImageArgs),

    /// Audio generation and processing
    Audio(AudioArgs),

    /// Video generation
    Video(VideoArgs),

    /// Gemini CLI passthrough
    Gemini(GeminiArgs),

    /// Check connection to ShadowBridge
    Ping,

    /// Push a file to a connected device
    Push(PushArgs),

    /// Pull a file from a connected device
    Pull(PullArgs),

    /// Control the autonomous agent loop
    Agent(AgentArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let level = utils::derive_level(cli.verbose, cli.quiet);
    utils::init_logging(level);

    // Settings: defaults < config file < env < flags
    let overrides = config::RawSettings {
        root: cli.root.clone(),
        bridge_url: cli.bridge_url.clone(),
        ..Default::default()
    };
    let settings = match config::load(cli.config.as_deref(), overrides) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            return ExitCode::from(2);
        }
    };
    tracing::debug!(root = %settings.root.display(), bridge = %settings.bridge_url, "settings resolved");

    let result = match cli.command {
        Commands::Bridge(args) => cmd::execute_bridge(args, &settings),
        Commands::Image(args) => cmd::execute_image(args, &settings),
        Commands::Audio(args) => cmd::execute_audio(args, &settings),
        Commands::Video(args) => cmd::execute_video(args, &settings),
        Commands::Gemini(args) => {
            return match cmd::execute_gemini(args, &settings) {
                Ok(code) => ExitCode::from(child_status(code)),
                Err(e) => fail(e),
            };
        }
        Commands::Ping => cmd::execute_ping(&settings),
        Commands::Push(args) => cmd::execute_push(args, &settings),
        Commands::Pull(args) => cmd::execute_pull(args, &settings),
        Commands::Agent(args) => cmd::execute_agent(args, &settings),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => fail(e),
    }
}

fn fail(err: anyhow::Error) -> ExitCode {
    if err.downcast_ref::<Aborted>().is_none() {
        let style = StyleOptions::detect();
        eprintln!("{}", color(Role::Error, format!("Error: {err:#}"), &style));
    }
    ExitCode::FAILURE
}

/// Child exit code as ours; a signal-killed child counts as failure.
fn child_status(code: Option<i32>) -> u8 {
    match code {
        Some(c) => u8::try_from(c).unwrap_or(1),
        None => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "shadow",
            "ping",
            "--bridge-url",
            "http://10.0.0.2:6767/api",
            "-vv",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Ping));
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.bridge_url.as_deref(), Some("http://10.0.0.2:6767/api"));
    }

    #[test]
    fn unknown_subcommand_is_usage_error() {
        let err = Cli::try_parse_from(["shadow", "teleport"]).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn child_exit_codes_map_through() {
        assert_eq!(child_status(Some(0)), 0);
        assert_eq!(child_status(Some(3)), 3);
        assert_eq!(child_status(Some(-1)), 1);
        assert_eq!(child_status(None), 1);
    }
}
