/*!
`gemini.rs`

`shadow gemini <args...>` forwards everything after `gemini` to the
`gemini.ps1` wrapper in the install root via PowerShell
(`powershell.exe -File` on Windows, `pwsh -File` elsewhere; override with
`SHADOW_POWERSHELL`). The terminal stays attached and the wrapper's exit
code becomes ours.
*/

use std::path::Path;

use anyhow::Result;
use clap::Args;

use crate::cmd::shared::runtime;
use crate::config::Settings;
use crate::helper::{self, HelperCommand};

pub const GEMINI_SCRIPT: &str = "gemini.ps1";

#[derive(Args, Debug)]
pub struct GeminiArgs {
    /// Arguments passed through to the Gemini CLI unchanged
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "ARGS")]
    pub args: Vec<String>,
}

/// Build the PowerShell invocation for the wrapper script.
pub fn gemini_command(settings: &Settings, script: &Path, passthrough: &[String]) -> HelperCommand {
    HelperCommand::new(&settings.powershell)
        .arg("-File")
        .arg(script.display().to_string())
        .args(passthrough.iter().cloned())
}

/// Returns the wrapper's exit code (`None` if it was killed by a signal).
pub fn execute_gemini(args: GeminiArgs, settings: &Settings) -> Result<Option<i32>> {
    let script = settings.root.join(GEMINI_SCRIPT);
    helper::require_script(&script, GEMINI_SCRIPT)?;

    let cmd = gemini_command(settings, &script, &args.args);
    let code = runtime()?.block_on(helper::run_inherited(&cmd))?;
    tracing::debug!(?code, "gemini wrapper exited");
    Ok(code)
}
