/*!
`media.rs`

`image generate`, `audio synth|convert`, `video generate`.

These are pass-through wrappers: each runs a helper script from the bridge
directory to completion, captures stdout and looks for a JSON payload
between `<<<JSON_START>>>` and `<<<JSON_END>>>`:

  {"success": true,  "file_path": "out.png"}   -> success, path reported
  {"success": false, "error": "CUDA OOM"}      -> failure, error reported

Output without markers is echoed verbatim (plus stderr if the helper
exited non-zero).
*/

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Deserialize;

use crate::cmd::format::{Role, StyleOptions, color, emoji_prefix};
use crate::cmd::shared::{Aborted, runtime};
use crate::config::Settings;
use crate::helper::{self, CapturedOutput, HelperCommand};

/* ---- Arguments ---- */

#[derive(Args, Debug)]
pub struct ImageArgs {
    #[command(subcommand)]
    pub command: ImageCommand,
}

#[derive(Subcommand, Debug)]
pub enum ImageCommand {
    /// Generate an image using the local backend
    Generate {
        prompt: String,
        /// Model to use
        #[arg(long, default_value = "sd-xl-turbo")]
        model: String,
        /// Inference steps
        #[arg(long, default_value_t = 4)]
        steps: u32,
    },
}

#[derive(Args, Debug)]
pub struct AudioArgs {
    #[command(subcommand)]
    pub command: AudioCommand,
}

#[derive(Subcommand, Debug)]
pub enum AudioCommand {
    /// Synthesize speech from text
    Synth {
        text: String,
        /// Voice preset
        #[arg(long)]
        voice: Option<String>,
        /// Output file
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Convert an audio file to another format
    Convert {
        input: PathBuf,
        /// Target format
        #[arg(long, default_value = "wav")]
        format: String,
        /// Output file
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
pub struct VideoArgs {
    #[command(subcommand)]
    pub command: VideoCommand,
}

#[derive(Subcommand, Debug)]
pub enum VideoCommand {
    /// Generate a short video clip from a prompt
    Generate {
        prompt: String,
        /// Model to use (helper default when omitted)
        #[arg(long)]
        model: Option<String>,
        /// Clip length in seconds
        #[arg(long, value_name = "SECONDS")]
        duration: Option<u32>,
    },
}

/* ---- Helper tasks ---- */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Audio,
    Video,
}

impl MediaKind {
    pub fn script(&self) -> &'static str {
        match self {
            MediaKind::Image => "shadow_image_cli.py",
            MediaKind::Audio => "shadow_audio_cli.py",
            MediaKind::Video => "shadow_video_cli.py",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MediaKind::Image => "Image",
            MediaKind::Audio => "Audio",
            MediaKind::Video => "Video",
        }
    }

    fn emoji_tag(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
        }
    }
}

/// One helper invocation: which script, what it reports, and its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelperTask {
    pub kind: MediaKind,
    /// Past tense used in the success line ("generated", "converted").
    pub verb: &'static str,
    pub args: Vec<String>,
}

fn push_opt(args: &mut Vec<String>, flag: &str, value: Option<String>) {
    if let Some(v) = value {
        args.push(flag.to_string());
        args.push(v);
    }
}

impl From<ImageCommand> for HelperTask {
    fn from(cmd: ImageCommand) -> Self {
        match cmd {
            ImageCommand::Generate {
                prompt,
                model,
                steps,
            } => HelperTask {
                kind: MediaKind::Image,
                verb: "generated",
                args: vec![
                    "generate".into(),
                    prompt,
                    "--model".into(),
                    model,
                    "--steps".into(),
                    steps.to_string(),
                ],
            },
        }
    }
}

impl From<AudioCommand> for HelperTask {
    fn from(cmd: AudioCommand) -> Self {
        match cmd {
            AudioCommand::Synth {
                text,
                voice,
                output,
            } => {
                let mut args = vec!["synth".to_string(), text];
                push_opt(&mut args, "--voice", voice);
                push_opt(&mut args, "--output", output.map(|p| p.display().to_string()));
                HelperTask {
                    kind: MediaKind::Audio,
                    verb: "generated",
                    args,
                }
            }
            AudioCommand::Convert {
                input,
                format,
                output,
            } => {
                let mut args = vec![
                    "convert".to_string(),
                    input.display().to_string(),
                    "--format".into(),
                    format,
                ];
                push_opt(&mut args, "--output", output.map(|p| p.display().to_string()));
                HelperTask {
                    kind: MediaKind::Audio,
                    verb: "converted",
                    args,
                }
            }
        }
    }
}

impl From<VideoCommand> for HelperTask {
    fn from(cmd: VideoCommand) -> Self {
        match cmd {
            VideoCommand::Generate {
                prompt,
                model,
                duration,
            } => {
                let mut args = vec!["generate".to_string(), prompt];
                push_opt(&mut args, "--model", model);
                push_opt(&mut args, "--duration", duration.map(|d| d.to_string()));
                HelperTask {
                    kind: MediaKind::Video,
                    verb: "generated",
                    args,
                }
            }
        }
    }
}

/* ---- Outcome ---- */

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GenerationPayload {
    pub success: bool,
    pub file_path: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    Succeeded { file_path: Option<String> },
    Failed { error: String },
    /// No sentinel payload; the helper's own output is all we have.
    Unstructured {
        stdout: String,
        stderr: String,
        exit_ok: bool,
    },
}

impl GenerationOutcome {
    pub fn from_output(captured: &CapturedOutput) -> Result<Self> {
        let Some(value) = helper::extract_json_payload(&captured.stdout)? else {
            return Ok(GenerationOutcome::Unstructured {
                stdout: captured.stdout.clone(),
                stderr: captured.stderr.clone(),
                exit_ok: captured.success(),
            });
        };
        let payload: GenerationPayload = serde_json::from_value(value)?;
        Ok(if payload.success {
            GenerationOutcome::Succeeded {
                file_path: payload.file_path,
            }
        } else {
            GenerationOutcome::Failed {
                error: payload.error.unwrap_or_else(|| "Unknown error".into()),
            }
        })
    }

    pub fn is_success(&self) -> bool {
        match self {
            GenerationOutcome::Succeeded { .. } => true,
            GenerationOutcome::Failed { .. } => false,
            GenerationOutcome::Unstructured { exit_ok, .. } => *exit_ok,
        }
    }

    /// One-line summary for the structured cases.
    pub fn summary(&self, task: &HelperTask) -> Option<String> {
        match self {
            GenerationOutcome::Succeeded { file_path } => Some(format!(
                "{} {} successfully: {}",
                task.kind.label(),
                task.verb,
                file_path.as_deref().unwrap_or("Path not returned")
            )),
            GenerationOutcome::Failed { error } => Some(format!("Generation failed: {error}")),
            GenerationOutcome::Unstructured { .. } => None,
        }
    }
}

/* ---- Execution ---- */

/// Run the helper for `task` and interpret its output.
pub fn run_task(settings: &Settings, task: &HelperTask) -> Result<GenerationOutcome> {
    let bridge_dir = settings.bridge_dir();
    let script = bridge_dir.join(task.kind.script());
    helper::require_script(&script, task.kind.script())?;

    let cmd = HelperCommand::new(&settings.python)
        .arg(script.display().to_string())
        .args(task.args.iter().cloned())
        .current_dir(&bridge_dir);

    let captured = runtime()?.block_on(helper::run_captured(&cmd))?;
    GenerationOutcome::from_output(&captured)
}

fn report(task: &HelperTask, outcome: &GenerationOutcome) -> Result<()> {
    let style = StyleOptions::detect();
    match outcome {
        GenerationOutcome::Succeeded { .. } => {
            if let Some(line) = outcome.summary(task) {
                println!(
                    "{}{}",
                    emoji_prefix(task.kind.emoji_tag(), &style),
                    color(Role::Success, line, &style)
                );
            }
        }
        GenerationOutcome::Failed { .. } => {
            if let Some(line) = outcome.summary(task) {
                eprintln!("{}{}", emoji_prefix("error", &style), color(Role::Error, line, &style));
            }
        }
        GenerationOutcome::Unstructured {
            stdout,
            stderr,
            exit_ok,
        } => {
            print!("{stdout}");
            if !exit_ok {
                eprint!("{stderr}");
            }
        }
    }

    if outcome.is_success() {
        Ok(())
    } else {
        Err(Aborted.into())
    }
}

pub fn execute_image(args: ImageArgs, settings: &Settings) -> Result<()> {
    let task = HelperTask::from(args.command);
    let outcome = run_task(settings, &task)?;
    report(&task, &outcome)
}

pub fn execute_audio(args: AudioArgs, settings: &Settings) -> Result<()> {
    let task = HelperTask::from(args.command);
    let outcome = run_task(settings, &task)?;
    report(&task, &outcome)
}

pub fn execute_video(args: VideoArgs, settings: &Settings) -> Result<()> {
    let task = HelperTask::from(args.command);
    let outcome = run_task(settings, &task)?;
    report(&task, &outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RawSettings, resolve};
    use clap::Parser;

    #[derive(Parser, Debug)]
    struct TestCli {
        #[command(subcommand)]
        cmd: TestSub,
    }

    #[derive(clap::Subcommand, Debug)]
    enum TestSub {
        Image(ImageArgs),
        Audio(AudioArgs),
        Video(VideoArgs),
    }

    fn captured(stdout: &str, code: i32) -> CapturedOutput {
        CapturedOutput {
            stdout: stdout.into(),
            stderr: "traceback".into(),
            code: Some(code),
        }
    }

    fn image_task() -> HelperTask {
        HelperTask::from(ImageCommand::Generate {
            prompt: "a fox".into(),
            model: "sd-xl-turbo".into(),
            steps: 4,
        })
    }

    #[test]
    fn image_defaults_build_helper_args() {
        let cli = TestCli::try_parse_from(["t", "image", "generate", "a red fox"]).unwrap();
        let TestSub::Image(args) = cli.cmd else {
            panic!("expected image");
        };
        let task = HelperTask::from(args.command);
        assert_eq!(task.kind.script(), "shadow_image_cli.py");
        assert_eq!(
            task.args,
            vec!["generate", "a red fox", "--model", "sd-xl-turbo", "--steps", "4"]
        );
    }

    #[test]
    fn audio_and_video_args() {
        let cli = TestCli::try_parse_from(["t", "audio", "synth", "hello", "--voice", "amy"]).unwrap();
        let TestSub::Audio(args) = cli.cmd else {
            panic!("expected audio");
        };
        assert_eq!(HelperTask::from(args.command).args, vec!["synth", "hello", "--voice", "amy"]);

        let cli = TestCli::try_parse_from(["t", "audio", "convert", "in.mp3", "--format", "ogg"]).unwrap();
        let TestSub::Audio(args) = cli.cmd else {
            panic!("expected audio");
        };
        let task = HelperTask::from(args.command);
        assert_eq!(task.verb, "converted");
        assert_eq!(task.args, vec!["convert", "in.mp3", "--format", "ogg"]);

        let cli = TestCli::try_parse_from(["t", "video", "generate", "waves", "--duration", "6"]).unwrap();
        let TestSub::Video(args) = cli.cmd else {
            panic!("expected video");
        };
        let task = HelperTask::from(args.command);
        assert_eq!(task.kind, MediaKind::Video);
        assert_eq!(task.args, vec!["generate", "waves", "--duration", "6"]);
    }

    #[test]
    fn sentinel_success_reports_path() {
        let out = captured(
            "Loading pipeline...\n<<<JSON_START>>>{\"success\":true,\"file_path\":\"x.png\"}<<<JSON_END>>>\n",
            0,
        );
        let outcome = GenerationOutcome::from_output(&out).unwrap();
        assert_eq!(
            outcome,
            GenerationOutcome::Succeeded {
                file_path: Some("x.png".into())
            }
        );
        assert!(outcome.is_success());
        assert_eq!(
            outcome.summary(&image_task()).unwrap(),
            "Image generated successfully: x.png"
        );
    }

    #[test]
    fn sentinel_failure_reports_error() {
        let out = captured("<<<JSON_START>>>{\"success\":false,\"error\":\"CUDA OOM\"}<<<JSON_END>>>", 1);
        let outcome = GenerationOutcome::from_output(&out).unwrap();
        assert!(!outcome.is_success());
        assert_eq!(outcome.summary(&image_task()).unwrap(), "Generation failed: CUDA OOM");

        let bare = captured("<<<JSON_START>>>{\"success\":false}<<<JSON_END>>>", 0);
        assert_eq!(
            GenerationOutcome::from_output(&bare).unwrap().summary(&image_task()).unwrap(),
            "Generation failed: Unknown error"
        );
    }

    #[test]
    fn success_without_path() {
        let out = captured("<<<JSON_START>>>{\"success\":true}<<<JSON_END>>>", 0);
        let summary = GenerationOutcome::from_output(&out).unwrap().summary(&image_task());
        assert_eq!(summary.unwrap(), "Image generated successfully: Path not returned");
    }

    #[test]
    fn no_sentinel_is_unstructured() {
        let outcome = GenerationOutcome::from_output(&captured("just text\n", 2)).unwrap();
        assert!(!outcome.is_success());
        assert!(outcome.summary(&image_task()).is_none());
        let GenerationOutcome::Unstructured { stdout, .. } = outcome else {
            panic!("expected unstructured");
        };
        assert_eq!(stdout, "just text\n");
    }

    #[test]
    fn missing_helper_script_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let settings = resolve(RawSettings {
            root: Some(dir.path().to_path_buf()),
            ..Default::default()
        })
        .unwrap();
        let err = run_task(&settings, &image_task()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("shadow_image_cli.py"), "{msg}");
    }

    #[cfg(unix)]
    #[test]
    fn helper_script_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = dir.path().join("shadow-bridge");
        std::fs::create_dir_all(&bridge).unwrap();
        std::fs::write(
            bridge.join("shadow_image_cli.py"),
            "echo \"args: $*\"\necho '<<<JSON_START>>>{\"success\":true,\"file_path\":\"x.png\"}<<<JSON_END>>>'\n",
        )
        .unwrap();

        let settings = resolve(RawSettings {
            root: Some(dir.path().to_path_buf()),
            python: Some("sh".into()),
            ..Default::default()
        })
        .unwrap();

        let outcome = run_task(&settings, &image_task()).unwrap();
        assert_eq!(
            outcome.summary(&image_task()).unwrap(),
            "Image generated successfully: x.png"
        );
    }
}
