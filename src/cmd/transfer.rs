/*!
`transfer.rs`

  shadow push <path> [--device ID]        multipart POST /mobile/push
  shadow pull <file_id> [-o PATH] [--yes] streamed GET /mobile/pull/{id}

`push` validates the local file (exists, regular file, under the upload
limit) before any request is made. `pull` asks before overwriting an
existing output file; declining leaves it untouched and sends nothing.
*/

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Args;
use dialoguer::Confirm;
use thiserror::Error;

use crate::bridge::BridgeClient;
use crate::cmd::format::{Role, StyleOptions, color, emoji_prefix};
use crate::cmd::shared::{bridge_client, require_ok, runtime};
use crate::config::Settings;
use crate::utils::human_bytes;

#[derive(Error, Debug)]
pub enum TransferError {
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Not a regular file: {}", .0.display())]
    NotAFile(PathBuf),

    #[error("{} is {} which exceeds the upload limit of {}", .path.display(), size_text(.size), size_text(.limit))]
    TooLarge { path: PathBuf, size: u64, limit: u64 },

    #[error("Invalid file id '{0}'")]
    InvalidId(String),

    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn size_text(bytes: &u64) -> String {
    human_bytes(*bytes)
}

#[derive(Args, Debug)]
pub struct PushArgs {
    /// File to send
    pub path: PathBuf,

    /// Target device id (bridge default when omitted)
    #[arg(long, value_name = "ID")]
    pub device: Option<String>,
}

#[derive(Args, Debug)]
pub struct PullArgs {
    /// Id of the file on the device
    pub file_id: String,

    /// Where to write the file (defaults to the file id in the current directory)
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Overwrite an existing output file without asking
    #[arg(short, long)]
    pub yes: bool,
}

/* ---- push ---- */

/// Size of `path` if it may be uploaded.
pub fn validate_upload(path: &Path, limit: u64) -> Result<u64, TransferError> {
    let meta = std::fs::metadata(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            TransferError::NotFound(path.to_path_buf())
        } else {
            TransferError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;
    if !meta.is_file() {
        return Err(TransferError::NotAFile(path.to_path_buf()));
    }
    let size = meta.len();
    if size > limit {
        return Err(TransferError::TooLarge {
            path: path.to_path_buf(),
            size,
            limit,
        });
    }
    Ok(size)
}

/// Validate, upload, and return the line to print.
pub async fn push_file(
    client: &BridgeClient,
    path: &Path,
    device: Option<&str>,
    limit: u64,
) -> Result<String> {
    let size = validate_upload(path, limit)?;

    let mut fields = Vec::new();
    if let Some(id) = device {
        fields.push(("device_id", id.to_string()));
    }
    tracing::info!(path = %path.display(), size, "pushing file");

    let reply = client.upload("/mobile/push", path, &fields).await;
    let message = reply.message().map(str::to_string);
    require_ok(reply)?;

    Ok(message.unwrap_or_else(|| {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        format!("Pushed {name} ({})", human_bytes(size))
    }))
}

pub fn execute_push(args: PushArgs, settings: &Settings) -> Result<()> {
    let client = bridge_client(settings)?;
    let message = runtime()?.block_on(push_file(
        &client,
        &args.path,
        args.device.as_deref(),
        settings.max_upload_bytes,
    ))?;
    let style = StyleOptions::detect();
    println!(
        "{}{}",
        emoji_prefix("phone", &style),
        color(Role::Success, message, &style)
    );
    Ok(())
}

/* ---- pull ---- */

#[derive(Debug, PartialEq, Eq)]
pub enum PullOutcome {
    Saved { dest: PathBuf, bytes: u64 },
    Cancelled,
}

/// Ids are opaque to us but must not be empty or a dot segment.
fn check_file_id(file_id: &str) -> Result<(), TransferError> {
    match file_id {
        "" | "." | ".." => Err(TransferError::InvalidId(file_id.to_string())),
        _ => Ok(()),
    }
}

/// Bridge path for an id, escaped as a single path segment.
pub fn pull_endpoint(file_id: &str) -> Result<String, TransferError> {
    check_file_id(file_id)?;
    Ok(format!("/mobile/pull/{}", urlencoding::encode(file_id)))
}

/// Without `-o`, the last component of the id in the current directory.
pub fn pull_destination(file_id: &str, output: Option<&Path>) -> Result<PathBuf, TransferError> {
    if let Some(p) = output {
        return Ok(p.to_path_buf());
    }
    Path::new(file_id)
        .file_name()
        .map(PathBuf::from)
        .ok_or_else(|| TransferError::InvalidId(file_id.to_string()))
}

/// `confirm` is only consulted when `dest` already exists and `assume_yes`
/// is off.
pub async fn pull_file<F>(
    client: &BridgeClient,
    file_id: &str,
    dest: &Path,
    assume_yes: bool,
    confirm: F,
) -> Result<PullOutcome>
where
    F: FnOnce(&Path) -> Result<bool>,
{
    let endpoint = pull_endpoint(file_id)?;
    if dest.exists() && !assume_yes && !confirm(dest)? {
        return Ok(PullOutcome::Cancelled);
    }

    let download = client.download(&endpoint, dest).await;
    require_ok(download.as_reply())?;

    Ok(PullOutcome::Saved {
        dest: dest.to_path_buf(),
        bytes: download.bytes_written,
    })
}

fn confirm_overwrite(dest: &Path) -> Result<bool> {
    let answer = Confirm::new()
        .with_prompt(format!("{} already exists. Overwrite?", dest.display()))
        .default(false)
        .interact()?;
    Ok(answer)
}

pub fn execute_pull(args: PullArgs, settings: &Settings) -> Result<()> {
    let client = bridge_client(settings)?;
    let dest = pull_destination(&args.file_id, args.output.as_deref())?;
    let outcome = runtime()?.block_on(pull_file(
        &client,
        &args.file_id,
        &dest,
        args.yes,
        confirm_overwrite,
    ))?;

    let style = StyleOptions::detect();
    match outcome {
        PullOutcome::Cancelled => println!("{}", color(Role::Warning, "Cancelled", &style)),
        PullOutcome::Saved { dest, bytes } => println!(
            "{}{}",
            emoji_prefix("success", &style),
            color(
                Role::Success,
                format!("Saved {} ({})", dest.display(), human_bytes(bytes)),
                &style
            )
        ),
    }
    Ok(())
}
