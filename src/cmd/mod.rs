/*!
Command dispatcher module.

One file per subcommand family; this file only declares modules and
re-exports what `main.rs` needs.

  src/cmd/
    mod.rs          (this file)
    action.rs       (AgentAction enum + endpoint mapping)
    agent.rs        (AgentArgs    + execute_agent)
    bridge.rs       (BridgeArgs   + execute_bridge, execute_ping)
    gemini.rs       (GeminiArgs   + execute_gemini)
    media.rs        (Image/Audio/VideoArgs + execute_image/audio/video)
    transfer.rs     (PushArgs/PullArgs + execute_push/pull)
    format.rs       (color / emoji / table rendering)
    shared.rs       (runtime, Aborted, bridge reply checks)

Conventions:
  - Each subcommand module exposes `execute_*` functions that return
    `anyhow::Result`.
  - Argument structs derive `clap::Args` and are kept minimal.
  - Async work (bridge HTTP, helper processes) is driven with
    `shared::runtime().block_on(..)`; the async core is public so tests
    can call it directly under `#[tokio::test]`.
*/

pub mod action;
pub mod agent;
pub mod bridge;
pub mod format;
pub mod gemini;
pub mod media;
pub mod shared;
pub mod transfer;

pub use agent::{AgentArgs, execute_agent};
pub use bridge::{BridgeArgs, execute_bridge, execute_ping};
pub use gemini::{GeminiArgs, execute_gemini};
pub use media::{AudioArgs, ImageArgs, VideoArgs, execute_audio, execute_image, execute_video};
pub use shared::Aborted;
pub use transfer::{PullArgs, PushArgs, execute_pull, execute_push};
