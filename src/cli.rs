// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Args, Parser, Subcommand};
use shipyard::output::OutputMode;
use shipyard::queue::TaskStatus;
use shipyard::unit::UserInfo;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "shipyard")]
#[command(about = "Self-hosted deployment control plane for Podman Quadlet hosts")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print final results
    #[arg(short, long, global = true, conflicts_with = "json")]
    pub quiet: bool,

    /// Print JSON lines
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn output_mode(&self) -> OutputMode {
        if self.json {
            OutputMode::Json
        } else if self.quiet {
            OutputMode::Quiet
        } else {
            OutputMode::Normal
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new shipyard.yml configuration file
    Init {
        /// Target host, e.g. deploy@web1.internal:22 (repeatable)
        #[arg(long = "host")]
        hosts: Vec<String>,

        /// Overwrite an existing shipyard.yml
        #[arg(short, long)]
        force: bool,
    },

    /// Render a TOML deploy descriptor into a .container unit
    Render(RenderArgs),

    /// Show what a .container unit declares
    Inspect {
        /// Unit file to read
        unit: PathBuf,
    },

    /// Set the image of a .container unit, leaving everything else untouched
    PatchImage {
        /// Unit file to patch
        unit: PathBuf,

        /// New image reference
        image: String,

        /// Rewrite the file instead of printing the result
        #[arg(short, long)]
        in_place: bool,
    },

    /// Check that a .container unit has its mandatory sections
    Validate {
        /// Unit file to check
        unit: PathBuf,
    },

    /// Create or update the control-plane database schema
    Migrate,

    /// List build tasks
    Tasks {
        /// Only tasks in this status
        #[arg(short, long, default_value = "pending")]
        status: TaskStatus,
    },

    /// Inspect rollouts
    Rollout {
        #[command(subcommand)]
        command: RolloutCommand,
    },
}

#[derive(Args)]
pub struct RenderArgs {
    /// Deploy descriptor (TOML)
    pub descriptor: PathBuf,

    /// Pin the image for this release id
    #[arg(short, long)]
    pub release: Option<String>,

    /// Add a directory bootstrap owned by UID:GID
    #[arg(long, value_parser = parse_owner, requires = "release")]
    pub owner: Option<UserInfo>,

    /// Print the environment file instead of the unit
    #[arg(long)]
    pub env_file: bool,
}

#[derive(Subcommand)]
pub enum RolloutCommand {
    /// Record a new rollout of a release to the configured hosts
    Create(CreateRolloutArgs),

    /// Show a rollout and its nodes
    Show {
        /// Rollout id
        id: String,
    },

    /// List rollouts of an application, newest first
    List {
        /// Application id
        app: String,
    },
}

#[derive(Args)]
pub struct CreateRolloutArgs {
    /// Deploy descriptor (TOML)
    pub descriptor: PathBuf,

    /// Release id whose image is deployed
    #[arg(short, long)]
    pub release: String,

    /// Target host id, overriding the configured hosts (repeatable)
    #[arg(long = "host")]
    pub hosts: Vec<String>,
}

fn parse_owner(s: &str) -> Result<UserInfo, String> {
    let (uid, gid) = s
        .split_once(':')
        .ok_or_else(|| format!("expected UID:GID, got {s:?}"))?;
    Ok(UserInfo {
        uid: uid.parse().map_err(|_| format!("invalid uid: {uid}"))?,
        gid: gid.parse().map_err(|_| format!("invalid gid: {gid}"))?,
    })
}
