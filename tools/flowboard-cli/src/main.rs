//! Flowboard CLI — Command-line interface for storyboards of generated clips.
//!
//! Usage:
//!   flowboard init                     Create an empty board
//!   flowboard add-frame --name <NAME>  Place a frame on the board
//!   flowboard graph                    Show the frame graph
//!   flowboard path <FRAME>             Show the path from a frame to its root
//!   flowboard generate <FRAME>         Start a generation job from a frame
//!   flowboard poll                     Drive pending jobs to completion
//!   flowboard trim <CONNECTOR>         Set where a clip stops playing
//!   flowboard merge <FRAME>            Merge the clips along a path
//!   flowboard check                    Check media tools and configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use flowboard_common::config::{AppConfig, LoggingConfig};

mod commands;

#[derive(Parser)]
#[command(
    name = "flowboard",
    about = "Branching storyboards of AI-generated video clips",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Board snapshot to operate on
    #[arg(short, long, global = true, default_value = "board.json")]
    board: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an empty board
    Init {
        /// Board name
        #[arg(short, long, default_value = "storyboard")]
        name: String,

        /// Overwrite an existing board file
        #[arg(long)]
        force: bool,
    },

    /// Place a new frame on the board
    AddFrame {
        /// Display name
        #[arg(short, long)]
        name: String,

        /// Source image (path or URL)
        #[arg(short, long)]
        image: Option<String>,

        /// Explicit frame id instead of a generated one
        #[arg(long)]
        id: Option<String>,
    },

    /// Print the frame graph as a tree
    Graph {
        /// Print graph nodes as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the path from a frame back to its root
    Path {
        /// Frame id
        frame: String,
    },

    /// Submit a generation job starting from a frame
    Generate {
        /// Source frame id
        frame: String,

        /// What should happen in the next shot
        #[arg(short, long)]
        prompt: String,

        /// Board-wide context shared by every shot
        #[arg(short, long, default_value = "")]
        context: String,

        /// Starting image (defaults to the frame's still or image)
        #[arg(short, long)]
        image: Option<String>,
    },

    /// Poll pending generation jobs
    Poll {
        /// Keep polling until no job is pending
        #[arg(long)]
        until_idle: bool,
    },

    /// Set or clear the trim point of a finished clip
    Trim {
        /// Connector id
        connector: String,

        /// Trim end in seconds
        #[arg(short, long, conflicts_with = "clear", required_unless_present = "clear")]
        end: Option<f64>,

        /// Remove the trim point
        #[arg(long)]
        clear: bool,
    },

    /// Merge the clips on the path to a frame into one video
    Merge {
        /// Frame at the end of the path
        frame: String,

        /// Output file (client-side merge only)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Ask the backend to merge instead of compositing locally
        #[arg(long)]
        remote: bool,
    },

    /// Check media tools and configuration
    Check,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load();
    let logging = if cli.verbose {
        LoggingConfig {
            level: "debug".to_string(),
            ..config.logging.clone()
        }
    } else {
        config.logging.clone()
    };
    flowboard_common::logging::init_logging(&logging);

    if !matches!(cli.command, Commands::Check) {
        config.validate()?;
    }

    let board = cli.board;
    match cli.command {
        Commands::Init { name, force } => commands::init::run(&board, name, force),
        Commands::AddFrame { name, image, id } => commands::add_frame::run(&board, name, image, id),
        Commands::Graph { json } => commands::graph::run(&board, json),
        Commands::Path { frame } => commands::path::run(&board, frame),
        Commands::Generate {
            frame,
            prompt,
            context,
            image,
        } => commands::generate::run(&board, &config, frame, prompt, context, image).await,
        Commands::Poll { until_idle } => commands::poll::run(&board, &config, until_idle).await,
        Commands::Trim {
            connector,
            end,
            clear,
        } => commands::trim::run(&board, connector, if clear { None } else { end }),
        Commands::Merge {
            frame,
            output,
            remote,
        } => commands::merge::run(&board, &config, frame, output, remote).await,
        Commands::Check => commands::check::run(&config).await,
    }
}
