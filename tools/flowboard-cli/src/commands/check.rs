//! Check media tools and configuration.

use flowboard_common::config::{config_file_path, AppConfig};
use flowboard_render_engine::ToolStatus;

pub async fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("Flowboard System Check");
    println!("{}", "=".repeat(50));

    let tools = ToolStatus::detect().await;
    for (name, present) in [("ffmpeg", tools.ffmpeg), ("ffprobe", tools.ffprobe)] {
        if present {
            println!("[OK] {name} found");
        } else {
            println!("[MISSING] {name} not found in PATH");
        }
    }

    println!();
    let path = config_file_path();
    if path.exists() {
        println!("[OK] Config: {}", path.display());
    } else {
        println!("[--] Config: {} (using defaults)", path.display());
    }
    println!("     Backend: {}", config.backend.base_url);
    println!(
        "     Poll interval: {} ms (halt on transport error: {})",
        config.poller.interval_ms, config.poller.halt_on_transport_error
    );
    println!(
        "     Merge: {} @ {} fps, background {}",
        config.compositor.format.extension(),
        config.compositor.fps,
        config.compositor.background
    );

    let valid = match config.validate() {
        Ok(()) => true,
        Err(e) => {
            println!("[ERROR] {e}");
            false
        }
    };

    println!();
    if tools.all_present() && valid {
        println!("Client-side merging is available. Flowboard is ready.");
    } else if valid {
        println!("Only server-side merging (--remote) is available.");
        println!("Install ffmpeg and ffprobe to merge locally.");
    } else {
        println!("Fix the configuration above before running other commands.");
    }

    Ok(())
}
