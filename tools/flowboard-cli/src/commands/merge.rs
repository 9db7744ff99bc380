//! Merge the clips on the path to a frame into one video.

use std::io::Write;
use std::path::{Path, PathBuf};

use flowboard_board_model::ids::FrameId;
use flowboard_common::cancel::CancelFlag;
use flowboard_common::clock::now_millis;
use flowboard_common::config::AppConfig;
use flowboard_render_engine::{
    default_output_name, merge_clips, HttpMergeBackend, MergeJob, MergeProgress,
    MergeProgressCallback,
};

use super::{cancel_on_ctrl_c, open_storyboard};

pub async fn run(
    path: &Path,
    config: &AppConfig,
    frame: String,
    output: Option<PathBuf>,
    remote: bool,
) -> anyhow::Result<()> {
    let story = open_storyboard(path)?;
    let frame = FrameId::new(frame);
    let clips = story.clip_path(&frame)?;

    println!("Merging {} clip(s) on the path to {frame}", clips.len());

    if remote {
        let backend = HttpMergeBackend::new(&config.backend)?;
        let url = backend.merge(&clips).await?;
        println!("Merged video: {url}");
        return Ok(());
    }

    let output_path = output
        .unwrap_or_else(|| PathBuf::from(default_output_name(&config.compositor, now_millis())));
    println!("  Output: {}", output_path.display());
    println!(
        "  Format: {} @ {} fps",
        config.compositor.format.extension(),
        config.compositor.fps
    );

    let job = MergeJob {
        clips,
        output_path,
        config: config.compositor.clone(),
    };
    let cancel = CancelFlag::new();
    cancel_on_ctrl_c(cancel.clone());

    let progress_cb: MergeProgressCallback = Box::new(|p: MergeProgress| {
        print!(
            "\r  Progress: {:.0}% ({}/{} clips, {} frames)  ",
            p.fraction() * 100.0,
            p.completed,
            p.total,
            p.frames
        );
        let _ = std::io::stdout().flush();
    });

    match merge_clips(job, cancel, Some(progress_cb)).await {
        Ok(merged) => {
            println!(
                "\nMerge complete: {} ({}x{}, {:.1}s)",
                merged.path.display(),
                merged.width,
                merged.height,
                merged.duration_secs
            );
            Ok(())
        }
        Err(e) => {
            println!();
            Err(anyhow::anyhow!("Merge failed: {e}"))
        }
    }
}
