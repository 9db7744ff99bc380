//! Show the path from a frame back to its root.

use std::path::Path;

use flowboard_board_model::diagram::Diagram;
use flowboard_board_model::ids::FrameId;

use super::open_storyboard;

pub fn run(path: &Path, frame: String) -> anyhow::Result<()> {
    let story = open_storyboard(path)?;
    let frame = FrameId::new(frame);

    let frames = story.path_to_root(&frame);
    if frames.is_empty() {
        anyhow::bail!("Frame {frame} is not on the board");
    }

    println!("Path to {frame} ({} frames):", frames.len());
    for (step, id) in frames.iter().enumerate() {
        let name = story
            .diagram()
            .frame(id)
            .map(|f| f.name)
            .unwrap_or_default();
        println!("  {step}. {id} \"{name}\"");
    }

    println!();
    match story.clip_path(&frame) {
        Ok(clips) => {
            println!("Clips ({}):", clips.len());
            for clip in &clips {
                let end = clip
                    .trim_end
                    .or(clip.duration_secs)
                    .map(|s| format!("{s:.1}s"))
                    .unwrap_or_else(|| "full".to_string());
                println!("  {} ({end})", clip.url);
            }
        }
        Err(e) => println!("Not mergeable yet: {e}"),
    }

    Ok(())
}
