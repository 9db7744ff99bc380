//! Start a generation job from a frame.

use std::path::Path;

use flowboard_board_model::diagram::Diagram;
use flowboard_board_model::ids::FrameId;
use flowboard_common::config::AppConfig;
use flowboard_job_poller::{submit_generation, HttpJobBackend, JobRequest};

use super::{open_storyboard, save_storyboard};

pub async fn run(
    path: &Path,
    config: &AppConfig,
    frame: String,
    prompt: String,
    context: String,
    image: Option<String>,
) -> anyhow::Result<()> {
    let mut story = open_storyboard(path)?;
    let source = FrameId::new(frame);

    let starting_image = image.or_else(|| {
        story.diagram().frame(&source).and_then(|f| {
            f.still
                .map(|p| p.display().to_string())
                .or(f.image)
        })
    });

    let backend = HttpJobBackend::new(&config.backend)?;
    let request = JobRequest {
        prompt,
        global_context: context,
        starting_image,
    };
    let pending = submit_generation(&backend, &mut story, &source, request).await?;
    save_storyboard(&mut story, path)?;

    println!("Submitted generation from {source} via {}", backend.base_url());
    println!("  Connector: {}", pending.connector_id);
    println!("  Target frame: {}", pending.target_id);
    println!();
    println!("Run `flowboard poll --until-idle` to wait for the clip.");
    Ok(())
}
