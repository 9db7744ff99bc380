//! Place a frame on the board.

use std::path::Path;

use flowboard_board_model::diagram::{Diagram, FrameRecord};
use flowboard_board_model::ids::FrameId;

use super::{open_storyboard, save_storyboard};

pub fn run(
    path: &Path,
    name: String,
    image: Option<String>,
    id: Option<String>,
) -> anyhow::Result<()> {
    let mut story = open_storyboard(path)?;

    let id = id.map(FrameId::new).unwrap_or_else(FrameId::generate);
    let mut frame = FrameRecord::new(id.clone(), name);
    frame.image = image;
    story.diagram_mut().create_frame(frame)?;
    story.reconstruct();
    save_storyboard(&mut story, path)?;

    println!("{id}");
    Ok(())
}
