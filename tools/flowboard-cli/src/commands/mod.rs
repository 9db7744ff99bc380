//! Subcommand implementations.

pub mod add_frame;
pub mod check;
pub mod generate;
pub mod graph;
pub mod init;
pub mod merge;
pub mod path;
pub mod poll;
pub mod trim;

use std::path::Path;

use flowboard_board_model::board::Board;
use flowboard_common::cancel::CancelFlag;
use flowboard_frame_graph::Storyboard;

/// Load the board at `path` and rebuild its frame graph.
pub(crate) fn open_storyboard(path: &Path) -> anyhow::Result<Storyboard<Board>> {
    let board = Board::load(path)
        .map_err(|e| anyhow::anyhow!("Failed to load board {}: {e}", path.display()))?;
    Ok(Storyboard::new(board))
}

pub(crate) fn save_storyboard(story: &mut Storyboard<Board>, path: &Path) -> anyhow::Result<()> {
    story
        .diagram_mut()
        .save(path)
        .map_err(|e| anyhow::anyhow!("Failed to save board {}: {e}", path.display()))
}

/// Cancel `flag` when the user presses Ctrl-C.
pub(crate) fn cancel_on_ctrl_c(flag: CancelFlag) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, stopping");
            flag.cancel();
        }
    });
}
