//! Create a new, empty board.

use std::path::Path;

use flowboard_board_model::board::Board;

pub fn run(path: &Path, name: String, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }

    let mut board = Board::new(&name);
    board
        .save(path)
        .map_err(|e| anyhow::anyhow!("Failed to create board: {e}"))?;

    println!("Created board '{}' at {}", name, path.display());
    println!();
    println!("Next steps:");
    println!("  flowboard add-frame --name \"Opening shot\" --image shot.png");
    println!("  flowboard generate <FRAME> --prompt \"...\"");
    println!("  flowboard poll --until-idle");

    Ok(())
}
