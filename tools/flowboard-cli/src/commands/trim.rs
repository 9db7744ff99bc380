//! Set where a finished clip stops playing in merges.

use std::path::Path;

use flowboard_board_model::ids::ConnectorId;

use super::{open_storyboard, save_storyboard};

pub fn run(path: &Path, connector: String, end: Option<f64>) -> anyhow::Result<()> {
    let mut story = open_storyboard(path)?;
    let connector = ConnectorId::new(connector);

    story.set_trim_end(&connector, end)?;
    save_storyboard(&mut story, path)?;

    match end {
        Some(secs) => println!("Trimmed {connector} to {secs:.2}s"),
        None => println!("Cleared trim on {connector}"),
    }
    Ok(())
}
