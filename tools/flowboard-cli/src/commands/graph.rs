//! Show the frame graph.

use std::path::Path;

use flowboard_board_model::diagram::Diagram;
use flowboard_frame_graph::FrameNode;

use super::open_storyboard;

pub fn run(path: &Path, json: bool) -> anyhow::Result<()> {
    let story = open_storyboard(path)?;
    let diagram = story.diagram();

    if json {
        let mut nodes: Vec<FrameNode> = story.with_graph(|g| g.nodes().cloned().collect());
        nodes.sort_by(|a, b| a.frame_id.cmp(&b.frame_id));
        println!("{}", serde_json::to_string_pretty(&nodes)?);
        return Ok(());
    }

    let tree = story.with_graph(|g| {
        g.render_tree(|node| {
            let name = diagram
                .frame(&node.frame_id)
                .map(|f| f.name)
                .unwrap_or_default();
            match node.arrow_id.as_ref().and_then(|id| diagram.connector(id)) {
                Some(connector) => format!(
                    "\"{name}\" via {} ({})",
                    connector.id,
                    connector.state.label()
                ),
                None => format!("\"{name}\""),
            }
        })
    });

    println!("Board: {}", diagram.document().name);
    println!(
        "  {} frames, {} connectors, {} pending",
        diagram.list_frames().len(),
        diagram.list_connectors().len(),
        diagram.pending_connectors().len()
    );
    println!();
    print!("{tree}");
    Ok(())
}
