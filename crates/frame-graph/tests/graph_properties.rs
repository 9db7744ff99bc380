use std::path::PathBuf;

use flowboard_board_model::board::Board;
use flowboard_board_model::diagram::Diagram;
use flowboard_board_model::ids::FrameId;
use flowboard_frame_graph::{reconstruct, ConnectorEndpoints, FrameGraph, Storyboard};
use proptest::prelude::*;

fn load_fixture_board() -> Board {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
        .join("fixtures")
        .join("sample-board")
        .join("board.json");
    Board::load(path).expect("fixture board should load")
}

fn ids(frames: Vec<FrameId>) -> Vec<String> {
    frames.into_iter().map(|f| f.to_string()).collect()
}

#[test]
fn fixture_board_reconstructs_expected_forest() {
    let story = Storyboard::new(load_fixture_board());

    assert_eq!(ids(story.root_frames()), ["frame:loose", "frame:root"]);
    assert_eq!(
        ids(story.path_to_root(&"frame:d".into())),
        ["frame:root", "frame:a", "frame:b", "frame:d"]
    );
    assert_eq!(
        ids(story.descendants_of(&"frame:root".into())),
        ["frame:a", "frame:b", "frame:d", "frame:c"]
    );
    assert_eq!(
        story.branch_index_of(&"frame:a".into(), &"frame:c".into()),
        Some(1)
    );

    let tree = story.with_graph(|g| g.render_tree(|_| String::new()));
    assert!(tree.contains("    [1] frame:c"));
}

#[test]
fn fixture_clip_path_uses_trim_and_duration() {
    let story = Storyboard::new(load_fixture_board());
    let clips = story.clip_path(&"frame:b".into()).unwrap();

    assert_eq!(clips.len(), 2);
    let total: f64 = clips.iter().map(|c| c.effective_end(f64::MAX)).sum();
    assert!((total - 5.0).abs() < 1e-9);

    // frame:d sits behind an errored connector.
    assert!(story.clip_path(&"frame:d".into()).unwrap_err().is_validation());
}

#[test]
fn deleting_fixture_frame_cascades() {
    let mut story = Storyboard::new(load_fixture_board());
    story.diagram_mut().delete_frame(&"frame:a".into());

    assert!(story.path_to_root(&"frame:d".into()).is_empty());
    assert!(story.descendants_of(&"frame:root".into()).is_empty());
    assert_eq!(story.diagram().list_frames().len(), 5);
}

fn arb_board() -> impl Strategy<Value = (usize, Vec<(Option<usize>, Option<usize>)>)> {
    (1usize..12).prop_flat_map(|frames| {
        let endpoint = prop::option::weighted(0.9, 0..frames + 2);
        (
            Just(frames),
            prop::collection::vec((endpoint.clone(), endpoint), 0..24),
        )
    })
}

fn build(frames: usize, edges: &[(Option<usize>, Option<usize>)]) -> FrameGraph {
    let frame_ids = (0..frames).map(|i| FrameId::new(format!("f{i}")));
    let connectors: Vec<ConnectorEndpoints> = edges
        .iter()
        .enumerate()
        .map(|(i, (start, end))| ConnectorEndpoints {
            connector_id: format!("e{i}").into(),
            start: start.map(|s| FrameId::new(format!("f{s}"))),
            end: end.map(|e| FrameId::new(format!("f{e}"))),
            branch: None,
        })
        .collect();
    reconstruct(frame_ids, &connectors)
}

proptest! {
    #[test]
    fn reconstruction_is_idempotent((frames, edges) in arb_board()) {
        prop_assert_eq!(build(frames, &edges), build(frames, &edges));
    }

    #[test]
    fn reconstruction_yields_a_consistent_forest((frames, edges) in arb_board()) {
        let graph = build(frames, &edges);
        prop_assert_eq!(graph.len(), frames);

        for node in graph.nodes() {
            prop_assert_eq!(node.arrow_id.is_some(), node.parent_id.is_some());

            if let Some(parent) = &node.parent_id {
                let index = graph.branch_index_of(parent, &node.frame_id);
                prop_assert!(index.is_some());
            }
            for child in node.children.values() {
                let child_node = graph.get(child);
                prop_assert!(child_node.is_some());
                prop_assert_eq!(
                    child_node.and_then(|c| c.parent_id.as_ref()),
                    Some(&node.frame_id)
                );
            }

            let path = graph.path_to_root(&node.frame_id);
            prop_assert!(path.len() <= frames);
            prop_assert!(path[0].is_root());
        }
    }

    #[test]
    fn removal_leaves_no_references((frames, edges) in arb_board(), victim in 0usize..12) {
        let mut graph = build(frames, &edges);
        let victim = FrameId::new(format!("f{victim}"));
        let removed = graph.remove_node(&victim);

        for id in &removed {
            prop_assert!(!graph.contains(id));
        }
        for node in graph.nodes() {
            for child in node.children.values() {
                prop_assert!(graph.contains(child));
            }
        }
    }
}
