//! Flowboard Frame Graph
//!
//! Tracks how storyboard frames relate to each other:
//! - **Store:** A forest of frames with stable branch indices
//! - **Reconstruct:** Derive the forest from diagram frames and connectors
//! - **Storyboard:** Own diagram and graph together and resolve clip paths
//!
//! No I/O happens here; the diagram is reached only through its trait.

pub mod node;
pub mod reconstruct;
pub mod store;
pub mod storyboard;

pub use node::FrameNode;
pub use reconstruct::{reconstruct, reconstruct_from, ConnectorEndpoints};
pub use store::{FrameGraph, GraphError};
pub use storyboard::{PendingGeneration, SharedFrameGraph, Storyboard, GENERATING_FRAME_NAME};
