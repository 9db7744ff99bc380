//! Flowboard Board Model
//!
//! Defines the data contracts between the core and the diagram editor:
//! - **Ids:** Opaque frame and connector identifiers
//! - **Edges:** Generation state of a connector and the clip it produced
//! - **Diagram:** The read/mutate surface the core consumes
//! - **Board:** An in-memory diagram with a JSON snapshot format
//!
//! The editor stores job status and clip data as loosely typed shape
//! metadata; adapters translate it into [`EdgeState`] at this boundary.

pub mod board;
pub mod diagram;
pub mod edge;
pub mod ids;

pub use board::*;
pub use diagram::*;
pub use edge::*;
pub use ids::*;
