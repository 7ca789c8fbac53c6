pub mod body_summarizer;
pub mod broad_phase;
pub mod snapshot;

pub use body_summarizer::BuildScratch;
pub use broad_phase::{BroadPhase, BuildInput};
pub use snapshot::{BroadPhaseSnapshot, BroadPhaseView};
