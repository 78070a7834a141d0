mod grabcut;
mod invoker;
pub mod types;

pub use grabcut::GrabCut;
pub use invoker::{run_initial, run_refine, ITERATIONS};
pub use types::{Label, LabelMask, ModelState, SegmentationEngine};
