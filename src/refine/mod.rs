mod session;
mod state;

pub use session::{BrushSettings, Outcome, RefinementSession};
pub use state::Event;
