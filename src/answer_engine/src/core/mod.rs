pub mod metrics;
pub mod state;

pub use state::{AppState, SharedState};
