pub mod state;

pub use state::{StateError, StateStore};
