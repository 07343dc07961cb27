//! Load lifecycle types shared by the loaders and the preview facade

pub mod load_state;

pub use load_state::LoadState;
