// src/app/mod.rs
//! Application module - display-side state and actions.

pub mod state;

// Re-export the App struct
pub use state::App;
