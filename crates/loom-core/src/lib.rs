pub mod binding;
pub mod compose;
pub mod config;
pub mod context;
pub mod document;
pub mod error;
pub mod fragment;
pub mod io;
pub mod markdown;
pub mod paths;
pub mod pipeline;
pub mod placeholder;
pub mod project;
pub mod registry;
pub mod role;
pub mod state;
pub mod template;
pub mod types;
pub mod validate;

pub use error::{LoomError, Result};
