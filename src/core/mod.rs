//! Domain shapes, contracts and ambient plumbing shared by every layer

pub mod backend;
pub mod cancel;
pub mod config;
pub mod error;
pub mod log;
pub mod models;
pub mod normalize;
pub mod notify;
pub mod provider;

// Re-export main types for cleaner imports
pub use backend::{AccountBackend, Session};
pub use cancel::CancelToken;
pub use error::{Error, Result};
pub use provider::LeagueProvider;
