pub mod admin;
pub mod auth;
pub mod error;
pub mod members;
pub mod middleware;
pub mod state;

pub use error::ApiError;
pub use state::{AppState, AppStateInner};
