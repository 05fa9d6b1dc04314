// Submodules
pub mod auth;
pub mod handlers;
pub mod routes;
mod runtime;
pub mod session;
pub mod state;

// Public API (what main.rs imports)
pub use runtime::{run_host, start_host, HostOptions, RunningHost};
pub use session::TransferSession;
pub use state::HostState;
