//! State module for tracking run progress
//!
//! # Components
//!
//! - `RunState`: lifecycle of a whole run (idle, running, completed, failed)
//! - `SeedStatus`: outcome of a single seed (completed, failed, skipped)

mod run_state;
mod seed_status;

pub use run_state::RunState;
pub use seed_status::SeedStatus;
