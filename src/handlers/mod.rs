//! Operations exposed to the outer surfaces (HTTP, CLI, background tasks).
//!
//! Each handler validates its input and lifecycle preconditions before
//! touching the store, so rejected calls leave no side effects. The
//! transactional work itself lives in [`crate::db`].

mod ballot;
mod poll;

pub use ballot::submit_or_update_ballot;
pub use poll::{
    add_option, close_expired_polls, close_poll, create_poll, get_results, publish_poll,
};
