// Gateway module - controls public API for handlers
// Modules are private, only exported symbols are public

mod db_status;
mod health;
mod metrics;
mod root;
mod shared_types;
mod try_on;
mod user;

// Core handlers
pub use health::health_check;
pub use metrics::{metrics_handler, track_http_metrics};
pub use root::root_handler;

// Status and profile handlers
pub use db_status::db_status;
pub use user::{auth_test, get_profile, update_profile};

// Try-on handler
pub use try_on::try_on;
