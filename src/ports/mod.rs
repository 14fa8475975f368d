//! Port traits defining the boundaries between domain and adapters.

pub mod config_port;
pub mod label_port;
pub mod price_port;
pub mod progress_port;
pub mod report_port;
