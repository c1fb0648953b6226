pub mod config;
pub mod dashboard;
pub mod errors;
pub mod floor;
pub mod logging;
pub mod notifier;

pub use lineboard_common as common;
