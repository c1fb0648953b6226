//! CLI command implementations.
//!
//! | Module     | Commands handled            |
//! |------------|-----------------------------|
//! | `serve`    | `Serve`, `InitDb`           |
//! | `watch`    | `Watch`                     |
//! | `snapshot` | `Snapshot`                  |
//! | `config`   | `Config`, `Targets`         |

pub mod config;
pub mod serve;
pub mod snapshot;
pub mod watch;

pub use config::{cmd_config, cmd_targets, config_path, load_config};
pub use serve::{cmd_init_db, cmd_serve};
pub use snapshot::cmd_snapshot;
pub use watch::cmd_watch;
