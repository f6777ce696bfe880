//! Layered configuration.
//!
//! Tiers, lowest to highest, merged field by field:
//! 1. **Defaults** - [`Config::default`]
//! 2. **Project** - `./task-tracker/config.yaml`
//! 3. **User** - `~/.task-tracker/config.yaml`
//! 4. **Environment** - `TASK_TRACKER_*` variables
//!
//! ## Environment Variables
//! - `TASK_TRACKER_CONFIG_PATH` - Explicit config file (replaces the file tiers)
//! - `TASK_TRACKER_PROJECT_DIR` - Project config dir (default: `./task-tracker`)
//! - `TASK_TRACKER_USER_DIR` - User config dir (default: `~/.task-tracker`)
//! - `TASK_TRACKER_DB_PATH` - Database path
//! - `TASK_TRACKER_BIND` - Listen address
//! - `TASK_TRACKER_PORT` - Listen port
//! - `TASK_TRACKER_STORE` - `sqlite` or `memory`

mod loader;
mod merge;
mod types;

pub use loader::{ConfigLoader, ConfigPaths, ConfigTier, apply_env_overrides};
pub use merge::{deep_merge, deep_merge_all};
pub use types::*;
