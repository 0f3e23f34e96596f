pub mod config;
pub mod index;
pub mod lock;
pub mod watch;

pub use config::{cmd_config_init, cmd_config_show};
pub use index::cmd_index;
pub use lock::{cmd_lock_set, cmd_lock_status};
pub use watch::cmd_watch;
