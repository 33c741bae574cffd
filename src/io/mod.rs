pub mod atomic;
pub mod auth;
pub mod config_io;
pub mod local_store;
pub mod lock;
pub mod remote_store;
pub mod store;
pub mod watcher;
