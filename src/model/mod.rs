pub mod task;
pub mod category;
pub mod filter;
pub mod time_entry;
pub mod session;
pub mod config;

pub use task::*;
pub use category::*;
pub use filter::*;
pub use time_entry::*;
pub use session::*;
pub use config::*;
