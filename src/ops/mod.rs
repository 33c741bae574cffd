pub mod catalog_ops;
pub mod dashboard;
pub mod query;
pub mod recurrence;
pub mod task_ops;
pub mod time_ops;
pub mod views;
