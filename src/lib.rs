pub mod cli;
pub mod domain;
pub mod io;
pub mod model;
pub mod ops;
pub mod util;
