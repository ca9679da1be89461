pub mod config;
pub mod hierarchy;
pub mod logging;

pub use config::*;
pub use hierarchy::*;
pub use logging::*;
