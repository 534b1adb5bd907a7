pub mod classifier;
pub mod config;
pub mod orchestrator;
pub mod reply;
pub mod severity;

pub use classifier::*;
pub use config::*;
pub use orchestrator::*;
pub use reply::*;
pub use severity::*;
