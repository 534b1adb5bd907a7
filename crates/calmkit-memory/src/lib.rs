pub mod mood_log;
pub mod technique_index;

pub use mood_log::*;
pub use technique_index::*;
