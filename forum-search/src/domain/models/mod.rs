mod ids;
mod thread;

pub use ids::*;
pub use thread::*;
