mod message_source;
mod progress;
mod remote_cache;
mod thread_source;

pub use message_source::*;
pub use progress::*;
pub use remote_cache::*;
pub use thread_source::*;
