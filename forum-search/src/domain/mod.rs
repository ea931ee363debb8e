mod error;
pub mod models;
pub mod ports;
pub mod search;

pub use error::*;
