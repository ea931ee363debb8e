//! Search engine for forum threads on a chat platform.
//!
//! The [`domain`] holds the search pipeline and the ports it talks through,
//! [`cache`] the two-tier thread cache, [`adapters`] the concrete Redis tier
//! and [`factory`] wires everything from [`config::Settings`].

pub mod adapters;
pub mod cache;
pub mod config;
pub mod domain;
pub mod factory;
