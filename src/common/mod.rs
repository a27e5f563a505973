//! Facilities shared by all phases
pub mod environment;
pub mod naming;
pub mod prettify;
