//! Database initialization for the new-title baseline

pub mod init;

pub use init::*;
