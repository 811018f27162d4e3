//! Shared functionality
//!
//! This crate supplies the pieces that every stylesync crate leans on: the error type, the
//! result alias, instance identifiers and the cooperative frame scheduler.
//!

pub mod abort;
pub mod errors;
pub mod node;
pub mod scheduler;
pub mod types;
