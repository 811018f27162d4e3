//! Style cascade synchronization.
//!
//! Keeps the stylesheets of a live canvas in sync with the editor's style data model: the
//! [`planner`] describes the rules, the [`diff`] engine narrows each store change down to the
//! declarations that changed, the [`sink`] batches the writes into one render per frame and
//! the [`overlay`] previews uncommitted values. The [`collapse`] detector flags elements that
//! render without size. A [`session::SyncSession`] wires all of it to the stores.

pub mod collapse;
pub mod config;
pub mod diff;
pub mod helpers;
pub mod import;
pub mod inspector;
pub mod model;
pub mod overlay;
pub mod planner;
pub mod selectors;
pub mod session;
pub mod sink;
pub mod state_preview;
pub mod store;

pub use crate::session::SyncSession;
