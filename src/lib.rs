//! Dual-pane file manager engine.
//!
//! [`controller::Commander`] owns two panes, a session (history, clipboard,
//! favorites, SMB credentials) and the in-flight requests to a [`backend::Backend`].
//! The `cmdr` binary puts a terminal front-end on top of it.

pub mod backend;
pub mod background;
pub mod compare;
pub mod config;
pub mod controller;
pub mod dir_size;
pub mod errors;
pub mod fs;
pub mod operations;
pub mod pane_manager;
pub mod state;
pub mod utils;
