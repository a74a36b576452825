//! Worldforge core library — local graph state, optimistic mutations against
//! a remote store, import/export, and local persistence.
//!
//! The main entry point is [`session::EditorSession`], which drives a
//! [`engine::MutationEngine`] over a [`state::GraphState`].

pub mod config;
pub mod engine;
pub mod error;
pub mod flatten;
pub mod history;
pub mod persistence;
pub mod remote;
pub mod session;
pub mod state;
pub mod transfer;
pub mod types;
