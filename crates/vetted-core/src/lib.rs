//! Core types and the approval state machine for the vetted record store.
//!
//! Writes to a configured subset of a record's fields ("gated" fields) are
//! held in a single unapproved draft until a reviewer approves or denies them
//! field by field. Approved drafts become immutable history.
//!
//! This crate is deliberately free of database dependencies. Storage backends
//! implement [`store::RecordStore`]; everything else is pure logic over
//! [`state::RecordState`] driven by [`engine::Engine`].

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod changes;
pub mod config;
pub mod draft;
pub mod engine;
pub mod error;
pub mod record;
pub mod schema;
pub mod state;
pub mod store;
pub mod validate;

pub use error::{Error, Result};
