//! Core types, rules and trait definitions for the bump pregnancy tracker.
//!
//! This crate is deliberately free of HTTP and database dependencies. It owns
//! the access-control rules (who may read or write a pregnancy record) and the
//! invite-code lifecycle. Storage backends implement [`store::SharingStore`];
//! transport layers drive [`SharingService`].

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod access;
pub mod code;
pub mod entry;
pub mod error;
pub mod hasher;
pub mod invite;
pub mod limiter;
pub mod pairing;
pub mod pregnancy;
pub mod service;
pub mod settings;
pub mod sharing;
pub mod store;

pub use error::{Error, ErrorKind, Result};
pub use service::{SharingPolicy, SharingService};
