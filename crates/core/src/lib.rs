//! `gatehouse-core`: identifiers shared by every crate.
//!
//! This crate has no knowledge of HTTP, storage, or tokens.

pub mod id;

pub use id::UserId;
