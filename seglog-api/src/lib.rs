//! # Seglog API
//!
//! HTTP front-end for the seglog store and the remote client that speaks
//! to it. The wire contract is small: JSON bodies over `/db/{key}`, with
//! `404` for absent or tombstoned keys.

pub mod client;
pub mod server;

pub use client::RemoteClient;
pub use server::{create_router, AppState};
