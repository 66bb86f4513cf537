//! Client side of the remote document store.

mod api_types;
mod client;
#[cfg(test)]
pub mod fake;

pub use client::{DocumentStore, RemoteClient};
