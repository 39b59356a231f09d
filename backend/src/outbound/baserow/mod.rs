//! Baserow outbound adapter.
//!
//! This module provides a thin HTTP implementation of the `RemoteStore`
//! port against the Baserow REST API.

mod dto;
mod http_store;

pub use http_store::{BaserowHttpOptions, BaserowHttpStore};
