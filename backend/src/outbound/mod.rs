//! Outbound adapters implementing domain ports for external infrastructure.
//!
//! - **baserow**: reqwest-backed [`RemoteStore`](crate::domain::ports::RemoteStore)
//!   talking to the Baserow REST API.
//!
//! Adapters are thin translators between domain types and wire formats. They
//! contain no business logic.

pub mod baserow;
