//! Domain ports defining the edges of the hexagon.
//!
//! The only driven dependency of the core is the remote row store. Its port
//! exposes a strongly typed error so adapters map failures into predictable
//! variants instead of returning opaque errors.

mod macros;
mod remote_store;

pub(crate) use macros::define_port_error;

#[cfg(test)]
pub use remote_store::MockRemoteStore;
pub use remote_store::{RemoteStore, RemoteStoreError, RemoteTable, RowFilters};
