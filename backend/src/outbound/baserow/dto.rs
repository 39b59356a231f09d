//! DTOs for decoding Baserow JSON responses.
//!
//! Table listings are decoded here and mapped into [`RemoteTable`] in one
//! pass. Rows need no mapping: Baserow already returns them as field bags.

use serde::Deserialize;

use crate::domain::ports::RemoteTable;
use crate::domain::{Row, TableId};

/// Table listing, either bare or wrapped in a paginated envelope depending
/// on the Baserow version.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(super) enum TableListDto {
    Bare(Vec<TableDto>),
    Paged { results: Vec<TableDto> },
}

#[derive(Debug, Deserialize)]
pub(super) struct TableDto {
    pub(super) id: i64,
    pub(super) name: String,
    #[serde(default)]
    pub(super) database_id: i64,
}

/// One page of `GET /api/database/rows/table/{id}/`.
#[derive(Debug, Deserialize)]
pub(super) struct RowsPageDto {
    #[serde(default)]
    pub(super) next: Option<String>,
    #[serde(default)]
    pub(super) results: Vec<Row>,
}

impl TableListDto {
    pub(super) fn into_remote_tables(self) -> Vec<RemoteTable> {
        let tables = match self {
            Self::Bare(tables) | Self::Paged { results: tables } => tables,
        };
        tables.into_iter().map(TableDto::into_remote_table).collect()
    }
}

impl TableDto {
    fn into_remote_table(self) -> RemoteTable {
        RemoteTable {
            id: TableId::new(self.id),
            name: self.name,
            database_id: self.database_id,
        }
    }
}
