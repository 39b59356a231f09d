//! Reqwest-backed Baserow remote store adapter.
//!
//! This adapter owns transport details only: URL construction, token
//! authentication, pagination, timeout and HTTP error mapping, and JSON
//! decoding into domain rows and tables. It never retries.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::debug;
use zeroize::Zeroizing;

use super::dto::{RowsPageDto, TableListDto};
use crate::domain::ports::{RemoteStore, RemoteStoreError, RemoteTable, RowFilters};
use crate::domain::{Row, RowFields, RowId, TableId};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const PAGE_SIZE: u32 = 200;
const PAGE_PARAM: &str = "page";
const SIZE_PARAM: &str = "size";

/// Transport settings for the Baserow client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaserowHttpOptions {
    /// Deadline applied to every request.
    pub timeout: Duration,
    /// Accept self-signed or otherwise invalid TLS certificates.
    pub accept_invalid_certs: bool,
}

impl Default for BaserowHttpOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_REQUEST_TIMEOUT,
            accept_invalid_certs: false,
        }
    }
}

/// Remote store adapter talking to one Baserow instance.
pub struct BaserowHttpStore {
    client: Client,
    base_url: Url,
    token: Zeroizing<String>,
}

impl BaserowHttpStore {
    /// Build an adapter with default transport options.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(base_url: Url, token: Zeroizing<String>) -> Result<Self, reqwest::Error> {
        Self::with_options(base_url, token, BaserowHttpOptions::default())
    }

    /// Build an adapter with explicit transport options.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn with_options(
        base_url: Url,
        token: Zeroizing<String>,
        options: BaserowHttpOptions,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(options.timeout)
            .danger_accept_invalid_certs(options.accept_invalid_certs)
            .build()?;
        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, RemoteStoreError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| RemoteStoreError::transport(format!("invalid base URL {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments)
            .push("");
        Ok(url)
    }

    fn rows_url(&self, table_id: TableId, row_id: Option<RowId>) -> Result<Url, RemoteStoreError> {
        let table = table_id.to_string();
        let mut url = match row_id {
            Some(row_id) => {
                let row = row_id.to_string();
                self.endpoint(&["api", "database", "rows", "table", &table, &row])?
            }
            None => self.endpoint(&["api", "database", "rows", "table", &table])?,
        };
        url.query_pairs_mut().append_pair("user_field_names", "true");
        Ok(url)
    }

    fn list_rows_url(
        &self,
        table_id: TableId,
        filters: &RowFilters,
        page: Option<u32>,
    ) -> Result<Url, RemoteStoreError> {
        let mut url = self.rows_url(table_id, None)?;
        {
            let mut query = url.query_pairs_mut();
            query.extend_pairs(filters.iter());
            if let Some(page) = page {
                query
                    .append_pair(SIZE_PARAM, &PAGE_SIZE.to_string())
                    .append_pair(PAGE_PARAM, &page.to_string());
            }
        }
        Ok(url)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, RemoteStoreError> {
        let authorization = Zeroizing::new(format!("Token {}", self.token.as_str()));
        let response = request
            .header(AUTHORIZATION, authorization.as_str())
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(map_status_error(status, body.as_ref()));
        }
        decode(body.as_ref())
    }

    async fn fetch_page(
        &self,
        table_id: TableId,
        filters: &RowFilters,
        page: Option<u32>,
    ) -> Result<RowsPageDto, RemoteStoreError> {
        let url = self.list_rows_url(table_id, filters, page)?;
        self.send_json(self.client.get(url)).await
    }
}

#[async_trait]
impl RemoteStore for BaserowHttpStore {
    async fn list_tables(&self) -> Result<Vec<RemoteTable>, RemoteStoreError> {
        let url = self.endpoint(&["api", "database", "tables"])?;
        let listing: TableListDto = self.send_json(self.client.get(url)).await?;
        Ok(listing.into_remote_tables())
    }

    async fn list_rows(
        &self,
        table_id: TableId,
        filters: &RowFilters,
    ) -> Result<Vec<Row>, RemoteStoreError> {
        // A caller-chosen page or size means exactly one page.
        if filters.contains(PAGE_PARAM) || filters.contains(SIZE_PARAM) {
            return Ok(self.fetch_page(table_id, filters, None).await?.results);
        }

        let mut rows = Vec::new();
        let mut page = 1_u32;
        loop {
            let RowsPageDto { next, results } = self.fetch_page(table_id, filters, Some(page)).await?;
            let exhausted = next.is_none() || results.is_empty();
            rows.extend(results);
            if exhausted {
                break;
            }
            page = page.saturating_add(1);
        }
        debug!(table = %table_id, pages = page, rows = rows.len(), "listed remote rows");
        Ok(rows)
    }

    async fn create_row(
        &self,
        table_id: TableId,
        fields: &RowFields,
    ) -> Result<Row, RemoteStoreError> {
        let url = self.rows_url(table_id, None)?;
        self.send_json(self.client.post(url).json(fields)).await
    }

    async fn update_row(
        &self,
        table_id: TableId,
        row_id: RowId,
        fields: &RowFields,
    ) -> Result<Row, RemoteStoreError> {
        let url = self.rows_url(table_id, Some(row_id))?;
        self.send_json(self.client.patch(url).json(fields)).await
    }

    async fn get_row(&self, table_id: TableId, row_id: RowId) -> Result<Row, RemoteStoreError> {
        let url = self.rows_url(table_id, Some(row_id))?;
        self.send_json(self.client.get(url)).await
    }
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, RemoteStoreError> {
    serde_json::from_slice(body).map_err(|error| {
        RemoteStoreError::decode(format!("invalid Baserow JSON payload: {error}"))
    })
}

fn map_transport_error(error: reqwest::Error) -> RemoteStoreError {
    if error.is_timeout() {
        RemoteStoreError::timeout(error.to_string())
    } else if error.is_decode() {
        RemoteStoreError::decode(error.to_string())
    } else {
        RemoteStoreError::transport(error.to_string())
    }
}

fn map_status_error(status: StatusCode, body: &[u8]) -> RemoteStoreError {
    let body_preview = body_preview(body);
    let message = if body_preview.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("empty response body")
            .to_owned()
    } else {
        body_preview
    };
    RemoteStoreError::status(status.as_u16(), message)
}

fn body_preview(body: &[u8]) -> String {
    const PREVIEW_CHAR_LIMIT: usize = 160;

    let compact = String::from_utf8_lossy(body)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let preview = compact.chars().take(PREVIEW_CHAR_LIMIT).collect::<String>();
    if compact.chars().count() > PREVIEW_CHAR_LIMIT {
        format!("{preview}...")
    } else {
        preview
    }
}
