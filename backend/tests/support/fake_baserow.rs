//! In-process fake Baserow for adapter integration tests.
//!
//! Serves the table listing and row endpoints the adapter uses, with Baserow's
//! pagination envelope and token check. Every request is recorded so tests
//! can assert on paths and query strings. Start it from an Actix test
//! runtime (`#[actix_web::test]`); call [`FakeBaserow::stop`] when done.

use std::collections::{BTreeMap, HashMap};
use std::net::TcpListener;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use actix_web::dev::ServerHandle;
use actix_web::http::header::AUTHORIZATION;
use actix_web::{App, HttpRequest, HttpResponse, HttpServer, web};
use reqwest::Url;
use serde_json::{Map, Value, json};

/// Token the fake accepts.
pub const FAKE_TOKEN: &str = "fake-baserow-token";

const DEFAULT_PAGE_SIZE: usize = 100;

type Fields = Map<String, Value>;

/// Request seen by the fake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    /// HTTP method.
    pub method: String,
    /// Request path.
    pub path: String,
    /// Raw query string.
    pub query: String,
    /// Request body for writes.
    pub body: Option<Value>,
}

#[derive(Default)]
struct FakeState {
    tables: Mutex<Value>,
    tables_status: Mutex<Option<u16>>,
    rows: Mutex<BTreeMap<i64, Vec<Fields>>>,
    requests: Mutex<Vec<RecordedRequest>>,
    listing_delay: Mutex<Option<Duration>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().expect("fake Baserow state lock")
}

/// Running fake server plus handles for scripting it.
pub struct FakeBaserow {
    /// Root URL to hand to the adapter.
    pub base_url: Url,
    state: web::Data<FakeState>,
    handle: ServerHandle,
}

impl FakeBaserow {
    /// Bind an ephemeral port and start serving.
    pub fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind fake Baserow");
        let addr = listener.local_addr().expect("fake Baserow address");
        let state = web::Data::new(FakeState::default());
        *lock(&state.tables) = json!([]);

        let app_state = state.clone();
        let server = HttpServer::new(move || {
            App::new()
                .app_data(app_state.clone())
                .route("/api/database/tables/", web::get().to(list_tables))
                .route("/api/database/rows/table/{table_id}/", web::get().to(list_rows))
                .route("/api/database/rows/table/{table_id}/", web::post().to(create_row))
                .route(
                    "/api/database/rows/table/{table_id}/{row_id}/",
                    web::get().to(get_row),
                )
                .route(
                    "/api/database/rows/table/{table_id}/{row_id}/",
                    web::patch().to(update_row),
                )
        })
        .disable_signals()
        .workers(1)
        .listen(listener)
        .expect("listen on fake Baserow socket")
        .run();

        let handle = server.handle();
        actix_web::rt::spawn(server);

        Self {
            base_url: Url::parse(&format!("http://{addr}/")).expect("fake Baserow URL"),
            state,
            handle,
        }
    }

    /// Serve `tables` as the listing body verbatim.
    pub fn set_tables(&self, tables: Value) {
        *lock(&self.state.tables) = tables;
    }

    /// Register a table with a bare-array listing entry.
    pub fn add_table(&self, id: i64, name: &str) {
        let mut tables = lock(&self.state.tables);
        if let Value::Array(entries) = &mut *tables {
            entries.push(json!({ "id": id, "name": name, "order": id, "database_id": 1 }));
        }
        lock(&self.state.rows).entry(id).or_default();
    }

    /// Append rows to a table, assigning ids in insertion order.
    pub fn add_rows(&self, table_id: i64, rows: impl IntoIterator<Item = Value>) {
        let mut tables = lock(&self.state.rows);
        let existing = tables.entry(table_id).or_default();
        for row in rows {
            let mut fields = match row {
                Value::Object(fields) => fields,
                other => panic!("rows must be objects, got {other}"),
            };
            let next_id = i64::try_from(existing.len()).expect("row count fits") + 1;
            fields.entry("id").or_insert(json!(next_id));
            existing.push(fields);
        }
    }

    /// Make the table listing answer with `status` until cleared.
    pub fn fail_table_listing(&self, status: Option<u16>) {
        *lock(&self.state.tables_status) = status;
    }

    /// Delay every table listing response.
    pub fn delay_table_listing(&self, delay: Duration) {
        *lock(&self.state.listing_delay) = Some(delay);
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.state.requests).clone()
    }

    /// Requests whose path starts with `prefix`.
    pub fn requests_to(&self, prefix: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|request| request.path.starts_with(prefix))
            .collect()
    }

    /// Stop the server without waiting for in-flight requests.
    pub async fn stop(self) {
        self.handle.stop(false).await;
    }
}

fn record(state: &FakeState, req: &HttpRequest, body: Option<Value>) {
    lock(&state.requests).push(RecordedRequest {
        method: req.method().to_string(),
        path: req.path().to_owned(),
        query: req.query_string().to_owned(),
        body,
    });
}

fn authorised(req: &HttpRequest) -> bool {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        == Some(format!("Token {FAKE_TOKEN}").as_str())
}

fn unauthorised() -> HttpResponse {
    HttpResponse::Unauthorized().json(json!({
        "error": "ERROR_INVALID_TOKEN",
        "detail": "The provided token does not exist.",
    }))
}

fn missing(what: &str) -> HttpResponse {
    HttpResponse::NotFound().json(json!({
        "error": format!("ERROR_{what}_DOES_NOT_EXIST"),
        "detail": format!("The requested {} does not exist.", what.to_lowercase()),
    }))
}

async fn list_tables(state: web::Data<FakeState>, req: HttpRequest) -> HttpResponse {
    record(&state, &req, None);
    let delay = *lock(&state.listing_delay);
    if let Some(delay) = delay {
        actix_web::rt::time::sleep(delay).await;
    }
    if !authorised(&req) {
        return unauthorised();
    }
    let status = *lock(&state.tables_status);
    if let Some(status) = status {
        let code = actix_web::http::StatusCode::from_u16(status).expect("valid status");
        return HttpResponse::build(code).json(json!({ "error": "ERROR_SCRIPTED_FAILURE" }));
    }
    HttpResponse::Ok().json(lock(&state.tables).clone())
}

async fn list_rows(
    state: web::Data<FakeState>,
    req: HttpRequest,
    path: web::Path<i64>,
    query: web::Query<HashMap<String, String>>,
) -> HttpResponse {
    record(&state, &req, None);
    if !authorised(&req) {
        return unauthorised();
    }
    let table_id = path.into_inner();
    let rows = lock(&state.rows);
    let Some(table) = rows.get(&table_id) else {
        return missing("TABLE");
    };

    let size = query
        .get("size")
        .and_then(|raw| raw.parse::<usize>().ok())
        .unwrap_or(DEFAULT_PAGE_SIZE);
    let page = query
        .get("page")
        .and_then(|raw| raw.parse::<usize>().ok())
        .unwrap_or(1);
    let results: Vec<&Fields> = table.iter().skip(page.saturating_sub(1) * size).take(size).collect();
    let next = (page * size < table.len()).then(|| {
        format!(
            "http://{}/api/database/rows/table/{table_id}/?page={}&size={size}",
            req.connection_info().host(),
            page + 1
        )
    });
    HttpResponse::Ok().json(json!({
        "count": table.len(),
        "next": next,
        "previous": null,
        "results": results,
    }))
}

async fn create_row(
    state: web::Data<FakeState>,
    req: HttpRequest,
    path: web::Path<i64>,
    body: web::Json<Fields>,
) -> HttpResponse {
    let mut fields = body.into_inner();
    record(&state, &req, Some(Value::Object(fields.clone())));
    if !authorised(&req) {
        return unauthorised();
    }
    let mut rows = lock(&state.rows);
    let Some(table) = rows.get_mut(&path.into_inner()) else {
        return missing("TABLE");
    };
    let next_id = i64::try_from(table.len()).expect("row count fits") + 1;
    fields.insert("id".to_owned(), json!(next_id));
    table.push(fields.clone());
    HttpResponse::Ok().json(fields)
}

async fn get_row(
    state: web::Data<FakeState>,
    req: HttpRequest,
    path: web::Path<(i64, i64)>,
) -> HttpResponse {
    record(&state, &req, None);
    if !authorised(&req) {
        return unauthorised();
    }
    let (table_id, row_id) = path.into_inner();
    let rows = lock(&state.rows);
    rows.get(&table_id)
        .and_then(|table| table.iter().find(|row| row.get("id") == Some(&json!(row_id))))
        .map_or_else(|| missing("ROW"), |row| HttpResponse::Ok().json(row))
}

async fn update_row(
    state: web::Data<FakeState>,
    req: HttpRequest,
    path: web::Path<(i64, i64)>,
    body: web::Json<Fields>,
) -> HttpResponse {
    let patch = body.into_inner();
    record(&state, &req, Some(Value::Object(patch.clone())));
    if !authorised(&req) {
        return unauthorised();
    }
    let (table_id, row_id) = path.into_inner();
    let mut rows = lock(&state.rows);
    let Some(row) = rows
        .get_mut(&table_id)
        .and_then(|table| table.iter_mut().find(|row| row.get("id") == Some(&json!(row_id))))
    else {
        return missing("ROW");
    };
    row.extend(patch);
    HttpResponse::Ok().json(row.clone())
}
