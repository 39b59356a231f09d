//! Compute one tenant's overview KPIs against Baserow and print them as JSON.
#![cfg_attr(not(any(test, doctest)), deny(clippy::unwrap_used))]
#![cfg_attr(not(any(test, doctest)), deny(clippy::expect_used))]

use std::ffi::OsString;
use std::io::{self, Write};
use std::sync::Arc;

use backend::config::RemoteStoreSettings;
use backend::domain::ports::RemoteStore;
use backend::domain::{KpiService, TableRegistry};
use backend::outbound::baserow::{BaserowHttpOptions, BaserowHttpStore};
use chrono::{DateTime, Utc};
use clap::Parser;
use mockable::{Clock, DefaultClock};
use ortho_config::OrthoConfig;
use tokio::runtime::Builder;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

/// `kpi-report` command arguments.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "kpi-report",
    about = "Compute a tenant's dashboard KPIs from Baserow and print them as JSON",
    version
)]
struct CliArgs {
    /// Tenant (agency) code, e.g. `TT001`.
    #[arg(long = "tenant", value_name = "code", value_parser = parse_tenant_code)]
    tenant: String,
    /// Evaluate the windows as of this RFC 3339 instant instead of now.
    #[arg(long = "at", value_name = "rfc3339", value_parser = parse_instant)]
    at: Option<DateTime<Utc>>,
    /// Emit single-line JSON.
    #[arg(long = "compact")]
    compact: bool,
}

fn main() -> io::Result<()> {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .with_writer(io::stderr)
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|error| io::Error::other(format!("create Tokio runtime: {error}")))?;
    runtime.block_on(async_main())
}

async fn async_main() -> io::Result<()> {
    let args = CliArgs::try_parse().map_err(io::Error::other)?;
    // Settings come from REMOTE_STORE_* variables and config files only; the
    // command line belongs to `CliArgs`.
    let settings = RemoteStoreSettings::load_from_iter([OsString::from("kpi-report")])
        .map_err(|error| io::Error::other(format!("load remote store settings: {error}")))?;

    let options = BaserowHttpOptions {
        timeout: settings.request_timeout(),
        accept_invalid_certs: settings.accept_invalid_certs,
    };
    let store: Arc<dyn RemoteStore> = Arc::new(
        BaserowHttpStore::with_options(settings.base_url()?, settings.token()?, options)
            .map_err(|error| io::Error::other(format!("build Baserow client: {error}")))?,
    );
    let clock: Arc<dyn Clock> = Arc::new(DefaultClock);
    let registry = Arc::new(TableRegistry::with_ttl(
        Arc::clone(&store),
        Arc::clone(&clock),
        settings.registry_ttl(),
    ));
    let service = KpiService::new(registry, store, Arc::clone(&clock));

    let at = args.at.unwrap_or_else(|| clock.utc());
    let snapshot = service.compute_kpis(&args.tenant, at).await;
    info!(tenant = %args.tenant, at = %at.to_rfc3339(), "KPI report computed");

    let mut stdout = io::stdout().lock();
    let written = if args.compact {
        serde_json::to_writer(&mut stdout, &snapshot)
    } else {
        serde_json::to_writer_pretty(&mut stdout, &snapshot)
    };
    written.map_err(|error| io::Error::other(format!("encode KPI report: {error}")))?;
    writeln!(stdout)
}

fn parse_tenant_code(raw: &str) -> Result<String, String> {
    let code = raw.trim();
    let mut chars = code.chars();
    let letters = chars.by_ref().take(2).filter(char::is_ascii_alphabetic).count();
    let digits = chars.by_ref().take(3).filter(char::is_ascii_digit).count();
    if letters != 2 || digits != 3 || chars.next().is_some() {
        return Err(format!(
            "tenant code must be two letters followed by three digits, got {raw:?}"
        ));
    }
    Ok(code.to_ascii_uppercase())
}

fn parse_instant(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|instant| instant.with_timezone(&Utc))
        .map_err(|error| format!("expected an RFC 3339 timestamp: {error}"))
}
