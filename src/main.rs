//! CLI entry point for the rating report tool.
//!
//! Provides subcommands for building the rating report from a dataset in
//! object storage, inspecting a written report, and granting the data
//! subnet network access to the storage account.

mod infra;

use crate::infra::azure::{ArmClient, Credentials};
use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use rating_report::analyzers::aggregate::DEFAULT_TOP_N;
use rating_report::analyzers::analyzer::{ReportConfig, run_report};
use rating_report::fetch::{BasicClient, Provider, Source};
use rating_report::network::{AccessTarget, configure_storage_access};
use rating_report::output::{format_cell, parse_report};
use rating_report::storage::{AzureBlobStore, LocalStore, ObjectStore, S3Store};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "rating_report")]
#[command(about = "Aggregate tourism ratings into a report stored in object storage", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the rating report from a dataset and upload it
    Report {
        /// Dataset location: s3://bucket/key, az://container/blob, an http(s) URL, or a local path
        #[arg(long, env = "SOURCE_URI", value_name = "URI")]
        source: String,

        /// Local file to write the report to
        #[arg(short, long, env = "OUTPUT_FILE", default_value = "rating_report.csv")]
        output: PathBuf,

        /// Bucket to upload the report to; skipped when unset
        #[arg(long, env = "DEST_BUCKET")]
        dest_bucket: Option<String>,

        /// Directory-style prefix for the uploaded object
        #[arg(long, env = "DEST_PREFIX")]
        dest_prefix: Option<String>,

        /// Directory for the HTML bar charts
        #[arg(long, env = "CHARTS_DIR", default_value = "charts")]
        charts_dir: PathBuf,

        /// Do not render charts
        #[arg(long, default_value_t = false)]
        no_charts: bool,

        /// Number of top categories to keep
        #[arg(short = 'n', long, default_value_t = DEFAULT_TOP_N, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
        top_n: usize,

        /// Gzip compress the report before uploading
        #[arg(long, default_value_t = false)]
        gzip: bool,

        /// Use this directory as the object store instead of S3
        #[arg(long, env = "LOCAL_STORE_ROOT")]
        local_store: Option<PathBuf>,

        /// Use Azure Blob Storage in this storage account instead of S3
        #[arg(long, env = "STORAGE_ACCOUNT_NAME")]
        azure_account: Option<String>,

        /// Custom endpoint for S3-compatible storage
        #[arg(long, env = "S3_ENDPOINT_URL")]
        s3_endpoint: Option<String>,
    },
    /// Print the contents of a written report
    Inspect {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Allow the data subnet to reach the storage account
    ConfigureNetwork {
        #[arg(long, env = "SUBSCRIPTION_ID")]
        subscription_id: String,

        #[arg(long, env = "RESOURCE_GROUP")]
        resource_group: String,

        #[arg(long, env = "STORAGE_ACCOUNT_NAME")]
        storage_account: String,

        #[arg(long, env = "VNET_NAME")]
        vnet: String,

        #[arg(long, env = "SUBNET_NAME")]
        subnet: String,

        /// Region recorded on the storage service endpoint
        #[arg(long, env = "LOCATION")]
        location: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/rating_report.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("rating_report.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Report {
            source,
            output,
            dest_bucket,
            dest_prefix,
            charts_dir,
            no_charts,
            top_n,
            gzip,
            local_store,
            azure_account,
            s3_endpoint,
        } => {
            let config = ReportConfig {
                source: Source::parse(&source)?,
                output,
                dest_bucket: dest_bucket.filter(|b| !b.is_empty()),
                dest_prefix,
                charts_dir: (!no_charts).then_some(charts_dir),
                top_n,
                gzip,
            };

            let store = open_store(
                &config.source,
                local_store,
                azure_account.filter(|a| !a.is_empty()),
                s3_endpoint.as_deref(),
            )
            .await?;
            let client = BasicClient::new()?;

            let summary = run_report(&config, &client, store.as_ref()).await?;
            info!(
                rows = summary.rows,
                countries = summary.countries,
                categories = summary.categories,
                output = %summary.output.display(),
                uploaded_key = ?summary.uploaded_key,
                charts = summary.charts.len(),
                "Report complete"
            );
        }
        Commands::Inspect { file } => {
            let bytes = std::fs::read(&file)
                .with_context(|| format!("failed to read report '{}'", file.display()))?;
            let table = parse_report(&bytes)?;

            info!(
                groups = table.groups.len(),
                rows = table.row_count(),
                "Report loaded"
            );
            for (group, field, cell) in table.triples() {
                info!(group = group.trim(), field, value = %format_cell(cell), "Cell");
            }
        }
        Commands::ConfigureNetwork {
            subscription_id,
            resource_group,
            storage_account,
            vnet,
            subnet,
            location,
        } => {
            let credentials = Credentials {
                tenant_id: required_env("AZURE_TENANT_ID")?,
                client_id: required_env("AZURE_CLIENT_ID")?,
                client_secret: required_env("AZURE_CLIENT_SECRET")?,
            };
            let client = ArmClient::new(&credentials).await?;

            let target = AccessTarget {
                subscription_id,
                resource_group,
                storage_account,
                vnet,
                subnet,
                location,
            };
            info!(subnet_id = %target.subnet_id(), "Configuring storage network access");

            let outcome = configure_storage_access(&client, &target).await?;
            info!(
                endpoint_added = outcome.endpoint_added,
                rule_added = outcome.rule_added,
                "Network access configured"
            );
        }
    }

    Ok(())
}

/// Picks the object store backend. A local directory wins; otherwise an
/// Azure account selects Blob Storage and S3 is the fallback.
async fn open_store(
    source: &Source,
    local_store: Option<PathBuf>,
    azure_account: Option<String>,
    s3_endpoint: Option<&str>,
) -> Result<Box<dyn ObjectStore>> {
    if let Some(root) = local_store {
        info!(root = %root.display(), "Using local directory as object store");
        return Ok(Box::new(LocalStore::new(root)));
    }

    match (source.provider(), azure_account) {
        (Some(Provider::S3), Some(account)) => {
            bail!("source {} is in S3 but Azure account '{}' was selected", source, account)
        }
        (_, Some(account)) => {
            info!(account = %account, "Using Azure Blob Storage");
            Ok(Box::new(AzureBlobStore::from_env(&account)?))
        }
        (Some(Provider::Azure), None) => {
            bail!("source {} needs --azure-account (STORAGE_ACCOUNT_NAME)", source)
        }
        (_, None) => Ok(Box::new(S3Store::from_env(s3_endpoint).await)),
    }
}

fn required_env(name: &str) -> Result<String> {
    std::env::var(name).with_context(|| format!("{} must be set", name))
}
