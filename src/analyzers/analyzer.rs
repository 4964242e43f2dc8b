use crate::analyzers::aggregate::{compute_country_averages, compute_top_categories};
use crate::analyzers::report::build_report_table;
use crate::charts::write_charts;
use crate::dataset::Dataset;
use crate::fetch::{HttpClient, Source, load_source};
use crate::output::{log_aggregates, serialize, write_report};
use crate::storage::{ObjectStore, object_key, upload_report};
use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::info;

/// Everything one report run needs to know.
#[derive(Debug, Clone)]
pub struct ReportConfig {
    pub source: Source,
    /// Local path the encoded report is written to; its file name is also
    /// the uploaded object's name.
    pub output: PathBuf,
    /// Upload destination. No upload when `None`.
    pub dest_bucket: Option<String>,
    pub dest_prefix: Option<String>,
    /// Directory for the HTML charts. No charts when `None`.
    pub charts_dir: Option<PathBuf>,
    pub top_n: usize,
    pub gzip: bool,
}

/// What a report run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportSummary {
    pub rows: usize,
    pub countries: usize,
    pub categories: usize,
    pub output: PathBuf,
    pub uploaded_key: Option<String>,
    pub charts: Vec<PathBuf>,
}

/// Loads the dataset, aggregates it, writes the report and charts locally
/// and uploads the report.
#[tracing::instrument(skip(config, client, store), fields(source = %config.source, top_n = config.top_n))]
pub async fn run_report<C: HttpClient>(
    config: &ReportConfig,
    client: &C,
    store: &dyn ObjectStore,
) -> Result<ReportSummary> {
    let raw = load_source(&config.source, client, store).await?;
    let dataset = Dataset::from_csv_bytes(&raw)
        .with_context(|| format!("failed to parse dataset from {}", config.source))?;
    info!(rows = dataset.len(), "Dataset loaded");

    let countries = compute_country_averages(&dataset)?;
    let categories = compute_top_categories(&dataset, config.top_n)?;
    info!(
        countries = countries.len(),
        categories = categories.len(),
        "Aggregates computed"
    );
    log_aggregates(&countries, &categories);

    let charts = match &config.charts_dir {
        Some(dir) => write_charts(dir, &countries, &categories, config.top_n)?,
        None => Vec::new(),
    };

    let table = build_report_table(&countries, &categories, config.top_n)?;
    let encoded = serialize(&table)?;
    write_report(&config.output, &encoded)?;

    let uploaded_key = match &config.dest_bucket {
        Some(bucket) => {
            let file_name = config
                .output
                .file_name()
                .and_then(|n| n.to_str())
                .context("output path has no file name")?;
            let key = object_key(config.dest_prefix.as_deref(), file_name);
            Some(upload_report(store, bucket, &key, encoded, config.gzip).await?)
        }
        None => {
            info!("No destination bucket configured, skipping upload");
            None
        }
    };

    Ok(ReportSummary {
        rows: dataset.len(),
        countries: countries.len(),
        categories: categories.len(),
        output: config.output.clone(),
        uploaded_key,
        charts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReportError;
    use crate::fetch::BasicClient;
    use crate::output::parse_report;
    use crate::storage::tests::MemoryStore;
    use bytes::Bytes;
    use std::env;

    async fn store_with(csv: &str) -> MemoryStore {
        let store = MemoryStore::default();
        store
            .put("raw", "tourism.csv", Bytes::from(csv.to_string()), "text/csv")
            .await
            .unwrap();
        store
    }

    fn config(name: &str) -> ReportConfig {
        ReportConfig {
            source: Source::parse("s3://raw/tourism.csv").unwrap(),
            output: env::temp_dir().join(format!("rating_report_test_{}/report.csv", name)),
            dest_bucket: Some("processed".into()),
            dest_prefix: Some("analysis".into()),
            charts_dir: None,
            top_n: 3,
            gzip: false,
        }
    }

    #[tokio::test]
    async fn test_run_report_uploads() {
        let store = store_with(
            "Country,Category,Rating\nFrance,Museum,4\nFrance,Museum,5\nItaly,Park,3\n",
        )
        .await;
        let client = BasicClient::new().unwrap();
        let config = config("upload");

        let summary = run_report(&config, &client, &store).await.unwrap();
        assert_eq!(summary.rows, 3);
        assert_eq!(summary.countries, 2);
        assert_eq!(summary.categories, 2);
        assert_eq!(summary.uploaded_key.as_deref(), Some("analysis/report.csv"));

        let uploaded = store.get("processed", "analysis/report.csv").await.unwrap();
        let local = std::fs::read(&config.output).unwrap();
        assert_eq!(&uploaded[..], &local[..]);

        let table = parse_report(&local).unwrap();
        assert_eq!(table.row_count(), 2);
        assert_eq!(*store.creates.lock().unwrap(), 1);

        let _ = std::fs::remove_dir_all(config.output.parent().unwrap());
    }

    #[tokio::test]
    async fn test_run_report_empty_dataset_fails() {
        let store = store_with("Country,Category,Rating\n").await;
        let client = BasicClient::new().unwrap();
        let config = config("empty");

        let err = run_report(&config, &client, &store).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ReportError>(),
            Some(ReportError::EmptyInput)
        ));
        assert!(store.objects.lock().unwrap().len() == 1);
    }

    #[tokio::test]
    async fn test_run_report_schema_error() {
        let store = store_with("Country,Score\nFrance,4\n").await;
        let client = BasicClient::new().unwrap();
        let config = config("schema");

        let err = run_report(&config, &client, &store).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ReportError>(),
            Some(ReportError::Schema { .. })
        ));
    }

    #[tokio::test]
    async fn test_run_report_without_upload() {
        let store = store_with("Country,Category,Rating\nPeru,Park,4\n").await;
        let client = BasicClient::new().unwrap();
        let mut config = config("local_only");
        config.dest_bucket = None;

        let summary = run_report(&config, &client, &store).await.unwrap();
        assert_eq!(summary.uploaded_key, None);
        assert!(summary.output.exists());
        assert_eq!(*store.creates.lock().unwrap(), 0);

        let _ = std::fs::remove_dir_all(config.output.parent().unwrap());
    }
}
