#[cfg(feature = "cli")]
use clap::Parser;
#[cfg(feature = "cli")]
use lake_etl::domain::ports::StorageGateway;
#[cfg(feature = "cli")]
use lake_etl::utils::{logger, validation::Validate};
#[cfg(feature = "cli")]
use lake_etl::{
    AlphaVantageSource, CliConfig, DatasetStatus, LocalGateway, MarketEtl, RunConfig,
    StorageConfig,
};
#[cfg(feature = "cli")]
use std::sync::Arc;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();
    logger::init_cli_logger(cli.verbose);

    tracing::info!("Starting lake-etl");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    let config = match RunConfig::from_file(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Configuration load failed: {}", e);
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = config.validate() {
        tracing::error!("Configuration validation failed: {}", e);
        eprintln!("{}", e);
        std::process::exit(1);
    }

    let gateway = build_gateway(&cli, &config.storage).await?;
    let source = AlphaVantageSource::new(config.api.base_url.clone(), config.api.api_key.clone());

    let etl = MarketEtl::new(gateway, source, config.market.clone())?
        .with_monitoring(cli.monitor);
    let report = etl.run().await;

    for entry in &report.entries {
        match &entry.status {
            DatasetStatus::Succeeded(outcome) => {
                tracing::info!("{} [{}]: {:?}", entry.dataset, entry.table, outcome)
            }
            DatasetStatus::Failed(reason) => {
                tracing::error!("{} [{}]: FAILED: {}", entry.dataset, entry.table, reason)
            }
            DatasetStatus::SkippedMissingInput { missing } => {
                tracing::warn!("{}: skipped, upstream '{}' not populated", entry.dataset, missing)
            }
            DatasetStatus::UpstreamFailure => {
                tracing::warn!("{}: upstream failure, state untouched", entry.dataset)
            }
        }
    }

    println!(
        "Run complete: {} succeeded, {} failed, {} total",
        report.succeeded(),
        report.failed(),
        report.entries.len()
    );

    if report.has_failures() {
        std::process::exit(1);
    }

    Ok(())
}

#[cfg(feature = "cli")]
async fn build_gateway(
    cli: &CliConfig,
    storage: &StorageConfig,
) -> anyhow::Result<Arc<dyn StorageGateway>> {
    match storage {
        StorageConfig::Local { path } => {
            let root = cli.data_root.clone().unwrap_or_else(|| path.clone());
            tracing::info!("Using local storage at {}", root);
            Ok(Arc::new(LocalGateway::new(root)))
        }
        #[cfg(feature = "s3")]
        StorageConfig::S3 {
            bucket,
            access_key,
            secret_key,
            region,
            endpoint,
            prefix,
        } => {
            tracing::info!("Using object storage bucket {}", bucket);
            let settings = lake_etl::S3Settings {
                bucket: bucket.clone(),
                region: region.clone(),
                endpoint: endpoint.clone(),
                access_key: access_key.clone(),
                secret_key: secret_key.clone(),
                prefix: prefix.clone(),
            };
            Ok(Arc::new(lake_etl::S3Gateway::connect(&settings).await?))
        }
        #[cfg(not(feature = "s3"))]
        StorageConfig::S3 { .. } => Err(anyhow::anyhow!(
            "configuration selects the s3 backend but this binary was built without the 's3' feature"
        )),
    }
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("lake-etl was built without the 'cli' feature");
}
