// src/main.rs

use color_eyre::eyre::{Result, WrapErr, eyre};
use std::sync::Arc;
use tokio::fs::OpenOptions;
use tokio::io::BufReader;
use tracing::{info, warn};

use nexpose_asset_attributor::core::attributor::{AssetAttributor, AttributionEngine, NoopAttributor};
use nexpose_asset_attributor::core::failure::{AttributionFailureHandler, DeadLetterWriter, NoopFailureHandler};
use nexpose_asset_attributor::core::inventory::InventoryClient;
use nexpose_asset_attributor::core::producer::JsonLinesProducer;
use nexpose_asset_attributor::core::validator::{
    AccountAllowListValidator, AssetValidator, MultiValidator, RequiredFieldsValidator,
};
use nexpose_asset_attributor::{App, AttributorConfig, RunSummary, logging};

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let config = AttributorConfig::from_env().wrap_err("invalid configuration")?;
    logging::initialize_logging(&config.logging)?;

    let app = build_app(&config).await?;
    let mut summary = RunSummary::default();
    let result = app.pump(BufReader::new(tokio::io::stdin()), &mut summary).await;
    summary.log();
    result?;
    Ok(())
}

async fn build_app(config: &AttributorConfig) -> Result<App> {
    let attributor: Arc<dyn AssetAttributor> = if config.dry_run {
        warn!("Dry run: records are not looked up in the asset inventory.");
        Arc::new(NoopAttributor)
    } else {
        let endpoint = config
            .inventory_endpoint
            .clone()
            .ok_or_else(|| eyre!("no inventory endpoint configured"))?;
        let client = InventoryClient::new(endpoint, config.inventory_timeout)?;
        info!(endpoint = %client.endpoint(), timeout = ?config.inventory_timeout, "Using asset inventory.");
        Arc::new(AttributionEngine::new(Arc::new(client)))
    };

    let mut validators: Vec<Arc<dyn AssetValidator>> = vec![Arc::new(RequiredFieldsValidator)];
    if !config.allowed_accounts.is_empty() {
        validators.push(Arc::new(AccountAllowListValidator::new(config.allowed_accounts.iter())));
    }
    let validator = MultiValidator::new(validators).with_timeout(config.validator_timeout);

    let failure_handler: Arc<dyn AttributionFailureHandler> = match &config.dead_letter_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .await
                .wrap_err_with(|| format!("cannot open dead letter file {}", path.display()))?;
            Arc::new(DeadLetterWriter::new(file))
        }
        None => Arc::new(NoopFailureHandler),
    };

    Ok(App::new(
        attributor,
        validator,
        Arc::new(JsonLinesProducer::new(tokio::io::stdout())),
        failure_handler,
    ))
}
