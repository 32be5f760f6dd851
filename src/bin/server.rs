use fintrack_report::{
    api::{start_server, ApiState},
    config::{AppConfig, Provider},
    dashboard::DashboardClient,
    generation::create_backend,
    synthesizer::ReportSynthesizer,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env()?;

    if config.generation.provider != Provider::Mock && config.generation.api_key.is_empty() {
        warn!("Generation API credential not set; every report will use the fallback text");
    }

    info!("FinTrack Report Service - API Server");
    info!("Port: {}", config.port);

    // Create components
    let backend = create_backend(&config.generation)?;
    let synthesizer = Arc::new(ReportSynthesizer::new(
        backend,
        config.generation.params.clone(),
    ));

    let dashboard = match &config.dashboard_base_url {
        Some(url) => {
            info!("Finance API: {}", url);
            Some(Arc::new(DashboardClient::new(url.clone(), config.generation.timeout)?))
        }
        None => None,
    };

    info!("Report synthesizer initialized ({})", synthesizer.backend_name());

    start_server(ApiState::new(synthesizer, dashboard), config.port).await?;

    Ok(())
}
