use anyhow::Context;
use axum_prometheus::PrometheusMetricLayer;
use clap::Parser;
use std::sync::Arc;
use tokio::net::TcpListener;

use churn_service::{
    AppState, Config, LinearClassifier, PlottersRenderer, RequiredColumns, metrics_router, router,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,churn_service=debug".into()),
        )
        .init();

    let config = Config::parse();
    tracing::info!("Starting churn prediction server with config: {:?}", config);

    let columns = RequiredColumns::load(&config.columns_path).with_context(|| {
        format!(
            "loading required columns from {}",
            config.columns_path.display()
        )
    })?;

    tracing::info!("Loading classifier...");
    let classifier = LinearClassifier::load(&config.model_path, &columns)
        .with_context(|| format!("loading classifier from {}", config.model_path.display()))?;
    tracing::info!("Model loaded successfully");

    let renderer = PlottersRenderer::with_font_candidates(&config.font_candidates());

    let state = AppState::new(
        Arc::new(classifier),
        Arc::new(columns),
        Arc::new(renderer),
    );

    let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();

    let app = router(state, config.max_upload_bytes())
        .merge(metrics_router(metric_handle))
        .layer(prometheus_layer);

    let listener = TcpListener::bind(&config.server_address()).await?;
    tracing::info!("Server running on http://{}", config.server_address());

    axum::serve(listener, app).await?;
    Ok(())
}
