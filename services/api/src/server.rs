use crate::cli::ServeArgs;
use crate::demo::sample_dataset;
use crate::infra::{AppState, InMemoryChargesStore};
use crate::routes::with_charges_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use common_charges::config::{AppConfig, AppEnvironment};
use common_charges::error::AppError;
use common_charges::telemetry;
use common_charges::workflows::charges::{ChargesDataset, ChargesService};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if let Some(data_dir) = args.data_dir.take() {
        config.data.data_dir = Some(data_dir);
    }

    telemetry::init(&config.telemetry)?;

    let dataset = match (&config.data.data_dir, config.environment) {
        (Some(dir), _) => {
            info!(data_dir = %dir.display(), "loading charges snapshot");
            ChargesDataset::from_dir(dir)?
        }
        (None, AppEnvironment::Production) => {
            warn!("CHARGES_DATA_DIR not set; serving an empty charges store");
            ChargesDataset::default()
        }
        (None, _) => {
            info!("CHARGES_DATA_DIR not set; serving the sample buildings");
            sample_dataset()
        }
    };

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = Arc::new(InMemoryChargesStore::new(dataset));
    let buildings = store.building_count();
    let charges_service = Arc::new(ChargesService::new(store.clone(), store));

    let app = with_charges_routes(charges_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        environment = config.environment.label(),
        %addr,
        buildings,
        "common charges service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
