use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{routing::get, Router};
use clap::Parser;
use http::HeaderValue;
use tokio::{signal, sync::watch};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use sellerdesk_api as api;

#[derive(Parser, Debug)]
#[command(name = "sellerdesk-api", about = "Seller metrics & distribution engine")]
struct Args {
    /// Print an admin token for the configured secret and exit. For ops
    /// tooling and local testing against the override endpoints.
    #[arg(long, value_name = "SUBJECT")]
    issue_admin_token: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let cfg = api::config::load_config()?;
    api::config::init_tracing(cfg.log_level(), cfg.log_json);

    if let Some(subject) = args.issue_admin_token {
        let token = api::auth::issue_token(&cfg.jwt_secret, &subject, true, cfg.jwt_expiration)?;
        println!("{}", token);
        return Ok(());
    }

    // Init DB
    let db_pool = api::db::establish_connection_from_app_config(&cfg).await?;
    if cfg.auto_migrate {
        api::db::run_migrations(&db_pool).await?;
    }
    let db_arc = Arc::new(db_pool);

    // Shutdown signal shared by the bulk coordinator and the realtime tick.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let (app_state, event_rx) = api::build_state(db_arc, cfg.clone(), shutdown_rx.clone());

    // Every write flows through the event loop into the seller rooms.
    tokio::spawn(api::events::process_events(
        event_rx,
        app_state.publisher.clone(),
    ));

    // Periodic re-resolve keeps connected dashboards moving without writes.
    let tick_handle = api::realtime::spawn_periodic_tick(
        app_state.publisher.clone(),
        Duration::from_secs(cfg.realtime_tick_secs),
        shutdown_rx,
    );

    // Build CORS layer from config
    let cors_layer = match cfg.cors_allowed_origins.as_deref() {
        Some(raw) => {
            let origins: Vec<HeaderValue> = raw
                .split(',')
                .filter_map(|origin| HeaderValue::from_str(origin.trim()).ok())
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any)
        }
        None => {
            if !cfg.is_development() {
                warn!("No CORS origins configured; falling back to permissive CORS");
            }
            CorsLayer::permissive()
        }
    };

    let app = Router::new()
        .route("/", get(|| async { "sellerdesk-api up" }))
        .route("/metrics", get(|| async { api::metrics::render() }))
        .merge(api::handlers::health::health_routes())
        .merge(api::realtime::realtime_routes())
        .nest("/api/v1", api::api_v1_routes())
        .merge(api::openapi::swagger_ui())
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors_layer)
        .with_state(app_state);

    // Bind and serve
    let addr = SocketAddr::from((cfg.host.parse::<std::net::IpAddr>()?, cfg.port));
    info!("sellerdesk-api listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop background work cooperatively; in-flight bulk items finish
    // atomically and remaining items are reported as cancelled.
    let _ = shutdown_tx.send(true);
    let _ = tick_handle.await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install signal handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
