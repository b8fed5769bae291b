use axum::{
    routing::{get, post},
    Router,
};
use jobscout_backend::{
    config::{get_config, init_config},
    database::pool::create_pool,
    routes, AppState,
};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio_cron_scheduler::{Job, JobScheduler};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    init_config()?;
    let config = get_config();

    let pool = create_pool().await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let app_state = AppState::new(pool)?;

    let _scheduler = start_scheduler(app_state.clone()).await?;

    let base_routes = Router::new().route("/health", get(routes::health::health));

    let api = Router::new()
        .route("/api/scrape/run", post(routes::scrape::run_acquisition))
        .route("/api/scrape/sweep", post(routes::scrape::run_sweep))
        .route("/api/vacancies", get(routes::vacancy::list_vacancies))
        .layer(axum::middleware::from_fn_with_state(
            jobscout_backend::middleware::rate_limit::new_rps_state(config.public_rps),
            jobscout_backend::middleware::rate_limit::rps_middleware,
        ));

    let app = base_routes
        .merge(api)
        .with_state(app_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = config.server_address.parse()?;
    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Installs the twice-daily acquisition-then-sweep schedule. The returned
/// handle must stay alive for the jobs to keep firing.
async fn start_scheduler(state: AppState) -> anyhow::Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    let job_state = state.clone();
    let job = Job::new_async("0 0 6,18 * * *", move |_uuid, _lock| {
        let state = job_state.clone();
        Box::pin(async move {
            let deadline = get_config().cycle_deadline();
            match tokio::time::timeout(deadline, state.acquisition_service.run_cycle()).await {
                Ok(summary) => info!(
                    discovered = summary.discovered,
                    new = summary.new,
                    existing = summary.existing,
                    failed_sources = summary.failed_sources,
                    errors = summary.errors,
                    "scheduled acquisition cycle finished"
                ),
                Err(_) => {
                    warn!("scheduled acquisition cycle exceeded its deadline and was cancelled")
                }
            }
            match tokio::time::timeout(deadline, state.sweep_service.sweep()).await {
                Ok(summary) => info!(
                    checked = summary.checked,
                    live = summary.live,
                    removed = summary.removed,
                    skipped = summary.skipped,
                    errors = summary.errors,
                    "scheduled staleness sweep finished"
                ),
                Err(_) => {
                    warn!("scheduled staleness sweep exceeded its deadline and was cancelled")
                }
            }
        })
    })?;
    scheduler.add(job).await?;
    scheduler.start().await?;

    info!("Scheduler started (acquisition and sweep at 06:00 and 18:00)");
    Ok(scheduler)
}
