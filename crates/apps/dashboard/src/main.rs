use std::env;

use dashboard::{DashboardConfig, HttpApi, LEGEND_TITLE, MapSession};
use render::{RecordingEngine, render_legend_text};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Runs one headless session: loads the national view and, when
/// `DASHBOARD_DRILL` is set to `region/prefecture/code`, drills down along it.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = DashboardConfig::from_env();
    info!(api = %config.api_base, scale = ?config.score_scale, "starting dashboard session");
    let api = HttpApi::new(&config)?;
    let mut session = MapSession::new(config, api, RecordingEngine::new());
    session.init().await?;
    info!("{}", render_legend_text(session.mapper(), LEGEND_TITLE));

    let drill = env::var("DASHBOARD_DRILL").unwrap_or_default();
    if let Err(e) = session.drill(&drill).await {
        warn!(error = %e, path = %drill, "drill stopped");
    }

    let crumbs: Vec<String> = session
        .controller()
        .breadcrumb()
        .into_iter()
        .map(|c| c.label)
        .collect();
    info!(level = %session.controller().level(), path = %crumbs.join(" > "), "view ready");
    if let Some(detail) = session.controller().detail() {
        info!(
            city = %detail.summary.city_name,
            score = ?detail.summary.total_score,
            rank = ?detail.national_rank,
            "municipality detail"
        );
    }
    for (name, value) in session.controller().counters().snapshot() {
        if value > 0 {
            warn!(counter = %name, value, "diagnostic counter");
        }
    }
    for event in session.controller().diagnostics().events() {
        info!(kind = event.kind.as_str(), seq = event.seq, "{}", event.message);
    }

    session.teardown()?;
    Ok(())
}
