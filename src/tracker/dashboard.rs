//! Live dashboard of holder growth rates.
//!
//! `GET /` renders one ranked table per window as a full HTML document that
//! re-fetches itself every `refresh_secs`. `GET /api/rates` serves the same
//! report as JSON. Rates are recomputed from the history store on every
//! request.

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
    routing::get,
    Router,
};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::error::TrackerResult;
use crate::tracker::clock::Clock;
use crate::tracker::rates::compute_report;
use crate::tracker::storage::HolderHistoryStore;
use crate::types::{RateReport, WindowRanking};

/// Shared state for the dashboard handlers.
#[derive(Clone)]
pub struct DashboardState {
    history: Arc<dyn HolderHistoryStore>,
    clock: Arc<dyn Clock>,
    windows: Arc<Vec<Duration>>,
    refresh_secs: u64,
}

impl DashboardState {
    pub fn new(
        history: Arc<dyn HolderHistoryStore>,
        clock: Arc<dyn Clock>,
        windows: Vec<Duration>,
        refresh_secs: u64,
    ) -> Self {
        Self {
            history,
            clock,
            windows: Arc::new(windows),
            refresh_secs,
        }
    }

    /// Compute the ranked report from the current history.
    pub async fn report(&self) -> TrackerResult<RateReport> {
        let history = self.history.load_history().await?;
        Ok(compute_report(&history, &self.windows, self.clock.now_millis()))
    }
}

pub fn dashboard_router(state: DashboardState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/rates", get(rates_json))
        .route("/health", get(health))
        .with_state(state)
}

/// Serve the dashboard until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: DashboardState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!("Mint rate display server running at http://{}", addr);
    }
    axum::serve(listener, dashboard_router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn index(State(state): State<DashboardState>) -> Response {
    match state.report().await {
        Ok(report) => Html(render_page(&report, state.refresh_secs)).into_response(),
        Err(e) => {
            error!("Error calculating holder rates: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Error calculating rates").into_response()
        }
    }
}

async fn rates_json(State(state): State<DashboardState>) -> Response {
    match state.report().await {
        Ok(report) => Json(report).into_response(),
        Err(e) => {
            error!("Error calculating holder rates: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Error calculating rates").into_response()
        }
    }
}

async fn health() -> &'static str {
    "ok"
}

/// Row colour derived from a mint identifier. Purely cosmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hsl {
    pub hue: u32,
    pub saturation: u32,
    pub lightness: u32,
}

impl fmt::Display for Hsl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hsl({}, {}%, {}%)", self.hue, self.saturation, self.lightness)
    }
}

/// Deterministic pastel colour for a string: hue 0-359, saturation 60-79%,
/// lightness 70-79%.
pub fn string_to_color(s: &str) -> Hsl {
    let hash = s
        .encode_utf16()
        .fold(0i32, |hash, c| (c as i32).wrapping_add((hash << 5).wrapping_sub(hash)));

    Hsl {
        hue: hash.rem_euclid(360) as u32,
        saturation: 60 + hash.rem_euclid(20) as u32,
        lightness: 70 + hash.rem_euclid(10) as u32,
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

const STYLE: &str = r#"
        body { font-family: Arial, sans-serif; margin: 0; padding: 20px; background-color: #f0f0f0; }
        h1 { text-align: center; color: #333; }
        .container { display: flex; justify-content: space-between; flex-wrap: wrap; }
        .rate-list { width: 32%; margin-bottom: 20px; background-color: #fff; border-radius: 8px;
                     box-shadow: 0 2px 4px rgba(0,0,0,0.1); overflow: hidden; }
        @media (max-width: 1200px) { .rate-list { width: 100%; } }
        .rate-list h2 { background-color: #4CAF50; color: white; margin: 0; padding: 10px; text-align: center; }
        table { width: 100%; border-collapse: collapse; }
        th, td { border: 1px solid #ddd; padding: 8px; text-align: left; }
        th { background-color: #f2f2f2; font-weight: bold; }
        .mint-address { width: 75%; word-break: break-all; }
        .rate-value { width: 25%; text-align: right; }
"#;

fn render_table(out: &mut String, ranking: &WindowRanking) {
    out.push_str("<table>\n<tr><th class=\"mint-address\">Mint</th><th class=\"rate-value\">New Holders</th></tr>\n");
    for rate in &ranking.rates {
        out.push_str(&format!(
            "<tr style=\"background-color: {};\"><td class=\"mint-address\">{}</td><td class=\"rate-value\">{}</td></tr>\n",
            string_to_color(&rate.mint),
            escape_html(&rate.mint),
            rate.rate
        ));
    }
    out.push_str("</table>\n");
}

/// Render the full dashboard document.
pub fn render_page(report: &RateReport, refresh_secs: u64) -> String {
    let mut out = String::with_capacity(4096);
    out.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"UTF-8\">\n");
    out.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n");
    out.push_str("<title>Mint Holder Rates</title>\n<style>");
    out.push_str(STYLE);
    out.push_str("</style>\n");
    out.push_str(&format!(
        "<script>\nsetInterval(function () {{\n  fetch(window.location.href)\n    .then(function (r) {{ return r.text(); }})\n    .then(function (html) {{\n      var doc = new DOMParser().parseFromString(html, 'text/html');\n      document.body.innerHTML = doc.body.innerHTML;\n    }});\n}}, {});\n</script>\n",
        refresh_secs.max(1).saturating_mul(1_000)
    ));
    out.push_str("</head>\n<body>\n<h1>Mint Holder Rates</h1>\n<div class=\"container\">\n");

    for ranking in &report.windows {
        out.push_str(&format!(
            "<div class=\"rate-list\">\n<h2>{} Rate</h2>\n",
            escape_html(&ranking.label)
        ));
        render_table(&mut out, ranking);
        out.push_str("</div>\n");
    }

    out.push_str("</div>\n</body>\n</html>\n");
    out
}
