//! # Proxyboard — Reactive Trading Dashboard Backend
//!
//! ## Architecture Overview
//!
//! ```text
//!  ┌──────────────┐  POST /api/value, /api/select,  ┌───────────────────────┐
//!  │  Dashboard   │  /api/simulation/*, /api/reset  │  AppState             │
//!  │  (browser)   │ ───────────────────────────────▶│   TradingStore        │
//!  └──────────────┘                                 │   ├─ observers        │
//!         ▲                                         │   ├─ mutation log     │
//!         │  WS /ws/monitor                         │   ├─ price history    │
//!         │  SNAPSHOT, STATE_CHANGED, ...           │   └─ persistence ──▶ STORAGE_DIR
//!         └─────────────────────────────────────────│   Simulator (1.5 s)   │
//!                                                   └───────────────────────┘
//! ```
//!
//! Settings come from the environment; see [`proxyboard::config`].

use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use proxyboard::{
    config::Config,
    routes::router,
    state::{build_state, spawn_render_forwarder},
};

// ─── Entry Point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Load .env (optional) ──────────────────────────────────────────────
    dotenvy::dotenv().ok();

    // ── 2. Initialise structured logging ─────────────────────────────────────
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env()
            .add_directive("proxyboard=debug".parse()?)
            .add_directive("tower_http=info".parse()?))
        .init();

    info!(
        r#"

  ╔═══════════════════════════════════════════════╗
  ║        PROXYBOARD — Trading Dashboard         ║
  ║        Observable store · Live simulation     ║
  ╚═══════════════════════════════════════════════╝"#
    );

    // ── 3. Configuration & shared state ──────────────────────────────────────
    let config = Config::from_env()?;
    let addr = config.bind_addr;
    let autostart = config.autostart;
    info!(
        storage_dir = %config.storage_dir.display(),
        key = %config.storage_key,
        tick = ?config.tick_interval,
        "⚙️ Configuration loaded"
    );

    let state = build_state(config);
    let _forwarder = spawn_render_forwarder(state.clone());

    if autostart {
        state.start_simulation();
    }

    // ── 4. CORS (browser dashboard on another origin) ───────────────────────
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // ── 5. Router + middleware ───────────────────────────────────────────────
    let app = router(state.clone())
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    info!(?addr, "🚀 Proxyboard server starting");

    // ── 6. Serve ─────────────────────────────────────────────────────────────
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    state.stop_simulation();
    Ok(())
}
