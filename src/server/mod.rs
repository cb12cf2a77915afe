/// HTTP API Server module
/// Exposes the receiving desk over REST plus a WebSocket event stream

#[cfg(feature = "server")]
pub mod routes;

#[cfg(feature = "server")]
pub mod handlers;

#[cfg(feature = "server")]
pub mod websocket;

#[cfg(feature = "server")]
pub mod auth;

#[cfg(feature = "server")]
pub use routes::create_router;

#[cfg(feature = "server")]
pub async fn run(
    host: String,
    port: u16,
    enable_cors: bool,
    desk: crate::core::ReceivingDesk,
    config: &crate::utils::AppConfig,
) -> anyhow::Result<()> {
    use anyhow::Context;
    use std::net::SocketAddr;

    use crate::utils::WEB_TOKEN_ENV;
    use handlers::AppState;

    let token = std::env::var(WEB_TOKEN_ENV).ok().filter(|t| !t.is_empty());
    if token.is_none() {
        println!("⚠️  {} environment variable not set!", WEB_TOKEN_ENV);
        println!("    Mutating routes will be open to anyone who can reach the server.");
        println!("    To protect them, restart with e.g.:");
        println!("      export {}=\"{}\"", WEB_TOKEN_ENV, auth::generate_token());
        println!();
        tracing::warn!("starting without API authentication");
    }

    let state = AppState::new(desk, token.clone(), config.seed_count);

    // Keep up with other desks writing to the same data directory
    let sync_state = state.clone();
    let refresh = config.refresh();
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(refresh).await;
            let mut desk = sync_state.desk.write().await;
            if let Err(e) = desk.sync().await {
                tracing::warn!(error = %e, "event log sync failed");
            }
        }
    });

    let app = create_router(state, enable_cors);

    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", host, port))?;
    println!("🚑 Receiving Desk API");
    println!("   🔌 API:    http://{}/api", addr);
    println!("   📡 Events: ws://{}/ws/events", addr);

    if token.is_some() {
        println!("   🔒 Auth:   Enabled (token required for changes)");
    } else {
        println!("   ⚠️  Auth:   Disabled (no token)");
    }

    println!();
    println!("📚 API Endpoints:");
    println!("   GET  /api/health                          - Health check");
    println!("   GET  /api/version                         - Version and build");
    println!("   GET  /api/facilities                      - Facilities and ICU beds");
    println!("   GET  /api/facilities/:name/queue          - Incoming queue");
    println!("   GET  /api/facilities/:name/analytics      - Same-day analytics");
    println!("   GET  /api/facilities/:name/export.csv     - CSV export");
    println!("   GET  /api/facilities/:name/export.json    - JSON export");
    println!("   GET  /api/referrals/:id                   - Referral detail");
    println!("   GET  /api/referrals/:id/isbar             - ISBAR handover text");
    println!("   GET  /api/events?since=&case=&limit=      - Event log");
    println!("   POST /api/referrals/:id/{{accept,enroute,arrive,handover,reject}}");
    println!("   POST /api/referrals/:id/vitals            - Record vitals");
    println!("   POST /api/referrals/:id/interventions     - Record interventions");
    println!("   PUT  /api/facilities/:name/icu            - Set ICU beds open");
    println!("   POST /api/day                             - Seed a new day");
    println!("   GET  /ws/events                           - WebSocket event stream");
    println!();

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(%addr, "API server listening");
    axum::serve(listener, app).await?;

    Ok(())
}
