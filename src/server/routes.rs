/// API Routes definition

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::auth;
use super::handlers::{self, AppState};
use super::websocket;

pub fn create_router(state: AppState, enable_cors: bool) -> Router {
    // Protected routes (require authentication)
    let protected_routes = Router::new()
        .route("/api/referrals/:id/accept", post(handlers::accept))
        .route("/api/referrals/:id/enroute", post(handlers::enroute))
        .route("/api/referrals/:id/arrive", post(handlers::arrive))
        .route("/api/referrals/:id/handover", post(handlers::handover))
        .route("/api/referrals/:id/reject", post(handlers::reject))
        .route("/api/referrals/:id/vitals", post(handlers::record_vitals))
        .route("/api/referrals/:id/interventions", post(handlers::record_interventions))
        .route("/api/facilities/:name/icu", put(handlers::set_icu))
        .route("/api/day", post(handlers::new_day))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::auth_middleware));

    // Public routes (read-only, no auth required)
    let public_routes = Router::new()
        .route("/api/health", get(handlers::health_check))
        .route("/api/version", get(handlers::get_version_info))
        .route("/api/facilities", get(handlers::get_facilities))
        .route("/api/facilities/:name/queue", get(handlers::get_queue))
        .route("/api/facilities/:name/analytics", get(handlers::get_analytics))
        .route("/api/facilities/:name/export.csv", get(handlers::export_csv))
        .route("/api/facilities/:name/export.json", get(handlers::export_json))
        .route("/api/referrals/:id", get(handlers::get_referral))
        .route("/api/referrals/:id/isbar", get(handlers::get_isbar))
        .route("/api/events", get(handlers::get_events))
        .route("/ws/events", get(websocket::ws_events_handler));

    let mut app = Router::new()
        .merge(protected_routes)
        .merge(public_routes)
        .with_state(state)
        // Add tracing middleware
        .layer(TraceLayer::new_for_http());

    if enable_cors {
        app = app.layer(CorsLayer::permissive());
    }

    app
}
