use crate::handlers;
use crate::state::AppState;
use axum::{routing::{delete, get, post}, Router};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/auth/register", post(handlers::register))
        .route("/api/auth/login", post(handlers::login))
        .route("/api/auth/logout", post(handlers::logout))
        .route("/api/me", get(handlers::get_me).patch(handlers::update_me))
        .route("/api/goals", get(handlers::list_goals).post(handlers::create_goal))
        .route(
            "/api/goals/:id",
            get(handlers::get_goal)
                .patch(handlers::update_goal)
                .delete(handlers::delete_goal),
        )
        .route(
            "/api/goals/:id/records",
            get(handlers::list_goal_records).post(handlers::create_record),
        )
        .route("/api/goals/:id/trend", get(handlers::get_goal_trend))
        .route("/api/records", get(handlers::list_records))
        .route("/api/stats", get(handlers::get_stats))
        .route(
            "/api/conversations",
            get(handlers::list_conversations).post(handlers::create_conversation),
        )
        .route("/api/conversations/:id", delete(handlers::delete_conversation))
        .route("/api/conversations/:id/messages", post(handlers::create_message))
        .with_state(state)
}
