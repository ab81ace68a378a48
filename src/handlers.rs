use crate::auth::bearer_token;
use crate::errors::AppError;
use crate::models::{
    AiConversation, AuthResponse, DailyRecord, GoalPatch, GoalView, LoginRequest, NewConversation,
    NewDailyRecord, NewGoal, NewMessage, ProfilePatch, RecordCreated, RegisterRequest,
    StatsResponse, TrendPoint, UserProfile,
};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

fn token(headers: &HeaderMap) -> Result<&str, AppError> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(bearer_token)
        .ok_or_else(AppError::unauthorized)
}

async fn require_user(state: &AppState, headers: &HeaderMap) -> Result<Uuid, AppError> {
    Ok(state.store.authenticate(token(headers)?).await?)
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let (token, snapshot) = state.store.register(payload).await?;
    Ok((StatusCode::CREATED, Json(AuthResponse { token, snapshot })))
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let (token, snapshot) = state.store.login(payload).await?;
    Ok(Json(AuthResponse { token, snapshot }))
}

pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<StatusCode, AppError> {
    let token = token(&headers)?;
    if state.store.logout(token).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::unauthorized())
    }
}

pub async fn get_me(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<UserProfile>, AppError> {
    let user_id = require_user(&state, &headers).await?;
    Ok(Json(state.store.current_user(user_id).await?))
}

pub async fn update_me(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(patch): Json<ProfilePatch>,
) -> Result<Json<UserProfile>, AppError> {
    let user_id = require_user(&state, &headers).await?;
    Ok(Json(state.store.update_profile(user_id, patch).await?))
}

pub async fn list_goals(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<Vec<GoalView>>, AppError> {
    let user_id = require_user(&state, &headers).await?;
    Ok(Json(state.store.load_goals(user_id).await?))
}

pub async fn create_goal(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<NewGoal>,
) -> Result<(StatusCode, Json<GoalView>), AppError> {
    let user_id = require_user(&state, &headers).await?;
    let goal = state.store.add_goal(user_id, payload).await?;
    Ok((StatusCode::CREATED, Json(goal)))
}

pub async fn get_goal(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<GoalView>, AppError> {
    let user_id = require_user(&state, &headers).await?;
    Ok(Json(state.store.load_goal(user_id, id).await?))
}

pub async fn update_goal(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(patch): Json<GoalPatch>,
) -> Result<Json<GoalView>, AppError> {
    let user_id = require_user(&state, &headers).await?;
    Ok(Json(state.store.update_goal(user_id, id, patch).await?))
}

pub async fn delete_goal(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let user_id = require_user(&state, &headers).await?;
    state.store.delete_goal(user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_goal_records(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<DailyRecord>>, AppError> {
    let user_id = require_user(&state, &headers).await?;
    Ok(Json(state.store.load_daily_records(user_id, Some(id)).await?))
}

pub async fn create_record(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<NewDailyRecord>,
) -> Result<(StatusCode, Json<RecordCreated>), AppError> {
    let user_id = require_user(&state, &headers).await?;
    let created = state.store.add_daily_record(user_id, id, payload).await?;
    let status = if created.applied {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(created)))
}

pub async fn get_goal_trend(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<TrendPoint>>, AppError> {
    let user_id = require_user(&state, &headers).await?;
    Ok(Json(state.store.goal_trend(user_id, id).await?))
}

pub async fn list_records(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<Vec<DailyRecord>>, AppError> {
    let user_id = require_user(&state, &headers).await?;
    Ok(Json(state.store.load_daily_records(user_id, None).await?))
}

pub async fn get_stats(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<StatsResponse>, AppError> {
    let user_id = require_user(&state, &headers).await?;
    Ok(Json(state.store.stats(user_id).await?))
}

pub async fn list_conversations(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<AiConversation>>, AppError> {
    let user_id = require_user(&state, &headers).await?;
    Ok(Json(state.store.load_conversations(user_id).await?))
}

pub async fn create_conversation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<NewConversation>,
) -> Result<(StatusCode, Json<AiConversation>), AppError> {
    let user_id = require_user(&state, &headers).await?;
    let conversation = state.store.add_conversation(user_id, &payload.title).await?;
    Ok((StatusCode::CREATED, Json(conversation)))
}

pub async fn delete_conversation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let user_id = require_user(&state, &headers).await?;
    state.store.delete_conversation(user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn create_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<NewMessage>,
) -> Result<(StatusCode, Json<AiConversation>), AppError> {
    let user_id = require_user(&state, &headers).await?;
    let conversation = state.store.add_message(user_id, id, payload).await?;
    Ok((StatusCode::CREATED, Json(conversation)))
}
