//! HTTP API consumed by the dining assistant front end.

use crate::analysis::{analyze_meal, MealAnalysis};
use crate::calculator::{calculate_targets, BodyProfile, NutritionTargets};
use crate::chat::{finish_reply, ChatReply, ChatService};
use crate::config::{AppConfig, SummaryConfig};
use crate::dashboard::{build_dashboard, Dashboard, TimeRange};
use crate::enrich::NutritionCache;
use crate::error::DiningError;
use crate::halls::portal_date;
use crate::history::{ManualMeal, MealHistory};
use crate::model::{ChatMessage, ChatSession, MealHistoryEntry, MenuData, MenuItem, NutritionFacts};
use crate::plan::{selected_menu_summary, MealPlan, MealPlanRequest, MealPlanner};
use crate::portal::MenuPortal;
use crate::providers::{LlmProvider, ProviderFactory};
use crate::sessions::ChatSessions;
use crate::store::{FileStore, KeyValueStore};
use crate::summary::menu_summary;
use axum::{
    extract::{rejection::JsonRejection, FromRequest, Path, Query, State},
    http::{header::CONTENT_TYPE, Method, StatusCode},
    response::{
        sse::{Event, KeepAlive},
        IntoResponse, Response, Sse,
    },
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Local, NaiveDate, Utc};
use futures::Stream;
use log::{error, info, warn};
use serde::Deserialize;
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::signal::ctrl_c;
use tower_http::cors::CorsLayer;

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Dining(#[from] DiningError),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Dining(DiningError::MissingInput(_) | DiningError::InvalidInput(_)) => {
                StatusCode::BAD_REQUEST
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("{}", self);
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Dining(DiningError::InvalidInput(rejection.body_text()))
    }
}

type ApiResult<T> = Result<Json<T>, AppError>;

/// JSON request body whose rejections answer 400 with an `{"error"}` body.
#[derive(FromRequest)]
#[from_request(via(Json), rejection(AppError))]
struct Payload<T>(T);

/// Shared handles for every route.
#[derive(Clone)]
pub struct AppState {
    pub portal: Arc<MenuPortal>,
    pub provider: Arc<dyn LlmProvider>,
    pub chat: Arc<ChatService>,
    pub planner: Arc<MealPlanner>,
    pub cache: Arc<NutritionCache>,
    pub history: Arc<MealHistory>,
    pub sessions: Arc<ChatSessions>,
}

impl AppState {
    pub async fn new(
        portal: MenuPortal,
        provider: Arc<dyn LlmProvider>,
        store: Arc<dyn KeyValueStore>,
        summary: SummaryConfig,
    ) -> Self {
        AppState {
            portal: Arc::new(portal),
            chat: Arc::new(ChatService::new(provider.clone(), summary)),
            planner: Arc::new(MealPlanner::new(provider.clone())),
            provider,
            cache: Arc::new(NutritionCache::new()),
            history: Arc::new(MealHistory::load(store.clone()).await),
            sessions: Arc::new(ChatSessions::load(store).await),
        }
    }

    pub async fn from_config(config: &AppConfig) -> Result<Self, DiningError> {
        let portal = MenuPortal::from_config(&config.portal)?;
        let provider: Arc<dyn LlmProvider> = Arc::from(ProviderFactory::create(&config.llm)?);
        let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(&config.storage.dir));
        Ok(Self::new(portal, provider, store, config.summary).await)
    }
}

fn required<'a>(value: &'a str, field: &'static str) -> Result<&'a str, DiningError> {
    let value = value.trim();
    if value.is_empty() {
        Err(DiningError::MissingInput(field))
    } else {
        Ok(value)
    }
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct MenuRequest {
    dining_hall: String,
    date: String,
    meal_period: String,
}

async fn menu_handler(
    State(state): State<AppState>,
    Payload(payload): Payload<MenuRequest>,
) -> ApiResult<MenuData> {
    let hall = required(&payload.dining_hall, "Dining hall")?;
    let date = required(&payload.date, "Date")?;
    let period = required(&payload.meal_period, "Meal period")?;
    Ok(Json(state.portal.fetch_menu(hall, date, period).await?))
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct NutritionRequest {
    nutrition_link: String,
}

async fn nutrition_handler(
    State(state): State<AppState>,
    Payload(payload): Payload<NutritionRequest>,
) -> ApiResult<NutritionFacts> {
    let link = required(&payload.nutrition_link, "Nutrition link")?;
    Ok(Json(state.portal.fetch_nutrition(link).await?))
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct AnalyzeRequest {
    meal_description: String,
}

async fn analyze_handler(
    State(state): State<AppState>,
    Payload(payload): Payload<AnalyzeRequest>,
) -> ApiResult<MealAnalysis> {
    Ok(Json(analyze_meal(state.provider.as_ref(), &payload.meal_description).await?))
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct ChatRequest {
    messages: Vec<ChatMessage>,
    menu_summary: Option<String>,
    /// Enables nutrition enrichment of the reply
    menu_data: Option<MenuData>,
}

impl ChatRequest {
    fn summary(&self) -> Option<String> {
        self.menu_summary
            .clone()
            .or_else(|| self.menu_data.as_ref().map(menu_summary))
    }
}

async fn chat_handler(
    State(state): State<AppState>,
    Payload(payload): Payload<ChatRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    if payload.messages.is_empty() {
        return Err(DiningError::MissingInput("Messages").into());
    }

    let summary = payload.summary();
    let text = state.chat.chat(&payload.messages, summary.as_deref()).await;
    let reply = finish_reply(
        &text,
        payload.menu_data.as_ref(),
        state.portal.as_ref(),
        &state.cache,
    )
    .await;

    let event = Event::default()
        .json_data(&reply)
        .map_err(|e| AppError::Internal(e.to_string()))?;
    let events: [Result<Event, Infallible>; 2] = [Ok(event), Ok(Event::default().data("[DONE]"))];
    Ok(Sse::new(futures::stream::iter(events)).keep_alive(KeepAlive::new()))
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct DirectChatRequest {
    message: String,
    menu_summary: Option<String>,
    menu_data: Option<MenuData>,
}

async fn direct_chat_handler(
    State(state): State<AppState>,
    Payload(payload): Payload<DirectChatRequest>,
) -> ApiResult<ChatReply> {
    let message = required(&payload.message, "Message")?;
    let summary = payload
        .menu_summary
        .clone()
        .or_else(|| payload.menu_data.as_ref().map(menu_summary));

    let text = state.chat.direct(message, summary.as_deref()).await;
    let reply = finish_reply(
        &text,
        payload.menu_data.as_ref(),
        state.portal.as_ref(),
        &state.cache,
    )
    .await;
    Ok(Json(reply))
}

async fn meal_plan_handler(
    State(state): State<AppState>,
    Payload(payload): Payload<MealPlanRequest>,
) -> ApiResult<MealPlan> {
    let today = portal_date(Local::now().date_naive());
    let summary = selected_menu_summary(&state.portal, &payload, &today).await;
    Ok(Json(state.planner.generate(&payload, summary.as_deref()).await))
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct MealsQuery {
    /// Only meals on this UTC day, as `YYYY-MM-DD`
    date: Option<String>,
}

async fn list_meals_handler(
    State(state): State<AppState>,
    Query(query): Query<MealsQuery>,
) -> ApiResult<Vec<MealHistoryEntry>> {
    let meals = match query.date.as_deref() {
        Some(date) => {
            let day = NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .map_err(|_| DiningError::InvalidInput(format!("Invalid date: {date}")))?;
            state.history.for_day(day).await
        }
        None => state.history.entries().await,
    };
    Ok(Json(meals))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManualMealRequest {
    date: Option<DateTime<Utc>>,
    meal_type: String,
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    dining_hall: String,
}

impl ManualMealRequest {
    fn into_meal(self) -> Result<ManualMeal, DiningError> {
        required(&self.name, "Name")?;
        required(&self.meal_type, "Meal type")?;
        Ok(ManualMeal {
            date: self.date.unwrap_or_else(Utc::now),
            meal_type: self.meal_type,
            name: self.name,
            description: self.description,
            dining_hall: self.dining_hall,
        })
    }
}

async fn add_meal_handler(
    State(state): State<AppState>,
    Payload(payload): Payload<ManualMealRequest>,
) -> ApiResult<MealHistoryEntry> {
    Ok(Json(state.history.add_manual(payload.into_meal()?).await?))
}

async fn update_meal_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Payload(payload): Payload<ManualMealRequest>,
) -> ApiResult<MealHistoryEntry> {
    state
        .history
        .update(&id, payload.into_meal()?)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("Meal"))
}

async fn delete_meal_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    if state.history.delete(&id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound("Meal"))
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MenuMealRequest {
    item: MenuItem,
    dining_hall: String,
    meal_period: String,
    nutrition: Option<NutritionFacts>,
}

/// Log a menu item, fetching its nutrition page when the client has none.
async fn add_menu_meal_handler(
    State(state): State<AppState>,
    Payload(payload): Payload<MenuMealRequest>,
) -> ApiResult<MealHistoryEntry> {
    let facts = match (&payload.nutrition, &payload.item.nutrition_link) {
        (Some(facts), _) => Some(facts.clone()),
        (None, Some(link)) => state
            .portal
            .fetch_nutrition(link)
            .await
            .inspect_err(|e| warn!("Logging {} without nutrition: {}", payload.item.name, e))
            .ok(),
        (None, None) => None,
    };
    let entry = state
        .history
        .add_from_menu(
            &payload.item,
            &payload.dining_hall,
            &payload.meal_period,
            facts.as_ref(),
        )
        .await?;
    Ok(Json(entry))
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct DashboardQuery {
    range: Option<String>,
}

async fn dashboard_handler(
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
) -> ApiResult<Dashboard> {
    let range = match query.range.as_deref() {
        Some(range) => range
            .parse::<TimeRange>()
            .map_err(DiningError::InvalidInput)?,
        None => TimeRange::default(),
    };
    let meals = state.history.entries().await;
    Ok(Json(build_dashboard(&meals, range, Utc::now())))
}

async fn targets_handler(Payload(profile): Payload<BodyProfile>) -> ApiResult<NutritionTargets> {
    Ok(Json(calculate_targets(&profile)?))
}

async fn list_sessions_handler(State(state): State<AppState>) -> Json<Vec<ChatSession>> {
    Json(state.sessions.list().await)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SaveSessionRequest {
    dining_hall: String,
    meal_period: String,
    messages: Vec<ChatMessage>,
}

async fn save_session_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Payload(payload): Payload<SaveSessionRequest>,
) -> ApiResult<ChatSession> {
    let session = state
        .sessions
        .autosave(&id, &payload.dining_hall, &payload.meal_period, payload.messages)
        .await?;
    Ok(Json(session))
}

async fn get_session_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ChatSession> {
    state
        .sessions
        .get(&id)
        .await
        .map(Json)
        .ok_or(AppError::NotFound("Session"))
}

async fn delete_session_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    if state.sessions.delete(&id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound("Session"))
    }
}

async fn export_session_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let export = state
        .sessions
        .export(&id)
        .await?
        .ok_or(AppError::NotFound("Session"))?;
    let disposition = format!("attachment; filename=\"{}\"", export.file_name);
    Ok((
        [
            (CONTENT_TYPE, "application/json".to_string()),
            (axum::http::header::CONTENT_DISPOSITION, disposition),
        ],
        export.json,
    )
        .into_response())
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/api/menu", post(menu_handler))
        .route("/api/nutrition", post(nutrition_handler))
        .route("/api/analyze-meal", post(analyze_handler))
        .route("/api/chat", post(chat_handler))
        .route("/api/chat/direct", post(direct_chat_handler))
        .route("/api/meal-plan", post(meal_plan_handler))
        .route("/api/meals", get(list_meals_handler).post(add_meal_handler))
        .route("/api/meals/from-menu", post(add_menu_meal_handler))
        .route(
            "/api/meals/:id",
            axum::routing::put(update_meal_handler).delete(delete_meal_handler),
        )
        .route("/api/dashboard", get(dashboard_handler))
        .route("/api/targets", post(targets_handler))
        .route("/api/sessions", get(list_sessions_handler))
        .route(
            "/api/sessions/:id",
            get(get_session_handler)
                .put(save_session_handler)
                .delete(delete_session_handler),
        )
        .route("/api/sessions/:id/export", get(export_session_handler))
        .layer(cors)
        .with_state(state)
}

/// Bind the configured address and serve until Ctrl+C or SIGTERM.
pub async fn serve(config: &AppConfig) -> Result<(), DiningError> {
    info!("Initializing state...");
    let state = AppState::from_config(config).await?;

    let address = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(error: AppError) -> StatusCode {
        error.into_response().status()
    }

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            status_of(DiningError::MissingInput("Nutrition link").into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_of(AppError::NotFound("Meal")), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(DiningError::UpstreamStatus(503).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_missing_input_message() {
        let error: AppError = DiningError::MissingInput("Nutrition link").into();
        assert_eq!(error.to_string(), "Nutrition link is required");
    }

    #[tokio::test]
    async fn test_body_rejections_are_bad_requests() {
        use axum::body::Body;
        use axum::http::Request;

        let request = |body: &'static str| {
            Request::post("/")
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body))
                .unwrap()
        };

        let missing =
            Payload::<ManualMealRequest>::from_request(request(r#"{"mealType":"lunch"}"#), &())
                .await
                .err()
                .unwrap();
        assert_eq!(missing.into_response().status(), StatusCode::BAD_REQUEST);

        let garbled = Payload::<AnalyzeRequest>::from_request(request("not json"), &())
            .await
            .err()
            .unwrap();
        assert!(matches!(garbled, AppError::Dining(DiningError::InvalidInput(_))));
    }

    #[test]
    fn test_chat_request_summary_falls_back_to_menu() {
        let menu = MenuData::new("The Atrium", "3/4/2025", "Lunch", Vec::new());
        let request = ChatRequest {
            menu_data: Some(menu),
            ..Default::default()
        };
        assert!(request.summary().unwrap().starts_with("Menu at The Atrium"));
    }
}
