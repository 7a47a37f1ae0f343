use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Path, Query, Request, State},
    http::{HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info};

use weighin_core::fooddb::{FoodDatabase, FoodNutrientLookup};
use weighin_core::models::{
    DailyTargets, DayLog, FoodLogEntry, FoodLogUpdate, FoodNutrients, Profile, ProgressReport,
    WeightEntry, validate_meal_type, validate_nutrients, validate_profile, validate_weight,
};
use weighin_core::service::PlannerService;

const BODY_LIMIT: usize = 1024 * 1024; // 1 MB

#[derive(Clone)]
struct AppState {
    svc: Arc<Mutex<PlannerService>>,
    foods: Option<Arc<Mutex<FoodDatabase>>>,
}

impl AppState {
    fn svc(&self) -> MutexGuard<'_, PlannerService> {
        self.svc
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

// --- Request / Response types ---

#[derive(Deserialize)]
struct ProfileRequest {
    weight_lbs: f64,
    target_weight_lbs: f64,
    height_inches: f64,
    body_fat_percentage: Option<f64>,
    today_date: String,
    target_date: String,
}

#[derive(Deserialize)]
struct CreateWeightRequest {
    date: String,
    weight_lbs: f64,
    notes: Option<String>,
}

#[derive(Deserialize)]
struct WeightHistoryQuery {
    days: Option<i64>,
}

/// Either a database food (`food_id` + `grams`) or a manual entry
/// (`name` + nutrients).
#[derive(Deserialize)]
struct CreateFoodRequest {
    date: String,
    meal_type: String,
    food_id: Option<i64>,
    grams: Option<f64>,
    name: Option<String>,
    calories: Option<f64>,
    #[serde(default)]
    protein: f64,
    #[serde(default)]
    fat: f64,
    #[serde(default)]
    carbs: f64,
    #[serde(default)]
    fiber: f64,
    #[serde(default)]
    sodium: f64,
}

/// Fields to change on a logged food. Omitted fields are kept.
#[derive(Deserialize)]
struct UpdateFoodRequest {
    name: Option<String>,
    meal_type: Option<String>,
    calories: Option<f64>,
    protein: Option<f64>,
    fat: Option<f64>,
    carbs: Option<f64>,
    fiber: Option<f64>,
    sodium: Option<f64>,
}

impl From<UpdateFoodRequest> for FoodLogUpdate {
    fn from(req: UpdateFoodRequest) -> Self {
        Self {
            food_name: req.name,
            meal_type: req.meal_type,
            calories: req.calories,
            protein: req.protein,
            fat: req.fat,
            carbs: req.carbs,
            fiber: req.fiber,
            sodium: req.sodium,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// --- Error handling ---

enum ApiError {
    NotFound(String),
    BadRequest(String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Internal(err) => {
                error!("internal server error: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

fn bad_request(err: &anyhow::Error) -> ApiError {
    ApiError::BadRequest(format!("{err}"))
}

fn parse_date(s: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| ApiError::BadRequest(format!("Invalid date '{s}'. Use YYYY-MM-DD")))
}

// --- Middleware ---

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static("default-src 'none'"),
    );
    response
}

// --- Profile / targets ---

async fn get_profile(
    State(state): State<AppState>,
    Path(user): Path<String>,
) -> Result<Json<Profile>, ApiError> {
    let profile = state
        .svc()
        .get_profile(&user)
        .context("database error")?
        .ok_or_else(|| ApiError::NotFound(format!("No profile for '{user}'")))?;
    Ok(Json(profile))
}

async fn put_profile(
    State(state): State<AppState>,
    Path(user): Path<String>,
    Json(req): Json<ProfileRequest>,
) -> Result<Json<Profile>, ApiError> {
    let profile = Profile {
        username: user,
        weight_lbs: req.weight_lbs,
        target_weight_lbs: req.target_weight_lbs,
        height_inches: req.height_inches,
        body_fat_percentage: req.body_fat_percentage,
        today_date: parse_date(&req.today_date)?,
        target_date: parse_date(&req.target_date)?,
    };
    validate_profile(&profile).map_err(|e| bad_request(&e))?;

    let saved = state
        .svc()
        .save_profile(&profile)
        .context("failed to save profile")?;
    Ok(Json(saved))
}

async fn get_targets(
    State(state): State<AppState>,
    Path((user, date)): Path<(String, String)>,
) -> Result<Json<DailyTargets>, ApiError> {
    let date = parse_date(&date)?;
    let targets = state
        .svc()
        .daily_targets(&user, date)
        .context("failed to compute targets")?
        .ok_or_else(|| ApiError::NotFound(format!("No profile for '{user}'")))?;
    Ok(Json(targets))
}

// --- Weight ---

async fn create_weight(
    State(state): State<AppState>,
    Path(user): Path<String>,
    Json(req): Json<CreateWeightRequest>,
) -> Result<(StatusCode, Json<WeightEntry>), ApiError> {
    let date = parse_date(&req.date)?;
    validate_weight(req.weight_lbs).map_err(|e| bad_request(&e))?;

    let entry = state
        .svc()
        .log_weight(&user, date, req.weight_lbs, req.notes)
        .context("failed to upsert weight")?;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn get_weight_history(
    State(state): State<AppState>,
    Path(user): Path<String>,
    Query(params): Query<WeightHistoryQuery>,
) -> Result<Json<Vec<WeightEntry>>, ApiError> {
    if params.days.is_some_and(|d| d <= 0) {
        return Err(ApiError::BadRequest(
            "days must be greater than 0".to_string(),
        ));
    }
    let entries = state
        .svc()
        .weight_history(&user, params.days)
        .context("database error")?;
    Ok(Json(entries))
}

async fn delete_weight(
    State(state): State<AppState>,
    Path((user, date)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let date = parse_date(&date)?;
    if state
        .svc()
        .delete_weight(&user, date)
        .context("database error")?
    {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("No weight entry for {date}")))
    }
}

// --- Food log ---

async fn get_summary(
    State(state): State<AppState>,
    Path((user, date)): Path<(String, String)>,
) -> Result<Json<DayLog>, ApiError> {
    let date = parse_date(&date)?;
    let day = state
        .svc()
        .day_log(&user, date)
        .context("failed to build day log")?;
    Ok(Json(day))
}

async fn create_food(
    State(state): State<AppState>,
    Path(user): Path<String>,
    Json(req): Json<CreateFoodRequest>,
) -> Result<(StatusCode, Json<FoodLogEntry>), ApiError> {
    let date = parse_date(&req.date)?;
    let meal_type = validate_meal_type(&req.meal_type).map_err(|e| bad_request(&e))?;

    let entry = if let Some(food_id) = req.food_id {
        let grams = req
            .grams
            .filter(|g| g.is_finite() && *g > 0.0)
            .ok_or_else(|| ApiError::BadRequest("grams must be greater than 0".to_string()))?;
        let foods = state.foods.as_ref().ok_or_else(|| {
            ApiError::BadRequest("No food database configured on this server".to_string())
        })?;
        let foods = foods
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let food = foods.get_food(food_id).context("food database error")?;
        if food.is_none() {
            return Err(ApiError::BadRequest(format!(
                "Food with id {food_id} not found"
            )));
        }
        state
            .svc()
            .log_food_from_database(&*foods, &user, date, &meal_type, food_id, grams)
            .context("failed to log food")?
    } else {
        let name = req
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| {
                ApiError::BadRequest("Either food_id or a non-empty name is required".to_string())
            })?;
        let nutrients = FoodNutrients::manual(
            req.calories,
            req.protein,
            req.fat,
            req.carbs,
            req.fiber,
            req.sodium,
        );
        validate_nutrients(&nutrients).map_err(|e| bad_request(&e))?;
        state
            .svc()
            .log_food(&user, date, &meal_type, name, nutrients)
            .context("failed to log food")?
    };

    Ok((StatusCode::CREATED, Json(entry)))
}

async fn get_food(
    State(state): State<AppState>,
    Path((user, id)): Path<(String, i64)>,
) -> Result<Json<FoodLogEntry>, ApiError> {
    let entry = state
        .svc()
        .get_food_log(&user, id)
        .context("database error")?
        .ok_or_else(|| ApiError::NotFound(format!("Entry {id} not found")))?;
    Ok(Json(entry))
}

async fn update_food(
    State(state): State<AppState>,
    Path((user, id)): Path<(String, i64)>,
    Json(req): Json<UpdateFoodRequest>,
) -> Result<Json<FoodLogEntry>, ApiError> {
    let update = FoodLogUpdate::from(req);
    if update.is_empty() {
        return Err(ApiError::BadRequest(
            "Nothing to update. Provide at least one field".to_string(),
        ));
    }
    if let Some(meal) = &update.meal_type {
        validate_meal_type(meal).map_err(|e| bad_request(&e))?;
    }
    if update.food_name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(ApiError::BadRequest("name must not be empty".to_string()));
    }

    let svc = state.svc();
    let not_found = || ApiError::NotFound(format!("Entry {id} not found"));
    let current = svc
        .get_food_log(&user, id)
        .context("database error")?
        .ok_or_else(not_found)?;
    validate_nutrients(&update.apply(&current.nutrients)).map_err(|e| bad_request(&e))?;

    let entry = svc
        .update_food(&user, id, &update)
        .context("failed to update food")?
        .ok_or_else(not_found)?;
    Ok(Json(entry))
}

async fn delete_food(
    State(state): State<AppState>,
    Path((user, id)): Path<(String, i64)>,
) -> Result<StatusCode, ApiError> {
    if state.svc().delete_food(&user, id).context("database error")? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Entry {id} not found")))
    }
}

// --- Progress ---

async fn get_progress(
    State(state): State<AppState>,
    Path(user): Path<String>,
) -> Result<Json<ProgressReport>, ApiError> {
    let svc = state.svc();
    if svc.get_profile(&user).context("database error")?.is_none() {
        return Err(ApiError::NotFound(format!("No profile for '{user}'")));
    }
    let report = svc
        .progress(&user)
        .context("failed to build progress report")?
        .ok_or_else(|| ApiError::NotFound("No weight entries logged".to_string()))?;
    Ok(Json(report))
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/users/{user}/profile",
            get(get_profile).put(put_profile),
        )
        .route("/api/users/{user}/targets/{date}", get(get_targets))
        .route(
            "/api/users/{user}/weight",
            post(create_weight).get(get_weight_history),
        )
        .route("/api/users/{user}/weight/{date}", delete(delete_weight))
        .route("/api/users/{user}/summary/{date}", get(get_summary))
        .route("/api/users/{user}/food", post(create_food))
        .route(
            "/api/users/{user}/food/{id}",
            get(get_food).put(update_food).delete(delete_food),
        )
        .route("/api/users/{user}/progress", get(get_progress))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(middleware::from_fn(security_headers))
        .with_state(state)
}

// --- Server startup ---

pub async fn start_server(
    svc: PlannerService,
    foods: Option<FoodDatabase>,
    port: u16,
    bind: &str,
) -> anyhow::Result<()> {
    if foods.is_none() {
        eprintln!("Warning: no food database found. Logging by food_id is disabled.");
    }
    let state = AppState {
        svc: Arc::new(Mutex::new(svc)),
        foods: foods.map(|f| Arc::new(Mutex::new(f))),
    };

    let app = build_router(state);

    if bind != "127.0.0.1" && bind != "localhost" {
        eprintln!(
            "Warning: Listening on {bind} with no authentication. Any device on your network can access this API."
        );
    }

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}"))
        .await
        .with_context(|| format!("failed to bind {bind}:{port}"))?;
    info!(%bind, port, "server started");
    eprintln!("Listening on http://{bind}:{port}");
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        AppState {
            svc: Arc::new(Mutex::new(PlannerService::new_in_memory().unwrap())),
            foods: None,
        }
    }

    fn test_app() -> Router {
        build_router(test_state())
    }

    fn json_request(method: &str, uri: &str, body: &serde_json::Value) -> axum::http::Request<Body> {
        axum::http::Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(body).unwrap()))
            .unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    fn profile_body() -> serde_json::Value {
        serde_json::json!({
            "weight_lbs": 180.0,
            "target_weight_lbs": 175.0,
            "height_inches": 70.0,
            "body_fat_percentage": 20.0,
            "today_date": "2024-06-10",
            "target_date": "2024-06-15"
        })
    }

    fn seed_profile(state: &AppState) {
        let svc = state.svc.lock().unwrap();
        svc.save_profile(&Profile {
            username: "alex".to_string(),
            weight_lbs: 180.0,
            target_weight_lbs: 175.0,
            height_inches: 70.0,
            body_fat_percentage: Some(20.0),
            today_date: NaiveDate::from_ymd_opt(2024, 6, 10).unwrap(),
            target_date: NaiveDate::from_ymd_opt(2024, 6, 15).unwrap(),
        })
        .unwrap();
    }

    #[tokio::test]
    async fn put_then_get_profile() {
        let state = test_state();

        let response = build_router(state.clone())
            .oneshot(json_request("PUT", "/api/users/alex/profile", &profile_body()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = build_router(state)
            .oneshot(
                axum::http::Request::get("/api/users/alex/profile")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["username"], "alex");
        assert_eq!(json["target_date"], "2024-06-15");
    }

    #[tokio::test]
    async fn missing_profile_returns_404() {
        let response = test_app()
            .oneshot(
                axum::http::Request::get("/api/users/nobody/profile")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn invalid_profile_returns_400() {
        let mut body = profile_body();
        body["height_inches"] = serde_json::json!(0.0);

        let response = test_app()
            .oneshot(json_request("PUT", "/api/users/alex/profile", &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"], "height_inches must be greater than 0");
    }

    #[tokio::test]
    async fn targets_without_weight_log() {
        let state = test_state();
        seed_profile(&state);

        let response = build_router(state)
            .oneshot(
                axum::http::Request::get("/api/users/alex/targets/2024-06-10")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["days_to_goal"], 5);
        assert_eq!(json["bmr_formula"], "katch_mc_ardle");
        assert_eq!(json["adjustment"]["needs_weight_log"], true);
        assert_eq!(json["micros"]["fiber_grams"], 30.0);
        assert_eq!(json["micros"]["sodium_mg"], 2300.0);
    }

    #[tokio::test]
    async fn targets_without_profile_returns_404() {
        let response = test_app()
            .oneshot(
                axum::http::Request::get("/api/users/alex/targets/2024-06-10")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn targets_invalid_date_returns_400() {
        let response = test_app()
            .oneshot(
                axum::http::Request::get("/api/users/alex/targets/not-a-date")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn logged_weight_drives_adjustment() {
        let state = test_state();
        {
            let svc = state.svc.lock().unwrap();
            svc.save_profile(&Profile {
                username: "alex".to_string(),
                weight_lbs: 165.0,
                target_weight_lbs: 150.0,
                height_inches: 70.0,
                body_fat_percentage: None,
                today_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
                target_date: NaiveDate::from_ymd_opt(2024, 6, 15).unwrap(),
            })
            .unwrap();
        }

        let body = serde_json::json!({ "date": "2024-06-10", "weight_lbs": 159.0 });
        let response = build_router(state.clone())
            .oneshot(json_request("POST", "/api/users/alex/weight", &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = build_router(state)
            .oneshot(
                axum::http::Request::get("/api/users/alex/targets/2024-06-10")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["adjustment"]["status"], "reduce_calories");
        assert_eq!(json["adjustment"]["delta_calories"], -200.0);
    }

    #[tokio::test]
    async fn weight_history_and_delete() {
        let state = test_state();
        for (date, w) in [("2024-06-01", 170.0), ("2024-06-02", 169.0)] {
            let body = serde_json::json!({ "date": date, "weight_lbs": w });
            let response = build_router(state.clone())
                .oneshot(json_request("POST", "/api/users/alex/weight", &body))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::CREATED);
        }

        let response = build_router(state.clone())
            .oneshot(
                axum::http::Request::get("/api/users/alex/weight?days=1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json.as_array().unwrap().len(), 1);
        assert_eq!(json[0]["date"], "2024-06-02");

        let response = build_router(state.clone())
            .oneshot(
                axum::http::Request::delete("/api/users/alex/weight/2024-06-02")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = build_router(state)
            .oneshot(
                axum::http::Request::delete("/api/users/alex/weight/2024-06-02")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn non_positive_weight_returns_400() {
        let body = serde_json::json!({ "date": "2024-06-01", "weight_lbs": 0.0 });
        let response = test_app()
            .oneshot(json_request("POST", "/api/users/alex/weight", &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn manual_food_shows_in_summary() {
        let state = test_state();
        seed_profile(&state);

        let body = serde_json::json!({
            "date": "2024-06-10",
            "meal_type": "Lunch",
            "name": "Chicken salad",
            "protein": 30.0,
            "fat": 10.0,
            "carbs": 20.0
        });
        let response = build_router(state.clone())
            .oneshot(json_request("POST", "/api/users/alex/food", &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let json = body_json(response).await;
        assert_eq!(json["meal_type"], "lunch");
        // 30*4 + 10*9 + 20*4
        assert_eq!(json["calories"], 290.0);

        let response = build_router(state)
            .oneshot(
                axum::http::Request::get("/api/users/alex/summary/2024-06-10")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["total"]["calories"], 290.0);
        assert_eq!(json["meals"][0]["meal_type"], "lunch");
        assert!(json["targets"].is_object());
        assert!(json["remaining"]["calories"].is_number());
    }

    #[tokio::test]
    async fn food_without_name_or_id_returns_400() {
        let body = serde_json::json!({ "date": "2024-06-10", "meal_type": "lunch" });
        let response = test_app()
            .oneshot(json_request("POST", "/api/users/alex/food", &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn food_by_id_without_database_returns_400() {
        let body = serde_json::json!({
            "date": "2024-06-10",
            "meal_type": "dinner",
            "food_id": 1,
            "grams": 150.0
        });
        let response = test_app()
            .oneshot(json_request("POST", "/api/users/alex/food", &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn invalid_meal_type_returns_400() {
        let body = serde_json::json!({
            "date": "2024-06-10",
            "meal_type": "brunch",
            "name": "Eggs",
            "calories": 200.0
        });
        let response = test_app()
            .oneshot(json_request("POST", "/api/users/alex/food", &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn delete_food_is_scoped_to_user() {
        let state = test_state();
        let id = {
            let svc = state.svc.lock().unwrap();
            svc.log_food(
                "alex",
                NaiveDate::from_ymd_opt(2024, 6, 10).unwrap(),
                "snack",
                "Apple",
                FoodNutrients::manual(Some(95.0), 0.5, 0.3, 25.0, 4.0, 2.0),
            )
            .unwrap()
            .id
        };

        let response = build_router(state.clone())
            .oneshot(
                axum::http::Request::delete(format!("/api/users/sam/food/{id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = build_router(state)
            .oneshot(
                axum::http::Request::delete(format!("/api/users/alex/food/{id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    fn log_apple(state: &AppState) -> i64 {
        let svc = state.svc.lock().unwrap();
        svc.log_food(
            "alex",
            NaiveDate::from_ymd_opt(2024, 6, 10).unwrap(),
            "snack",
            "Apple",
            FoodNutrients::manual(Some(95.0), 0.5, 0.3, 25.0, 4.0, 2.0),
        )
        .unwrap()
        .id
    }

    #[tokio::test]
    async fn update_food_is_scoped_to_user() {
        let state = test_state();
        let id = log_apple(&state);
        let body = serde_json::json!({ "name": "Pear", "meal_type": "lunch" });

        let response = build_router(state.clone())
            .oneshot(json_request("PUT", &format!("/api/users/sam/food/{id}"), &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = build_router(state.clone())
            .oneshot(json_request("PUT", &format!("/api/users/alex/food/{id}"), &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["id"], id);
        assert_eq!(json["food_name"], "Pear");
        assert_eq!(json["meal_type"], "lunch");
        assert_eq!(json["date"], "2024-06-10");
        assert!((json["calories"].as_f64().unwrap() - 95.0).abs() < 1e-9);

        let response = build_router(state)
            .oneshot(
                axum::http::Request::get(format!("/api/users/alex/food/{id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["food_name"], "Pear");
    }

    #[tokio::test]
    async fn get_food_is_scoped_to_user() {
        let state = test_state();
        let id = log_apple(&state);

        let response = build_router(state)
            .oneshot(
                axum::http::Request::get(format!("/api/users/sam/food/{id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn invalid_food_update_returns_400() {
        let state = test_state();
        let id = log_apple(&state);
        let uri = format!("/api/users/alex/food/{id}");

        for body in [
            serde_json::json!({}),
            serde_json::json!({ "meal_type": "brunch" }),
            serde_json::json!({ "name": "  " }),
            serde_json::json!({ "protein": -3.0 }),
        ] {
            let response = build_router(state.clone())
                .oneshot(json_request("PUT", &uri, &body))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{body}");
        }

        let svc = state.svc.lock().unwrap();
        let stored = svc.get_food_log("alex", id).unwrap().unwrap();
        assert_eq!(stored.food_name, "Apple");
        assert_eq!(stored.meal_type, "snack");
    }

    #[tokio::test]
    async fn far_future_target_date_returns_400() {
        let mut body = profile_body();
        body["target_date"] = serde_json::json!("9999-12-31");

        let response = test_app()
            .oneshot(json_request("PUT", "/api/users/alex/profile", &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn progress_needs_weight_entries() {
        let state = test_state();
        seed_profile(&state);

        let response = build_router(state.clone())
            .oneshot(
                axum::http::Request::get("/api/users/alex/progress")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        {
            let svc = state.svc.lock().unwrap();
            svc.log_weight("alex", NaiveDate::from_ymd_opt(2024, 6, 10).unwrap(), 180.0, None)
                .unwrap();
            svc.log_weight("alex", NaiveDate::from_ymd_opt(2024, 6, 12).unwrap(), 178.0, None)
                .unwrap();
        }

        let response = build_router(state)
            .oneshot(
                axum::http::Request::get("/api/users/alex/progress")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["starting_weight_lbs"], 180.0);
        assert_eq!(json["current_weight_lbs"], 178.0);
        let pct = json["progress_percentage"].as_f64().unwrap();
        assert!((pct - 40.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn security_headers_present() {
        let response = test_app()
            .oneshot(
                axum::http::Request::get("/api/users/alex/profile")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            response.headers().get("x-content-type-options").unwrap(),
            "nosniff"
        );
        assert_eq!(response.headers().get("x-frame-options").unwrap(), "DENY");
        assert_eq!(
            response.headers().get("content-security-policy").unwrap(),
            "default-src 'none'"
        );
    }

    #[tokio::test]
    async fn body_size_limit_rejects_oversized() {
        let big_body = vec![0u8; BODY_LIMIT + 1];
        let response = test_app()
            .oneshot(
                axum::http::Request::post("/api/users/alex/food")
                    .header("content-type", "application/json")
                    .body(Body::from(big_body))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn internal_error_does_not_leak_details() {
        let error = ApiError::Internal(anyhow::anyhow!("secret database path /home/user/.weighin/db"));
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let json = body_json(response).await;
        assert_eq!(json["error"], "Internal server error");
        assert!(!json["error"].as_str().unwrap().contains("secret"));
    }
}
