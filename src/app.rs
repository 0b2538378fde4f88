use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware,
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::JwtKeys;
use crate::config::{AppConfig, SecurityConfig};
use crate::database::RecipeStore;
use crate::handlers::{health, recipes};
use crate::middleware::jwt_auth_middleware;
use crate::services::RecipeService;

/// Shared per-request state
#[derive(Clone)]
pub struct AppState {
    pub recipes: RecipeService,
    pub jwt: JwtKeys,
    /// Prefix the recipe routes are mounted under
    pub api_root: Arc<str>,
}

impl AppState {
    pub fn new(store: Arc<dyn RecipeStore>, jwt: JwtKeys, api_root: &str) -> Self {
        Self {
            recipes: RecipeService::new(store),
            jwt,
            api_root: Arc::from(api_root),
        }
    }
}

/// Build the full router: public health routes plus the authenticated
/// recipe routes nested under the configured API root.
pub fn app(state: AppState, config: &AppConfig) -> Router {
    let api = if config.api.root.is_empty() {
        recipe_routes(&state)
    } else {
        Router::new().nest(&config.api.root, recipe_routes(&state))
    };

    let router = Router::new()
        // Public
        .route("/", get(health::root))
        .route("/health", get(health::health))
        .merge(api)
        .layer(DefaultBodyLimit::max(config.api.max_request_size_bytes))
        .layer(cors_layer(&config.security))
        .with_state(state);

    if config.api.enable_request_logging {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

fn recipe_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/recipes", get(recipes::list).post(recipes::create))
        .route(
            "/recipes/:id",
            get(recipes::get).put(recipes::put).delete(recipes::delete),
        )
        // Authenticate before any recipe handler runs
        .route_layer(middleware::from_fn_with_state(
            state.jwt.clone(),
            jwt_auth_middleware,
        ))
}

fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .expose_headers([header::LOCATION])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{MemoryRecipeStore, StoreError};
    use crate::models::{OwnerId, Recipe, RecipeFields, RecipeId};
    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{HeaderMap, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    struct TestApp {
        router: Router,
        jwt: JwtKeys,
    }

    struct TestResponse {
        status: StatusCode,
        headers: HeaderMap,
        body: Value,
    }

    impl TestApp {
        fn new() -> Self {
            Self::with_store(AppConfig::test(), Arc::new(MemoryRecipeStore::new()))
        }

        fn with_store(config: AppConfig, store: Arc<dyn RecipeStore>) -> Self {
            let jwt = JwtKeys::from_config(&config.security).unwrap();
            let state = AppState::new(store, jwt.clone(), &config.api.root);
            Self {
                router: app(state, &config),
                jwt,
            }
        }

        fn token(&self, user: &str) -> String {
            self.jwt.issue(user, None).unwrap()
        }

        async fn send(
            &self,
            method: Method,
            uri: &str,
            user: Option<&str>,
            body: Option<Value>,
        ) -> TestResponse {
            let mut builder = Request::builder().method(method).uri(uri);
            if let Some(user) = user {
                builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", self.token(user)));
            }
            let request = match body {
                Some(body) => builder
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
                None => builder.body(Body::empty()).unwrap(),
            };

            let response = self.router.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let headers = response.headers().clone();
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let body = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap()
            };

            TestResponse {
                status,
                headers,
                body,
            }
        }
    }

    /// Store whose every call fails the way a broken query does
    struct FailingStore;

    fn query_failure() -> StoreError {
        StoreError::Sqlx(sqlx::Error::Protocol(
            "relation \"recipes\" does not exist".to_string(),
        ))
    }

    #[async_trait]
    impl RecipeStore for FailingStore {
        async fn find_by_owner(&self, _owner: &OwnerId) -> Result<Vec<Recipe>, StoreError> {
            Err(query_failure())
        }

        async fn find_one(&self, _id: RecipeId, _owner: &OwnerId) -> Result<Option<Recipe>, StoreError> {
            Err(query_failure())
        }

        async fn create(&self, _owner: &OwnerId, _fields: RecipeFields) -> Result<Recipe, StoreError> {
            Err(query_failure())
        }

        async fn update(
            &self,
            _id: RecipeId,
            _owner: &OwnerId,
            _fields: RecipeFields,
        ) -> Result<Option<Recipe>, StoreError> {
            Err(query_failure())
        }

        async fn delete_one(&self, _id: RecipeId, _owner: &OwnerId) -> Result<bool, StoreError> {
            Err(query_failure())
        }

        async fn ping(&self) -> Result<(), StoreError> {
            Err(query_failure())
        }
    }

    fn soup() -> Value {
        json!({"title": "Soup", "ingredients": ["water", "salt"], "recipe": "Boil."})
    }

    #[tokio::test]
    async fn recipe_routes_require_a_bearer_token() {
        let app = TestApp::new();

        let res = app.send(Method::GET, "/api/recipes", None, None).await;
        assert_eq!(res.status, StatusCode::UNAUTHORIZED);
        assert_eq!(res.body["code"], "UNAUTHORIZED");

        let request = Request::builder()
            .uri("/api/recipes")
            .header(header::AUTHORIZATION, "Bearer not.a.jwt")
            .body(Body::empty())
            .unwrap();
        let response = app.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn public_routes_need_no_token() {
        let app = TestApp::new();

        let res = app.send(Method::GET, "/health", None, None).await;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.body["status"], "ok");

        let res = app.send(Method::GET, "/", None, None).await;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.body["name"], "Recipe API");
    }

    #[tokio::test]
    async fn owner_lifecycle_scenario() {
        let app = TestApp::new();

        let created = app.send(Method::POST, "/api/recipes", Some("u1"), Some(soup())).await;
        assert_eq!(created.status, StatusCode::CREATED);
        let id = created.body["id"].as_str().unwrap().to_string();
        assert_eq!(
            created.headers[header::LOCATION],
            format!("/api/recipes/{}", id).as_str()
        );
        assert_eq!(created.body["userId"], "u1");

        let path = format!("/api/recipes/{}", id);
        let fetched = app.send(Method::GET, &path, Some("u1"), None).await;
        assert_eq!(fetched.status, StatusCode::OK);
        assert_eq!(fetched.body, created.body);

        let foreign = app.send(Method::GET, &path, Some("u2"), None).await;
        assert_eq!(foreign.status, StatusCode::NOT_FOUND);
        assert_eq!(foreign.body, Value::Null);

        let listed = app.send(Method::GET, "/api/recipes", Some("u2"), None).await;
        assert_eq!(listed.body, json!([]));

        let deleted = app.send(Method::DELETE, &path, Some("u1"), None).await;
        assert_eq!(deleted.status, StatusCode::NO_CONTENT);
        assert_eq!(deleted.body, Value::Null);

        let gone = app.send(Method::GET, &path, Some("u1"), None).await;
        assert_eq!(gone.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn validation_failures_are_bad_requests() {
        let app = TestApp::new();

        let res = app.send(Method::GET, "/api/recipes/xyz", Some("u1"), None).await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST);
        assert_eq!(res.body["message"], "The `id` is not valid");
        assert_eq!(res.body["status"], 400);

        let res = app.send(Method::DELETE, "/api/recipes/xyz", Some("u1"), None).await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST);

        let body = json!({"title": "Soup", "recipe": "Boil."});
        let res = app.send(Method::POST, "/api/recipes", Some("u1"), Some(body)).await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST);
        assert_eq!(res.body["message"], "Missing `ingredients` in request body");

        let body = json!({"title": "Soup", "ingredients": ["water"]});
        let res = app.send(Method::PUT, "/api/recipes/xyz", Some("u1"), Some(body)).await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST);
        assert_eq!(res.body["message"], "Missing `recipe` in request body");
    }

    #[tokio::test]
    async fn body_without_json_content_type_has_no_fields() {
        let app = TestApp::new();
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/recipes")
            .header(header::AUTHORIZATION, format!("Bearer {}", app.token("u1")))
            .body(Body::from("title=Soup"))
            .unwrap();

        let response = app.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["message"], "Missing `title` in request body");
    }

    #[tokio::test]
    async fn malformed_json_is_rejected() {
        let app = TestApp::new();
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/recipes")
            .header(header::AUTHORIZATION, format!("Bearer {}", app.token("u1")))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{\"title\": "))
            .unwrap();

        let response = app.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["code"], "INVALID_JSON");
    }

    #[tokio::test]
    async fn put_replaces_and_is_scoped_to_owner() {
        let app = TestApp::new();
        let created = app.send(Method::POST, "/api/recipes", Some("u1"), Some(soup())).await;
        let path = format!("/api/recipes/{}", created.body["id"].as_str().unwrap());

        let stew = json!({"title": "Stew", "ingredients": ["beef"], "recipe": "Simmer."});
        let hijack = app.send(Method::PUT, &path, Some("u2"), Some(stew.clone())).await;
        assert_eq!(hijack.status, StatusCode::NOT_FOUND);

        let updated = app.send(Method::PUT, &path, Some("u1"), Some(stew)).await;
        assert_eq!(updated.status, StatusCode::OK);
        assert_eq!(updated.body["title"], "Stew");
        assert_eq!(updated.body["id"], created.body["id"]);
    }

    #[tokio::test]
    async fn store_failures_are_hidden_from_clients() {
        let app = TestApp::with_store(AppConfig::test(), Arc::new(FailingStore));

        let res = app.send(Method::POST, "/api/recipes", Some("u1"), Some(soup())).await;
        assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(res.body["message"], "An error occurred while processing your request");
        assert!(!res.body.to_string().contains("does not exist"));

        let res = app.send(Method::GET, "/api/recipes", Some("u1"), None).await;
        assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);

        let res = app.send(Method::GET, "/health", None, None).await;
        assert_eq!(res.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(res.body["status"], "degraded");
        assert_eq!(res.body["database"], "unavailable");
    }

    #[tokio::test]
    async fn oversized_bodies_are_payload_too_large() {
        let mut config = AppConfig::test();
        config.api.max_request_size_bytes = 64;
        let app = TestApp::with_store(config, Arc::new(MemoryRecipeStore::new()));

        let ingredients = vec!["water"; 32];
        let body = json!({"title": "Soup", "ingredients": ingredients, "recipe": "Boil."});
        let res = app.send(Method::POST, "/api/recipes", Some("u1"), Some(body)).await;
        assert_eq!(res.status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(res.body["code"], "PAYLOAD_TOO_LARGE");
        assert_eq!(res.body["status"], 413);
    }

    #[tokio::test]
    async fn forged_tokens_get_a_fixed_message() {
        let app = TestApp::new();
        let forged = JwtKeys::from_secret("someone-else", 1)
            .unwrap()
            .issue("u1", None)
            .unwrap();

        for token in [forged.as_str(), "not.a.jwt"] {
            let request = Request::builder()
                .uri("/api/recipes")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap();
            let response = app.router.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let body: Value = serde_json::from_slice(&bytes).unwrap();
            assert_eq!(body["message"], "Invalid or expired token");
        }
    }

    #[tokio::test]
    async fn root_reports_the_configured_api_root() {
        let mut config = AppConfig::test();
        config.api.root = "/v1".to_string();
        let app = TestApp::with_store(config, Arc::new(MemoryRecipeStore::new()));

        let res = app.send(Method::GET, "/", None, None).await;
        assert_eq!(res.body["endpoints"]["recipes"], "/v1/recipes[/:id] (bearer token required)");

        let res = app.send(Method::GET, "/v1/recipes", Some("u1"), None).await;
        assert_eq!(res.status, StatusCode::OK);
    }
}
