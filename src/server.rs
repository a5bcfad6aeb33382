//! HTTP query endpoint.
//!
//! A single-route JSON API over the retrieval engine and answer synthesizer.
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/` | Answer a free-text query about food trucks |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! Error responses carry a machine-readable code and a human-readable
//! message:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "missing query" } }
//! ```
//!
//! Codes: `bad_request` (400), `provider_error` (502), `internal` (500).
//! A failed request never takes the serving process down; retrieval holds no
//! per-request state, so concurrent queries need no coordination.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::answer;
use crate::config::Config;
use crate::db;
use crate::embedding::{self, ChatProvider, EmbeddingProvider};
use crate::error::ProviderError;
use crate::retrieve::{self, Retrieval};

/// Shared application state passed to route handlers via Axum's `State`
/// extractor. Providers are constructed once at startup.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    pool: SqlitePool,
    embedder: Arc<dyn EmbeddingProvider>,
    chat: Arc<dyn ChatProvider>,
}

/// Starts the query server. Binds to `[server].bind` and runs until the
/// process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();

    let embedder: Arc<dyn EmbeddingProvider> =
        embedding::create_embedding_provider(&config.embedding)?.into();
    let chat: Arc<dyn ChatProvider> = embedding::create_chat_provider(&config.chat)?.into();
    let pool = db::connect(config).await?;

    let state = AppState {
        config: Arc::new(config.clone()),
        pool,
        embedder,
        chat,
    };

    let app = router(state);

    println!("server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", post(handle_query))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

/// Map a retrieval or synthesis failure to a response. Provider failures
/// surface as 502 with their own code; everything else is a 500.
fn classify_error(err: anyhow::Error) -> AppError {
    if err.downcast_ref::<ProviderError>().is_some() {
        AppError {
            status: StatusCode::BAD_GATEWAY,
            code: "provider_error".to_string(),
            message: format!("{:#}", err),
        }
    } else {
        AppError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "internal".to_string(),
            message: format!("{:#}", err),
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST / ============

#[derive(Deserialize)]
struct QueryRequest {
    #[serde(default)]
    query: String,
}

#[derive(Serialize)]
struct QueryResponse {
    response: String,
}

async fn handle_query(
    State(state): State<AppState>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>, AppError> {
    // Malformed bodies must come back in the same error envelope as every
    // other failure, not axum's plain-text rejection
    let Json(request) = payload.map_err(|rejection| bad_request(rejection.body_text()))?;

    let query = request.query.trim();
    if query.is_empty() {
        return Err(bad_request("missing query"));
    }

    println!("generating embedding for {:?}", query);

    let result = retrieve::retrieve(
        &state.pool,
        state.embedder.as_ref(),
        state.config.retrieval.top_k,
        query,
    )
    .await
    .map_err(classify_error)?;

    let trucks = match result {
        Retrieval::Matches(trucks) => trucks,
        Retrieval::NoMatches => {
            println!("no database results found");
            return Ok(Json(QueryResponse {
                response: answer::NO_MATCHES_ANSWER.to_string(),
            }));
        }
    };

    println!("retrieving chat response...");
    let response = answer::synthesize(state.chat.as_ref(), &trucks, query)
        .await
        .map_err(classify_error)?;

    println!("request completed");
    Ok(Json(QueryResponse { response }))
}
