mod graphql;
mod middleware;

pub use graphql::{CharacterObject, OriginObject, PortalSchema, QueryRoot, build_schema};

use std::sync::Arc;

use async_graphql::http::GraphiQLSource;
use async_graphql_axum::{GraphQLRequest, GraphQLResponse};
use axum::{
    Router,
    extract::State,
    http::StatusCode,
    middleware as axum_middleware,
    response::{Html, IntoResponse, Response},
    routing::get,
};
use sqlx::Error as SqlxError;

use crate::application::error::{ErrorReport, HttpError};
use crate::cache::CacheStore;
use crate::infra::db::PostgresRepositories;

use middleware::{log_responses, set_request_context};

pub const GRAPHQL_PATH: &str = "/graphql";

#[derive(Clone)]
pub struct HttpState {
    pub schema: PortalSchema,
    pub db: Arc<PostgresRepositories>,
    pub cache: Arc<dyn CacheStore>,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route(GRAPHQL_PATH, get(graphiql).post(graphql_handler))
        .route("/_health/db", get(health_db))
        .route("/_health/cache", get(health_cache))
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
        .with_state(state)
}

async fn graphql_handler(State(state): State<HttpState>, request: GraphQLRequest) -> GraphQLResponse {
    state.schema.execute(request.into_inner()).await.into()
}

async fn graphiql() -> impl IntoResponse {
    Html(GraphiQLSource::build().endpoint(GRAPHQL_PATH).finish())
}

async fn health_db(State(state): State<HttpState>) -> Response {
    db_health_response(state.db.health_check().await)
}

async fn health_cache(State(state): State<HttpState>) -> Response {
    if state.cache.is_available() {
        StatusCode::NO_CONTENT.into_response()
    } else {
        HttpError::new(
            "infra::http::cache_health",
            StatusCode::SERVICE_UNAVAILABLE,
            "Cache unavailable",
            format!("{} cache backend is not available", state.cache.backend()),
        )
        .into_response()
    }
}

fn db_health_response(result: Result<(), SqlxError>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::db_health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}
