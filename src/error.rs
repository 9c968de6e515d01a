use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{error, warn};

use crate::config::AppConfig;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("not implemented: {0}")]
    NotImplemented(String),
    #[error("prediction service error: {0}")]
    Upstream(String),
    #[error("prediction service timed out")]
    UpstreamTimeout,
    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub title: String,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ApiError {
    pub fn not_found(resource: &str, id: impl std::fmt::Display) -> Self {
        ApiError::NotFound(format!("{resource} {id} not found"))
    }

    pub fn internal(e: impl std::fmt::Display) -> Self {
        ApiError::Internal(e.to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> ErrorBody {
        let status = self.status();
        let (title, detail) = match self {
            ApiError::Unauthorized(msg)
            | ApiError::NotFound(msg)
            | ApiError::Validation(msg)
            | ApiError::Conflict(msg)
            | ApiError::NotImplemented(msg) => (msg.clone(), None),
            ApiError::Upstream(msg) => (
                "prediction service is unavailable".to_string(),
                Some(msg.clone()),
            ),
            ApiError::UpstreamTimeout => ("prediction service timed out".to_string(), None),
            ApiError::Internal(msg) => (
                "An error occurred while processing your request".to_string(),
                Some(msg.clone()),
            ),
        };
        ErrorBody {
            title,
            status: status.as_u16(),
            detail,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::Internal(msg) => error!(error = %msg, "internal error"),
            ApiError::Upstream(msg) => warn!(error = %msg, "prediction service error"),
            ApiError::UpstreamTimeout => warn!("prediction service timed out"),
            _ => {}
        }
        let report = self.body();
        let public = ErrorBody {
            detail: None,
            ..report.clone()
        };
        let mut res = (self.status(), Json(public)).into_response();
        if report.detail.is_some() {
            res.extensions_mut().insert(ErrorReport(report));
        }
        res
    }
}

/// Full error body, detail included, riding along in response extensions.
#[derive(Debug, Clone)]
struct ErrorReport(ErrorBody);

/// Puts internal detail back into error bodies when running in development.
/// The report never leaves the process otherwise.
pub async fn error_detail(
    State(config): State<Arc<AppConfig>>,
    req: Request,
    next: Next,
) -> Response {
    let mut res = next.run(req).await;
    let report = res.extensions_mut().remove::<ErrorReport>();
    match report {
        Some(ErrorReport(report)) if config.environment.is_development() => {
            (res.status(), Json(report)).into_response()
        }
        _ => res,
    }
}

/// Renders a handler panic as a 500, used by `CatchPanicLayer`.
pub fn panic_response(err: Box<dyn std::any::Any + Send + 'static>) -> Response {
    let msg = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "handler panicked".to_string()
    };
    ApiError::Internal(msg).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(ApiError::Unauthorized("x".into()).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::not_found("valuation", 1).status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::Upstream("down".into()).status(), StatusCode::BAD_GATEWAY);
        assert_eq!(ApiError::UpstreamTimeout.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(ApiError::internal("boom").status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn client_errors_carry_message_as_title() {
        let body = ApiError::Conflict("Email already registered".into()).body();
        assert_eq!(body.title, "Email already registered");
        assert_eq!(body.status, 409);
        assert!(body.detail.is_none());
    }

    #[test]
    fn internal_error_title_is_generic() {
        let body = ApiError::internal("connection refused").body();
        assert_eq!(body.title, "An error occurred while processing your request");
        assert!(!body.title.contains("connection refused"));
    }

    mod detail {
        use axum::{body::Body, http::Request, middleware, routing::get, Router};
        use http_body_util::BodyExt;
        use tower::ServiceExt;
        use tower_http::catch_panic::CatchPanicLayer;

        use super::*;
        use crate::config::Environment;
        use crate::testing::test_config;

        fn app(environment: Environment) -> Router {
            let mut config = test_config();
            config.environment = environment;
            Router::new()
                .route("/boom", get(|| async { ApiError::internal("connection refused") }))
                .route("/missing", get(|| async { ApiError::not_found("valuation", 7) }))
                .route(
                    "/panic",
                    get(|| async {
                        if true {
                            panic!("handler blew up");
                        }
                        "unreachable"
                    }),
                )
                .layer(CatchPanicLayer::custom(panic_response))
                .layer(middleware::from_fn_with_state(Arc::new(config), error_detail))
        }

        async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
            let res = app
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            let status = res.status();
            let bytes = res.into_body().collect().await.unwrap().to_bytes();
            (status, serde_json::from_slice(&bytes).unwrap())
        }

        #[tokio::test]
        async fn development_includes_detail() {
            let (status, json) = get_json(app(Environment::Development), "/boom").await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(json["status"], 500);
            assert_eq!(json["detail"], "connection refused");
        }

        #[tokio::test]
        async fn production_hides_detail() {
            let (status, json) = get_json(app(Environment::Production), "/boom").await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(json["title"], "An error occurred while processing your request");
            assert!(json.get("detail").is_none());
        }

        #[tokio::test]
        async fn panics_render_as_internal_errors() {
            let (status, json) = get_json(app(Environment::Development), "/panic").await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(json["detail"], "handler blew up");

            let (_, json) = get_json(app(Environment::Production), "/panic").await;
            assert!(json.get("detail").is_none());
        }

        #[tokio::test]
        async fn client_errors_never_carry_detail() {
            let (status, json) = get_json(app(Environment::Development), "/missing").await;
            assert_eq!(status, StatusCode::NOT_FOUND);
            assert_eq!(json["title"], "valuation 7 not found");
            assert!(json.get("detail").is_none());
        }
    }
}
