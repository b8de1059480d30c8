//! axum adapter for [`AuthInterceptor`](super::AuthInterceptor).
//!
//! The request path is the fully-qualified method name, the headers are the
//! call metadata. On success the identity is handed to handlers as an
//! `Extension<AuthenticatedIdentity>`; allow-listed calls carry none.

use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use super::interceptor::CallMetadata;
use crate::error::ServerError;
use crate::state::AppState;

/// Authentication middleware function.
pub async fn auth_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ServerError> {
    let metadata = CallMetadata::from_headers(request.headers());
    let method = request.uri().path().to_string();

    state
        .interceptor
        .intercept(&metadata, &method, request, |identity, mut request| async move {
            if let Some(identity) = identity {
                request.extensions_mut().insert(identity);
            }
            Ok(next.run(request).await)
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthenticatedIdentity, token};
    use crate::config::ServerConfig;
    use axum::{
        Extension, Router,
        http::{Request, StatusCode},
        middleware,
        routing::post,
    };
    use chrono::Utc;
    use shelf_cache::CacheConfig;
    use shelf_store::{Driver, MockDriver, NewUser, Role, Session, Store};
    use std::sync::Arc;
    use tower::ServiceExt;

    const OPEN: &str = "/api.v1.UserService/CreateUser";
    const PROTECTED: &str = "/api.v1.UserService/GetCurrentUser";

    async fn whoami(identity: Option<Extension<AuthenticatedIdentity>>) -> String {
        match identity {
            Some(Extension(id)) => format!("{}:{}", id.user_id, id.session_id),
            None => "anonymous".to_string(),
        }
    }

    fn router(driver: Arc<MockDriver>) -> Router {
        let store = Store::new(driver, CacheConfig::default());
        let state = AppState::new(store, ServerConfig::default().with_allow_list([OPEN]));
        Router::new()
            .route(OPEN, post(whoami))
            .route(PROTECTED, post(whoami))
            .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
            .with_state(state)
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_allow_listed_route_without_cookie() {
        let app = router(Arc::new(MockDriver::new()));
        let response = app
            .oneshot(Request::post(OPEN).body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "anonymous");
    }

    #[tokio::test]
    async fn test_protected_route_without_cookie() {
        let app = router(Arc::new(MockDriver::new()));
        let response = app
            .oneshot(Request::post(PROTECTED).body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_string(response).await;
        assert!(body.contains("authentication required"));
    }

    #[tokio::test]
    async fn test_protected_route_with_session_cookie() {
        let driver = Arc::new(MockDriver::new());
        let user = driver
            .create_user(NewUser {
                username: "alice".to_string(),
                password_hash: "hash".to_string(),
                role: Role::Admin,
            })
            .await
            .unwrap();
        driver.seed_session(Session::new("s1", user.id, Utc::now()));

        let response = router(driver)
            .oneshot(
                Request::post(PROTECTED)
                    .header(
                        "grpcgateway-cookie",
                        format!("user_session={}", token::encode(user.id, "s1")),
                    )
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, format!("{}:s1", user.id));
    }
}
