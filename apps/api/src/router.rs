use axum::{
    Router,
    routing::get,
};

use appointment_cell::router::appointment_routes;
use payment_cell::router::payment_routes;
use shared_database::AppState;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "Amae Telehealth API is running!" }))
        .nest("/appointments", appointment_routes(state.clone()))
        .nest("/payments", payment_routes(state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::{Request, StatusCode}};
    use shared_config::AppConfig;
    use tower::ServiceExt;

    fn app() -> Router {
        create_router(AppState::in_memory(AppConfig {
            jwt_secret: "test-secret".to_string(),
            paddle_webhook_secret: "test-webhook-secret".to_string(),
            webhook_tolerance_secs: None,
            server_port: 0,
        }))
    }

    #[tokio::test]
    async fn test_banner() {
        let response = app()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"Amae Telehealth API is running!");
    }

    #[tokio::test]
    async fn test_cells_are_mounted() {
        let notifications = app()
            .oneshot(Request::builder().uri("/appointments/notifications").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(notifications.status(), StatusCode::UNAUTHORIZED);

        let webhook = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/payments/webhook")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(webhook.status(), StatusCode::UNAUTHORIZED);
    }
}
