use axum::response::IntoResponse;

pub async fn root_handler() -> impl IntoResponse {
    let version = env!("CARGO_PKG_VERSION");
    format!(
        r#"Welcome to the Virtual Try-On API 👋
Version: {version}

Available endpoints:
  - GET    /                 - This banner
  - GET    /health           - Health check (includes database)
  - GET    /metrics          - Prometheus metrics
  - GET    /api/db-status    - Database version and user count
  - GET    /api/auth/test    - Echo the authenticated user      (auth)
  - GET    /api/user/profile - Fetch the stored profile         (auth)
  - PUT    /api/user/profile - Update the display name          (auth)
  - POST   /api/try-on       - Generate a try-on image (JPEG)   (auth)

Endpoints marked (auth) need an `Authorization: Bearer <ID token>` header.
"#
    )
}
