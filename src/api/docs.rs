//! OpenAPI document and the Swagger UI / ReDoc pages that render it.

use axum::{
    http::header,
    response::{Html, IntoResponse},
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::api::{auth, serializers};
use crate::auth::TokenPair;
use crate::error::ErrorDetail;

pub const SCHEMA_PATH: &str = "/api/schema/";

#[derive(OpenApi)]
#[openapi(
    info(title = "Library Management API", description = "Accounts, catalogue and circulation"),
    paths(
        auth::register,
        auth::login,
        auth::refresh,
        auth::profile,
        auth::replace_profile,
        auth::update_profile,
    ),
    components(schemas(
        serializers::UserResponse,
        serializers::UserPayload,
        serializers::LoginRequest,
        serializers::RefreshRequest,
        serializers::AccessToken,
        TokenPair,
        ErrorDetail,
    )),
    modifiers(&JwtSecurity),
    tags((name = "Authentication", description = "Registration, login and profile"))
)]
pub struct ApiDoc;

struct JwtSecurity;

impl Modify for JwtSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "jwtAuth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

pub async fn schema() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/vnd.oai.openapi+json")],
        axum::Json(ApiDoc::openapi()),
    )
}

pub async fn swagger_ui() -> Html<String> {
    Html(format!(
        r##"<!DOCTYPE html>
<html>
<head>
  <title>Library Management API</title>
  <meta charset="utf-8"/>
  <link rel="stylesheet" href="https://cdn.jsdelivr.net/npm/swagger-ui-dist@5/swagger-ui.css">
</head>
<body>
  <div id="swagger-ui"></div>
  <script src="https://cdn.jsdelivr.net/npm/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
  <script>
    window.ui = SwaggerUIBundle({{
      url: "{SCHEMA_PATH}",
      dom_id: "#swagger-ui",
      deepLinking: true,
      persistAuthorization: true,
    }});
  </script>
</body>
</html>"##
    ))
}

pub async fn redoc() -> Html<String> {
    Html(format!(
        r##"<!DOCTYPE html>
<html>
<head>
  <title>Library Management API</title>
  <meta charset="utf-8"/>
</head>
<body>
  <redoc spec-url="{SCHEMA_PATH}"></redoc>
  <script src="https://cdn.jsdelivr.net/npm/redoc@latest/bundles/redoc.standalone.js"></script>
</body>
</html>"##
    ))
}
