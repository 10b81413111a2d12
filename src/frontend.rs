use axum::{
    body::Body,
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use rust_embed::RustEmbed;

#[derive(RustEmbed)]
#[folder = "dashboard"]
pub struct Assets;

pub async fn serve_dashboard(uri: Uri) -> impl IntoResponse {
    let path = match uri.path().trim_start_matches('/') {
        "" => "index.html",
        path => path,
    };

    if path.starts_with("api/") {
        return not_found();
    }

    match Assets::get(path) {
        Some(content) => serve_asset(path, content.data.into_owned()),
        None => not_found(),
    }
}

fn serve_asset(path: &str, data: Vec<u8>) -> Response {
    let mime = mime_guess::from_path(path).first_or_octet_stream();

    (
        [
            (header::CONTENT_TYPE, mime.as_ref().to_string()),
            (header::CACHE_CONTROL, "public, max-age=0, must-revalidate".to_string()),
        ],
        Body::from(data),
    )
        .into_response()
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "404 Not Found").into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_root_serves_index() {
        let response = serve_dashboard(Uri::from_static("/")).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/html");
    }

    #[tokio::test]
    async fn test_unknown_paths_are_not_found() {
        let response = serve_dashboard(Uri::from_static("/missing.js")).await.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = serve_dashboard(Uri::from_static("/api/v1/nope")).await.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
