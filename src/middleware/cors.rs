use axum::http::{
    header::{ACCEPT, CONTENT_TYPE, ETAG, IF_NONE_MATCH},
    HeaderName, Method,
};
use tower_http::cors::{Any, CorsLayer};

use crate::config::AppConfig;

pub fn build_cors_layer(config: &AppConfig) -> CorsLayer {
    let headers = vec![
        ACCEPT,
        CONTENT_TYPE,
        IF_NONE_MATCH,
        HeaderName::from_static("x-request-id"),
    ];

    let mut layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers(headers)
        .expose_headers([
            ETAG,
            axum::http::header::CONTENT_DISPOSITION,
            HeaderName::from_static("x-request-id"),
        ]);

    // Wildcard origins are refused in production.
    if !config.is_production()
        && config
            .cors_origins
            .iter()
            .any(|origin| origin.trim() == "*")
    {
        layer = layer.allow_origin(Any).allow_credentials(false);
    } else {
        let origins = config
            .cors_origins
            .iter()
            .filter(|origin| origin.trim() != "*")
            .filter_map(|origin| origin.parse().ok())
            .collect::<Vec<_>>();
        layer = layer.allow_origin(origins).allow_credentials(true);
    }

    layer
}
