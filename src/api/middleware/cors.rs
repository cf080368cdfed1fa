use actix_cors::Cors;

use crate::config::ServerConfig;

/// `*` admits any origin; credentials are allowed either way, so the
/// request's own origin is echoed back rather than a literal wildcard.
pub fn cors(server: &ServerConfig) -> Cors {
    let origins = server.origins();

    let mut cors = Cors::default()
        .allow_any_method()
        .allow_any_header()
        .supports_credentials()
        .max_age(3600);

    if origins.is_empty() || origins.contains(&"*") {
        cors = cors.allow_any_origin();
    } else {
        for origin in origins {
            cors = cors.allowed_origin(origin);
        }
    }
    cors
}
