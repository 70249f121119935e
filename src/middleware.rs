//! HTTP request tracking middleware for observability

use axum::{extract::Request, http::StatusCode, middleware::Next, response::Response};
use std::time::Instant;

/// Middleware to track HTTP request latency and counts
pub async fn track_metrics(req: Request, next: Next) -> Result<Response, StatusCode> {
    let start = Instant::now();
    let method = req.method().to_string();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    // Group dynamic segments to keep label cardinality bounded
    let normalized_path = normalize_path(&path);

    crate::metrics::HTTP_REQUEST_DURATION
        .with_label_values(&[&method, &normalized_path, &status])
        .observe(duration);

    crate::metrics::HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &normalized_path, &status])
        .inc();

    Ok(response)
}

/// Collapse path parameters into placeholders
/// /api/recommendations/user123 -> /api/recommendations/{id}
/// /api/seasonal/7 -> /api/seasonal/{month}
fn normalize_path(path: &str) -> String {
    let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
    let mut normalized = Vec::with_capacity(parts.len());

    for (i, part) in parts.iter().enumerate() {
        let parent = if i > 0 { Some(parts[i - 1]) } else { None };
        match parent {
            Some("seasonal") => normalized.push("{month}"),
            Some("recommendations") if *part == "invalidate" => normalized.push(part),
            Some("recommendations") | Some("profile") | Some("catalog") => {
                normalized.push("{id}")
            }
            _ => normalized.push(part),
        }
    }

    format!("/{}", normalized.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(
            normalize_path("/api/recommendations/user123"),
            "/api/recommendations/{id}"
        );
        assert_eq!(normalize_path("/api/profile/alice"), "/api/profile/{id}");
        assert_eq!(normalize_path("/api/seasonal/7"), "/api/seasonal/{month}");
        assert_eq!(normalize_path("/api/recommendations"), "/api/recommendations");
        assert_eq!(
            normalize_path("/api/recommendations/invalidate"),
            "/api/recommendations/invalidate"
        );
        assert_eq!(normalize_path("/api/catalog/miso-soup"), "/api/catalog/{id}");
        assert_eq!(normalize_path("/health"), "/health");
        assert_eq!(normalize_path("/"), "/");
    }
}
