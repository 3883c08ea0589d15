use axum::{
    body::Body,
    http::{HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// 请求日志中间件
pub async fn request_logging_middleware(request: Request<Body>, next: Next<Body>) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let client_ip = get_client_ip(&request);
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_default();

    let start_time = std::time::Instant::now();

    debug!("Incoming request [{}]: {} {} from {}", request_id, method, uri, client_ip);

    let response = next.run(request).await;

    let elapsed = start_time.elapsed();
    let status = response.status();

    if status.is_server_error() {
        warn!(
            "Request failed [{}]: {} {} {} - {}ms",
            request_id,
            method,
            uri,
            status.as_u16(),
            elapsed.as_millis()
        );
    } else {
        info!(
            "Request completed [{}]: {} {} {} - {}ms",
            request_id,
            method,
            uri,
            status.as_u16(),
            elapsed.as_millis()
        );
    }

    response
}

/// 请求 ID 中间件
pub async fn request_id_middleware(mut request: Request<Body>, next: Next<Body>) -> Response {
    let request_id = uuid::Uuid::new_v4().to_string();

    request.extensions_mut().insert(RequestId(request_id.clone()));

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("x-request-id", value);
    }

    response
}

/// 安全头中间件
pub async fn security_headers_middleware(request: Request<Body>, next: Next<Body>) -> Response {
    let mut response = next.run(request).await;

    let headers = response.headers_mut();
    headers.insert("x-content-type-options", HeaderValue::from_static("nosniff"));
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "referrer-policy",
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );

    response
}

/// 获取客户端 IP 地址
fn get_client_ip(request: &Request<Body>) -> String {
    let headers = request.headers();

    if let Some(forwarded_for) = headers.get("x-forwarded-for") {
        if let Ok(ip_str) = forwarded_for.to_str() {
            if let Some(ip) = ip_str.split(',').next() {
                return ip.trim().to_string();
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip") {
        if let Ok(ip_str) = real_ip.to_str() {
            return ip_str.to_string();
        }
    }

    request
        .extensions()
        .get::<SocketAddr>()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_ip_prefers_forwarded_header() {
        let request = Request::builder()
            .header("x-forwarded-for", "10.0.0.1, 10.0.0.2")
            .body(Body::empty())
            .unwrap();
        assert_eq!(get_client_ip(&request), "10.0.0.1");

        let bare = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(get_client_ip(&bare), "unknown");
    }
}
