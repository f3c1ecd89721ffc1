//! Reads `X-Exosphere-Request-ID` or generates one, and echoes it back on
//! the response (§4.9).

use axum::extract::Request;
use axum::http::{HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;

pub const REQUEST_ID_HEADER: &str = "X-Exosphere-Request-ID";

pub async fn propagate_request_id(mut request: Request, next: Next) -> Response {
    let header_name = HeaderName::from_static("x-exosphere-request-id");

    let request_id = request
        .headers()
        .get(&header_name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        request.headers_mut().insert(header_name.clone(), value.clone());

        let mut response = next.run(request).await;
        response.headers_mut().insert(header_name, value);
        response
    } else {
        next.run(request).await
    }
}
