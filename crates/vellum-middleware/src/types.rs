//! Response type produced by the pipeline.

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, CONTENT_TYPE, ETAG};
use vellum_core::{ErrorDetail, ErrorEnvelope, Exchange};

/// The committed HTTP response.
pub type Response = http::Response<Bytes>;

/// Header echoing the request id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

const JSON: &str = "application/json";

/// Builds the response for a committed exchange.
///
/// Errors are written as a JSON envelope with the recorded status. Otherwise
/// the status, response headers and response document are written, plus the
/// `ETag` header when the exchange carries a token.
pub fn build_response(exchange: &Exchange) -> Response {
    let request_id = exchange.request_id().to_string();

    let (status, body) = match exchange.error() {
        Some(error) => {
            let envelope = ErrorEnvelope {
                error: ErrorDetail {
                    code: error.code.clone(),
                    message: error.message.clone(),
                },
                request_id: Some(request_id.clone()),
            };
            (error.status, serde_json::to_vec(&envelope).map(Bytes::from).ok())
        }
        None => (
            exchange.status(),
            exchange
                .response_content()
                .and_then(|content| serde_json::to_vec(content).ok())
                .map(Bytes::from),
        ),
    };

    let mut response = http::Response::new(body.clone().unwrap_or_default());
    *response.status_mut() = status;

    let headers = response.headers_mut();
    headers.extend(exchange.response_headers().clone());
    if body.is_some() {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON));
    }
    if let Some(etag) = exchange.etag().filter(|_| !exchange.is_in_error()) {
        if let Ok(value) = HeaderValue::from_str(&etag.to_header_value()) {
            headers.insert(ETAG, value);
        }
    }
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        headers.insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }

    response
}
