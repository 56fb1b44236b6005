use httpmock::prelude::*;
use httpmock::Mock;
use serde_json::{json, Value};

use crate::client::{API_KEY_HEADER, INVOICES_PATH};

/// Header names arrive lower-cased on the wire.
fn api_key_header() -> String {
    API_KEY_HEADER.to_ascii_lowercase()
}

/// Body of a successful invoice creation, as returned by the sandbox.
pub fn sample_invoice_response() -> Value {
    json!({
        "result": "success",
        "id": "dfj5kpos6uacm",
        "link": "https://app.dev.bitbanker.org/external/invoice/dfj5kpos6uacm",
        "addresses": {
            "USDT": "0x36928500Bc1dCd7af6a2B4008875CC336b927D57",
            "BTC": "1BvBMSEYstWetqTFn5Au4m4GFg7xJaNVN2"
        }
    })
}

/// Answers `POST /v1/invoices` carrying `api_key` with the sample invoice.
pub fn mock_create_invoice<'a>(server: &'a MockServer, api_key: &str) -> Mock<'a> {
    server.mock(|when, then| {
        when.method(POST)
            .path(INVOICES_PATH)
            .header(api_key_header(), api_key)
            .header("content-type", "application/json");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(sample_invoice_response());
    })
}

/// Answers `POST /v1/invoices` only when the body contains `partial_body`.
pub fn mock_create_invoice_matching<'a>(server: &'a MockServer, partial_body: &Value) -> Mock<'a> {
    server.mock(|when, then| {
        when.method(POST)
            .path(INVOICES_PATH)
            .json_body_partial(partial_body.to_string());
        then.status(200)
            .header("content-type", "application/json")
            .json_body(sample_invoice_response());
    })
}

pub fn mock_create_invoice_unauthorized(server: &MockServer) -> Mock<'_> {
    server.mock(|when, then| {
        when.method(POST).path(INVOICES_PATH);
        then.status(401).body("401: Unauthorized");
    })
}

/// A 200 whose body carries a field the response schema does not know.
pub fn mock_create_invoice_unexpected_field(server: &MockServer) -> Mock<'_> {
    server.mock(|when, then| {
        let mut body = sample_invoice_response();
        body["expires_at"] = json!("2024-01-01T00:00:00Z");
        when.method(POST).path(INVOICES_PATH);
        then.status(200)
            .header("content-type", "application/json")
            .json_body(body);
    })
}

pub async fn mock_create_invoice_async<'a>(server: &'a MockServer, api_key: &str) -> Mock<'a> {
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path(INVOICES_PATH)
                .header(api_key_header(), api_key);
            then.status(200)
                .header("content-type", "application/json")
                .json_body(sample_invoice_response());
        })
        .await
}

pub async fn mock_create_invoice_unauthorized_async(server: &MockServer) -> Mock<'_> {
    server
        .mock_async(|when, then| {
            when.method(POST).path(INVOICES_PATH);
            then.status(401).body("401: Unauthorized");
        })
        .await
}
