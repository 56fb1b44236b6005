use bitbanker_sdk::client::{ClientConfig, INVOICES_PATH};
use bitbanker_sdk::mocks::{
    mock_create_invoice, mock_create_invoice_async, mock_create_invoice_matching,
    mock_create_invoice_unauthorized, mock_create_invoice_unauthorized_async,
    mock_create_invoice_unexpected_field,
};
use bitbanker_sdk::{
    generate_sign, AsyncBitbankerClient, BitbankerClient, Currency, Error, FieldIssue, InvoiceData,
};
use httpmock::prelude::*;
use serde_json::json;
use url::Url;

const API_KEY: &str = "test-api-key";

fn invoice() -> InvoiceData {
    InvoiceData::new(
        vec![Currency::Eth, Currency::Btc],
        1000,
        "invoice number 1",
        "invoice header",
    )
    .unwrap()
}

fn config_for(server: &MockServer) -> ClientConfig {
    ClientConfig::new(API_KEY)
        .unwrap()
        .with_base_url(Url::parse(&server.base_url()).unwrap())
}

#[test]
fn test_blocking_create_invoice_success() {
    let server = MockServer::start();
    let mock = mock_create_invoice(&server, API_KEY);

    let client = BitbankerClient::with_config(config_for(&server)).unwrap();
    let response = client.create_invoice(&invoice()).unwrap();

    mock.assert();
    assert_eq!(response.result(), "success");
    assert_eq!(response.id(), "dfj5kpos6uacm");
    assert_eq!(
        response.link(),
        "https://app.dev.bitbanker.org/external/invoice/dfj5kpos6uacm"
    );
    assert_eq!(
        response.address("USDT"),
        Some("0x36928500Bc1dCd7af6a2B4008875CC336b927D57")
    );
    assert_eq!(response.address("BTC"), Some("1BvBMSEYstWetqTFn5Au4m4GFg7xJaNVN2"));
}

#[test]
fn test_blocking_request_body_is_signed() {
    let server = MockServer::start();
    let sign = generate_sign("RUB1000invoice headerinvoice number 1", API_KEY).unwrap();
    let mock = mock_create_invoice_matching(
        &server,
        &json!({
            "payment_currencies": ["ETH", "BTC"],
            "currency": "RUB",
            "amount": 1000.0,
            "description": "invoice number 1",
            "header": "invoice header",
            "is_convert_payments": false,
            "sign": sign,
        }),
    );

    let client = BitbankerClient::with_config(config_for(&server)).unwrap();
    client.create_invoice(&invoice()).unwrap();
    mock.assert();
}

#[test]
fn test_blocking_base_path_is_preserved() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path(format!("/latest/api{INVOICES_PATH}"));
        then.status(200)
            .json_body(bitbanker_sdk::mocks::sample_invoice_response());
    });

    let config = ClientConfig::new(API_KEY)
        .unwrap()
        .with_base_url(Url::parse(&server.url("/latest/api")).unwrap());
    let client = BitbankerClient::with_config(config).unwrap();
    client.create_invoice(&invoice()).unwrap();
    mock.assert();
}

#[test]
fn test_blocking_create_invoice_response_error() {
    let server = MockServer::start();
    let mock = mock_create_invoice_unauthorized(&server);

    let client = BitbankerClient::with_config(config_for(&server)).unwrap();
    let err = client.create_invoice(&invoice()).unwrap_err();

    mock.assert();
    match err {
        Error::Response { status, body } => {
            assert_eq!(status, 401);
            assert_eq!(body, "401: Unauthorized");
        }
        other => panic!("Expected Response error, got: {:?}", other),
    }
}

#[test]
fn test_blocking_create_invoice_rejects_unknown_response_field() {
    let server = MockServer::start();
    mock_create_invoice_unexpected_field(&server);

    let client = BitbankerClient::with_config(config_for(&server)).unwrap();
    let err = client.create_invoice(&invoice()).unwrap_err();
    match err {
        Error::Validation(e) => {
            assert_eq!(e.model(), "CreateInvoiceResponse");
            assert_eq!(e.issue_for("expires_at"), Some(&FieldIssue::Unknown));
        }
        other => panic!("Expected Validation error, got: {:?}", other),
    }
}

#[test]
fn test_blocking_create_invoice_connection_error() {
    // Nothing listens on port 1.
    let config = ClientConfig::new(API_KEY)
        .unwrap()
        .with_base_url(Url::parse("http://127.0.0.1:1").unwrap())
        .with_timeout(2);
    let client = BitbankerClient::with_config(config).unwrap();

    let err = client.create_invoice(&invoice()).unwrap_err();
    assert!(err.is_connection(), "Expected Connection error, got: {:?}", err);
    assert!(std::error::Error::source(&err).is_some());
}

#[test]
fn test_blocking_client_rejects_invalid_api_key() {
    let err = BitbankerClient::new("bad\nkey").unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)));
    let err = BitbankerClient::new("").unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)));
}

#[tokio::test]
async fn test_async_create_invoice_success() {
    let server = MockServer::start_async().await;
    let mock = mock_create_invoice_async(&server, API_KEY).await;

    let client = AsyncBitbankerClient::with_config(config_for(&server)).unwrap();
    let response = client.create_invoice(&invoice()).await.unwrap();

    mock.assert_async().await;
    assert_eq!(response.result(), "success");
    assert_eq!(response.id(), "dfj5kpos6uacm");
    assert_eq!(response.addresses().len(), 2);
}

#[tokio::test]
async fn test_async_create_invoice_response_error() {
    let server = MockServer::start_async().await;
    mock_create_invoice_unauthorized_async(&server).await;

    let client = AsyncBitbankerClient::with_config(config_for(&server)).unwrap();
    let err = client.create_invoice(&invoice()).await.unwrap_err();

    assert!(err.is_response());
    assert_eq!(err.response_body(), Some("401: Unauthorized"));
}

#[tokio::test]
async fn test_async_create_invoice_connection_error() {
    let config = ClientConfig::new(API_KEY)
        .unwrap()
        .with_base_url(Url::parse("http://127.0.0.1:1").unwrap())
        .with_timeout(2);
    let client = AsyncBitbankerClient::with_config(config).unwrap();

    let err = client.create_invoice(&invoice()).await.unwrap_err();
    assert!(err.is_connection(), "Expected Connection error, got: {:?}", err);
}

#[tokio::test]
async fn test_async_client_makes_exactly_one_attempt() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path(INVOICES_PATH);
            then.status(503).body("Service Unavailable");
        })
        .await;

    let client = AsyncBitbankerClient::with_config(config_for(&server)).unwrap();
    let err = client.create_invoice(&invoice()).await.unwrap_err();

    assert_eq!(err.response_body(), Some("Service Unavailable"));
    assert_eq!(mock.hits_async().await, 1);
}
