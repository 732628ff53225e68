#![allow(dead_code)]

use std::sync::Arc;

use ed25519_dalek::SigningKey;
use parley_core::{
    sign_compact_jws, sha256_hex, BuildContext, Ed25519Verifier, Exchange, Message, Request,
    Response, SignatureVerifier, API_VERSION_HEADER,
};
use parley_sample::{SampleStandard, PUBLISHER, STANDARD_VERSION, SUBSCRIBER};
use rand::rngs::OsRng;
use serde_json::{json, Value};

pub const PUBLISHER_PARTY: &str = "acme-publisher";
pub const SUBSCRIBER_PARTY: &str = "acme-subscriber";

pub fn context() -> BuildContext {
    BuildContext::new("Sample Schedules", STANDARD_VERSION)
        .with_party(PUBLISHER, PUBLISHER_PARTY)
        .with_party(SUBSCRIBER, SUBSCRIBER_PARTY)
}

pub fn signing_key() -> SigningKey {
    SigningKey::generate(&mut OsRng)
}

pub fn standard(key: &SigningKey) -> SampleStandard {
    let verifier: Arc<dyn SignatureVerifier> = Arc::new(Ed25519Verifier::new(key.verifying_key()));
    SampleStandard::new(verifier).unwrap()
}

/// A subscriber-to-publisher exchange with `API-Version` headers on both
/// messages.
pub fn exchange(
    method: &str,
    path: &str,
    query: &[(&str, &str)],
    request_body: Option<Value>,
    status: u16,
    response_body: Option<Value>,
) -> Exchange {
    let ts = 1_735_603_200_000;
    let mut request_message = Message::new(SUBSCRIBER_PARTY, SUBSCRIBER, PUBLISHER_PARTY, PUBLISHER, ts)
        .with_header(API_VERSION_HEADER, STANDARD_VERSION);
    if let Some(body) = request_body {
        request_message = request_message.with_json(body);
    }
    let mut response_message =
        Message::new(PUBLISHER_PARTY, PUBLISHER, SUBSCRIBER_PARTY, SUBSCRIBER, ts + 20)
            .with_header(API_VERSION_HEADER, STANDARD_VERSION);
    if let Some(body) = response_body {
        response_message = response_message.with_json(body);
    }
    let url = format!("https://publisher.example.com/v1{path}");
    let request = query.iter().fold(
        Request::new(method, &url, request_message),
        |request, (name, value)| request.with_query_param(name, value),
    );
    Exchange::new(request, Response::new(status, response_message))
}

pub fn schedules_body() -> Value {
    json!({"schedules": [{
        "vesselName": "Maersk Pelican",
        "interval": "week",
        "startDate": "2024-12-30",
        "endDate": "2025-01-05"
    }]})
}

pub fn subscription(reference: &str) -> Value {
    json!({
        "subscriptionReference": reference,
        "callbackUrl": "https://subscriber.example.com/callback",
        "interval": "week"
    })
}

pub fn signed_subscription(key: &SigningKey, reference: &str) -> Value {
    let subscription = subscription(reference);
    let payload = json!({
        "subscription": subscription,
        "contentChecksum": sha256_hex(&subscription),
    });
    json!({"signedContent": sign_compact_jws(&payload, key)})
}
