//! Integration tests against a live FreeSWITCH instance.
//!
//! These tests require FreeSWITCH ESL on 127.0.0.1:8022 with password ClueCon.
//! Run with: cargo test --test live_freeswitch -- --ignored

use dialbridge::{EslClient, EslEventType, EventFormat};
use std::time::Duration;

const ESL_HOST: &str = "127.0.0.1";
const ESL_PORT: u16 = 8022;
const ESL_PASSWORD: &str = "ClueCon";

async fn connect() -> (EslClient, dialbridge::EslEventStream) {
    let (client, events) = EslClient::connect(ESL_HOST, ESL_PORT, ESL_PASSWORD)
        .await
        .expect("failed to connect to FreeSWITCH");
    client.set_command_timeout(Duration::from_secs(10));
    (client, events)
}

#[tokio::test]
#[ignore]
async fn live_connect_and_status() {
    let (client, _events) = connect().await;
    assert!(client.is_connected());

    let resp = client
        .api("status")
        .await
        .unwrap();
    let body = resp
        .body()
        .expect("status should have body");
    assert!(body.contains("UP"), "expected UP in status: {}", body);
}

#[tokio::test]
#[ignore]
async fn live_subscribe_and_recv_heartbeat() {
    let (client, mut events) = connect().await;

    client
        .subscribe_events(EventFormat::Plain, &[EslEventType::Heartbeat])
        .await
        .unwrap();

    let event = tokio::time::timeout(Duration::from_secs(25), events.recv())
        .await
        .expect("timeout waiting for heartbeat")
        .expect("event stream closed");

    assert_eq!(event.event_type(), Some(EslEventType::Heartbeat));
    assert!(event
        .header("Core-UUID")
        .is_some());
}

#[tokio::test]
#[ignore]
async fn live_api_multiple_commands() {
    let (client, _events) = connect().await;

    let version = client
        .api("version")
        .await
        .unwrap();
    assert!(
        version
            .body()
            .is_some(),
        "version should have body"
    );

    let hostname = client
        .api("hostname")
        .await
        .unwrap();
    assert!(
        hostname
            .body()
            .is_some(),
        "hostname should have body"
    );

    let global = client
        .api("global_getvar")
        .await
        .unwrap();
    assert!(
        global
            .body()
            .is_some(),
        "global_getvar should have body"
    );
}

#[tokio::test]
#[ignore]
async fn live_reply_status_ok() {
    let (client, _events) = connect().await;

    // subscribe_events goes through into_result(), so Ok here means +OK.
    client
        .subscribe_events(EventFormat::Plain, &[EslEventType::Heartbeat])
        .await
        .expect("subscribe should return +OK");
}

#[tokio::test]
#[ignore]
async fn live_api_err_body() {
    let (client, _events) = connect().await;

    // api with a non-existent command returns -ERR in the body, not an Err.
    let resp = client
        .api("nonexistent_command_xyz")
        .await
        .unwrap();
    let body = resp
        .body()
        .expect("api error should have body");
    assert!(
        body.contains("-ERR") || body.contains("-USAGE"),
        "expected error in body: {}",
        body
    );
}
