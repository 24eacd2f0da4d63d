//! End-to-end test against a real listening server, driven with reqwest.

mod common;

use std::time::Duration;

use actix_web::{App, HttpServer};
use common::{bearer, init_tracing, initialize_request, rpc, service};
use mcp_bearer_server::HEADER_SESSION_ID;
use serde_json::{Value, json};

#[actix_web::test]
async fn test_full_session_over_tcp() {
    init_tracing();

    let service = service();
    let server = HttpServer::new(move || App::new().configure(service.clone().configure()))
        .workers(2)
        .bind("127.0.0.1:0")
        .expect("Failed to bind server");

    let addr = *server.addrs().first().unwrap();
    let server_handle = server.run();
    let stop = server_handle.handle();
    let server_task = tokio::spawn(async move {
        let _ = server_handle.await;
    });

    tokio::time::sleep(Duration::from_millis(100)).await;

    let client = reqwest::Client::new();
    let url = format!("http://{addr}/");

    // Unauthenticated clients are pointed at the metadata document.
    let response = client
        .post(&url)
        .json(&initialize_request(json!(1)))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 401);
    let challenge = response
        .headers()
        .get("www-authenticate")
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();
    assert!(challenge.contains("resource_metadata="));

    let response = client
        .post(&url)
        .header("Authorization", bearer())
        .json(&initialize_request(json!(1)))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 200);
    let session_id = response
        .headers()
        .get(HEADER_SESSION_ID)
        .and_then(|v| v.to_str().ok())
        .expect("initialize must return a session id")
        .to_string();

    // Requests may land on either worker; the session is shared.
    for id in 2..6 {
        let response = client
            .post(&url)
            .header("Authorization", bearer())
            .header(HEADER_SESSION_ID, &session_id)
            .json(&rpc(
                json!(id),
                "tools/call",
                json!({"name": "add", "arguments": {"a": id, "b": 1}}),
            ))
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(response.status(), 200);
        let body: Value = response.json().await.unwrap();
        assert_eq!(
            body["result"]["content"][0]["text"],
            format!("{id} + 1 = {}", id + 1)
        );
    }

    let response = client
        .delete(&url)
        .header("Authorization", bearer())
        .header(HEADER_SESSION_ID, &session_id)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 204);

    let response = client
        .post(&url)
        .header("Authorization", bearer())
        .header(HEADER_SESSION_ID, &session_id)
        .json(&rpc(json!(7), "tools/list", json!({})))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], -32000);

    stop.stop(true).await;
    let _ = server_task.await;
}
