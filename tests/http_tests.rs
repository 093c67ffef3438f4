// Integration tests for the HTTP front end


use hyper::{Method, StatusCode};
use test_utils::*;

#[tokio::test]
async fn test_post_and_fetch_message() {
    let server = TestServer::start().await;

    let (status, created) = server.post_message("hello from the wire").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["content"], "hello from the wire");
    assert_eq!(created["char_count"], 19);
    let id = created["id"].as_str().unwrap().to_string();

    let (status, fetched) = server
        .request(Method::GET, &format!("/msg/{}", id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, created);
}

#[tokio::test]
async fn test_validation_errors_are_422() {
    let server = TestServer::start().await;

    let (status, body) = server.post_message(&"x".repeat(141)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["length"], 141);
    assert!(body["detail"].as_str().unwrap().contains("140"));

    let (status, body) = server.post_message("").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["detail"], "Message cannot be empty");

    let (status, _) = server
        .request(Method::POST, "/msg", Some("not json"))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    assert_eq!(server.store.len().await, 0);
}

#[tokio::test]
async fn test_list_query_parameters() {
    let server = TestServer::start().await;
    for i in 0..4 {
        server.post_message(&format!("m{}", i)).await;
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    }

    let (status, all) = server.request(Method::GET, "/msg", None).await;
    assert_eq!(status, StatusCode::OK);
    let all = all.as_array().unwrap().clone();
    assert_eq!(all.len(), 4);
    assert_eq!(all[0]["content"], "m3");

    let (_, page) = server
        .request(Method::GET, "/msg?limit=2&offset=1&sort=asc", None)
        .await;
    let contents: Vec<_> = page
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["content"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(contents, vec!["m1", "m2"]);

    let (_, empty) = server.request(Method::GET, "/msg?offset=10", None).await;
    assert_eq!(empty.as_array().unwrap().len(), 0);

    for bad in ["/msg?limit=-1", "/msg?offset=-2", "/msg?limit=ten", "/msg?sort=up"] {
        let (status, _) = server.request(Method::GET, bad, None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{}", bad);
    }
}

#[tokio::test]
async fn test_unknown_message_is_404() {
    let server = TestServer::start().await;

    let (status, body) = server.request(Method::GET, "/msg/00000000", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["detail"].as_str().unwrap().contains("not found"));
}

#[tokio::test]
async fn test_delete_requires_admin_key() {
    let server = TestServer::start().await;
    let (_, created) = server.post_message("temporary").await;
    let id = created["id"].as_str().unwrap().to_string();

    let (status, _) = server
        .request(Method::DELETE, &format!("/msg/{}", id), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = server
        .request(Method::DELETE, &format!("/msg/{}?admin_key=wrong", id), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Unauthorized callers get 403 even for ids that do not exist
    let (status, _) = server
        .request(Method::DELETE, "/msg/00000000?admin_key=wrong", None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = server
        .request(
            Method::DELETE,
            &format!("/msg/00000000?admin_key={}", ADMIN_KEY),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = server
        .request(
            Method::DELETE,
            &format!("/msg/{}?admin_key={}", id, ADMIN_KEY),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], id.as_str());

    let (status, _) = server
        .request(Method::GET, &format!("/msg/{}", id), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_stats_and_health() {
    let server = TestServer::start().await;

    let (status, stats) = server.request(Method::GET, "/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total_messages"], 0);
    assert_eq!(stats["avg_message_length"], 0.0);

    server.post_message("a").await;
    server.post_message(&"b".repeat(140)).await;

    let (_, stats) = server.request(Method::GET, "/stats", None).await;
    assert_eq!(stats["total_messages"], 2);
    assert_eq!(stats["total_characters"], 141);
    assert_eq!(stats["avg_message_length"], 70.5);
    assert_eq!(stats["shortest_message"], 1);
    assert_eq!(stats["longest_message"], 140);

    let (status, health) = server.request(Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "ok");
    assert_eq!(health["messages"], 2);
}

#[tokio::test]
async fn test_routing_edges() {
    let server = TestServer::start().await;

    let (status, headers, body) = server.raw_request(Method::GET, "/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("POST /msg"));
    assert_eq!(headers["access-control-allow-origin"], "*");

    let (status, _) = server.request(Method::GET, "/nowhere", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = server.request(Method::GET, "/msg/a/b", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, headers, _) = server.raw_request(Method::PUT, "/msg", None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(headers["allow"], "GET, POST, OPTIONS");

    let (status, headers, _) = server.raw_request(Method::POST, "/msg/abc", None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(headers["allow"], "GET, DELETE, OPTIONS");

    let (status, headers, _) = server.raw_request(Method::DELETE, "/stats", None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(headers["allow"], "GET, OPTIONS");
}

#[tokio::test]
async fn test_cors_preflight() {
    let server = TestServer::start().await;

    for path in ["/msg", "/msg/abc", "/stats", "/health", "/"] {
        let (status, headers, body) = server.raw_request(Method::OPTIONS, path, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT, "{}", path);
        assert_eq!(headers["access-control-allow-origin"], "*");
        assert_eq!(headers["access-control-allow-methods"], "GET, POST");
        assert_eq!(headers["access-control-allow-headers"], "*");
        assert!(body.is_empty());
    }

    let (status, _, _) = server.raw_request(Method::OPTIONS, "/nowhere", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // A preflight never touches the store
    assert!(server.store.is_empty().await);
}

#[tokio::test]
async fn test_oversized_body_is_413() {
    let server = TestServer::start().await;

    let padding = " ".repeat(5000);
    let body = format!("{{\"content\": \"hi\"{}}}", padding);
    let (status, body) = server.request(Method::POST, "/msg", Some(&body)).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(body["detail"].as_str().unwrap().contains("4096"));
    assert!(server.store.is_empty().await);

    // Whitespace padding under the cap is still a valid request
    let body = format!("{{\"content\": \"hi\"{}}}", " ".repeat(1000));
    let (status, created) = server.request(Method::POST, "/msg", Some(&body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["content"], "hi");
}

#[tokio::test]
async fn test_writes_reach_disk_before_response() {
    let server = TestServer::start().await;
    let (_, created) = server.post_message("durable").await;

    let raw = std::fs::read_to_string(server.dir.path().join("messages.json")).unwrap();
    let table: serde_json::Value = serde_json::from_str(&raw).unwrap();
    let id = created["id"].as_str().unwrap();
    assert_eq!(table[id]["content"], "durable");
}
