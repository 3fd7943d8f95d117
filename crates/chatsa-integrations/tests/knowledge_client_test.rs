use chatsa_integrations::{FileUpload, KnowledgeBase, KnowledgeConfig, TrieveClient};
use mockito::Matcher;

fn client_for(server: &mockito::ServerGuard) -> TrieveClient {
    TrieveClient::new(KnowledgeConfig::new("tr-key", "org-1").with_base_url(server.url())).unwrap()
}

#[tokio::test]
async fn test_create_dataset_sends_credentials() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/dataset")
        .match_header("authorization", "tr-key")
        .match_header("tr-organization", "org-1")
        .match_body(Matcher::PartialJson(serde_json::json!({ "dataset_name": "acme-bot" })))
        .with_status(200)
        .with_body(r#"{"id":"ds-1","name":"acme-bot"}"#)
        .create_async()
        .await;

    let id = client_for(&server).create_dataset("acme-bot").await.unwrap();
    assert_eq!(id, "ds-1");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_upload_file_targets_dataset() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/file")
        .match_header("tr-dataset", "ds-1")
        .match_body(Matcher::PartialJson(serde_json::json!({ "file_name": "faq.txt" })))
        .with_status(200)
        .with_body(r#"{"file_metadata":{"id":"file-9"}}"#)
        .create_async()
        .await;

    let id = client_for(&server)
        .upload_file("ds-1", FileUpload::new("faq.txt", b"Q: hours? A: 9-5".to_vec()))
        .await
        .unwrap();
    assert_eq!(id, "file-9");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_ingest_url_fetches_then_uploads() {
    let mut server = mockito::Server::new_async().await;
    let page = server
        .mock("GET", "/pricing")
        .with_status(200)
        .with_header("content-type", "text/html; charset=utf-8")
        .with_body("<html><body>Pro costs $49</body></html>")
        .create_async()
        .await;
    let upload = server
        .mock("POST", "/api/file")
        .match_body(Matcher::PartialJson(serde_json::json!({ "file_name": "pricing.html" })))
        .with_status(200)
        .with_body(r#"{"file_metadata":{"id":"file-url"}}"#)
        .create_async()
        .await;

    let url = format!("{}/pricing", server.url());
    let id = client_for(&server).ingest_url("ds-1", &url).await.unwrap();

    assert_eq!(id, "file-url");
    page.assert_async().await;
    upload.assert_async().await;
}

#[tokio::test]
async fn test_search_returns_scored_chunks() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/api/chunk/search")
        .match_body(Matcher::PartialJson(serde_json::json!({ "query": "opening hours", "page_size": 3 })))
        .with_status(200)
        .with_body(
            r#"{"chunks":[{"chunk":{"id":"c1","chunk_html":"We open at 9"},"score":0.8}]}"#,
        )
        .create_async()
        .await;

    let chunks = client_for(&server).search("ds-1", "opening hours", 3).await.unwrap();
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].content, "We open at 9");
}

#[tokio::test]
async fn test_provider_error_propagates() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("DELETE", "/api/file/missing")
        .with_status(404)
        .with_body("not found")
        .create_async()
        .await;

    let err = client_for(&server).delete_file("ds-1", "missing").await.unwrap_err();
    assert!(err.to_string().contains("delete file"));
}
