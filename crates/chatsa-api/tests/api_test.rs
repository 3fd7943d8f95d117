mod common;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
};
use serde_json::json;
use tower::ServiceExt;

use common::{get_request, json_request, test_app, ADMIN_TOKEN, ANSWER};

#[tokio::test]
async fn test_health_reports_storage() {
    let app = test_app();
    let (status, body) = app.send(get_request("/health", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["storage"]["connected"], true);
}

#[tokio::test]
async fn test_create_team_requires_admin_token() {
    let app = test_app();
    let payload = json!({ "name": "Acme", "owner_email": "owner@acme.test" });

    let (status, _) = app.send(json_request("POST", "/teams", None, payload.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .method("POST")
        .uri("/teams")
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-admin-token", ADMIN_TOKEN)
        .body(Body::from(payload.to_string()))
        .unwrap();
    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["plan"], "free");
    let api_key = body["api_key"].as_str().unwrap().to_string();

    let (status, body) = app.send(get_request("/team", Some(&api_key))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Acme");
    assert!(body.get("api_key").is_none());
    assert_eq!(body["usage"]["messages_used"], 0);
}

#[tokio::test]
async fn test_missing_or_unknown_key_is_unauthorized() {
    let app = test_app();

    let (status, body) = app.send(get_request("/chatbots", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());

    let (status, _) = app.send(get_request("/chatbots", Some("cs_unknown"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_free_plan_allows_one_chatbot() {
    let app = test_app();
    let team = app.team().await;
    let chatbot_id = app.chatbot(&team).await;

    let (status, body) = app
        .send(json_request("POST", "/chatbots", Some(&team.api_key), json!({ "name": "Second" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN, "{}", body);

    let (status, body) = app.send(get_request("/chatbots", Some(&team.api_key))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["id"], chatbot_id.as_str());
    assert!(body[0]["dataset_id"].as_str().unwrap().ends_with("-Helpdesk"));
}

#[tokio::test]
async fn test_chatbot_of_another_team_is_forbidden() {
    let app = test_app();
    let owner = app.team().await;
    let other = app.team().await;
    let chatbot_id = app.chatbot(&owner).await;

    let uri = format!("/chatbots/{}", chatbot_id);
    let (status, _) = app.send(get_request(&uri, Some(&other.api_key))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.send(get_request("/chatbots/missing", Some(&owner.api_key))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_update_chatbot_validates_settings() {
    let app = test_app();
    let team = app.team().await;
    let chatbot_id = app.chatbot(&team).await;
    let uri = format!("/chatbots/{}", chatbot_id);

    let (status, _) = app
        .send(json_request("PATCH", &uri, Some(&team.api_key), json!({ "temperature": 3.5 })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .send(json_request(
            "PATCH",
            &uri,
            Some(&team.api_key),
            json!({ "provider": "groq", "model": "llama-3.1-8b-instant" }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["settings"]["provider"], "groq");
    assert_eq!(body["settings"]["model"], "llama-3.1-8b-instant");
}

#[tokio::test]
async fn test_add_text_file_to_dataset() {
    let app = test_app();
    let team = app.team().await;
    let chatbot_id = app.chatbot(&team).await;
    let uri = format!("/chatbots/{}/files", chatbot_id);

    let (status, body) = app
        .send(json_request(
            "POST",
            &uri,
            Some(&team.api_key),
            json!({ "type": "text", "name": "hours", "text": "We open at 9am." }),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["status"], "ready");
    assert_eq!(app.knowledge.texts.lock().unwrap().as_slice(), ["We open at 9am."]);

    let (status, _) = app
        .send(json_request(
            "POST",
            &uri,
            Some(&team.api_key),
            json!({ "type": "upload", "name": "a.pdf", "content_base64": "%%%not-base64" }),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.send(get_request(&uri, Some(&team.api_key))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_widget_chat_answers_without_api_key() {
    let app = test_app();
    let team = app.team().await;
    let chatbot_id = app.chatbot(&team).await;
    let uri = format!("/chatbots/{}/chat", chatbot_id);

    let (status, body) = app
        .send(json_request("POST", &uri, None, json!({ "message": "When do you open?" })))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["reply"], ANSWER);
    assert_eq!(body["human_takeover"], false);
    let conversation_id = body["conversation_id"].as_str().unwrap().to_string();

    let (status, body) = app
        .send(get_request(&format!("/conversations/{}", conversation_id), Some(&team.api_key)))
        .await;
    assert_eq!(status, StatusCode::OK);
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(messages[1]["role"], "assistant");

    let (status, body) = app.send(get_request("/team", Some(&team.api_key))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["usage"]["messages_used"], 1);
}

#[tokio::test]
async fn test_widget_chat_rejects_bad_input() {
    let app = test_app();
    let team = app.team().await;
    let chatbot_id = app.chatbot(&team).await;

    let (status, _) = app
        .send(json_request(
            "POST",
            &format!("/chatbots/{}/chat", chatbot_id),
            None,
            json!({ "message": "   " }),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(json_request("POST", "/chatbots/missing/chat", None, json!({ "message": "hi" })))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_widget_chat_stream_is_sse() {
    let app = test_app();
    let team = app.team().await;
    let chatbot_id = app.chatbot(&team).await;

    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/chatbots/{}/chat/stream", chatbot_id),
            None,
            json!({ "message": "When do you open?" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/event-stream"));

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8_lossy(&bytes);
    assert!(text.contains("event: conversation"));
    assert!(text.contains("event: message"));
    assert!(text.contains("event: done"));
}

#[tokio::test]
async fn test_flow_upsert_validates_and_replaces() {
    let app = test_app();
    let team = app.team().await;
    let chatbot_id = app.chatbot(&team).await;
    let uri = format!("/chatbots/{}/flows", chatbot_id);

    let broken = json!({
        "name": "Menu",
        "nodes": [{ "id": "q1", "type": "question", "text": "Sales or support?", "options": ["Sales", "Support"] }],
        "edges": [{ "source": "q1", "target": "nowhere", "option_index": 0 }]
    });
    let (status, _) = app.send(json_request("PUT", &uri, Some(&team.api_key), broken)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let flow = json!({
        "name": "Menu",
        "nodes": [
            { "id": "q1", "type": "question", "text": "Sales or support?", "options": ["Sales", "Support"] },
            { "id": "sales", "type": "message", "text": "A seller will call you." },
            { "id": "bye", "type": "end", "text": "Thanks!" }
        ],
        "edges": [
            { "source": "q1", "target": "sales", "option_index": 0 },
            { "source": "q1", "target": "bye", "option_index": 1 },
            { "source": "sales", "target": "bye" }
        ]
    });
    let (status, body) = app.send(json_request("PUT", &uri, Some(&team.api_key), flow.clone())).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let flow_id = body["id"].as_str().unwrap().to_string();

    let mut replacement = flow;
    replacement["id"] = json!(flow_id);
    replacement["trigger_keywords"] = json!(["menu"]);
    let (status, body) = app.send(json_request("PUT", &uri, Some(&team.api_key), replacement)).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["trigger_keywords"], json!(["menu"]));

    let (_, body) = app.send(get_request(&uri, Some(&team.api_key))).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_connect_channel_hides_token() {
    let app = test_app();
    let team = app.team().await;
    let chatbot_id = app.chatbot(&team).await;
    let uri = format!("/chatbots/{}/integrations", chatbot_id);

    let (status, body) = app
        .send(json_request(
            "POST",
            &uri,
            Some(&team.api_key),
            json!({ "channel": "whatsapp", "account_id": "PHONE-1", "access_token": "wa-token" }),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["channel"], "whatsapp");
    assert!(body.get("access_token").is_none());
    assert_eq!(app.messenger.subscribed.lock().unwrap().len(), 1);

    let (status, _) = app
        .send(json_request(
            "POST",
            &uri,
            Some(&team.api_key),
            json!({ "channel": "web", "account_id": "x", "access_token": "y" }),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_channel_owned_by_another_team_conflicts() {
    let app = test_app();
    let first = app.team().await;
    let second = app.team().await;
    let first_bot = app.chatbot(&first).await;
    let second_bot = app.chatbot(&second).await;
    let payload = json!({ "channel": "messenger", "account_id": "PAGE-1", "access_token": "t" });

    let (status, _) = app
        .send(json_request(
            "POST",
            &format!("/chatbots/{}/integrations", first_bot),
            Some(&first.api_key),
            payload.clone(),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = app
        .send(json_request(
            "POST",
            &format!("/chatbots/{}/integrations", second_bot),
            Some(&second.api_key),
            payload,
        ))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_takeover_and_agent_reply() {
    let app = test_app();
    let team = app.team().await;
    let chatbot_id = app.chatbot(&team).await;

    let (_, body) = app
        .send(json_request(
            "POST",
            &format!("/chatbots/{}/chat", chatbot_id),
            None,
            json!({ "message": "I need a human" }),
        ))
        .await;
    let conversation_id = body["conversation_id"].as_str().unwrap().to_string();

    let (status, body) = app
        .send(get_request(&format!("/chatbots/{}/conversations", chatbot_id), Some(&team.api_key)))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["conversations"].as_array().unwrap().len(), 1);
    assert_eq!(body["has_more"], false);

    let (status, body) = app
        .send(json_request(
            "POST",
            &format!("/conversations/{}/takeover", conversation_id),
            Some(&team.api_key),
            json!({ "enabled": true }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["human_takeover"], true);

    let (status, body) = app
        .send(json_request(
            "POST",
            &format!("/conversations/{}/reply", conversation_id),
            Some(&team.api_key),
            json!({ "text": "Hi, this is Sam." }),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["role"], "agent");

    // Visitor messages are stored but not answered while an agent has the conversation
    let (status, body) = app
        .send(json_request(
            "POST",
            &format!("/chatbots/{}/chat", chatbot_id),
            None,
            json!({ "message": "Thanks", "conversation_id": conversation_id }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["human_takeover"], true);
    assert!(body.get("reply").is_none());
}
