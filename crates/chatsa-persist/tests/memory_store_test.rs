use std::sync::Arc;

use chatsa_persist::{InMemoryPersistenceClient, PersistenceClient};
use chatsa_types::{Channel, Conversation, Integration, QuestionFlow, Team};
use chrono::{Duration, Utc};

fn store() -> Arc<dyn PersistenceClient> {
    Arc::new(InMemoryPersistenceClient::new())
}

#[tokio::test]
async fn test_team_lookup_by_api_key() {
    let store = store();
    let team = Team::new("Acme", "owner@acme.test");
    store.save_team(&team).await.unwrap();

    let found = store.find_team_by_api_key(&team.api_key).await.unwrap().unwrap();
    assert_eq!(found.id, team.id);
    assert!(store.find_team_by_api_key("cs_unknown").await.unwrap().is_none());
}

#[tokio::test]
async fn test_conversation_lookup_is_per_channel_and_user() {
    let store = store();
    let web = Conversation::new("bot", Channel::Web, "visitor-1");
    let wa = Conversation::new("bot", Channel::WhatsApp, "visitor-1");
    store.save_conversation(&web).await.unwrap();
    store.save_conversation(&wa).await.unwrap();

    let found = store
        .find_conversation("bot", Channel::WhatsApp, "visitor-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, wa.id);
    assert!(store
        .find_conversation("bot", Channel::Instagram, "visitor-1")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_conversations_listed_by_recent_activity() {
    let store = store();
    let now = Utc::now();
    for (i, user) in ["a", "b", "c"].iter().enumerate() {
        let mut conversation = Conversation::new("bot", Channel::Web, *user);
        conversation.last_message_at = now - Duration::minutes(10 - i as i64);
        store.save_conversation(&conversation).await.unwrap();
    }

    let page = store.list_conversations("bot", Some(2), None).await.unwrap();
    let users: Vec<&str> = page.iter().map(|c| c.external_user_id.as_str()).collect();
    assert_eq!(users, vec!["c", "b"]);

    let rest = store.list_conversations("bot", Some(2), Some(2)).await.unwrap();
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0].external_user_id, "a");
}

#[tokio::test]
async fn test_saves_are_upserts() {
    let store = store();
    let mut integration = Integration::new("team", "bot", Channel::Messenger, "PAGE", "tok");
    store.save_integration(&integration).await.unwrap();

    integration.enabled = false;
    store.save_integration(&integration).await.unwrap();

    let all = store.list_integrations("bot").await.unwrap();
    assert_eq!(all.len(), 1);
    assert!(!all[0].enabled);

    let flow = QuestionFlow::new("bot", "Welcome", vec![], vec![]);
    store.save_flow(&flow).await.unwrap();
    store.save_flow(&flow).await.unwrap();
    assert_eq!(store.list_flows("bot").await.unwrap().len(), 1);
    store.delete_flow(&flow.id).await.unwrap();
    assert!(store.get_flow(&flow.id).await.unwrap().is_none());
}
