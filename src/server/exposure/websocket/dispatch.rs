//! Protocol logic: what each decoded client envelope does

use super::protocol::{self, ClientMessage, ServerMessage};
use super::session::SessionId;
use crate::core::error::ChatError;
use crate::core::message::{MessageRecord, UserId};
use crate::core::push::PushNotification;
use crate::server::host::ServerHost;

/// Identity of the Session a frame arrived on
///
/// The user id was established by the gateway and is trusted from here on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub session_id: SessionId,
    pub user_id: UserId,
}

/// Apply one client envelope
///
/// Never fails: errors are logged and the connection keeps going.
pub async fn dispatch(host: &ServerHost, ctx: &SessionContext, msg: ClientMessage) {
    match msg {
        ClientMessage::JoinChat { chat_id } => {
            host.hub.join_room(&ctx.session_id, &chat_id).await;
        }
        ClientMessage::LeaveChat { chat_id } => {
            host.hub.leave_room(&ctx.session_id, &chat_id).await;
        }
        ClientMessage::Typing { chat_id, is_typing } => {
            if let Err(e) = broadcast_typing(host, ctx, &chat_id, is_typing).await {
                tracing::error!(session_id = %ctx.session_id, error = %e, "Failed to broadcast typing");
            }
        }
        ClientMessage::SendMessage { chat_id, content } => {
            if let Err(e) = send_message(host, ctx, &chat_id, &content).await {
                tracing::error!(
                    session_id = %ctx.session_id,
                    user_id = %ctx.user_id,
                    chat_id = %chat_id,
                    error = %e,
                    "Message not delivered"
                );
            }
        }
    }
}

/// Relay a typing indicator to the room; nothing is persisted
pub async fn broadcast_typing(
    host: &ServerHost,
    ctx: &SessionContext,
    chat_id: &str,
    is_typing: bool,
) -> Result<(), ChatError> {
    let frame = protocol::encode(&ServerMessage::UserTyping {
        user_id: ctx.user_id.clone(),
        chat_id: chat_id.to_string(),
        is_typing,
    })?;
    host.hub.broadcast_to_room(chat_id, frame).await;
    Ok(())
}

/// Persist a message, bump unread counters, then fan it out to the room
///
/// A failed append aborts before any counter changes or any peer sees the
/// message. So does a failed participant lookup, since the append is already
/// durable but the recipients are unknown.
pub async fn send_message(
    host: &ServerHost,
    ctx: &SessionContext,
    chat_id: &str,
    content: &str,
) -> Result<MessageRecord, ChatError> {
    let message = host
        .store
        .append_message(chat_id, &ctx.user_id, content)
        .await
        .map_err(ChatError::persistence)?;

    let participants = host
        .store
        .get_participants(chat_id)
        .await
        .map_err(ChatError::persistence)?;

    let recipients: Vec<&UserId> = participants
        .iter()
        .filter(|p| **p != ctx.user_id)
        .collect();

    for participant in &recipients {
        if let Err(e) = host.store.increment_unread(chat_id, participant).await {
            tracing::warn!(
                chat_id = %chat_id,
                participant_id = %participant,
                error = %e,
                "Failed to increment unread count"
            );
        }
    }
    if let Err(e) = host.store.touch_conversation(chat_id).await {
        tracing::warn!(chat_id = %chat_id, error = %e, "Failed to touch conversation");
    }

    let frame = protocol::encode(&ServerMessage::NewMessage {
        message: message.clone(),
    })?;
    let delivery = host.hub.broadcast_to_room(chat_id, frame).await;
    tracing::debug!(
        chat_id = %chat_id,
        message_id = %message.id,
        delivered = delivery.delivered,
        "Message broadcast"
    );

    notify_offline(host, &recipients, &message).await;

    Ok(message)
}

/// Fire-and-forget push for recipients without a live Session
async fn notify_offline(host: &ServerHost, recipients: &[&UserId], message: &MessageRecord) {
    let Some(notifier) = host.push.clone() else {
        return;
    };

    for recipient in recipients {
        if host.hub.is_user_online(recipient).await {
            continue;
        }

        let notification = PushNotification::chat_message(
            recipient,
            &message.sender_id,
            &message.chat_id,
            &message.content,
        );
        let notifier = notifier.clone();
        tokio::spawn(async move {
            let recipient_id = notification.recipient_id.clone();
            if let Err(e) = notifier.notify(notification).await {
                tracing::warn!(recipient_id = %recipient_id, error = %e, "Push notification failed");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChatConfig;
    use crate::core::auth::StaticIdentityResolver;
    use crate::core::message::Conversation;
    use crate::core::push::PushNotifier;
    use crate::core::store::ChatStore;
    use crate::server::exposure::websocket::protocol::Frame;
    use crate::server::exposure::websocket::session::Session;
    use crate::storage::InMemoryChatStore;
    use anyhow::{Result, anyhow};
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::sync::mpsc;

    /// Store whose appends always fail
    struct FailingStore {
        inner: InMemoryChatStore,
    }

    #[async_trait]
    impl ChatStore for FailingStore {
        async fn append_message(&self, _: &str, _: &str, _: &str) -> Result<MessageRecord> {
            Err(anyhow!("database unavailable"))
        }
        async fn increment_unread(&self, chat_id: &str, participant_id: &str) -> Result<()> {
            self.inner.increment_unread(chat_id, participant_id).await
        }
        async fn get_participants(&self, chat_id: &str) -> Result<Vec<UserId>> {
            self.inner.get_participants(chat_id).await
        }
        async fn touch_conversation(&self, chat_id: &str) -> Result<()> {
            self.inner.touch_conversation(chat_id).await
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<PushNotification>>,
    }

    #[async_trait]
    impl PushNotifier for RecordingNotifier {
        async fn notify(&self, notification: PushNotification) -> Result<()> {
            self.sent.lock().unwrap().push(notification);
            Ok(())
        }
    }

    fn chat_c1(store: &InMemoryChatStore, participants: &[&str]) {
        let mut conv = Conversation::new(participants.iter().map(|p| p.to_string()).collect());
        conv.id = "c1".to_string();
        store.insert_conversation(conv).unwrap();
    }

    fn host_with(store: Arc<dyn ChatStore>) -> ServerHost {
        ServerHost::new(
            ChatConfig::default(),
            store,
            Arc::new(StaticIdentityResolver::new()),
        )
    }

    async fn connect(host: &ServerHost, user: &str) -> (SessionContext, mpsc::Receiver<Frame>) {
        let (session, rx) = Session::new(user, 16);
        let ctx = SessionContext {
            session_id: session.id().to_string(),
            user_id: user.to_string(),
        };
        host.hub.register(session).await;
        (ctx, rx)
    }

    fn parse(frame: Frame) -> Value {
        serde_json::from_str(&frame).unwrap()
    }

    #[tokio::test]
    async fn test_join_and_leave_dispatch() {
        let host = host_with(Arc::new(InMemoryChatStore::new()));
        let (ctx, _rx) = connect(&host, "alice").await;

        dispatch(&host, &ctx, ClientMessage::JoinChat { chat_id: "c1".into() }).await;
        assert!(host.hub.room_members("c1").await.contains(&ctx.session_id));

        dispatch(&host, &ctx, ClientMessage::LeaveChat { chat_id: "c1".into() }).await;
        assert!(host.hub.room_members("c1").await.is_empty());
    }

    #[tokio::test]
    async fn test_send_message_persists_counts_and_broadcasts() {
        let store = InMemoryChatStore::new();
        chat_c1(&store, &["alice", "bob", "carol"]);
        let host = host_with(Arc::new(store.clone()));

        let (alice, mut alice_rx) = connect(&host, "alice").await;
        let (bob, mut bob_rx) = connect(&host, "bob").await;
        host.hub.join_room(&alice.session_id, "c1").await;
        host.hub.join_room(&bob.session_id, "c1").await;

        dispatch(
            &host,
            &alice,
            ClientMessage::SendMessage {
                chat_id: "c1".into(),
                content: "hi".into(),
            },
        )
        .await;

        let messages = store.messages("c1").unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "hi");
        assert_eq!(messages[0].sender_id, "alice");

        let conv = store.conversation("c1").unwrap().unwrap();
        assert_eq!(conv.unread_for("alice"), 0);
        assert_eq!(conv.unread_for("bob"), 1);
        assert_eq!(conv.unread_for("carol"), 1);

        for rx in [&mut alice_rx, &mut bob_rx] {
            let json = parse(rx.try_recv().unwrap());
            assert_eq!(json["type"], "new_message");
            assert_eq!(json["message"]["content"], "hi");
            assert_eq!(json["message"]["senderId"], "alice");
            assert_eq!(json["message"]["id"], messages[0].id);
            // Exactly one envelope each
            assert!(rx.try_recv().is_err());
        }
    }

    #[tokio::test]
    async fn test_persistence_failure_prevents_broadcast() {
        let inner = InMemoryChatStore::new();
        chat_c1(&inner, &["alice", "bob"]);
        let host = host_with(Arc::new(FailingStore {
            inner: inner.clone(),
        }));

        let (alice, mut alice_rx) = connect(&host, "alice").await;
        let (bob, mut bob_rx) = connect(&host, "bob").await;
        host.hub.join_room(&alice.session_id, "c1").await;
        host.hub.join_room(&bob.session_id, "c1").await;

        let result = send_message(&host, &alice, "c1", "hi").await;
        assert!(matches!(result, Err(ChatError::Persistence(_))));

        assert!(alice_rx.try_recv().is_err());
        assert!(bob_rx.try_recv().is_err());
        let conv = inner.conversation("c1").unwrap().unwrap();
        assert_eq!(conv.unread_for("bob"), 0);
    }

    #[tokio::test]
    async fn test_send_to_unknown_conversation_is_dropped() {
        let host = host_with(Arc::new(InMemoryChatStore::new()));
        let (alice, mut rx) = connect(&host, "alice").await;
        host.hub.join_room(&alice.session_id, "ghost").await;

        let result = send_message(&host, &alice, "ghost", "hi").await;
        assert!(result.is_err());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_typing_is_relayed_not_persisted() {
        let store = InMemoryChatStore::new();
        chat_c1(&store, &["alice", "carol"]);
        let host = host_with(Arc::new(store.clone()));

        let (carol, _carol_rx) = connect(&host, "carol").await;
        let (alice, mut alice_rx) = connect(&host, "alice").await;
        host.hub.join_room(&carol.session_id, "c1").await;
        host.hub.join_room(&alice.session_id, "c1").await;

        dispatch(
            &host,
            &carol,
            ClientMessage::Typing {
                chat_id: "c1".into(),
                is_typing: true,
            },
        )
        .await;

        let json = parse(alice_rx.try_recv().unwrap());
        assert_eq!(json["type"], "user_typing");
        assert_eq!(json["userId"], "carol");
        assert_eq!(json["chatId"], "c1");
        assert_eq!(json["isTyping"], true);

        assert!(store.messages("c1").unwrap().is_empty());
        assert_eq!(store.conversation("c1").unwrap().unwrap().unread_for("alice"), 0);
    }

    #[tokio::test]
    async fn test_push_only_for_offline_recipients() {
        let store = InMemoryChatStore::new();
        chat_c1(&store, &["alice", "bob", "dave"]);
        let notifier = Arc::new(RecordingNotifier::default());
        let host = host_with(Arc::new(store)).with_push_notifier(notifier.clone());

        let (alice, _alice_rx) = connect(&host, "alice").await;
        // bob is connected but has not joined the room; dave is offline
        let (_bob, _bob_rx) = connect(&host, "bob").await;

        send_message(&host, &alice, "c1", "are you there?").await.unwrap();

        // Notifications are sent from spawned tasks
        for _ in 0..50 {
            if !notifier.sent.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;

        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient_id, "dave");
        assert_eq!(sent[0].title, "New message from alice");
        assert_eq!(sent[0].body, "are you there?");
    }
}
