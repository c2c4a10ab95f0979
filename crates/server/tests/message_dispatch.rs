use chatter_server::auth::AuthManager;
use chatter_server::groups::GroupManager;
use chatter_server::messages::MessageManager;
use std::path::Path;
use tempfile::tempdir;

async fn setup(dir: &Path) -> (AuthManager, GroupManager, MessageManager) {
    let db = dir.join("chatter.sqlite");
    let auth = AuthManager::new(&db).await.unwrap();
    let groups = GroupManager::new(&db, 24).await.unwrap();
    let messages = MessageManager::new(&db).await.unwrap();
    (auth, groups, messages)
}

async fn register(auth: &AuthManager, name: &str) -> String {
    auth.register(
        format!("{}@example.com", name),
        name.to_string(),
        "pw123456".into(),
    )
    .await
    .unwrap()
    .0
    .id
}

#[tokio::test]
async fn direct_message_opens_a_conversation() {
    let dir = tempdir().unwrap();
    let (auth, _groups, messages) = setup(dir.path()).await;

    let alice = register(&auth, "alice").await;
    let bob = register(&auth, "bob").await;

    let sent = messages
        .send_message(alice.clone(), "hi bob".into(), Some(bob.clone()), None, None)
        .await
        .unwrap();
    assert!(sent.conversation_id.is_some());
    assert!(sent.group_id.is_none());
    assert!(!sent.is_read);

    // The reply lands in the same conversation
    let reply = messages
        .send_message(bob.clone(), "hi alice".into(), Some(alice.clone()), None, None)
        .await
        .unwrap();
    assert_eq!(reply.conversation_id, sent.conversation_id);

    let history = messages
        .conversation_messages(sent.conversation_id.as_deref().unwrap(), &alice)
        .await
        .unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].content, "hi bob");
    assert_eq!(history[1].content, "hi alice");
}

#[tokio::test]
async fn message_must_target_exactly_one_destination() {
    let dir = tempdir().unwrap();
    let (auth, _groups, messages) = setup(dir.path()).await;

    let alice = register(&auth, "alice").await;
    let bob = register(&auth, "bob").await;

    let err = messages
        .send_message(alice.clone(), "untargeted".into(), None, None, None)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("no target"));

    let err = messages
        .send_message(
            alice.clone(),
            "double".into(),
            Some(bob.clone()),
            None,
            Some("some-group".into()),
        )
        .await
        .unwrap_err();
    assert!(err.to_string().contains("exactly one"));
}

#[tokio::test]
async fn group_messages_require_membership() {
    let dir = tempdir().unwrap();
    let (auth, groups, messages) = setup(dir.path()).await;

    let admin = register(&auth, "admin").await;
    let member = register(&auth, "member").await;
    let outsider = register(&auth, "outsider").await;

    let group = groups.create_group("team".into(), admin.clone()).await.unwrap();
    let invite = groups.generate_invite(&group.id, &admin).await.unwrap();
    groups.join_with_code(&invite.code, &member).await.unwrap();

    messages
        .send_message(admin.clone(), "welcome".into(), None, None, Some(group.id.clone()))
        .await
        .unwrap();
    messages
        .send_message(member.clone(), "thanks".into(), None, None, Some(group.id.clone()))
        .await
        .unwrap();

    let err = messages
        .send_message(outsider.clone(), "let me in".into(), None, None, Some(group.id.clone()))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("not a member"));

    let history = messages.group_messages(&group.id, &member).await.unwrap();
    assert_eq!(history.len(), 2);

    assert!(messages.group_messages(&group.id, &outsider).await.is_err());
}

#[tokio::test]
async fn conversation_access_is_participants_only() {
    let dir = tempdir().unwrap();
    let (auth, _groups, messages) = setup(dir.path()).await;

    let alice = register(&auth, "alice").await;
    let bob = register(&auth, "bob").await;
    let carol = register(&auth, "carol").await;

    let sent = messages
        .send_message(alice.clone(), "private".into(), Some(bob.clone()), None, None)
        .await
        .unwrap();
    let conversation_id = sent.conversation_id.unwrap();

    // A third party can neither read nor write it
    assert!(messages
        .conversation_messages(&conversation_id, &carol)
        .await
        .is_err());
    let err = messages
        .send_message(
            carol.clone(),
            "eavesdrop".into(),
            None,
            Some(conversation_id.clone()),
            None,
        )
        .await
        .unwrap_err();
    assert!(err.to_string().contains("not a participant"));
}

#[tokio::test]
async fn self_messages_and_unknown_receivers_are_rejected() {
    let dir = tempdir().unwrap();
    let (auth, _groups, messages) = setup(dir.path()).await;

    let alice = register(&auth, "alice").await;

    let err = messages
        .send_message(alice.clone(), "note to self".into(), Some(alice.clone()), None, None)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("yourself"));

    let err = messages
        .send_message(alice.clone(), "hello?".into(), Some("ghost".into()), None, None)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("not found"));

    let err = messages
        .send_message(alice.clone(), "   ".into(), Some("anyone".into()), None, None)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("empty"));
}

#[tokio::test]
async fn mark_read_flips_only_peer_messages() {
    let dir = tempdir().unwrap();
    let (auth, _groups, messages) = setup(dir.path()).await;

    let alice = register(&auth, "alice").await;
    let bob = register(&auth, "bob").await;

    messages
        .send_message(alice.clone(), "one".into(), Some(bob.clone()), None, None)
        .await
        .unwrap();
    let sent = messages
        .send_message(alice.clone(), "two".into(), Some(bob.clone()), None, None)
        .await
        .unwrap();
    let conversation_id = sent.conversation_id.unwrap();

    // Alice has nothing unread; her own messages don't count
    let err = messages
        .mark_read(&alice, Some(&conversation_id), None)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("No unread"));

    let marked = messages
        .mark_read(&bob, Some(&conversation_id), None)
        .await
        .unwrap();
    assert_eq!(marked, 2);

    // Second pass finds nothing left
    let err = messages
        .mark_read(&bob, Some(&conversation_id), None)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("No unread"));

    let history = messages
        .conversation_messages(&conversation_id, &bob)
        .await
        .unwrap();
    assert!(history.iter().all(|m| m.is_read));
}

#[tokio::test]
async fn mark_read_in_groups_and_target_validation() {
    let dir = tempdir().unwrap();
    let (auth, groups, messages) = setup(dir.path()).await;

    let admin = register(&auth, "admin").await;
    let member = register(&auth, "member").await;

    let group = groups.create_group("team".into(), admin.clone()).await.unwrap();
    let invite = groups.generate_invite(&group.id, &admin).await.unwrap();
    groups.join_with_code(&invite.code, &member).await.unwrap();

    messages
        .send_message(admin.clone(), "standup at 9".into(), None, None, Some(group.id.clone()))
        .await
        .unwrap();

    // Mark-read needs exactly one target
    assert!(messages.mark_read(&member, None, None).await.is_err());
    assert!(messages
        .mark_read(&member, Some("conv"), Some(&group.id))
        .await
        .is_err());

    let marked = messages.mark_read(&member, None, Some(&group.id)).await.unwrap();
    assert_eq!(marked, 1);
}

#[tokio::test]
async fn conversation_listing_carries_unread_counts() {
    let dir = tempdir().unwrap();
    let (auth, _groups, messages) = setup(dir.path()).await;

    let alice = register(&auth, "alice").await;
    let bob = register(&auth, "bob").await;
    let carol = register(&auth, "carol").await;

    messages
        .send_message(alice.clone(), "hi bob".into(), Some(bob.clone()), None, None)
        .await
        .unwrap();
    messages
        .send_message(alice.clone(), "again".into(), Some(bob.clone()), None, None)
        .await
        .unwrap();
    messages
        .send_message(carol.clone(), "hi bob too".into(), Some(bob.clone()), None, None)
        .await
        .unwrap();

    let conversations = messages.list_conversations(&bob).await.unwrap();
    assert_eq!(conversations.len(), 2);

    let from_alice = conversations
        .iter()
        .find(|c| c.peer_id == alice)
        .unwrap();
    assert_eq!(from_alice.peer_username, "alice");
    assert_eq!(from_alice.unread, 2);

    let from_carol = conversations
        .iter()
        .find(|c| c.peer_id == carol)
        .unwrap();
    assert_eq!(from_carol.unread, 1);

    // Alice sees the same conversation with zero unread
    let alice_view = messages.list_conversations(&alice).await.unwrap();
    assert_eq!(alice_view.len(), 1);
    assert_eq!(alice_view[0].unread, 0);
}
