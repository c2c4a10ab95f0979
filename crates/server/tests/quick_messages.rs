use chatter_server::auth::AuthManager;
use chatter_server::quick::QuickMessageManager;
use tempfile::tempdir;

#[tokio::test]
async fn snippet_crud_roundtrip() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("chatter.sqlite");
    let auth = AuthManager::new(&db).await.unwrap();
    let quick = QuickMessageManager::new(&db).await.unwrap();

    let user = auth
        .register("alice@example.com".into(), "alice".into(), "pw123456".into())
        .await
        .unwrap()
        .0;

    quick
        .create(&user.id, "brb".into(), "Be right back!".into())
        .await
        .unwrap();
    quick
        .create(&user.id, "omw".into(), "On my way".into())
        .await
        .unwrap();

    let snippets = quick.list(&user.id).await.unwrap();
    assert_eq!(snippets.len(), 2);
    assert_eq!(snippets[0].key, "brb"); // sorted by key

    quick
        .update(&user.id, "brb", "Be right back in five".into())
        .await
        .unwrap();
    let snippets = quick.list(&user.id).await.unwrap();
    assert_eq!(snippets[0].text, "Be right back in five");

    quick.delete(&user.id, "brb").await.unwrap();
    assert_eq!(quick.list(&user.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn keys_are_unique_per_user_not_global() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("chatter.sqlite");
    let auth = AuthManager::new(&db).await.unwrap();
    let quick = QuickMessageManager::new(&db).await.unwrap();

    let alice = auth
        .register("alice@example.com".into(), "alice".into(), "pw123456".into())
        .await
        .unwrap()
        .0;
    let bob = auth
        .register("bob@example.com".into(), "bob".into(), "pw123456".into())
        .await
        .unwrap()
        .0;

    quick
        .create(&alice.id, "brb".into(), "alice's brb".into())
        .await
        .unwrap();

    // Same key for another user is fine
    quick
        .create(&bob.id, "brb".into(), "bob's brb".into())
        .await
        .unwrap();

    // Duplicate for the same user is not
    let err = quick
        .create(&alice.id, "brb".into(), "again".into())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("already exists"));
}

#[tokio::test]
async fn unknown_keys_are_rejected() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("chatter.sqlite");
    let auth = AuthManager::new(&db).await.unwrap();
    let quick = QuickMessageManager::new(&db).await.unwrap();

    let user = auth
        .register("alice@example.com".into(), "alice".into(), "pw123456".into())
        .await
        .unwrap()
        .0;

    assert!(quick.update(&user.id, "nope", "text".into()).await.is_err());
    assert!(quick.delete(&user.id, "nope").await.is_err());
    assert!(quick
        .create(&user.id, "   ".into(), "blank key".into())
        .await
        .is_err());
}
