use chatter_server::auth::AuthManager;
use chatter_server::groups::GroupManager;
use chrono::{Duration, Utc};
use std::path::Path;
use tempfile::tempdir;

async fn setup(dir: &Path) -> (AuthManager, GroupManager) {
    let db = dir.join("chatter.sqlite");
    let auth = AuthManager::new(&db).await.unwrap();
    let groups = GroupManager::new(&db, 24).await.unwrap();
    (auth, groups)
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

async fn open_pool(dir: &Path) -> sqlx::SqlitePool {
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
    use std::str::FromStr;

    let options = SqliteConnectOptions::from_str(&format!(
        "sqlite://{}",
        dir.join("chatter.sqlite").display()
    ))
    .unwrap();
    SqlitePoolOptions::new().connect_with(options).await.unwrap()
}

#[tokio::test]
async fn creator_is_admin_and_can_invite() {
    let dir = tempdir().unwrap();
    let (auth, groups) = setup(dir.path()).await;

    let admin = register(&auth, "admin").await;
    let joiner = register(&auth, "joiner").await;

    let group = groups.create_group("rustaceans".into(), admin.clone()).await.unwrap();

    let invite = groups.generate_invite(&group.id, &admin).await.unwrap();
    assert!(invite.expires_at > Utc::now());

    let member = groups.join_with_code(&invite.code, &joiner).await.unwrap();
    assert_eq!(member.group_id, group.id);
    assert!(!member.is_admin);

    let members = groups.list_members(&group.id, &admin).await.unwrap();
    assert_eq!(members.len(), 2);
    assert!(members.iter().any(|m| m.user_id == admin && m.is_admin));
    assert!(members.iter().any(|m| m.user_id == joiner && !m.is_admin));
}

#[tokio::test]
async fn non_admin_cannot_generate_invite() {
    let dir = tempdir().unwrap();
    let (auth, groups) = setup(dir.path()).await;

    let admin = register(&auth, "admin").await;
    let member = register(&auth, "member").await;
    let outsider = register(&auth, "outsider").await;

    let group = groups.create_group("private".into(), admin.clone()).await.unwrap();
    let invite = groups.generate_invite(&group.id, &admin).await.unwrap();
    groups.join_with_code(&invite.code, &member).await.unwrap();

    let err = groups.generate_invite(&group.id, &member).await.unwrap_err();
    assert!(err.to_string().contains("admins"));

    let err = groups.generate_invite(&group.id, &outsider).await.unwrap_err();
    assert!(err.to_string().contains("Not a member"));
}

#[tokio::test]
async fn duplicate_join_is_rejected() {
    let dir = tempdir().unwrap();
    let (auth, groups) = setup(dir.path()).await;

    let admin = register(&auth, "admin").await;
    let joiner = register(&auth, "joiner").await;

    let group = groups.create_group("once".into(), admin.clone()).await.unwrap();
    let invite = groups.generate_invite(&group.id, &admin).await.unwrap();

    groups.join_with_code(&invite.code, &joiner).await.unwrap();
    let err = groups.join_with_code(&invite.code, &joiner).await.unwrap_err();
    assert!(err.to_string().contains("Already a member"));

    // The creator is a member too
    let err = groups.join_with_code(&invite.code, &admin).await.unwrap_err();
    assert!(err.to_string().contains("Already a member"));
}

#[tokio::test]
async fn expired_invite_is_rejected() {
    let dir = tempdir().unwrap();
    let (auth, groups) = setup(dir.path()).await;

    let admin = register(&auth, "admin").await;
    let late = register(&auth, "late").await;

    let group = groups.create_group("expiring".into(), admin.clone()).await.unwrap();
    let invite = groups.generate_invite(&group.id, &admin).await.unwrap();

    // Backdate the expiry
    let pool = open_pool(dir.path()).await;
    sqlx::query("UPDATE groups SET invite_code_expires_at = ? WHERE id = ?")
        .bind((Utc::now() - Duration::hours(1)).to_rfc3339())
        .bind(&group.id)
        .execute(&pool)
        .await
        .unwrap();
    pool.close().await;

    let err = groups.join_with_code(&invite.code, &late).await.unwrap_err();
    assert!(err.to_string().contains("expired"));
}

#[tokio::test]
async fn unknown_and_revoked_codes_are_rejected() {
    let dir = tempdir().unwrap();
    let (auth, groups) = setup(dir.path()).await;

    let admin = register(&auth, "admin").await;
    let joiner = register(&auth, "joiner").await;

    let group = groups.create_group("sealed".into(), admin.clone()).await.unwrap();

    let err = groups.join_with_code("no-such-code", &joiner).await.unwrap_err();
    assert!(err.to_string().contains("Invalid invite code"));

    let invite = groups.generate_invite(&group.id, &admin).await.unwrap();
    groups.revoke_invite(&group.id, &admin).await.unwrap();

    let err = groups.join_with_code(&invite.code, &joiner).await.unwrap_err();
    assert!(err.to_string().contains("Invalid invite code"));
}

#[tokio::test]
async fn regenerating_replaces_previous_code() {
    let dir = tempdir().unwrap();
    let (auth, groups) = setup(dir.path()).await;

    let admin = register(&auth, "admin").await;
    let joiner = register(&auth, "joiner").await;

    let group = groups.create_group("rotating".into(), admin.clone()).await.unwrap();
    let first = groups.generate_invite(&group.id, &admin).await.unwrap();
    let second = groups.generate_invite(&group.id, &admin).await.unwrap();
    assert_ne!(first.code, second.code);

    // The replaced code no longer resolves
    assert!(groups.join_with_code(&first.code, &joiner).await.is_err());
    assert!(groups.join_with_code(&second.code, &joiner).await.is_ok());
}

#[tokio::test]
async fn sole_admin_cannot_abandon_members() {
    let dir = tempdir().unwrap();
    let (auth, groups) = setup(dir.path()).await;

    let admin = register(&auth, "admin").await;
    let member = register(&auth, "member").await;

    let group = groups.create_group("stuck".into(), admin.clone()).await.unwrap();
    let invite = groups.generate_invite(&group.id, &admin).await.unwrap();
    groups.join_with_code(&invite.code, &member).await.unwrap();

    let err = groups.leave_group(&group.id, &admin).await.unwrap_err();
    assert!(err.to_string().contains("Promote"));

    // After promoting the other member, the original admin may leave
    groups.promote_member(&group.id, &admin, &member).await.unwrap();
    groups.leave_group(&group.id, &admin).await.unwrap();

    let members = groups.list_members(&group.id, &member).await.unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].user_id, member);
}

#[tokio::test]
async fn member_listing_requires_membership() {
    let dir = tempdir().unwrap();
    let (auth, groups) = setup(dir.path()).await;

    let admin = register(&auth, "admin").await;
    let outsider = register(&auth, "outsider").await;

    let group = groups.create_group("closed".into(), admin.clone()).await.unwrap();

    assert!(groups.list_members(&group.id, &outsider).await.is_err());
    assert_eq!(groups.list_user_groups(&outsider).await.unwrap().len(), 0);
    assert_eq!(groups.list_user_groups(&admin).await.unwrap().len(), 1);
}
