//! End-to-end scenarios over the in-memory unit of work.

use entitrack_core::{
    Capabilities, DeletePolicy, Entity, EntityKey, EntityState, Operation, ReadOnlyRepository,
    Repository, TrackError, TrackerConfig, TrackerManager, TransitionFeed, UnitOfWork,
    UnsupportedPolicy,
};
use entitrack_testkit::{
    sample_groups, sample_users, DaoCall, GroupChange, GroupRecord, MemoryDao, MemoryUnitOfWork,
    UserChange, UserField, UserRecord,
};
use std::sync::Arc;

fn key(id: &str) -> EntityKey {
    EntityKey::from(id)
}

fn uow() -> MemoryUnitOfWork {
    MemoryUnitOfWork::new(sample_users(), sample_groups())
}

async fn load(uow: &MemoryUnitOfWork, id: &str) -> Entity<UserRecord> {
    uow.users()
        .get(&key(id))
        .await
        .unwrap()
        .unwrap_or_else(|| panic!("user {id} not found"))
}

#[tokio::test]
async fn edit_and_revert_returns_to_unchanged() {
    let uow = uow();
    let user = load(&uow, "0").await;
    assert_eq!(user.state(), EntityState::Unchanged);

    user.set(UserChange::Fullname("Hello".into()));
    assert_eq!(user.state(), EntityState::Modified);
    assert_eq!(user.original_values(), vec![UserChange::Fullname("X".into())]);

    user.set(UserChange::Fullname("X".into()));
    assert_eq!(user.state(), EntityState::Unchanged);
    assert!(!user.has_changes());
}

#[tokio::test]
async fn added_entity_is_created_and_stays_tracked() {
    let uow = uow();
    let user = Entity::new(UserRecord::new(3, "333"));

    uow.users().add(&user).unwrap();
    assert_eq!(user.state(), EntityState::Added);

    let report = uow.commit().await.unwrap();

    assert_eq!(report.inserted, 1);
    assert_eq!(user.state(), EntityState::Unchanged);
    assert!(!user.has_changes());
    assert!(uow.user_changes().contains(&key("3")));
    assert_eq!(uow.users_dao().mutations(), vec![DaoCall::Create(key("3"))]);
}

#[tokio::test]
async fn repeated_get_is_served_from_identity_map() {
    let uow = uow();

    let first = load(&uow, "0").await;
    let second = load(&uow, "0").await;

    assert!(first.ptr_eq(&second));
    assert_eq!(uow.users_dao().calls(), vec![DaoCall::SelectOne(key("0"))]);
}

#[tokio::test]
async fn commit_orders_delete_insert_update() {
    let uow = uow();
    let modified = load(&uow, "0").await;
    let deleted = load(&uow, "1").await;
    modified.set(UserChange::Role("teacher".into()));
    uow.users().remove(&deleted).unwrap();
    uow.users().add(&Entity::new(UserRecord::new(3, "333"))).unwrap();

    uow.commit().await.unwrap();

    assert_eq!(
        uow.users_dao().mutations(),
        vec![
            DaoCall::Delete(key("1")),
            DaoCall::Create(key("3")),
            DaoCall::Update(key("0")),
        ]
    );
}

#[tokio::test]
async fn sample_session_persists_net_changes() {
    let uow = uow();

    let kp71 = uow
        .users()
        .apply_many(
            uow.users_dao()
                .select_where("group kp71", |u| u.group_id.as_deref() == Some("kp71")),
        )
        .await
        .unwrap();
    assert_eq!(kp71.len(), 2);

    let u1 = load(&uow, "0").await;
    load(&uow, "0").await;
    let u2 = load(&uow, "1").await;
    let u3 = load(&uow, "2").await;

    u1.set(UserChange::Fullname("Hello".into()));
    uow.users().remove(&u2).unwrap();
    u1.set(UserChange::Fullname("X".into()));
    u3.set(UserChange::Fullname("A Three 000".into()));
    let new_user = Entity::new(UserRecord::new(3, "333"));
    uow.users().add(&new_user).unwrap();
    new_user.set(UserChange::Fullname("Changed!".into()));

    let report = uow.commit().await.unwrap();

    assert_eq!((report.deleted, report.inserted, report.updated), (1, 1, 1));
    assert_eq!(
        uow.users_dao().call_log(),
        vec![
            "query group kp71",
            "select_one 2",
            "delete 1",
            "create 3",
            "update 2",
        ]
    );
    let stored = uow.users_dao().row(&key("3")).unwrap();
    assert_eq!(stored.fullname, "Changed!");
    assert!(!uow.user_changes().contains(&key("1")));
    assert_eq!(u2.state(), EntityState::Detached);
    assert_eq!(u1.state(), EntityState::Unchanged);
}

#[tokio::test]
async fn insert_then_delete_is_permitted() {
    let uow = uow();
    let user = Entity::new(UserRecord::new(7, "bb7"));

    uow.users().add(&user).unwrap();
    uow.users().remove(&user).unwrap();
    assert_eq!(user.state(), EntityState::Deleted);

    let report = uow.commit().await.unwrap();

    assert!(report.is_empty());
    assert!(uow.users_dao().mutations().is_empty());
    assert_eq!(user.state(), EntityState::Detached);
    assert!(uow.user_changes().is_empty());
}

#[tokio::test]
async fn rollback_of_insert_then_delete_leaves_nothing_behind() {
    let uow = uow();
    let user = Entity::new(UserRecord::new(7, "bb7"));
    uow.users().add(&user).unwrap();
    uow.users().remove(&user).unwrap();

    uow.rollback();

    assert_eq!(user.state(), EntityState::Detached);
    assert!(!uow.user_changes().contains(&key("7")));
    assert!(uow.users().get(&key("7")).await.unwrap().is_none());
    assert_eq!(uow.users_dao().calls(), vec![DaoCall::SelectOne(key("7"))]);
}

#[tokio::test]
async fn duplicate_and_untracked_are_rejected() {
    let uow = uow();
    let user = load(&uow, "0").await;

    let err = uow
        .users()
        .add(&Entity::new(UserRecord::new(0, "bb0")))
        .unwrap_err();
    assert!(matches!(err, TrackError::DuplicateEntity { .. }));

    let err = uow
        .users()
        .remove(&Entity::new(UserRecord::new(8, "bb8")))
        .unwrap_err();
    assert!(matches!(err, TrackError::NotTracked { .. }));

    uow.users().remove(&user).unwrap();
    uow.users().remove(&user).unwrap();
    assert_eq!(user.state(), EntityState::Deleted);
}

#[tokio::test]
async fn strict_policy_rejects_second_delete() {
    let config = TrackerConfig::new().delete(DeletePolicy::Strict);
    let uow = MemoryUnitOfWork::with_config(sample_users(), sample_groups(), config);
    let user = load(&uow, "0").await;

    uow.users().remove(&user).unwrap();
    let err = uow.users().remove(&user).unwrap_err();

    assert!(matches!(err, TrackError::AlreadyDeleted { .. }));
}

#[tokio::test]
async fn rollback_restores_every_pending_change() {
    let uow = uow();
    let modified = load(&uow, "0").await;
    let deleted = load(&uow, "1").await;
    let added = Entity::new(UserRecord::new(3, "333"));

    modified.set(UserChange::Fullname("Hello".into()));
    deleted.set(UserChange::IsExcluded(true));
    uow.users().remove(&deleted).unwrap();
    uow.users().add(&added).unwrap();

    uow.rollback();

    assert_eq!(modified.state(), EntityState::Unchanged);
    assert_eq!(modified.get(UserField::Fullname), UserChange::Fullname("X".into()));
    assert_eq!(deleted.state(), EntityState::Unchanged);
    assert_eq!(deleted.get(UserField::IsExcluded), UserChange::IsExcluded(false));
    assert!(uow.user_changes().contains(&key("1")));
    assert_eq!(added.state(), EntityState::Detached);
    assert!(!uow.user_changes().contains(&key("3")));
    assert!(uow.users_dao().mutations().is_empty());
}

#[tokio::test]
async fn persistence_failure_keeps_earlier_effects() {
    let uow = uow();
    let modified = load(&uow, "0").await;
    let deleted = load(&uow, "1").await;
    let added = Entity::new(UserRecord::new(3, "333"));
    modified.set(UserChange::Fullname("Hello".into()));
    uow.users().remove(&deleted).unwrap();
    uow.users().add(&added).unwrap();
    uow.users_dao().fail_on(Operation::Update, "0");

    let err = uow.commit().await.unwrap_err();

    assert!(err.is_persistence());
    assert_eq!(err.key(), Some(&key("0")));
    assert_eq!(added.state(), EntityState::Unchanged);
    assert_eq!(deleted.state(), EntityState::Deleted);
    assert_eq!(modified.state(), EntityState::Modified);
    assert!(uow.users_dao().row(&key("1")).is_none());
    assert!(uow.users_dao().row(&key("3")).is_some());

    // The retry reissues the delete, which the store treats as a no-op.
    uow.users_dao().clear_failures();
    let report = uow.commit().await.unwrap();
    assert_eq!((report.deleted, report.inserted, report.updated), (1, 0, 1));
    assert_eq!(deleted.state(), EntityState::Detached);
    assert_eq!(modified.state(), EntityState::Unchanged);
}

#[tokio::test]
async fn read_only_groups_are_never_persisted() {
    let uow = uow();

    let groups = uow.groups().get_all().await.unwrap();
    let kp71 = uow.groups().get(&key("kp71")).await.unwrap().unwrap();
    kp71.set(GroupChange::Name("renamed".into()));
    assert_eq!(kp71.state(), EntityState::Modified);

    uow.commit().await.unwrap();
    uow.rollback();

    assert_eq!(groups.len(), 2);
    assert_eq!(uow.groups_dao().calls(), vec![DaoCall::SelectAll]);
    assert_eq!(kp71.state(), EntityState::Modified);
}

#[tokio::test]
async fn unsupported_updates_are_skipped_or_rejected() {
    let users = Arc::new(
        MemoryDao::with_rows(sample_users())
            .with_capabilities(Capabilities::ALL.without(Operation::Update)),
    );
    let groups = Arc::new(MemoryDao::<GroupRecord>::new().read_only());

    let uow = MemoryUnitOfWork::from_parts(TrackerManager::new(), users.clone(), groups.clone());
    let user = load(&uow, "0").await;
    user.set(UserChange::Fullname("Hello".into()));
    let report = uow.commit().await.unwrap();
    assert_eq!(report.skipped, vec![Operation::Update]);
    assert_eq!(user.state(), EntityState::Modified);

    let strict = TrackerConfig::new().unsupported(UnsupportedPolicy::FailFast);
    let uow = MemoryUnitOfWork::from_parts(TrackerManager::with_config(strict), users, groups);
    let user = load(&uow, "0").await;
    user.set(UserChange::Fullname("Hello".into()));
    let err = uow.commit().await.unwrap_err();
    assert!(matches!(
        err,
        TrackError::Unsupported {
            operation: Operation::Update,
            pending: 1
        }
    ));
}

#[tokio::test]
async fn transitions_reach_injected_observer() {
    let feed = Arc::new(TransitionFeed::new());
    let uow = MemoryUnitOfWork::from_parts(
        TrackerManager::new().with_observer(feed.clone()),
        Arc::new(MemoryDao::with_rows(sample_users())),
        Arc::new(MemoryDao::with_rows(sample_groups()).read_only()),
    );
    let user = load(&uow, "0").await;

    user.set(UserChange::Fullname("Hello".into()));
    uow.commit().await.unwrap();

    assert_eq!(
        feed.states_of(&key("0")),
        vec![
            EntityState::Unchanged,
            EntityState::Modified,
            EntityState::Unchanged,
        ]
    );
}
