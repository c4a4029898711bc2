use bump_core::{
  ErrorKind,
  entry::{EntryQuery, NewEntry},
  invite::InviteRole,
};
use chrono::Duration;
use mockable::Clock as _;
use serde_json::json;

use super::{harness, redeem};

fn kick(client_id: &str, count: u32) -> NewEntry {
  NewEntry {
    client_id:  client_id.to_owned(),
    entry_type: "kick".to_owned(),
    data:       json!({ "count": count }),
  }
}

#[tokio::test]
async fn upsert_replaces_by_client_id() {
  let h = harness().await;
  h.pregnancy_for("mom").await;

  let first = h.service.upsert_entry("mom", kick("k1", 3)).await.unwrap();
  h.clock.advance(Duration::minutes(5));
  let second = h.service.upsert_entry("mom", kick("k1", 7)).await.unwrap();

  assert_eq!(first.entry_id, second.entry_id);
  assert_eq!(second.created_at, first.created_at);
  assert!(second.updated_at > first.updated_at);
  assert_eq!(second.data, json!({ "count": 7 }));

  let listed = h.service.list_entries("mom", EntryQuery::default()).await.unwrap();
  assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn same_client_id_in_another_type_is_separate() {
  let h = harness().await;
  h.pregnancy_for("mom").await;
  h.service.upsert_entry("mom", kick("x", 1)).await.unwrap();
  h.service
    .upsert_entry(
      "mom",
      NewEntry {
        client_id:  "x".to_owned(),
        entry_type: "weight".to_owned(),
        data:       json!({ "kg": 64.5 }),
      },
    )
    .await
    .unwrap();

  let all = h.service.list_entries("mom", EntryQuery::default()).await.unwrap();
  assert_eq!(all.len(), 2);

  let weights = h
    .service
    .list_entries("mom", EntryQuery { entry_type: Some("weight".to_owned()), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(weights.len(), 1);
  assert_eq!(weights[0].entry_type, "weight");
}

#[tokio::test]
async fn since_filters_on_last_update() {
  let h = harness().await;
  h.pregnancy_for("mom").await;
  h.service.upsert_entry("mom", kick("old", 1)).await.unwrap();
  h.clock.advance(Duration::hours(1));
  let cutoff = h.clock.utc();
  h.clock.advance(Duration::seconds(1));
  h.service.upsert_entry("mom", kick("new", 2)).await.unwrap();

  let recent = h
    .service
    .list_entries("mom", EntryQuery { since: Some(cutoff), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(recent.len(), 1);
  assert_eq!(recent[0].client_id, "new");
}

#[tokio::test]
async fn since_excludes_the_last_seen_update() {
  let h = harness().await;
  h.pregnancy_for("mom").await;
  let seen = h.service.upsert_entry("mom", kick("k1", 1)).await.unwrap();

  let again = h
    .service
    .list_entries("mom", EntryQuery { since: Some(seen.updated_at), ..Default::default() })
    .await
    .unwrap();
  assert!(again.is_empty());

  h.clock.advance(Duration::seconds(1));
  h.service.upsert_entry("mom", kick("k1", 2)).await.unwrap();
  let changed = h
    .service
    .list_entries("mom", EntryQuery { since: Some(seen.updated_at), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(changed.len(), 1);
  assert_eq!(changed[0].data, json!({ "count": 2 }));
}

#[tokio::test]
async fn entries_are_listed_newest_first() {
  let h = harness().await;
  h.pregnancy_for("mom").await;
  for (i, id) in ["a", "b", "c"].into_iter().enumerate() {
    h.service.upsert_entry("mom", kick(id, i as u32)).await.unwrap();
    h.clock.advance(Duration::minutes(1));
  }

  let listed = h.service.list_entries("mom", EntryQuery::default()).await.unwrap();
  let ids: Vec<_> = listed.iter().map(|e| e.client_id.as_str()).collect();
  assert_eq!(ids, ["c", "b", "a"]);
}

#[tokio::test]
async fn batch_upserts_together() {
  let h = harness().await;
  h.pregnancy_for("mom").await;
  h.service.upsert_entry("mom", kick("k1", 1)).await.unwrap();

  let written = h
    .service
    .upsert_entries("mom", vec![kick("k1", 5), kick("k2", 6)])
    .await
    .unwrap();
  assert_eq!(written.len(), 2);
  assert_eq!(written[0].data, json!({ "count": 5 }));
  assert_eq!(h.service.list_entries("mom", EntryQuery::default()).await.unwrap().len(), 2);

  assert!(h.service.upsert_entries("mom", Vec::new()).await.unwrap().is_empty());
}

#[tokio::test]
async fn batch_with_an_invalid_entry_writes_nothing() {
  let h = harness().await;
  h.pregnancy_for("mom").await;

  let err = h
    .service
    .upsert_entries("mom", vec![kick("ok", 1), kick(" ", 2)])
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Validation);
  assert!(h.service.list_entries("mom", EntryQuery::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn delete_is_soft_and_undone_by_upsert() {
  let h = harness().await;
  h.pregnancy_for("mom").await;
  h.service.upsert_entry("mom", kick("k1", 1)).await.unwrap();

  h.service.delete_entry("mom", "k1").await.unwrap();
  assert!(h.service.list_entries("mom", EntryQuery::default()).await.unwrap().is_empty());

  let with_deleted = h
    .service
    .list_entries("mom", EntryQuery { include_deleted: true, ..Default::default() })
    .await
    .unwrap();
  assert_eq!(with_deleted.len(), 1);
  assert!(with_deleted[0].deleted_at.is_some());

  let err = h.service.delete_entry("mom", "k1").await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);

  let revived = h.service.upsert_entry("mom", kick("k1", 2)).await.unwrap();
  assert!(revived.deleted_at.is_none());
  assert_eq!(h.service.list_entries("mom", EntryQuery::default()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn read_only_supporter_can_list_but_not_write() {
  let h = harness().await;
  h.pregnancy_for("mom").await;
  h.service.upsert_entry("mom", kick("k1", 1)).await.unwrap();
  let issued = h
    .service
    .issue_invite_code("mom", InviteRole::Support, None)
    .await
    .unwrap();
  h.service.redeem_invite_code(redeem(&issued.code, "aunt")).await.unwrap();

  assert_eq!(h.service.list_entries("aunt", EntryQuery::default()).await.unwrap().len(), 1);

  let err = h.service.upsert_entry("aunt", kick("k2", 1)).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Forbidden);
  let err = h.service.upsert_entries("aunt", vec![kick("k2", 1)]).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Forbidden);
  let err = h.service.delete_entry("aunt", "k1").await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Forbidden);
}

#[tokio::test]
async fn entries_require_a_relationship() {
  let h = harness().await;
  let err = h
    .service
    .list_entries("stranger", EntryQuery::default())
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);

  h.pregnancy_for("mom").await;
  let err = h
    .service
    .upsert_entry("mom", NewEntry { client_id: " ".to_owned(), ..kick("", 1) })
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Validation);
}
