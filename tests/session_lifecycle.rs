use anyhow::{anyhow, Result};
use async_trait::async_trait;
use mep_outreach::campaign::{Campaign, Catalog};
use mep_outreach::config::DraftTimings;
use mep_outreach::db::SqliteStore;
use mep_outreach::model::{Draft, Representative, SaveStatus, Step};
use mep_outreach::render;
use mep_outreach::session::DraftSession;
use mep_outreach::store::{KvStore, MemoryStore};
use mep_outreach::wizard;
use std::sync::Arc;
use tokio::time::{sleep, Duration};

const KEY: &str = "mep-campaign-iran";

fn iran() -> Campaign {
    Catalog::builtin().unwrap().get("iran").unwrap().clone()
}

fn rep() -> Representative {
    Representative {
        id: 2,
        ep_id: "124833".into(),
        name: "Hannah Neumann".into(),
        country: "Germany".into(),
        group: "Greens/EFA".into(),
        email: "hannah.neumann@europarl.europa.eu".into(),
        photo_url: String::new(),
        profile_url: String::new(),
    }
}

async fn open(store: &Arc<MemoryStore>) -> DraftSession {
    DraftSession::open(store.clone(), &iran(), DraftTimings::default()).await
}

fn stored(store: &MemoryStore) -> Option<Draft> {
    store.raw(KEY).map(|raw| serde_json::from_str(&raw).unwrap())
}

/// Store whose every call fails.
struct BrokenStore;

#[async_trait]
impl KvStore for BrokenStore {
    async fn get(&self, _key: &str) -> Result<Option<String>> {
        Err(anyhow!("disk on fire"))
    }

    async fn set(&self, _key: &str, _value: &str) -> Result<()> {
        Err(anyhow!("disk on fire"))
    }

    async fn remove(&self, _key: &str) -> Result<()> {
        Err(anyhow!("disk on fire"))
    }
}

#[tokio::test(start_paused = true)]
async fn fresh_load_starts_idle_with_defaults() {
    let store = Arc::new(MemoryStore::new());
    let session = open(&store).await;
    let campaign = iran();

    assert_eq!(session.status(), SaveStatus::Idle);
    let draft = session.draft().await;
    assert_eq!(draft.current_step, Step::SelectRepresentative);
    assert!(!draft.is_non_empty());
    assert!(draft.template_index.unwrap() < campaign.body_templates.len());
    assert!(draft.subject_index.unwrap() < campaign.subjects.len());

    // an empty draft is never written and never goes inactive
    sleep(Duration::from_secs(400)).await;
    assert!(!store.contains(KEY));
    assert!(!session.is_inactive());
}

#[tokio::test(start_paused = true)]
async fn restore_shows_restored_then_idle() {
    let store = Arc::new(MemoryStore::with_entry(
        KEY,
        r#"{"senderName":"Jane","currentStep":3,"templateIndex":1,"subjectIndex":2}"#,
    ));
    let session = open(&store).await;

    assert_eq!(session.status(), SaveStatus::Restored);
    let draft = session.draft().await;
    assert_eq!(draft.sender_name, "Jane");
    assert_eq!(draft.current_step, Step::Personalize);
    assert_eq!(draft.template_index, Some(1));
    assert_eq!(draft.subject_index, Some(2));

    sleep(Duration::from_millis(3100)).await;
    assert_eq!(session.status(), SaveStatus::Idle);
}

#[tokio::test(start_paused = true)]
async fn unreadable_record_starts_fresh() {
    let store = Arc::new(MemoryStore::with_entry(KEY, "{oops"));
    let session = open(&store).await;
    assert_eq!(session.status(), SaveStatus::Idle);
    assert!(!session.has_draft().await);
}

#[tokio::test(start_paused = true)]
async fn out_of_range_step_is_clamped() {
    let store = Arc::new(MemoryStore::with_entry(KEY, r#"{"currentStep":9}"#));
    let session = open(&store).await;
    assert_eq!(session.draft().await.current_step, Step::CopyAndSend);
}

#[tokio::test(start_paused = true)]
async fn heartbeat_saves_non_empty_draft() {
    let store = Arc::new(MemoryStore::new());
    let session = open(&store).await;
    session.update(|d| d.sender_name = "Jane".into()).await;

    sleep(Duration::from_secs(29)).await;
    assert!(!store.contains(KEY));

    sleep(Duration::from_secs(2)).await;
    let saved = stored(&store).expect("heartbeat wrote the draft");
    assert_eq!(saved.sender_name, "Jane");
    assert!(saved.last_saved.is_some());
    assert_eq!(session.status(), SaveStatus::Saved);
    assert!(session.draft().await.last_saved.is_some());

    sleep(Duration::from_secs(3)).await;
    assert_eq!(session.status(), SaveStatus::Idle);
}

#[tokio::test(start_paused = true)]
async fn inactivity_continue_and_discard() {
    let store = Arc::new(MemoryStore::new());
    let session = open(&store).await;
    let mut inactive = session.subscribe_inactive();
    session
        .update(|d| {
            wizard::select_representative(d, &rep());
            d.personal_message = "keep me".into();
        })
        .await;

    sleep(Duration::from_secs(299)).await;
    assert!(!session.is_inactive());
    sleep(Duration::from_secs(2)).await;
    assert!(session.is_inactive());
    assert!(*inactive.borrow_and_update());

    session.continue_draft().await;
    assert!(!session.is_inactive());
    assert_eq!(session.draft().await.personal_message, "keep me");
    sleep(Duration::from_secs(299)).await;
    assert!(!session.is_inactive());
    sleep(Duration::from_secs(2)).await;
    assert!(session.is_inactive());

    session.discard().await;
    assert!(!session.is_inactive());
    assert!(!store.contains(KEY));
    let draft = session.draft().await;
    assert!(!draft.is_non_empty());
    assert_eq!(draft.current_step, Step::SelectRepresentative);
    assert!(draft.has_indices());
}

#[tokio::test(start_paused = true)]
async fn updates_push_back_the_countdown() {
    let store = Arc::new(MemoryStore::new());
    let session = open(&store).await;
    session.update(|d| d.greeting = "formal-name".into()).await;
    sleep(Duration::from_secs(200)).await;
    session.update(|d| d.sender_name = "Jane".into()).await;
    sleep(Duration::from_secs(200)).await;
    assert!(!session.is_inactive());
    sleep(Duration::from_secs(101)).await;
    assert!(session.is_inactive());
}

#[tokio::test(start_paused = true)]
async fn indices_survive_updates_and_reload() {
    let store = Arc::new(MemoryStore::new());
    let session = open(&store).await;
    let first = session.draft().await;
    session.update(|d| d.greeting = "respected".into()).await;
    session.update(|d| wizard::toggle(&mut d.asks, "recall-ambassadors")).await;
    session.update(|d| d.sender_name = "Jane".into()).await;
    let after = session.draft().await;
    assert_eq!(after.template_index, first.template_index);
    assert_eq!(after.subject_index, first.subject_index);

    session.close().await;
    let reopened = open(&store).await;
    let restored = reopened.draft().await;
    assert_eq!(restored.template_index, first.template_index);
    assert_eq!(restored.subject_index, first.subject_index);
    assert!(restored.asks.contains("recall-ambassadors"));
}

#[tokio::test(start_paused = true)]
async fn clear_removes_record_and_stops_timers() {
    let store = Arc::new(MemoryStore::new());
    let session = open(&store).await;
    session.update(|d| d.sender_name = "Jane".into()).await;
    assert!(session.save_now().await);
    assert!(store.contains(KEY));

    session.clear().await;
    assert!(!store.contains(KEY));
    assert_eq!(session.status(), SaveStatus::Idle);
    let draft = session.draft().await;
    assert!(!draft.is_non_empty());
    assert!(draft.has_indices());
    assert_eq!(draft.current_step, Step::SelectRepresentative);
    assert!(draft.last_saved.is_none());

    sleep(Duration::from_secs(400)).await;
    assert!(!store.contains(KEY));
    assert!(!session.is_inactive());
}

#[tokio::test(start_paused = true)]
async fn picks_after_clear_survive_reload() {
    let store = Arc::new(MemoryStore::new());
    let campaign = iran();
    let session = open(&store).await;
    session.update(|d| d.sender_name = "Ann".into()).await;
    session.clear().await;

    session.update(|d| d.sender_name = "Jane".into()).await;
    let before = session.draft().await;
    let subject = render::subject(&before, &campaign);
    session.close().await;

    let saved = stored(&store).expect("close wrote the draft");
    assert_eq!(saved.template_index, before.template_index);
    assert_eq!(saved.subject_index, before.subject_index);

    let reopened = open(&store).await;
    let after = reopened.draft().await;
    assert_eq!(after.template_index, before.template_index);
    assert_eq!(after.subject_index, before.subject_index);
    assert_eq!(render::subject(&after, &campaign), subject);
}

#[tokio::test(start_paused = true)]
async fn emptying_the_draft_cancels_timers() {
    let store = Arc::new(MemoryStore::new());
    let session = open(&store).await;
    session.update(|d| d.sender_name = "Jane".into()).await;
    session.update(|d| d.sender_name.clear()).await;
    sleep(Duration::from_secs(400)).await;
    assert!(!store.contains(KEY));
    assert!(!session.is_inactive());
}

#[tokio::test(start_paused = true)]
async fn close_saves_non_empty_draft() {
    let store = Arc::new(MemoryStore::new());
    let session = open(&store).await;
    session.update(|d| d.personal_message = "bye".into()).await;
    session.close().await;
    assert_eq!(stored(&store).unwrap().personal_message, "bye");

    let empty_store = Arc::new(MemoryStore::new());
    open(&empty_store).await.close().await;
    assert!(!empty_store.contains(KEY));
}

#[tokio::test(start_paused = true)]
async fn storage_failures_are_swallowed() {
    let session =
        DraftSession::open(Arc::new(BrokenStore), &iran(), DraftTimings::default()).await;
    assert_eq!(session.status(), SaveStatus::Idle);

    session.update(|d| d.sender_name = "Jane".into()).await;
    assert!(!session.save_now().await);
    assert_eq!(session.status(), SaveStatus::Idle);
    assert!(session.draft().await.last_saved.is_none());

    sleep(Duration::from_secs(31)).await;
    assert_eq!(session.status(), SaveStatus::Idle);

    session.clear().await;
    session.close().await;
}

#[tokio::test]
async fn sqlite_round_trip() {
    let store = SqliteStore::connect("sqlite::memory:").await.unwrap();
    let shared: Arc<dyn KvStore> = Arc::new(store.clone());

    let session = DraftSession::open(shared.clone(), &iran(), DraftTimings::default()).await;
    session
        .update(|d| {
            wizard::select_representative(d, &rep());
            d.concerns.insert("wrong-signal".into());
            d.current_step = Step::ComposeMessage;
        })
        .await;
    assert!(session.save_now().await);
    session.close().await;

    let reopened = DraftSession::open(shared, &iran(), DraftTimings::default()).await;
    assert_eq!(reopened.status(), SaveStatus::Restored);
    let draft = reopened.draft().await;
    assert_eq!(draft.selected_mep.map(|r| r.id), Some(2));
    assert!(draft.concerns.contains("wrong-signal"));
    assert_eq!(draft.current_step, Step::ComposeMessage);
    assert!(store.get(KEY).await.unwrap().is_some());
}
