//! Draft persistence lifecycle.
//!
//! A [`DraftSession`] owns the in-progress draft of one campaign and keeps it
//! in the key-value store under `mep-campaign-<id>`:
//!
//! - on open, a stored record is restored (status `restored`, back to `idle`
//!   after the toast delay); a missing or unreadable record starts a fresh draft
//! - while the draft is non-empty, a heartbeat saves it every
//!   `autosave_interval` and an inactivity countdown runs; both restart on
//!   every update
//! - when the countdown elapses the session reports itself inactive until the
//!   user continues or discards
//! - [`DraftSession::close`] cancels the timers and makes a last save
//!
//! Storage failures never reach the caller. They are logged and the session
//! carries on as if nothing was stored.

use crate::campaign::Campaign;
use crate::config::DraftTimings;
use crate::model::{Draft, SaveStatus};
use crate::store::KvStore;
use anyhow::Result;
use chrono::{DateTime, Utc};
use rand::Rng;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

/// Number of subject and body variants a draft can be assigned.
#[derive(Debug, Clone, Copy)]
struct Variants {
    templates: usize,
    subjects: usize,
}

impl Variants {
    fn of(campaign: &Campaign) -> Self {
        Self {
            templates: campaign.body_templates.len(),
            subjects: campaign.subjects.len(),
        }
    }

    fn assign(&self, draft: &mut Draft) {
        let mut rng = rand::thread_rng();
        draft.template_index = Some(rng.gen_range(0..self.templates.max(1)));
        draft.subject_index = Some(rng.gen_range(0..self.subjects.max(1)));
    }
}

#[derive(Default)]
struct Timers {
    heartbeat: Option<JoinHandle<()>>,
    inactivity: Option<JoinHandle<()>>,
    status: Option<JoinHandle<()>>,
}

impl Timers {
    fn replace(slot: &mut Option<JoinHandle<()>>, next: Option<JoinHandle<()>>) {
        if let Some(prev) = std::mem::replace(slot, next) {
            prev.abort();
        }
    }

    fn abort_all(&mut self) {
        Self::replace(&mut self.heartbeat, None);
        Self::replace(&mut self.inactivity, None);
        Self::replace(&mut self.status, None);
    }
}

struct Shared {
    key: String,
    store: Arc<dyn KvStore>,
    timings: DraftTimings,
    variants: Variants,
    draft: Mutex<Draft>,
    status: watch::Sender<SaveStatus>,
    inactive: watch::Sender<bool>,
    timers: StdMutex<Timers>,
}

impl Shared {
    fn timers(&self) -> std::sync::MutexGuard<'_, Timers> {
        self.timers.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Restart (or, for an empty draft, stop) the heartbeat and the countdown.
    fn on_activity(self: &Arc<Self>, non_empty: bool) {
        self.inactive.send_replace(false);
        let mut timers = self.timers();
        if non_empty {
            Timers::replace(
                &mut timers.heartbeat,
                Some(tokio::spawn(heartbeat(Arc::clone(self)))),
            );
            Timers::replace(
                &mut timers.inactivity,
                Some(tokio::spawn(inactivity_countdown(Arc::clone(self)))),
            );
        } else {
            Timers::replace(&mut timers.heartbeat, None);
            Timers::replace(&mut timers.inactivity, None);
        }
    }

    fn restart_countdown(self: &Arc<Self>) {
        let handle = tokio::spawn(inactivity_countdown(Arc::clone(self)));
        Timers::replace(&mut self.timers().inactivity, Some(handle));
    }

    /// Put `from` back to `idle` once the toast delay has passed, unless the
    /// status moved on in the meantime.
    fn schedule_status_revert(self: &Arc<Self>, from: SaveStatus) {
        let shared = Arc::clone(self);
        let handle = tokio::spawn(async move {
            time::sleep(shared.timings.toast()).await;
            shared.status.send_if_modified(|s| {
                if *s == from {
                    *s = SaveStatus::Idle;
                    true
                } else {
                    false
                }
            });
        });
        Timers::replace(&mut self.timers().status, Some(handle));
    }

    /// Write the draft if it is non-empty. Returns whether a record was written.
    async fn autosave(self: &Arc<Self>) -> bool {
        let mut draft = self.draft.lock().await;
        if !draft.is_non_empty() {
            return false;
        }
        self.status.send_replace(SaveStatus::Saving);
        let now = Utc::now();
        match write_record(self.store.as_ref(), &self.key, &draft, now).await {
            Ok(()) => {
                draft.last_saved = Some(now);
                self.status.send_replace(SaveStatus::Saved);
                self.schedule_status_revert(SaveStatus::Saved);
                debug!(key = %self.key, "draft saved");
                true
            }
            Err(err) => {
                warn!(?err, key = %self.key, "failed to save draft");
                self.status.send_replace(SaveStatus::Idle);
                false
            }
        }
    }
}

async fn heartbeat(shared: Arc<Shared>) {
    let every = shared.timings.autosave_interval();
    let mut ticker = time::interval_at(Instant::now() + every, every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        // Detached so that restarting the heartbeat never cuts a write short.
        let shared = Arc::clone(&shared);
        tokio::spawn(async move {
            shared.autosave().await;
        });
    }
}

async fn inactivity_countdown(shared: Arc<Shared>) {
    time::sleep(shared.timings.inactivity_timeout()).await;
    info!(key = %shared.key, "draft inactive");
    shared.inactive.send_replace(true);
}

async fn read_record(store: &dyn KvStore, key: &str) -> Option<Draft> {
    let raw = match store.get(key).await {
        Ok(raw) => raw?,
        Err(err) => {
            warn!(?err, key, "failed to read draft");
            return None;
        }
    };
    match serde_json::from_str::<Draft>(&raw) {
        Ok(draft) => Some(draft),
        Err(err) => {
            warn!(?err, key, "ignoring unreadable draft");
            None
        }
    }
}

async fn write_record(
    store: &dyn KvStore,
    key: &str,
    draft: &Draft,
    now: DateTime<Utc>,
) -> Result<()> {
    let mut record = draft.clone();
    record.last_saved = Some(now);
    let json = serde_json::to_string(&record)?;
    store.set(key, &json).await
}

/// Human-readable age of the last save.
pub fn last_saved_ago(last_saved: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(saved) = last_saved else {
        return String::new();
    };
    let seconds = (now - saved).num_seconds().max(0);
    match seconds {
        0..=4 => "just now".to_string(),
        5..=59 => format!("{} seconds ago", seconds),
        60..=119 => "1 minute ago".to_string(),
        _ => format!("{} minutes ago", seconds / 60),
    }
}

/// In-progress draft for one campaign plus its autosave/inactivity timers.
pub struct DraftSession {
    shared: Arc<Shared>,
}

impl DraftSession {
    /// Load the campaign's draft from `store` and start its timers.
    #[instrument(skip_all, fields(campaign = %campaign.id))]
    pub async fn open(
        store: Arc<dyn KvStore>,
        campaign: &Campaign,
        timings: DraftTimings,
    ) -> Self {
        let key = campaign.storage_key();
        let restored = read_record(store.as_ref(), &key).await;
        let status = if restored.is_some() {
            SaveStatus::Restored
        } else {
            SaveStatus::Idle
        };
        let variants = Variants::of(campaign);
        let mut draft = restored.unwrap_or_default();
        if !draft.has_indices() {
            variants.assign(&mut draft);
        }
        let non_empty = draft.is_non_empty();
        info!(key = %key, status = status.as_str(), non_empty, "draft session opened");

        let shared = Arc::new(Shared {
            key,
            store,
            timings,
            variants,
            draft: Mutex::new(draft),
            status: watch::Sender::new(status),
            inactive: watch::Sender::new(false),
            timers: StdMutex::new(Timers::default()),
        });
        if status == SaveStatus::Restored {
            shared.schedule_status_revert(SaveStatus::Restored);
        }
        if non_empty {
            shared.on_activity(true);
        }
        Self { shared }
    }

    pub fn key(&self) -> &str {
        &self.shared.key
    }

    /// Snapshot of the current draft.
    pub async fn draft(&self) -> Draft {
        self.shared.draft.lock().await.clone()
    }

    pub async fn has_draft(&self) -> bool {
        self.shared.draft.lock().await.is_non_empty()
    }

    /// Apply `f` to the draft. Counts as activity.
    pub async fn update<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut Draft) -> R,
    {
        let (out, non_empty) = {
            let mut draft = self.shared.draft.lock().await;
            let out = f(&mut draft);
            (out, draft.is_non_empty())
        };
        self.shared.on_activity(non_empty);
        out
    }

    pub fn status(&self) -> SaveStatus {
        *self.shared.status.borrow()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SaveStatus> {
        self.shared.status.subscribe()
    }

    pub fn is_inactive(&self) -> bool {
        *self.shared.inactive.borrow()
    }

    pub fn subscribe_inactive(&self) -> watch::Receiver<bool> {
        self.shared.inactive.subscribe()
    }

    pub async fn last_saved_ago(&self, now: DateTime<Utc>) -> String {
        last_saved_ago(self.shared.draft.lock().await.last_saved, now)
    }

    /// Save immediately, as a heartbeat tick would.
    pub async fn save_now(&self) -> bool {
        self.shared.autosave().await
    }

    /// Answer to the inactivity prompt: keep the draft, restart the countdown.
    pub async fn continue_draft(&self) {
        self.shared.inactive.send_replace(false);
        if self.has_draft().await {
            self.shared.restart_countdown();
        }
    }

    /// Remove the stored record and start a new draft lifecycle: defaults plus
    /// freshly rolled template/subject picks.
    #[instrument(skip_all, fields(key = %self.shared.key))]
    pub async fn clear(&self) {
        let mut draft = self.shared.draft.lock().await;
        if let Err(err) = self.shared.store.remove(&self.shared.key).await {
            warn!(?err, "failed to remove stored draft");
        }
        *draft = Draft::default();
        self.shared.variants.assign(&mut draft);
        drop(draft);
        self.shared.timers().abort_all();
        self.shared.inactive.send_replace(false);
        self.shared.status.send_replace(SaveStatus::Idle);
        info!("draft cleared");
    }

    /// Answer to the inactivity prompt: throw the draft away and start fresh.
    pub async fn discard(&self) {
        self.clear().await;
    }

    /// Tear down: cancel timers and make a best-effort final save.
    pub async fn close(self) {
        self.shared.timers().abort_all();
        let draft = self.shared.draft.lock().await;
        if !draft.is_non_empty() {
            return;
        }
        let written = write_record(
            self.shared.store.as_ref(),
            &self.shared.key,
            &draft,
            Utc::now(),
        )
        .await;
        match written {
            Ok(()) => debug!(key = %self.shared.key, "draft saved on exit"),
            Err(err) => debug!(?err, key = %self.shared.key, "save on exit skipped"),
        }
    }
}

impl Drop for DraftSession {
    fn drop(&mut self) {
        self.shared.timers().abort_all();
    }
}
