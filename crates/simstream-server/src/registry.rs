//! Session registry.
//!
//! A manifest request creates a session: the dataset is prepared on the
//! loader pool, a cursor is seeded at frame 0 and the result is parked here
//! under a fresh [`SessionId`]. The streaming connection later *attaches*,
//! which moves the [`Session`] out to the connection task that owns it from
//! then on. Only the bookkeeping entry stays behind until *release*.
//!
//! Sessions that are never attached are dropped by the expiry sweeper.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use metrics::{counter, histogram};
use simstream_core::{DatasetDescriptor, DatasetSource, FrameCursor, SessionId, StreamError};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::loader::DatasetLoader;
use crate::metrics::{
    DATASET_PREPARE_SECONDS, DATASETS_NOT_FOUND_TOTAL, SESSIONS_CREATED_TOTAL,
    SESSIONS_RELEASED_TOTAL,
};

/// Per-client streaming state, owned by exactly one connection once attached.
#[derive(Debug)]
pub struct Session {
    /// Registry key.
    pub id: SessionId,
    /// Dataset being streamed.
    pub descriptor: DatasetDescriptor,
    /// Frame cursor, seeded at frame 0.
    pub cursor: FrameCursor,
}

/// Result of [`SessionRegistry::create`].
#[derive(Clone, Debug)]
pub struct CreatedSession {
    /// New session key.
    pub id: SessionId,
    /// Dataset shape, for the manifest.
    pub descriptor: DatasetDescriptor,
}

#[derive(Debug)]
enum Slot {
    Pending(Box<Session>),
    Attached,
}

#[derive(Debug)]
struct Entry {
    descriptor: DatasetDescriptor,
    created_at: Instant,
    slot: Slot,
}

/// Process-wide map from [`SessionId`] to session.
pub struct SessionRegistry {
    sessions: DashMap<SessionId, Entry>,
    loader: DatasetLoader,
    created: AtomicU64,
    released: AtomicU64,
}

impl SessionRegistry {
    /// Registry preparing datasets from `source` with `workers` threads.
    pub fn new(source: Arc<dyn DatasetSource>, workers: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            loader: DatasetLoader::new(source, workers),
            created: AtomicU64::new(0),
            released: AtomicU64::new(0),
        }
    }

    /// Prepare `dataset` and register a new session for it.
    ///
    /// Unknown datasets fail immediately without touching the loader pool.
    pub async fn create(&self, dataset: &str) -> simstream_core::Result<CreatedSession> {
        if !self.loader.contains(dataset) {
            counter!(DATASETS_NOT_FOUND_TOTAL).increment(1);
            return Err(StreamError::DatasetNotFound {
                name: dataset.to_owned(),
            });
        }

        let started = Instant::now();
        let (descriptor, cursor) = self.loader.open(dataset).await?;
        histogram!(DATASET_PREPARE_SECONDS).record(started.elapsed().as_secs_f64());

        let id = SessionId::new();
        let session = Session {
            id: id.clone(),
            descriptor: descriptor.clone(),
            cursor,
        };
        let _ = self.sessions.insert(
            id.clone(),
            Entry {
                descriptor: descriptor.clone(),
                created_at: Instant::now(),
                slot: Slot::Pending(Box::new(session)),
            },
        );
        let _ = self.created.fetch_add(1, Ordering::Relaxed);
        counter!(SESSIONS_CREATED_TOTAL).increment(1);
        info!(session_id = %id, dataset, "session created");

        Ok(CreatedSession { id, descriptor })
    }

    /// Hand the session to a streaming connection.
    ///
    /// The entry stays registered (marked attached) until [`release`].
    /// A second attach for the same id fails with [`StreamError::SessionInUse`].
    ///
    /// [`release`]: Self::release
    pub fn attach(&self, id: &SessionId) -> simstream_core::Result<Session> {
        let mut entry = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| StreamError::SessionNotFound { id: id.to_string() })?;
        match std::mem::replace(&mut entry.slot, Slot::Attached) {
            Slot::Pending(session) => {
                debug!(session_id = %id, "session attached");
                Ok(*session)
            }
            Slot::Attached => Err(StreamError::SessionInUse { id: id.to_string() }),
        }
    }

    /// Remove a session. Returns `false` if it was already gone.
    pub fn release(&self, id: &SessionId) -> bool {
        let removed = self.sessions.remove(id).is_some();
        if removed {
            let _ = self.released.fetch_add(1, Ordering::Relaxed);
            counter!(SESSIONS_RELEASED_TOTAL, "reason" => "closed").increment(1);
            debug!(session_id = %id, "session released");
        }
        removed
    }

    /// Dataset shape of a live session.
    pub fn descriptor(&self, id: &SessionId) -> Option<DatasetDescriptor> {
        self.sessions.get(id).map(|e| e.descriptor.clone())
    }

    /// Whether `id` is registered.
    pub fn contains(&self, id: &SessionId) -> bool {
        self.sessions.contains_key(id)
    }

    /// Whether `id` is registered and attached.
    pub fn is_attached(&self, id: &SessionId) -> bool {
        self.sessions
            .get(id)
            .is_some_and(|e| matches!(e.slot, Slot::Attached))
    }

    /// Live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no sessions are live.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Sessions with an open streaming connection.
    pub fn attached_count(&self) -> usize {
        self.sessions
            .iter()
            .filter(|e| matches!(e.slot, Slot::Attached))
            .count()
    }

    /// Sessions ever created.
    pub fn created_total(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }

    /// Sessions ever released, by close or by expiry.
    pub fn released_total(&self) -> u64 {
        self.released.load(Ordering::Relaxed)
    }

    /// Names of the datasets clients may request.
    pub fn dataset_names(&self) -> Vec<String> {
        self.loader.names()
    }

    /// Drop sessions that have waited longer than `max_age` without a
    /// streaming connection. Returns how many were removed.
    pub fn expire_unattached(&self, max_age: Duration) -> usize {
        let now = Instant::now();
        let stale: Vec<SessionId> = self
            .sessions
            .iter()
            .filter(|e| {
                matches!(e.slot, Slot::Pending(_)) && now.duration_since(e.created_at) >= max_age
            })
            .map(|e| e.key().clone())
            .collect();

        let mut removed = 0;
        for id in stale {
            // Re-check under the shard lock: it may have attached meanwhile.
            let expired = self
                .sessions
                .remove_if(&id, |_, e| matches!(e.slot, Slot::Pending(_)))
                .is_some();
            if expired {
                removed += 1;
                let _ = self.released.fetch_add(1, Ordering::Relaxed);
                counter!(SESSIONS_RELEASED_TOTAL, "reason" => "expired").increment(1);
                debug!(session_id = %id, "unattached session expired");
            }
        }
        removed
    }
}

/// Spawn the sweeper releasing unattached sessions older than `max_age`.
pub fn start_expiry_task(
    registry: Arc<SessionRegistry>,
    interval: Duration,
    max_age: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let removed = registry.expire_unattached(max_age);
                    if removed > 0 {
                        warn!(removed, "expired sessions that never connected");
                    }
                }
            }
        }
        debug!("session expiry task stopped");
    })
}

#[cfg(test)]
mod tests {
    use simstream_core::{Resolution, SyntheticSource};

    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn registry_is_shareable_across_tasks() {
        assert_send_sync::<SessionRegistry>();
        assert_send_sync::<Arc<SessionRegistry>>();
        assert_send_sync::<Session>();
    }

    fn registry() -> SessionRegistry {
        SessionRegistry::new(Arc::new(SyntheticSource::with_test_dataset()), 2)
    }

    #[tokio::test]
    async fn create_registers_pending_session() {
        let reg = registry();
        let created = reg.create("test").await.unwrap();
        assert!(created.id.as_str().starts_with("sess_"));
        assert_eq!(created.descriptor.frame_count, 10);
        assert!(reg.contains(&created.id));
        assert!(!reg.is_attached(&created.id));
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.created_total(), 1);
        assert_eq!(reg.dataset_names(), vec!["test".to_string()]);
        assert_eq!(reg.descriptor(&created.id), Some(created.descriptor));
    }

    #[tokio::test]
    async fn ids_are_distinct() {
        let reg = registry();
        let a = reg.create("test").await.unwrap().id;
        let b = reg.create("test").await.unwrap().id;
        assert_ne!(a, b);
        assert_eq!(reg.len(), 2);
    }

    #[tokio::test]
    async fn unknown_dataset_creates_nothing() {
        let reg = registry();
        let err = reg.create("nope").await.unwrap_err();
        assert!(matches!(err, StreamError::DatasetNotFound { ref name } if name == "nope"));
        assert!(reg.is_empty());
    }

    #[tokio::test]
    async fn attach_hands_over_seeded_cursor() {
        let reg = registry();
        let id = reg.create("test").await.unwrap().id;
        let mut session = reg.attach(&id).unwrap();
        assert_eq!(session.id, id);
        assert_eq!(session.cursor.position(), 0);
        assert!(matches!(
            session.cursor.resolve(0).unwrap(),
            Resolution::Cached(_)
        ));
        assert!(reg.is_attached(&id));
        assert_eq!(reg.attached_count(), 1);
    }

    #[tokio::test]
    async fn second_attach_is_rejected() {
        let reg = registry();
        let id = reg.create("test").await.unwrap().id;
        let _session = reg.attach(&id).unwrap();
        let err = reg.attach(&id).unwrap_err();
        assert!(matches!(err, StreamError::SessionInUse { .. }));
        assert!(err.is_not_found());
    }

    #[test]
    fn attach_unknown_is_not_found() {
        let reg = registry();
        let err = reg.attach(&SessionId::from_raw("sess_missing")).unwrap_err();
        assert!(matches!(err, StreamError::SessionNotFound { .. }));
    }

    #[tokio::test]
    async fn release_is_idempotent() {
        let reg = registry();
        let id = reg.create("test").await.unwrap().id;
        let _session = reg.attach(&id).unwrap();
        assert!(reg.release(&id));
        assert!(!reg.release(&id));
        assert!(reg.is_empty());
        assert!(reg.descriptor(&id).is_none());
        assert_eq!(reg.released_total(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_skips_attached_and_young_sessions() {
        let reg = registry();
        let stale = reg.create("test").await.unwrap().id;
        let attached = reg.create("test").await.unwrap().id;
        let _session = reg.attach(&attached).unwrap();

        tokio::time::advance(Duration::from_secs(30)).await;
        let young = reg.create("test").await.unwrap().id;

        assert_eq!(reg.expire_unattached(Duration::from_secs(20)), 1);
        assert!(!reg.contains(&stale));
        assert!(reg.contains(&attached));
        assert!(reg.contains(&young));
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_task_sweeps_until_cancelled() {
        let reg = Arc::new(registry());
        let id = reg.create("test").await.unwrap().id;
        let cancel = CancellationToken::new();
        let handle = start_expiry_task(
            Arc::clone(&reg),
            Duration::from_secs(1),
            Duration::from_secs(5),
            cancel.clone(),
        );

        tokio::time::sleep(Duration::from_secs(7)).await;
        assert!(!reg.contains(&id));
        assert_eq!(reg.released_total(), 1);

        cancel.cancel();
        handle.await.unwrap();
    }
}
