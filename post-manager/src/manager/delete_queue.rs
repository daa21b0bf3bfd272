/*!
Durable queue of pending remote deletions, and its reconciliation against
the posts service
*/

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use posts_api::{PostId, PostsService};

use crate::manager::{
    config::RefreshPolicy, error::ManagerError, posts::PostCollection, queue_store::QueueStore,
};

/// Result of one remote delete attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DeleteOutcome {
    Deleted {
        post_id: PostId,
    },
    Failed {
        post_id: PostId,
        status: Option<u16>,
        error: String,
    },
}

impl DeleteOutcome {
    pub fn post_id(&self) -> PostId {
        match self {
            DeleteOutcome::Deleted { post_id } | DeleteOutcome::Failed { post_id, .. } => *post_id,
        }
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self, DeleteOutcome::Deleted { .. })
    }
}

/// Everything one reconcile pass did
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileReport {
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    /// One entry per remote request, in queue order
    pub outcomes: Vec<DeleteOutcome>,
    /// Queue contents once the pass finished
    pub remaining: Vec<PostId>,
    /// Set when the queue could not be written back; `remaining` is then
    /// ahead of what is on disk
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_error: Option<String>,
}

impl ReconcileReport {
    pub fn deleted(&self) -> impl Iterator<Item = PostId> + '_ {
        self.outcomes.iter().filter(|o| o.is_deleted()).map(DeleteOutcome::post_id)
    }

    pub fn failed(&self) -> impl Iterator<Item = &DeleteOutcome> {
        self.outcomes.iter().filter(|o| !o.is_deleted())
    }

    /// True when every attempted delete succeeded
    pub fn is_clean(&self) -> bool {
        self.outcomes.iter().all(DeleteOutcome::is_deleted)
    }
}

/// What a refresh did on top of its reconcile pass
#[derive(Debug, Clone, Serialize)]
pub struct RefreshReport {
    pub reconcile: ReconcileReport,
    /// Size of the freshly fetched collection, `None` when the fetch failed
    pub fetched: Option<usize>,
    /// Entries dropped from the queue while their remote delete was still unresolved
    pub discarded: Vec<PostId>,
}

/// Owns the delete queue and keeps its durable copy in step
pub struct DeleteQueueManager {
    queue: Vec<PostId>,
    store: QueueStore,
}

impl DeleteQueueManager {
    /// Restore the queue persisted by a previous run
    pub fn load(store: QueueStore) -> Result<Self, ManagerError> {
        let queue = store.load()?;
        if !queue.is_empty() {
            info!("Restored {} pending deletions from {:?}", queue.len(), store.key());
        }
        Ok(Self { queue, store })
    }

    pub fn pending(&self) -> &[PostId] {
        &self.queue
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Queue a post for remote deletion and drop it from the local view right
    /// away. The local mutation always happens; only the persist can fail.
    pub fn enqueue(&mut self, post_id: PostId, posts: &mut PostCollection) -> Result<(), ManagerError> {
        self.queue.push(post_id);
        posts.remove(post_id);
        debug!("Queued post {} for deletion ({} pending)", post_id, self.queue.len());
        self.persist()
    }

    /// Replay the queue against the service in insertion order.
    ///
    /// Each entry gets one delete request. Successful ids leave the queue (all
    /// of their occurrences) and the local collection; failed ones stay and
    /// the pass moves on. Remote and storage failures both end up in the
    /// report; a failed persist does not stop the pass, the queue is written
    /// again once it is over.
    pub async fn reconcile(
        &mut self,
        service: &dyn PostsService,
        posts: &mut PostCollection,
    ) -> ReconcileReport {
        let started_at = Utc::now();
        let snapshot = self.queue.clone();
        let mut outcomes = Vec::with_capacity(snapshot.len());

        if !snapshot.is_empty() {
            info!("Reconciling {} queued deletions", snapshot.len());
        }

        let mut resolved: Vec<PostId> = Vec::new();
        let mut storage_error: Option<ManagerError> = None;
        for post_id in snapshot {
            // a duplicate entry already deleted earlier in this pass
            if resolved.contains(&post_id) {
                continue;
            }

            match service.delete_post(post_id).await {
                Ok(()) => {
                    self.queue.retain(|queued| *queued != post_id);
                    posts.remove(post_id);
                    if storage_error.is_none() {
                        if let Err(e) = self.persist() {
                            error!("Error saving delete queue after deleting post {}: {}", post_id, e);
                            storage_error = Some(e);
                        }
                    }
                    resolved.push(post_id);
                    debug!("Deleted post {}", post_id);
                    outcomes.push(DeleteOutcome::Deleted { post_id });
                }
                Err(e) => {
                    warn!("Error deleting post {}: {}", post_id, e);
                    outcomes.push(DeleteOutcome::Failed {
                        post_id,
                        status: e.status(),
                        error: e.to_string(),
                    });
                }
            }
        }

        if storage_error.is_some() {
            match self.persist() {
                Ok(()) => storage_error = None,
                Err(e) => {
                    error!(
                        "Delete queue not saved; {:?} deleted remotely but still stored as pending: {}",
                        resolved, e
                    );
                    storage_error = Some(e);
                }
            }
        }

        let report = ReconcileReport {
            started_at,
            completed_at: Utc::now(),
            outcomes,
            remaining: self.queue.clone(),
            storage_error: storage_error.map(|e| e.to_string()),
        };

        if !report.outcomes.is_empty() {
            info!(
                "Reconcile finished: {} deleted, {} failed, {} still queued",
                report.deleted().count(),
                report.failed().count(),
                report.remaining.len()
            );
        }

        report
    }

    /// Reconcile, then replace the local collection with a fresh fetch.
    ///
    /// With [`RefreshPolicy::ClearQueue`] the queue is emptied once the fetch
    /// succeeds, whether or not reconcile drained it; posts whose delete never
    /// went through can reappear. [`RefreshPolicy::KeepUnresolved`] keeps them
    /// queued and hidden. A failed fetch leaves collection and queue alone.
    pub async fn refresh(
        &mut self,
        service: &dyn PostsService,
        posts: &mut PostCollection,
        policy: RefreshPolicy,
    ) -> Result<RefreshReport, ManagerError> {
        let reconcile = self.reconcile(service, posts).await;

        let fresh = match service.fetch_posts().await {
            Ok(fresh) => fresh,
            Err(e) => {
                error!("Error fetching posts: {}", e);
                return Ok(RefreshReport {
                    reconcile,
                    fetched: None,
                    discarded: Vec::new(),
                });
            }
        };

        let fetched = fresh.len();
        posts.replace_all(fresh);

        let discarded = match policy {
            RefreshPolicy::ClearQueue => {
                let discarded = std::mem::take(&mut self.queue);
                if !discarded.is_empty() {
                    warn!(
                        "Refresh dropped {} unresolved deletions from the queue: {:?}",
                        discarded.len(),
                        discarded
                    );
                }
                self.persist()?;
                discarded
            }
            RefreshPolicy::KeepUnresolved => {
                posts.hide(&self.queue);
                Vec::new()
            }
        };

        info!("Refreshed {} posts, {} deletions pending", posts.len(), self.queue.len());

        Ok(RefreshReport {
            reconcile,
            fetched: Some(fetched),
            discarded,
        })
    }

    #[cfg(test)]
    pub fn store(&self) -> &QueueStore {
        &self.store
    }

    fn persist(&self) -> Result<(), ManagerError> {
        self.store.save(&self.queue)
    }
}
