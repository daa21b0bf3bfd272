/*!
The post manager session: owns the local collection, the delete queue and the
view state, and drives them against the posts service
*/

use chrono::{DateTime, Utc};
use tokio_stream::{Stream, StreamExt};
use tracing::{error, info};

use posts_api::{Comment, HttpPostsClient, Post, PostId, PostsService};

use crate::manager::{
    config::ManagerConfig,
    delete_queue::{DeleteQueueManager, ReconcileReport, RefreshReport},
    error::ManagerError,
    event_system::SessionEvent,
    output_plugins::ReportManager,
    posts::PostCollection,
    queue_store::QueueStore,
};

/// Transient selection state, reset on refresh
#[derive(Debug, Clone, Default)]
pub struct ViewState {
    pub selected: Option<Post>,
    pub comments: Vec<Comment>,
}

impl ViewState {
    pub fn reset(&mut self) {
        self.selected = None;
        self.comments.clear();
    }
}

/// Counters about the session's operation
#[derive(Debug, Clone)]
pub struct SessionStats {
    pub visible_posts: usize,
    pub queued_deletions: usize,
    pub reconcile_runs: u64,
    pub last_reconcile_at: Option<DateTime<Utc>>,
}

pub struct PostSession {
    config: ManagerConfig,
    service: Box<dyn PostsService>,
    posts: PostCollection,
    queue: DeleteQueueManager,
    view: ViewState,
    reports: ReportManager,
    reconcile_runs: u64,
    last_reconcile_at: Option<DateTime<Utc>>,
}

impl PostSession {
    /// Restore the persisted queue and set up report sinks. Posts are not
    /// fetched until [`PostSession::load`].
    pub async fn new(
        config: ManagerConfig,
        service: Box<dyn PostsService>,
        store: QueueStore,
    ) -> Result<Self, ManagerError> {
        let queue = DeleteQueueManager::load(store)?;
        let mut reports = ReportManager::new(&config.outputs, config.api.timeout())?;
        reports.initialize().await?;

        Ok(Self {
            config,
            service,
            posts: PostCollection::default(),
            queue,
            view: ViewState::default(),
            reports,
            reconcile_runs: 0,
            last_reconcile_at: None,
        })
    }

    /// Initial fetch of the collection. Posts still waiting in the delete
    /// queue stay hidden. Returns the number of visible posts, or `None` when
    /// the fetch failed (logged, collection left empty).
    pub async fn load(&mut self) -> Option<usize> {
        match self.service.fetch_posts().await {
            Ok(posts) => {
                self.posts.replace_all(posts);
                self.posts.hide(self.queue.pending());
                info!("📥 Loaded {} posts ({} queued for deletion)", self.posts.len(), self.queue.len());
                Some(self.posts.len())
            }
            Err(e) => {
                error!("Error fetching posts: {}", e);
                None
            }
        }
    }

    pub fn posts(&self) -> &PostCollection {
        &self.posts
    }

    pub fn pending_deletions(&self) -> &[PostId] {
        self.queue.pending()
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    /// Select a post and fetch its comments into the view state
    pub async fn view_comments(&mut self, post_id: PostId) -> &[Comment] {
        self.view.selected = self.posts.get(post_id).cloned();
        self.view.comments = match self.service.fetch_comments(post_id).await {
            Ok(comments) => comments,
            Err(e) => {
                error!("Error fetching comments: {}", e);
                Vec::new()
            }
        };
        &self.view.comments
    }

    pub fn close_comments(&mut self) {
        self.view.reset();
    }

    /// Queue a post for deletion; it disappears from the collection at once
    pub fn delete_post(&mut self, post_id: PostId) -> Result<(), ManagerError> {
        if self.view.selected.as_ref().is_some_and(|post| post.id == post_id) {
            self.view.reset();
        }
        self.queue.enqueue(post_id, &mut self.posts)
    }

    pub async fn reconcile(&mut self) -> ReconcileReport {
        let report = self.queue.reconcile(self.service.as_ref(), &mut self.posts).await;
        self.record(&report).await;
        report
    }

    /// Reset the view, reconcile, then replace the collection with a fresh
    /// fetch. Queue handling follows `reconcile.refresh_policy`.
    pub async fn refresh(&mut self) -> Result<RefreshReport, ManagerError> {
        self.view.reset();
        let report = self
            .queue
            .refresh(
                self.service.as_ref(),
                &mut self.posts,
                self.config.reconcile.refresh_policy,
            )
            .await?;
        self.record(&report.reconcile).await;
        Ok(report)
    }

    async fn record(&mut self, report: &ReconcileReport) {
        self.reconcile_runs += 1;
        self.last_reconcile_at = Some(report.completed_at);
        self.reports.handle_report(report).await;
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            visible_posts: self.posts.len(),
            queued_deletions: self.queue.len(),
            reconcile_runs: self.reconcile_runs,
            last_reconcile_at: self.last_reconcile_at,
        }
    }

    /// Run each scheduled event to completion before taking the next one.
    /// Returns when the event stream ends; storage errors stop the loop.
    pub async fn watch<S>(&mut self, events: S) -> Result<(), ManagerError>
    where
        S: Stream<Item = SessionEvent>,
    {
        let mut events = Box::pin(events);

        while let Some(event) = events.next().await {
            match event {
                SessionEvent::ReconcileDue { .. } => {
                    self.reconcile().await;
                }
                SessionEvent::RefreshDue { .. } => {
                    self.refresh().await?;
                }
            }
        }

        Ok(())
    }

    /// Flush report sinks
    pub async fn shutdown(mut self) -> Result<(), ManagerError> {
        info!("🛑 Shutting down, {} deletions still queued", self.queue.len());
        self.reports.finalize().await
    }
}

/// reqwest-backed service for the configured base URL
pub fn http_service(config: &ManagerConfig) -> Result<Box<dyn PostsService>, ManagerError> {
    let client = HttpPostsClient::new(&config.api.base_url, config.api.timeout())?;
    Ok(Box::new(client))
}

/// Helper function to create a session from a config, using the HTTP client
/// and the configured state database
pub async fn create_session(config: ManagerConfig) -> Result<PostSession, ManagerError> {
    let service = http_service(&config)?;
    let store = QueueStore::open(&config.storage)?;
    PostSession::new(config, service, store).await
}
