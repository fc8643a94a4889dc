//! Subscriber-side projection of the reports currently in range.
//!
//! [`LocalMirror`] is a plain ordered collection updated by applying
//! [`ProximityEvent`]s. [`LiveMirror`] drives one from a subscription on a
//! background task, forwards centre and radius changes to it, and publishes
//! every change as a snapshot.

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::domain::ports::{QueryId, SpatialIndexError};
use crate::domain::{
    GeoPoint, ProximityEvent, ProximitySubscription, RadiusKm, Report, ReportId,
};

/// Reports in first-seen order, at most one entry per id.
///
/// # Examples
/// ```
/// use chrono::Utc;
/// use cartwatch::domain::{
///     AuthorId, GeoPoint, LocalMirror, ProximityEvent, Report, ReportDraft, ReportId,
/// };
///
/// let record = ReportDraft::at(GeoPoint::new(1.0, 2.0).expect("valid point"))
///     .into_record(AuthorId::new("uid").expect("valid author"), Utc::now())
///     .expect("valid draft");
/// let id = ReportId::new("r-1").expect("valid id");
///
/// let mut mirror = LocalMirror::new();
/// mirror.apply(ProximityEvent::ReportEntered(Report::new(id.clone(), record)));
/// assert!(mirror.contains(&id));
/// mirror.apply(ProximityEvent::ReportExited(id.clone()));
/// mirror.apply(ProximityEvent::ReportExited(id));
/// assert!(mirror.is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalMirror {
    entries: Vec<Report>,
}

impl LocalMirror {
    /// Create an empty mirror.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one event.
    ///
    /// Entered and moved both upsert: an existing entry is replaced in place,
    /// otherwise the report is appended. Exits of unknown ids are ignored.
    pub fn apply(&mut self, event: ProximityEvent) {
        match event {
            ProximityEvent::ReportEntered(report) | ProximityEvent::ReportMoved(report) => {
                self.upsert(report);
            }
            ProximityEvent::ReportExited(id) => self.remove(&id),
        }
    }

    fn position(&self, id: &ReportId) -> Option<usize> {
        self.entries.iter().position(|entry| entry.id == *id)
    }

    fn upsert(&mut self, report: Report) {
        match self.position(&report.id) {
            Some(index) => {
                if let Some(slot) = self.entries.get_mut(index) {
                    *slot = report;
                }
            }
            None => self.entries.push(report),
        }
    }

    fn remove(&mut self, id: &ReportId) {
        if let Some(index) = self.position(id) {
            self.entries.remove(index);
        }
    }

    /// Entries in first-seen order.
    pub fn current(&self) -> &[Report] {
        &self.entries
    }

    /// Entry for `id`, if present.
    pub fn get(&self, id: &ReportId) -> Option<&Report> {
        self.entries.iter().find(|entry| entry.id == *id)
    }

    /// Whether an entry for `id` is present.
    pub fn contains(&self, id: &ReportId) -> bool {
        self.position(id).is_some()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the mirror holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A [`LocalMirror`] kept current by a background task.
///
/// The task owns the subscription; criteria changes are forwarded to it over
/// a command channel. Dropping the live mirror stops the task and closes the
/// subscription.
pub struct LiveMirror {
    query_id: QueryId,
    commands: mpsc::UnboundedSender<MirrorCommand>,
    snapshots: watch::Receiver<Vec<Report>>,
    task: JoinHandle<()>,
}

enum MirrorCommand {
    UpdateCenter {
        center: GeoPoint,
        reply: oneshot::Sender<Result<(), SpatialIndexError>>,
    },
    UpdateRadius {
        radius: RadiusKm,
        reply: oneshot::Sender<Result<(), SpatialIndexError>>,
    },
}

impl LiveMirror {
    /// Start applying events from `subscription`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(subscription: ProximitySubscription) -> Self {
        let query_id = subscription.query_id();
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (publisher, snapshots) = watch::channel(Vec::new());
        let task = tokio::spawn(follow(subscription, command_rx, publisher));
        Self {
            query_id,
            commands,
            snapshots,
            task,
        }
    }

    /// Latest snapshot, in first-seen order.
    pub fn current(&self) -> Vec<Report> {
        self.snapshots.borrow().clone()
    }

    /// Wait for the next snapshot.
    ///
    /// Returns `false` once the feed has ended and no further snapshots will
    /// arrive.
    pub async fn changed(&mut self) -> bool {
        self.snapshots.changed().await.is_ok()
    }

    /// Move the followed centre, keeping the radius.
    ///
    /// Entries leaving the new area drop out of later snapshots as their
    /// exits arrive.
    pub async fn update_center(&self, center: GeoPoint) -> Result<(), SpatialIndexError> {
        self.send(|reply| MirrorCommand::UpdateCenter { center, reply })
            .await
    }

    /// Resize the followed area, keeping the centre.
    pub async fn update_radius(&self, radius: RadiusKm) -> Result<(), SpatialIndexError> {
        self.send(|reply| MirrorCommand::UpdateRadius { radius, reply })
            .await
    }

    async fn send(
        &self,
        command: impl FnOnce(oneshot::Sender<Result<(), SpatialIndexError>>) -> MirrorCommand,
    ) -> Result<(), SpatialIndexError> {
        let query_id = self.query_id;
        let closed = move || SpatialIndexError::query_closed(query_id);
        let (reply, response) = oneshot::channel();
        self.commands.send(command(reply)).map_err(|_| closed())?;
        response.await.map_err(|_| closed())?
    }

    /// Stop following the subscription.
    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for LiveMirror {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn follow(
    mut subscription: ProximitySubscription,
    mut commands: mpsc::UnboundedReceiver<MirrorCommand>,
    publisher: watch::Sender<Vec<Report>>,
) {
    let mut mirror = LocalMirror::new();
    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(MirrorCommand::UpdateCenter { center, reply }) => {
                    let _ = reply.send(subscription.update_center(center).await);
                }
                Some(MirrorCommand::UpdateRadius { radius, reply }) => {
                    let _ = reply.send(subscription.update_radius(radius).await);
                }
                None => break,
            },
            event = subscription.next_event() => {
                let Some(event) = event else { break };
                mirror.apply(event);
                if publisher.send(mirror.current().to_vec()).is_err() {
                    break;
                }
            }
        }
    }
    debug!(query_id = subscription.query_id(), "live mirror feed ended");
}
