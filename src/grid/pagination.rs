//! Incremental photo loading for the active person.
//!
//! The loader accumulates pages into one ordered sequence. Each person
//! selection starts a new session; a page response is only applied if its
//! session is still current, so answers that arrive after a reset are
//! dropped instead of being appended at ambiguous indices.
//!
//! `loading` is the only re-entrancy guard. Scroll checks, the safety-net
//! poll and explicit reloads may all call `load_next_page` concurrently; any
//! call that finds a fetch in flight returns immediately without queueing.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::bridge::{BridgeResult, SharedBridge};
use crate::error::BridgeError;
use crate::events::{EventSink, ViewEvent};
use crate::models::{FaceId, PageWindow, PersonKey, Photo, PhotoPage};
use crate::scheduler::TaskSlot;

/// Trailing status line shown under the grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GridStatus {
    /// More pages are available.
    Loading {
        loaded: usize,
        total: usize,
        /// Total exceeds the large-count threshold; show exact counts.
        large: bool,
    },
    /// Every photo has been loaded.
    Complete { total: usize },
    /// A later page failed; what is shown stays, nothing more will load.
    Stopped { loaded: usize },
}

impl GridStatus {
    pub fn label(&self) -> String {
        match self {
            GridStatus::Loading {
                loaded,
                total,
                large: true,
            } => format!("Loaded {loaded} of {total} photos. Scroll for more..."),
            GridStatus::Loading { loaded, total, .. } => {
                format!("Showing {loaded} from {total} photos, loading more...")
            }
            GridStatus::Complete { total: 1 } => "All 1 photo loaded".to_string(),
            GridStatus::Complete { total } => format!("All {total} photos loaded"),
            GridStatus::Stopped { loaded } => {
                format!("Could not load more photos ({loaded} shown)")
            }
        }
    }
}

/// Why a `load_next_page` call did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoPerson,
    Busy,
    Exhausted,
}

/// Result of one `load_next_page` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome {
    Skipped(SkipReason),
    Appended { start: usize, count: usize },
    /// The sequence ended without a single visible photo.
    Empty,
    Failed(BridgeError),
    /// The session changed while the request was outstanding.
    Stale,
}

/// What one response did to the sequence.
enum Applied {
    Done(PageOutcome),
    /// Nothing visible on this page but more remain.
    Skipped,
}

#[derive(Debug)]
struct LoaderState {
    session: u64,
    person: Option<PersonKey>,
    photos: Vec<Photo>,
    positions: HashMap<FaceId, usize>,
    page: u32,
    total_count: usize,
    has_more: bool,
    loading: bool,
}

impl LoaderState {
    fn new() -> Self {
        Self {
            session: 0,
            person: None,
            photos: Vec::new(),
            positions: HashMap::new(),
            page: 1,
            total_count: 0,
            has_more: false,
            loading: false,
        }
    }

    fn restart(&mut self, person: Option<PersonKey>) {
        self.session += 1;
        self.person = person;
        self.photos.clear();
        self.positions.clear();
        self.page = 1;
        self.total_count = 0;
        self.has_more = person.is_some();
        self.loading = false;
    }
}

/// Clears `loading` when the fetch that set it ends, however it ends,
/// unless a reset has handed the flag to a newer session.
struct InFlight {
    state: Arc<Mutex<LoaderState>>,
    session: u64,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        if state.session == self.session {
            state.loading = false;
        }
    }
}

/// Paged loader for the active person's photos. Clones share state.
#[derive(Clone)]
pub struct PaginationLoader {
    bridge: SharedBridge,
    events: EventSink,
    state: Arc<Mutex<LoaderState>>,
    page_size: u32,
    large_count_threshold: usize,
}

impl PaginationLoader {
    pub fn new(
        bridge: SharedBridge,
        events: EventSink,
        page_size: u32,
        large_count_threshold: usize,
    ) -> Self {
        Self {
            bridge,
            events,
            state: Arc::new(Mutex::new(LoaderState::new())),
            page_size: page_size.max(1),
            large_count_threshold,
        }
    }

    /// Start a new session for `person`: empty sequence, page 1, more available.
    pub fn reset(&self, person: PersonKey) {
        let mut state = self.state.lock();
        state.restart(Some(person));
        debug!(?person, session = state.session, "Pagination reset");
    }

    /// End the session without starting another; nothing will load.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.restart(None);
        debug!(session = state.session, "Pagination cleared");
    }

    /// Fetch and append the next page, unless one is already in flight or
    /// the sequence is exhausted.
    ///
    /// A page can come back empty while more remain (the backend filters
    /// hidden faces after paging); the loader then moves on to the following
    /// page within the same call.
    pub async fn load_next_page(&self) -> PageOutcome {
        let (session, person) = {
            let mut state = self.state.lock();
            let Some(person) = state.person else {
                trace!("No active person, skipping page load");
                return PageOutcome::Skipped(SkipReason::NoPerson);
            };
            if state.loading {
                debug!(page = state.page, "Page load already in flight, skipping");
                return PageOutcome::Skipped(SkipReason::Busy);
            }
            if !state.has_more {
                trace!("All pages loaded, skipping");
                return PageOutcome::Skipped(SkipReason::Exhausted);
            }
            state.loading = true;
            (state.session, person)
        };
        let _in_flight = InFlight {
            state: Arc::clone(&self.state),
            session,
        };

        loop {
            let page = self.state.lock().page;
            debug!(?person, page, page_size = self.page_size, "Requesting photo page");
            let response = self
                .bridge
                .get_photos(person.clustering_id, person.person_id, page, self.page_size)
                .await;

            let mut state = self.state.lock();
            if state.session != session {
                debug!(?person, page, "Discarding page from a previous session");
                return PageOutcome::Stale;
            }
            match self.apply_response(&mut state, page, response) {
                Applied::Done(outcome) => return outcome,
                Applied::Skipped => {
                    debug!(?person, page, "Page had no visible photos, fetching the next one");
                }
            }
        }
    }

    fn apply_response(
        &self,
        state: &mut LoaderState,
        page: u32,
        response: BridgeResult<PhotoPage>,
    ) -> Applied {
        let offset = (page as usize - 1) * self.page_size as usize;
        let response = response.and_then(|resp| {
            if resp.photos.is_empty() && resp.has_more && offset >= resp.total_count {
                Err(BridgeError::InvalidResponse(format!(
                    "page {page} starts past {} photos but claims more are available",
                    resp.total_count
                )))
            } else {
                Ok(resp)
            }
        });

        match response {
            Ok(resp) => {
                if page == 1 && resp.total_count == 0 {
                    state.has_more = false;
                    debug!(person = ?state.person, "Person has no photos");
                    self.events.emit(ViewEvent::GridEmpty);
                    return Applied::Done(PageOutcome::Empty);
                }

                let start = state.photos.len();
                let mut appended = Vec::with_capacity(resp.photos.len());
                for photo in resp.photos {
                    if state.positions.contains_key(&photo.face_id) {
                        warn!(face_id = photo.face_id, page, "Duplicate face in page, skipping");
                        continue;
                    }
                    state.positions.insert(photo.face_id, state.photos.len());
                    state.photos.push(photo.clone());
                    appended.push(photo);
                }
                let count = appended.len();

                state.total_count = resp.total_count;
                state.has_more = resp.has_more;
                state.page += 1;

                debug!(page, count, total = resp.total_count, has_more = resp.has_more, "Page applied");
                if count == 0 && state.has_more {
                    return Applied::Skipped;
                }
                if count > 0 {
                    self.events.emit(ViewEvent::TilesAppended {
                        start,
                        photos: appended,
                    });
                }
                if state.photos.is_empty() {
                    debug!(person = ?state.person, "No visible photos in any page");
                    self.events.emit(ViewEvent::GridEmpty);
                    return Applied::Done(PageOutcome::Empty);
                }
                self.events.emit(ViewEvent::GridStatus(self.status_of(state)));
                Applied::Done(PageOutcome::Appended { start, count })
            }
            Err(err) => {
                warn!(person = ?state.person, page, error = %err, "Failed to load photo page");
                state.has_more = false;
                if state.photos.is_empty() {
                    self.events
                        .emit(ViewEvent::GridError("Error loading photos".to_string()));
                } else {
                    self.events.emit(ViewEvent::GridStatus(GridStatus::Stopped {
                        loaded: state.photos.len(),
                    }));
                }
                Applied::Done(PageOutcome::Failed(err))
            }
        }
    }

    fn status_of(&self, state: &LoaderState) -> GridStatus {
        let loaded = state.photos.len();
        if state.has_more {
            GridStatus::Loading {
                loaded,
                total: state.total_count,
                large: state.total_count > self.large_count_threshold,
            }
        } else {
            GridStatus::Complete { total: loaded }
        }
    }

    pub fn person(&self) -> Option<PersonKey> {
        self.state.lock().person
    }

    pub fn session(&self) -> u64 {
        self.state.lock().session
    }

    pub fn is_loading(&self) -> bool {
        self.state.lock().loading
    }

    pub fn has_more(&self) -> bool {
        self.state.lock().has_more
    }

    pub fn len(&self) -> usize {
        self.state.lock().photos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn window(&self) -> PageWindow {
        let state = self.state.lock();
        PageWindow {
            page_number: state.page,
            page_size: self.page_size,
            total_count: state.total_count,
            has_more: state.has_more,
        }
    }

    /// Copy of the accumulated sequence.
    pub fn snapshot(&self) -> Vec<Photo> {
        self.state.lock().photos.clone()
    }

    pub fn photo_at(&self, index: usize) -> Option<Photo> {
        self.state.lock().photos.get(index).cloned()
    }

    /// Absolute index of `face_id` in the accumulated sequence.
    pub fn index_of(&self, face_id: FaceId) -> Option<usize> {
        self.state.lock().positions.get(&face_id).copied()
    }

    pub fn photo(&self, face_id: FaceId) -> Option<Photo> {
        let state = self.state.lock();
        let index = *state.positions.get(&face_id)?;
        state.photos.get(index).cloned()
    }

    /// Face ids in sequence order.
    pub fn face_ids(&self) -> Vec<FaceId> {
        self.state.lock().photos.iter().map(|p| p.face_id).collect()
    }
}

/// Geometry of the scrollable grid at the time of a scroll event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollMetrics {
    pub scroll_top: f32,
    pub viewport_height: f32,
    pub content_height: f32,
}

impl ScrollMetrics {
    pub fn distance_to_bottom(&self) -> f32 {
        (self.content_height - self.scroll_top - self.viewport_height).max(0.0)
    }

    pub fn near_bottom(&self, threshold_px: f32) -> bool {
        self.distance_to_bottom() < threshold_px
    }
}

/// Drives `load_next_page` from scroll proximity: a debounced check on
/// scroll events plus an optional fixed-interval poll.
pub struct ScrollTrigger {
    loader: PaginationLoader,
    metrics: Arc<Mutex<Option<ScrollMetrics>>>,
    threshold_px: f32,
    debounce_delay: Duration,
    poll_period: Option<Duration>,
    debounce: TaskSlot,
    poll: TaskSlot,
}

impl ScrollTrigger {
    pub fn new(
        loader: PaginationLoader,
        threshold_px: f32,
        debounce_delay: Duration,
        poll_period: Option<Duration>,
    ) -> Self {
        Self {
            loader,
            metrics: Arc::new(Mutex::new(None)),
            threshold_px,
            debounce_delay,
            poll_period,
            debounce: TaskSlot::new("scroll-debounce"),
            poll: TaskSlot::new("scroll-poll"),
        }
    }

    /// Record new scroll geometry and schedule a debounced proximity check.
    pub fn on_scroll(&mut self, metrics: ScrollMetrics) {
        *self.metrics.lock() = Some(metrics);
        let loader = self.loader.clone();
        let shared = Arc::clone(&self.metrics);
        let threshold = self.threshold_px;
        self.debounce.schedule_after(self.debounce_delay, async move {
            if is_near_bottom(&shared, threshold) {
                // Detached so a later scroll superseding the debounce can't
                // abort the fetch itself.
                tokio::spawn(async move {
                    loader.load_next_page().await;
                });
            }
        });
    }

    /// Record geometry after a layout pass without a scroll, e.g. when a
    /// fresh grid is rendered. Loads straight away if already near the
    /// bottom, and gives the safety poll something to check.
    pub fn report_layout(&self, metrics: ScrollMetrics) {
        *self.metrics.lock() = Some(metrics);
        if metrics.near_bottom(self.threshold_px) {
            let loader = self.loader.clone();
            tokio::spawn(async move {
                loader.load_next_page().await;
            });
        }
    }

    /// Start the safety-net poll, if configured.
    pub fn start(&mut self) {
        let Some(period) = self.poll_period else {
            debug!("Pagination safety poll disabled");
            return;
        };
        let loader = self.loader.clone();
        let shared = Arc::clone(&self.metrics);
        let threshold = self.threshold_px;
        self.poll.schedule_every(period, move || {
            let loader = loader.clone();
            let near = is_near_bottom(&shared, threshold);
            async move {
                if near {
                    loader.load_next_page().await;
                }
            }
        });
        debug!(?period, "Pagination safety poll started");
    }

    /// Forget the last geometry, e.g. when the grid is emptied.
    pub fn forget_metrics(&self) {
        *self.metrics.lock() = None;
    }

    /// Cancel the pending debounce and the poll.
    pub fn stop(&mut self) {
        self.debounce.cancel();
        self.poll.cancel();
    }

    pub fn is_polling(&self) -> bool {
        self.poll.is_pending()
    }
}

fn is_near_bottom(metrics: &Mutex<Option<ScrollMetrics>>, threshold: f32) -> bool {
    metrics
        .lock()
        .map(|m| m.near_bottom(threshold))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::MemoryBridge;
    use crate::events::{self, drain};

    fn loader_for(bridge: &Arc<MemoryBridge>) -> (PaginationLoader, flume::Receiver<ViewEvent>) {
        let (sink, rx) = events::channel();
        let shared: SharedBridge = bridge.clone();
        (PaginationLoader::new(shared, sink, 100, 1000), rx)
    }

    fn alice(bridge: &MemoryBridge, photos: usize) -> PersonKey {
        bridge.add_person(1, 7, "Alice", photos)
    }

    #[tokio::test]
    async fn test_reset_starts_empty_session() {
        let bridge = Arc::new(MemoryBridge::new());
        let key = alice(&bridge, 10);
        let (loader, _rx) = loader_for(&bridge);

        loader.reset(key);
        loader.load_next_page().await;
        assert_eq!(loader.len(), 10);

        loader.reset(key);
        assert_eq!(loader.len(), 0);
        assert!(loader.has_more());
        assert!(!loader.is_loading());
        assert_eq!(loader.window().page_number, 1);
    }

    #[tokio::test]
    async fn test_three_pages_for_250_photos() {
        let bridge = Arc::new(MemoryBridge::new());
        let key = alice(&bridge, 250);
        let (loader, rx) = loader_for(&bridge);
        loader.reset(key);

        assert_eq!(
            loader.load_next_page().await,
            PageOutcome::Appended { start: 0, count: 100 }
        );
        assert!(loader.has_more());
        assert_eq!(
            loader.load_next_page().await,
            PageOutcome::Appended { start: 100, count: 100 }
        );
        assert!(loader.has_more());
        assert_eq!(
            loader.load_next_page().await,
            PageOutcome::Appended { start: 200, count: 50 }
        );
        assert!(!loader.has_more());
        assert_eq!(
            loader.load_next_page().await,
            PageOutcome::Skipped(SkipReason::Exhausted)
        );
        assert_eq!(bridge.calls("get_photos"), 3);

        let statuses: Vec<GridStatus> = drain(&rx)
            .into_iter()
            .filter_map(|e| match e {
                ViewEvent::GridStatus(s) => Some(s),
                _ => None,
            })
            .collect();
        assert_eq!(statuses.last(), Some(&GridStatus::Complete { total: 250 }));
        assert_eq!(
            statuses[0].label(),
            "Showing 100 from 250 photos, loading more..."
        );
    }

    #[tokio::test]
    async fn test_overlapping_loads_issue_one_request() {
        let bridge = Arc::new(MemoryBridge::new());
        let key = alice(&bridge, 250);
        let (loader, _rx) = loader_for(&bridge);
        loader.reset(key);
        bridge.hold_photos();

        let first = tokio::spawn({
            let loader = loader.clone();
            async move { loader.load_next_page().await }
        });
        tokio::task::yield_now().await;
        assert!(loader.is_loading());

        assert_eq!(
            loader.load_next_page().await,
            PageOutcome::Skipped(SkipReason::Busy)
        );

        bridge.release_photos(1);
        let outcome = first.await.unwrap();
        assert_eq!(outcome, PageOutcome::Appended { start: 0, count: 100 });
        assert_eq!(bridge.calls("get_photos"), 1);
        assert!(!loader.is_loading());
    }

    #[tokio::test]
    async fn test_stale_response_is_discarded() {
        let bridge = Arc::new(MemoryBridge::new());
        let alice_key = alice(&bridge, 30);
        let bob_key = bridge.add_person(1, 8, "Bob", 5);
        let (loader, _rx) = loader_for(&bridge);
        loader.reset(alice_key);
        bridge.hold_photos();

        let stale = tokio::spawn({
            let loader = loader.clone();
            async move { loader.load_next_page().await }
        });
        tokio::task::yield_now().await;

        loader.reset(bob_key);
        bridge.open_gate();
        assert_eq!(stale.await.unwrap(), PageOutcome::Stale);
        assert_eq!(loader.len(), 0);

        let outcome = loader.load_next_page().await;
        assert_eq!(outcome, PageOutcome::Appended { start: 0, count: 5 });
        assert_eq!(loader.snapshot().len(), 5);
    }

    #[tokio::test]
    async fn test_empty_person() {
        let bridge = Arc::new(MemoryBridge::new());
        let key = alice(&bridge, 0);
        let (loader, rx) = loader_for(&bridge);
        loader.reset(key);

        assert_eq!(loader.load_next_page().await, PageOutcome::Empty);
        assert!(!loader.has_more());
        assert!(drain(&rx).contains(&ViewEvent::GridEmpty));
    }

    #[tokio::test]
    async fn test_page_of_only_hidden_faces_moves_on() {
        let bridge = Arc::new(MemoryBridge::new());
        let key = alice(&bridge, 150);
        bridge.skip_hidden_photos(true);
        bridge.hide_faces(bridge.face_ids_of(key).into_iter().take(100));
        let (loader, rx) = loader_for(&bridge);
        loader.reset(key);

        assert_eq!(
            loader.load_next_page().await,
            PageOutcome::Appended { start: 0, count: 50 }
        );
        assert_eq!(loader.len(), 50);
        assert!(!loader.has_more());
        assert_eq!(bridge.calls("get_photos"), 2);
        let events = drain(&rx);
        assert!(!events.iter().any(|e| matches!(e, ViewEvent::GridError(_))));
        assert!(events.contains(&ViewEvent::GridStatus(GridStatus::Complete { total: 50 })));
    }

    #[tokio::test]
    async fn test_every_face_hidden_ends_empty() {
        let bridge = Arc::new(MemoryBridge::new());
        let key = alice(&bridge, 150);
        bridge.skip_hidden_photos(true);
        bridge.hide_faces(bridge.face_ids_of(key));
        let (loader, rx) = loader_for(&bridge);
        loader.reset(key);

        assert_eq!(loader.load_next_page().await, PageOutcome::Empty);
        assert!(!loader.has_more());
        assert!(drain(&rx).contains(&ViewEvent::GridEmpty));
    }

    #[tokio::test]
    async fn test_empty_page_past_the_end_claiming_more_fails() {
        use crate::bridge::HostBridge;
        use crate::models::{ActionReply, ClusteringId, Person, PersonId, TransferTargets};
        use std::path::Path;

        /// Always claims more photos without ever returning any.
        struct Endless;

        #[async_trait::async_trait]
        impl HostBridge for Endless {
            async fn get_people(&self) -> BridgeResult<Vec<Person>> {
                Ok(Vec::new())
            }
            async fn get_photos(
                &self,
                _clustering_id: ClusteringId,
                _person_id: PersonId,
                _page: u32,
                _page_size: u32,
            ) -> BridgeResult<PhotoPage> {
                Ok(PhotoPage {
                    photos: Vec::new(),
                    total_count: 150,
                    has_more: true,
                })
            }
            async fn get_full_size_preview(&self, _path: &Path) -> BridgeResult<Option<String>> {
                Ok(None)
            }
            async fn open_photo(&self, _path: &Path) -> BridgeResult<()> {
                Ok(())
            }
            async fn hide_person(
                &self,
                _clustering_id: ClusteringId,
                _person_id: PersonId,
            ) -> BridgeResult<ActionReply> {
                unreachable!()
            }
            async fn unhide_person(
                &self,
                _clustering_id: ClusteringId,
                _person_id: PersonId,
            ) -> BridgeResult<ActionReply> {
                unreachable!()
            }
            async fn untag_person(
                &self,
                _clustering_id: ClusteringId,
                _person_id: PersonId,
            ) -> BridgeResult<ActionReply> {
                unreachable!()
            }
            async fn rename_person(
                &self,
                _clustering_id: ClusteringId,
                _person_id: PersonId,
                _new_name: &str,
            ) -> BridgeResult<ActionReply> {
                unreachable!()
            }
            async fn set_primary_photo(
                &self,
                _person_name: &str,
                _face_id: FaceId,
            ) -> BridgeResult<ActionReply> {
                unreachable!()
            }
            async fn hide_photo(&self, _face_id: FaceId) -> BridgeResult<ActionReply> {
                unreachable!()
            }
            async fn unhide_photo(&self, _face_id: FaceId) -> BridgeResult<ActionReply> {
                unreachable!()
            }
            async fn remove_face_to_unmatched(
                &self,
                _clustering_id: ClusteringId,
                _face_id: FaceId,
            ) -> BridgeResult<()> {
                unreachable!()
            }
            async fn transfer_face_to_person(
                &self,
                _clustering_id: ClusteringId,
                _face_id: FaceId,
                _target_name: &str,
            ) -> BridgeResult<()> {
                unreachable!()
            }
            async fn get_named_people_for_transfer(
                &self,
                _clustering_id: ClusteringId,
            ) -> BridgeResult<TransferTargets> {
                unreachable!()
            }
        }

        let (sink, rx) = events::channel();
        let loader = PaginationLoader::new(Arc::new(Endless), sink, 100, 1000);
        loader.reset(PersonKey::new(1, 7));

        assert!(matches!(
            loader.load_next_page().await,
            PageOutcome::Failed(BridgeError::InvalidResponse(_))
        ));
        assert!(!loader.has_more());
        assert!(drain(&rx)
            .iter()
            .any(|e| matches!(e, ViewEvent::GridError(_))));
    }

    #[tokio::test]
    async fn test_first_page_failure_shows_error_and_stops() {
        let bridge = Arc::new(MemoryBridge::new());
        let key = alice(&bridge, 50);
        let (loader, rx) = loader_for(&bridge);
        loader.reset(key);
        bridge.set_failing("get_photos", true);

        assert!(matches!(loader.load_next_page().await, PageOutcome::Failed(_)));
        assert!(!loader.has_more());
        assert!(!loader.is_loading());
        assert!(drain(&rx)
            .iter()
            .any(|e| matches!(e, ViewEvent::GridError(_))));

        bridge.set_failing("get_photos", false);
        assert_eq!(
            loader.load_next_page().await,
            PageOutcome::Skipped(SkipReason::Exhausted)
        );
    }

    #[tokio::test]
    async fn test_later_page_failure_keeps_tiles() {
        let bridge = Arc::new(MemoryBridge::new());
        let key = alice(&bridge, 150);
        let (loader, rx) = loader_for(&bridge);
        loader.reset(key);
        loader.load_next_page().await;
        drain(&rx);

        bridge.set_failing("get_photos", true);
        assert!(matches!(loader.load_next_page().await, PageOutcome::Failed(_)));
        assert_eq!(loader.len(), 100);
        assert_eq!(
            drain(&rx),
            vec![ViewEvent::GridStatus(GridStatus::Stopped { loaded: 100 })]
        );
    }

    #[tokio::test]
    async fn test_aborted_fetch_does_not_wedge() {
        let bridge = Arc::new(MemoryBridge::new());
        let key = alice(&bridge, 20);
        let (loader, _rx) = loader_for(&bridge);
        loader.reset(key);
        bridge.hold_photos();

        let task = tokio::spawn({
            let loader = loader.clone();
            async move { loader.load_next_page().await }
        });
        tokio::task::yield_now().await;
        assert!(loader.is_loading());
        task.abort();
        let _ = task.await;

        assert!(!loader.is_loading());
        bridge.open_gate();
        assert_eq!(
            loader.load_next_page().await,
            PageOutcome::Appended { start: 0, count: 20 }
        );
    }

    #[test]
    fn test_status_labels() {
        let large = GridStatus::Loading {
            loaded: 1200,
            total: 5000,
            large: true,
        };
        assert_eq!(large.label(), "Loaded 1200 of 5000 photos. Scroll for more...");
        assert_eq!(GridStatus::Complete { total: 7 }.label(), "All 7 photos loaded");
    }

    #[tokio::test(start_paused = true)]
    async fn test_scroll_trigger_debounces() {
        let bridge = Arc::new(MemoryBridge::new());
        let key = alice(&bridge, 300);
        let (loader, _rx) = loader_for(&bridge);
        loader.reset(key);
        let mut trigger =
            ScrollTrigger::new(loader.clone(), 800.0, Duration::from_millis(100), None);

        for top in [0.0, 50.0, 100.0] {
            trigger.on_scroll(ScrollMetrics {
                scroll_top: top,
                viewport_height: 600.0,
                content_height: 1000.0,
            });
            tokio::time::sleep(Duration::from_millis(30)).await;
        }
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(bridge.calls("get_photos"), 1);
        assert_eq!(loader.len(), 100);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scroll_far_from_bottom_does_nothing() {
        let bridge = Arc::new(MemoryBridge::new());
        let key = alice(&bridge, 300);
        let (loader, _rx) = loader_for(&bridge);
        loader.reset(key);
        let mut trigger =
            ScrollTrigger::new(loader.clone(), 800.0, Duration::from_millis(100), None);

        trigger.on_scroll(ScrollMetrics {
            scroll_top: 0.0,
            viewport_height: 600.0,
            content_height: 5000.0,
        });
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(bridge.calls("get_photos"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_safety_poll_fills_short_grid() {
        let bridge = Arc::new(MemoryBridge::new());
        let key = alice(&bridge, 250);
        let (loader, _rx) = loader_for(&bridge);
        loader.reset(key);
        let mut trigger = ScrollTrigger::new(
            loader.clone(),
            800.0,
            Duration::from_millis(100),
            Some(Duration::from_secs(1)),
        );
        // Content never grows in this test, so the grid stays "near bottom".
        *trigger.metrics.lock() = Some(ScrollMetrics {
            scroll_top: 0.0,
            viewport_height: 900.0,
            content_height: 900.0,
        });
        trigger.start();
        assert!(trigger.is_polling());

        tokio::time::sleep(Duration::from_millis(5500)).await;
        assert_eq!(bridge.calls("get_photos"), 3);
        assert_eq!(loader.len(), 250);

        trigger.stop();
        assert!(!trigger.is_polling());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reported_layout_feeds_the_poll() {
        let bridge = Arc::new(MemoryBridge::new());
        let key = alice(&bridge, 250);
        let (loader, _rx) = loader_for(&bridge);
        loader.reset(key);
        let mut trigger = ScrollTrigger::new(
            loader.clone(),
            800.0,
            Duration::from_millis(100),
            Some(Duration::from_secs(1)),
        );
        trigger.start();
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(bridge.calls("get_photos"), 0);

        trigger.report_layout(ScrollMetrics {
            scroll_top: 0.0,
            viewport_height: 900.0,
            content_height: 900.0,
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(loader.len(), 100);

        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(loader.len(), 250);
        trigger.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleared_session_drops_scroll_fetch() {
        let bridge = Arc::new(MemoryBridge::new());
        let key = alice(&bridge, 250);
        let (loader, rx) = loader_for(&bridge);
        loader.reset(key);
        let mut trigger =
            ScrollTrigger::new(loader.clone(), 800.0, Duration::from_millis(100), None);
        bridge.hold_photos();

        trigger.on_scroll(ScrollMetrics {
            scroll_top: 0.0,
            viewport_height: 600.0,
            content_height: 700.0,
        });
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(loader.is_loading());

        trigger.stop();
        loader.clear();
        bridge.open_gate();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(loader.len(), 0);
        assert!(!drain(&rx)
            .iter()
            .any(|e| matches!(e, ViewEvent::TilesAppended { .. })));
    }
}
