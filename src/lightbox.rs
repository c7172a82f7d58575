//! Full-screen single photo viewer.
//!
//! The lightbox works on a snapshot of the grid taken when it opens; later
//! pages do not extend it. Each shown photo appears immediately with its
//! thumbnail, then a higher resolution preview is fetched in the background
//! and swapped in only if that photo is still on screen. A failed or empty
//! preview leaves the thumbnail in place.

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::bridge::SharedBridge;
use crate::events::{EventSink, ViewEvent};
use crate::models::{FaceId, Photo};
use crate::scheduler::TaskSlot;

#[derive(Debug, Clone)]
struct LightboxState {
    photos: Vec<Photo>,
    current: usize,
}

impl LightboxState {
    fn current_face(&self) -> Option<FaceId> {
        self.photos.get(self.current).map(|p| p.face_id)
    }
}

pub struct LightboxNavigator {
    bridge: SharedBridge,
    events: EventSink,
    state: Arc<Mutex<Option<LightboxState>>>,
    previews: Arc<Mutex<LruCache<PathBuf, String>>>,
    fetch: TaskSlot,
}

impl LightboxNavigator {
    pub fn new(bridge: SharedBridge, events: EventSink, cache_entries: usize) -> Self {
        let capacity = NonZeroUsize::new(cache_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            bridge,
            events,
            state: Arc::new(Mutex::new(None)),
            previews: Arc::new(Mutex::new(LruCache::new(capacity))),
            fetch: TaskSlot::new("lightbox-preview"),
        }
    }

    /// Show `photos[index]`. Returns false, leaving the lightbox closed, if
    /// the index is out of range.
    pub fn open(&mut self, photos: Vec<Photo>, index: usize) -> bool {
        if index >= photos.len() {
            debug!(index, len = photos.len(), "Lightbox index out of range");
            return false;
        }
        debug!(index, len = photos.len(), "Lightbox opened");
        *self.state.lock() = Some(LightboxState {
            photos,
            current: index,
        });
        self.show();
        true
    }

    /// Step forward. No-op at the last photo.
    pub fn next(&mut self) -> bool {
        self.step(1)
    }

    /// Step back. No-op at the first photo.
    pub fn prev(&mut self) -> bool {
        self.step(-1)
    }

    pub fn close(&mut self) -> bool {
        self.fetch.cancel();
        let was_open = self.state.lock().take().is_some();
        if was_open {
            debug!("Lightbox closed");
            self.events.emit(ViewEvent::LightboxClosed);
        }
        was_open
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().is_some()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.state.lock().as_ref().map(|s| s.current)
    }

    pub fn current_photo(&self) -> Option<Photo> {
        let state = self.state.lock();
        let state = state.as_ref()?;
        state.photos.get(state.current).cloned()
    }

    pub fn len(&self) -> usize {
        self.state.lock().as_ref().map_or(0, |s| s.photos.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn step(&mut self, delta: isize) -> bool {
        {
            let mut state = self.state.lock();
            let Some(state) = state.as_mut() else {
                return false;
            };
            let Some(target) = state.current.checked_add_signed(delta) else {
                return false;
            };
            if target >= state.photos.len() {
                return false;
            }
            state.current = target;
        }
        self.show();
        true
    }

    fn show(&mut self) {
        let Some((index, total, photo)) = self
            .state
            .lock()
            .as_ref()
            .and_then(|s| Some((s.current, s.photos.len(), s.photos.get(s.current)?.clone())))
        else {
            return;
        };

        let cached = self.previews.lock().get(&photo.path).cloned();
        let needs_fetch = cached.is_none();
        self.events.emit(ViewEvent::LightboxShown {
            index,
            total,
            image: cached.unwrap_or_else(|| photo.thumbnail.clone()),
            photo: photo.clone(),
            has_prev: index > 0,
            has_next: index + 1 < total,
        });

        if !needs_fetch {
            self.fetch.cancel();
            return;
        }

        let bridge = Arc::clone(&self.bridge);
        let events = self.events.clone();
        let state = Arc::clone(&self.state);
        let previews = Arc::clone(&self.previews);
        self.fetch.spawn(async move {
            let face_id = photo.face_id;
            let image = match bridge.get_full_size_preview(&photo.path).await {
                Ok(Some(image)) if !image.is_empty() => image,
                Ok(_) => {
                    debug!(face_id, "No preview available, keeping thumbnail");
                    return;
                }
                Err(err) => {
                    warn!(face_id, error = %err, "Preview fetch failed, keeping thumbnail");
                    return;
                }
            };
            previews.lock().put(photo.path.clone(), image.clone());

            let still_shown = state
                .lock()
                .as_ref()
                .and_then(LightboxState::current_face)
                == Some(face_id);
            if still_shown {
                events.emit(ViewEvent::LightboxPreview { face_id, image });
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::MemoryBridge;
    use crate::events::{self, drain};

    fn photos(n: i64) -> Vec<Photo> {
        (1..=n)
            .map(|i| Photo::new(i, format!("/p/{i}.jpg"), format!("thumb:{i}")))
            .collect()
    }

    fn navigator(bridge: &Arc<MemoryBridge>) -> (LightboxNavigator, flume::Receiver<ViewEvent>) {
        let (sink, rx) = events::channel();
        let shared: SharedBridge = bridge.clone();
        (LightboxNavigator::new(shared, sink, 8), rx)
    }

    #[tokio::test]
    async fn test_bounds_do_not_wrap() {
        let bridge = Arc::new(MemoryBridge::new());
        let (mut lightbox, _rx) = navigator(&bridge);

        assert!(!lightbox.open(photos(3), 3));
        assert!(!lightbox.is_open());

        assert!(lightbox.open(photos(3), 0));
        assert!(!lightbox.prev());
        assert_eq!(lightbox.current_index(), Some(0));
        assert!(lightbox.next());
        assert!(lightbox.next());
        assert!(!lightbox.next());
        assert_eq!(lightbox.current_index(), Some(2));
    }

    #[tokio::test]
    async fn test_affordances_follow_bounds() {
        let bridge = Arc::new(MemoryBridge::new());
        let (mut lightbox, rx) = navigator(&bridge);

        lightbox.open(photos(2), 0);
        lightbox.next();
        let shown: Vec<(bool, bool)> = drain(&rx)
            .into_iter()
            .filter_map(|e| match e {
                ViewEvent::LightboxShown {
                    has_prev, has_next, ..
                } => Some((has_prev, has_next)),
                _ => None,
            })
            .collect();
        assert_eq!(shown, vec![(false, true), (true, false)]);
    }

    #[tokio::test]
    async fn test_preview_replaces_thumbnail() {
        let bridge = Arc::new(MemoryBridge::new());
        bridge.set_preview("/p/1.jpg", "full:1");
        let (mut lightbox, rx) = navigator(&bridge);

        lightbox.open(photos(2), 0);
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;

        let events = drain(&rx);
        assert!(matches!(
            &events[0],
            ViewEvent::LightboxShown { image, .. } if image == "thumb:1"
        ));
        assert!(events.contains(&ViewEvent::LightboxPreview {
            face_id: 1,
            image: "full:1".into()
        }));

        // Coming back uses the cached preview without another fetch.
        lightbox.next();
        lightbox.prev();
        let calls = bridge.calls("get_full_size_preview");
        let events = drain(&rx);
        assert!(matches!(
            events.last(),
            Some(ViewEvent::LightboxShown { image, .. }) if image == "full:1"
        ));
        tokio::task::yield_now().await;
        assert_eq!(bridge.calls("get_full_size_preview"), calls);
    }

    #[tokio::test]
    async fn test_failed_preview_keeps_thumbnail() {
        let bridge = Arc::new(MemoryBridge::new());
        bridge.set_failing("get_full_size_preview", true);
        let (mut lightbox, rx) = navigator(&bridge);

        lightbox.open(photos(1), 0);
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;

        let events = drain(&rx);
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            ViewEvent::LightboxShown { image, .. } if image == "thumb:1"
        ));
        assert!(lightbox.is_open());
    }

    #[tokio::test]
    async fn test_close() {
        let bridge = Arc::new(MemoryBridge::new());
        let (mut lightbox, rx) = navigator(&bridge);
        lightbox.open(photos(2), 1);
        assert!(lightbox.close());
        assert!(!lightbox.close());
        assert!(!lightbox.next());
        assert_eq!(drain(&rx).last(), Some(&ViewEvent::LightboxClosed));
    }
}
