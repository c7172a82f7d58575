//! Transient floating overlays: per-person and per-photo context menus and
//! the sort menu.
//!
//! At most one overlay exists at a time. `open` always closes the current
//! one first. Hover intent is tracked with a single cancellable timer:
//! leaving the overlay or its trigger arms it, coming back disarms it.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::events::{EventSink, ViewEvent};
use crate::models::{FaceId, Person, PersonKey};
use crate::people::SortMode;
use crate::scheduler::TaskSlot;

const MENU_WIDTH: f32 = 220.0;
const MENU_ITEM_HEIGHT: f32 = 36.0;
const MENU_PADDING: f32 = 8.0;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// Screen rectangle in viewport coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }
}

/// Top-left corner for an overlay of `size` opened from `trigger`.
///
/// Default is just below the trigger with right edges aligned. Flips above
/// the trigger when it would run past the viewport bottom, left-aligns to
/// the trigger when it would run past the left edge, and finally clamps
/// against the right edge.
pub fn place_overlay(trigger: Rect, size: Size, viewport: Size, gap: f32, margin: f32) -> Point {
    let mut top = trigger.bottom() + gap;
    let mut left = trigger.right() - size.width;

    if top + size.height > viewport.height {
        top = trigger.y - size.height - gap;
    }
    if left < 0.0 {
        left = trigger.x;
    }
    if left + size.width > viewport.width {
        left = viewport.width - size.width - margin;
    }

    Point { x: left, y: top }
}

pub type OverlayId = u64;

/// What an overlay is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayKind {
    PersonMenu(PersonKey),
    PhotoMenu { face_id: FaceId },
    SortMenu,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    RenamePerson,
    HidePerson,
    UnhidePerson,
    UntagPerson,
    MakePrimary,
    HidePhotos,
    UnhidePhotos,
    RemoveTags,
    TransferPhotos,
    Sort(SortMode),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MenuEntry {
    pub action: MenuAction,
    pub label: String,
    pub enabled: bool,
    pub checked: bool,
}

impl MenuEntry {
    fn new(action: MenuAction, label: impl Into<String>) -> Self {
        Self {
            action,
            label: label.into(),
            enabled: true,
            checked: false,
        }
    }

    fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    fn checked(mut self, checked: bool) -> Self {
        self.checked = checked;
        self
    }
}

/// Overlay contents plus the size used for placement.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayContent {
    pub kind: OverlayKind,
    pub entries: Vec<MenuEntry>,
    pub size: Size,
}

impl OverlayContent {
    pub fn new(kind: OverlayKind, entries: Vec<MenuEntry>) -> Self {
        let height = entries.len() as f32 * MENU_ITEM_HEIGHT + MENU_PADDING * 2.0;
        Self {
            kind,
            entries,
            size: Size::new(MENU_WIDTH, height),
        }
    }

    /// Replace the estimated size with a measured one.
    pub fn with_size(mut self, size: Size) -> Self {
        self.size = size;
        self
    }

    pub fn entry(&self, action: MenuAction) -> Option<&MenuEntry> {
        self.entries.iter().find(|e| e.action == action)
    }
}

pub fn person_menu(person: &Person) -> OverlayContent {
    let visibility = if person.is_hidden {
        MenuEntry::new(MenuAction::UnhidePerson, "Unhide person")
    } else {
        MenuEntry::new(MenuAction::HidePerson, "Hide person")
    };
    OverlayContent::new(
        OverlayKind::PersonMenu(person.key()),
        vec![
            MenuEntry::new(MenuAction::RenamePerson, "Rename"),
            visibility,
            MenuEntry::new(MenuAction::UntagPerson, "Remove all tags").enabled(person.is_named()),
        ],
    )
}

/// Menu for a photo tile. With a non-empty selection the labels address the
/// whole selection instead of the clicked photo.
pub fn photo_menu(
    face_id: FaceId,
    photo_hidden: bool,
    selected: usize,
    person_named: bool,
) -> OverlayContent {
    let kind = OverlayKind::PhotoMenu { face_id };
    let entries = if selected == 0 {
        let visibility = if photo_hidden {
            MenuEntry::new(MenuAction::UnhidePhotos, "Unhide photo")
        } else {
            MenuEntry::new(MenuAction::HidePhotos, "Hide photo")
        };
        vec![
            MenuEntry::new(MenuAction::MakePrimary, "Make primary photo").enabled(person_named),
            visibility,
            MenuEntry::new(MenuAction::RemoveTags, "Remove tag"),
            MenuEntry::new(MenuAction::TransferPhotos, "Transfer tag to someone else"),
        ]
    } else {
        let noun = count_noun(selected);
        vec![
            MenuEntry::new(MenuAction::HidePhotos, format!("Hide {noun}")),
            MenuEntry::new(MenuAction::UnhidePhotos, format!("Unhide {noun}")),
            MenuEntry::new(MenuAction::RemoveTags, format!("Remove tag from {noun}")),
            MenuEntry::new(
                MenuAction::TransferPhotos,
                format!("Transfer {noun} to someone else"),
            ),
        ]
    };
    OverlayContent::new(kind, entries)
}

pub fn sort_menu(current: SortMode) -> OverlayContent {
    let entries = SortMode::ALL
        .into_iter()
        .map(|mode| MenuEntry::new(MenuAction::Sort(mode), mode.label()).checked(mode == current))
        .collect();
    OverlayContent::new(OverlayKind::SortMenu, entries)
}

fn count_noun(count: usize) -> String {
    if count == 1 {
        "1 photo".to_string()
    } else {
        format!("{count} photos")
    }
}

/// What a pointer press landed on, as reported by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerTarget {
    /// Inside the open overlay.
    Overlay,
    /// On the kebab button that opened it.
    Trigger,
    /// On the sort menu button.
    SortTrigger,
    Elsewhere,
}

#[derive(Debug, Clone)]
struct ActiveOverlay {
    id: OverlayId,
    content: OverlayContent,
    trigger: Rect,
    position: Point,
}

pub struct OverlayManager {
    active: Arc<Mutex<Option<ActiveOverlay>>>,
    next_id: OverlayId,
    hover_close: TaskSlot,
    events: EventSink,
    viewport: Size,
    gap: f32,
    margin: f32,
    hover_delay: Duration,
}

impl OverlayManager {
    pub fn new(events: EventSink, gap: f32, margin: f32, hover_delay: Duration) -> Self {
        Self {
            active: Arc::new(Mutex::new(None)),
            next_id: 0,
            hover_close: TaskSlot::new("overlay-hover-close"),
            events,
            viewport: Size::new(1200.0, 800.0),
            gap,
            margin,
            hover_delay,
        }
    }

    pub fn set_viewport(&mut self, viewport: Size) {
        self.viewport = viewport;
    }

    /// Close whatever is open, then show `content` next to `trigger`.
    pub fn open(&mut self, content: OverlayContent, trigger: Rect) -> OverlayId {
        self.close();

        self.next_id += 1;
        let id = self.next_id;
        let position = place_overlay(trigger, content.size, self.viewport, self.gap, self.margin);
        debug!(id, kind = ?content.kind, x = position.x, y = position.y, "Overlay opened");

        self.events.emit(ViewEvent::OverlayOpened {
            id,
            kind: content.kind,
            entries: content.entries.clone(),
            position,
        });
        *self.active.lock() = Some(ActiveOverlay {
            id,
            content,
            trigger,
            position,
        });
        id
    }

    /// Close the open overlay and disarm the hover timer.
    pub fn close(&mut self) -> Option<OverlayId> {
        self.hover_close.cancel();
        let closed = self.active.lock().take()?;
        debug!(id = closed.id, "Overlay closed");
        self.events.emit(ViewEvent::OverlayClosed { id: closed.id });
        Some(closed.id)
    }

    /// Outside-click dismissal. A click on the sort trigger leaves the
    /// overlay alone while a bulk selection is active.
    pub fn on_pointer_down(&mut self, target: PointerTarget, bulk_active: bool) -> bool {
        if !self.is_open() {
            return false;
        }
        let keep = match target {
            PointerTarget::Overlay | PointerTarget::Trigger => true,
            PointerTarget::SortTrigger => bulk_active,
            PointerTarget::Elsewhere => false,
        };
        if keep {
            trace!(?target, "Pointer press kept overlay open");
            return false;
        }
        self.close().is_some()
    }

    /// Pointer left the overlay or its trigger: close after the hover delay
    /// unless it comes back.
    pub fn on_pointer_leave(&mut self) {
        let Some(id) = self.active_id() else {
            return;
        };
        let active = Arc::clone(&self.active);
        let events = self.events.clone();
        self.hover_close.schedule_after(self.hover_delay, async move {
            let mut slot = active.lock();
            if slot.as_ref().is_some_and(|o| o.id == id) {
                *slot = None;
                drop(slot);
                debug!(id, "Overlay closed on hover exit");
                events.emit(ViewEvent::OverlayClosed { id });
            }
        });
    }

    /// Pointer is back over the overlay or its trigger.
    pub fn on_pointer_enter(&mut self) {
        if self.hover_close.cancel() {
            trace!("Hover close disarmed");
        }
    }

    pub fn is_open(&self) -> bool {
        self.active.lock().is_some()
    }

    pub fn active_id(&self) -> Option<OverlayId> {
        self.active.lock().as_ref().map(|o| o.id)
    }

    pub fn active_kind(&self) -> Option<OverlayKind> {
        self.active.lock().as_ref().map(|o| o.content.kind)
    }

    pub fn active_content(&self) -> Option<OverlayContent> {
        self.active.lock().as_ref().map(|o| o.content.clone())
    }

    pub fn position(&self) -> Option<Point> {
        self.active.lock().as_ref().map(|o| o.position)
    }

    pub fn trigger(&self) -> Option<Rect> {
        self.active.lock().as_ref().map(|o| o.trigger)
    }

    pub fn hover_close_pending(&self) -> bool {
        self.hover_close.is_pending()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{self, drain};

    const VIEWPORT: Size = Size {
        width: 1000.0,
        height: 700.0,
    };

    fn manager() -> (OverlayManager, flume::Receiver<ViewEvent>) {
        let (sink, rx) = events::channel();
        let mut manager = OverlayManager::new(sink, 4.0, 8.0, Duration::from_millis(200));
        manager.set_viewport(VIEWPORT);
        (manager, rx)
    }

    fn open_count(events: &[ViewEvent]) -> i32 {
        events.iter().fold(0, |open, e| match e {
            ViewEvent::OverlayOpened { .. } => open + 1,
            ViewEvent::OverlayClosed { .. } => open - 1,
            _ => open,
        })
    }

    #[test]
    fn test_placement_below_right_aligned() {
        let trigger = Rect::new(500.0, 100.0, 24.0, 24.0);
        let pos = place_overlay(trigger, Size::new(200.0, 150.0), VIEWPORT, 4.0, 8.0);
        assert_eq!(pos, Point { x: 324.0, y: 128.0 });
    }

    #[test]
    fn test_placement_flips_above_near_bottom() {
        let trigger = Rect::new(500.0, 600.0, 24.0, 24.0);
        let pos = place_overlay(trigger, Size::new(200.0, 150.0), VIEWPORT, 4.0, 8.0);
        assert_eq!(pos.y, 446.0);
    }

    #[test]
    fn test_placement_left_aligns_then_clamps() {
        let trigger = Rect::new(10.0, 100.0, 24.0, 24.0);
        let pos = place_overlay(trigger, Size::new(200.0, 150.0), VIEWPORT, 4.0, 8.0);
        assert_eq!(pos.x, 10.0);

        let narrow = Size::new(150.0, 700.0);
        let pos = place_overlay(trigger, Size::new(200.0, 150.0), narrow, 4.0, 8.0);
        assert_eq!(pos.x, -58.0);
    }

    #[test]
    fn test_open_closes_previous() {
        let (mut manager, rx) = manager();
        let trigger = Rect::new(500.0, 100.0, 24.0, 24.0);
        let first = manager.open(sort_menu(SortMode::NamesAsc), trigger);
        let second = manager.open(sort_menu(SortMode::NamesDesc), trigger);
        let third = manager.open(sort_menu(SortMode::PhotosAsc), trigger);
        assert!(first < second && second < third);
        assert_eq!(manager.active_id(), Some(third));

        let events = drain(&rx);
        assert_eq!(open_count(&events), 1);
        assert!(events.contains(&ViewEvent::OverlayClosed { id: first }));
        assert!(events.contains(&ViewEvent::OverlayClosed { id: second }));
    }

    #[test]
    fn test_outside_click_dismissal() {
        let (mut manager, _rx) = manager();
        let trigger = Rect::new(500.0, 100.0, 24.0, 24.0);
        manager.open(sort_menu(SortMode::NamesAsc), trigger);

        assert!(!manager.on_pointer_down(PointerTarget::Overlay, false));
        assert!(!manager.on_pointer_down(PointerTarget::SortTrigger, true));
        assert!(manager.is_open());
        assert!(manager.on_pointer_down(PointerTarget::SortTrigger, false));
        assert!(!manager.is_open());

        manager.open(sort_menu(SortMode::NamesAsc), trigger);
        assert!(manager.on_pointer_down(PointerTarget::Elsewhere, true));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hover_exit_closes_after_delay() {
        let (mut manager, rx) = manager();
        let id = manager.open(sort_menu(SortMode::NamesAsc), Rect::new(0.0, 0.0, 10.0, 10.0));

        manager.on_pointer_leave();
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(manager.is_open());
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!manager.is_open());
        assert!(drain(&rx).contains(&ViewEvent::OverlayClosed { id }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hover_return_cancels_close() {
        let (mut manager, _rx) = manager();
        manager.open(sort_menu(SortMode::NamesAsc), Rect::new(0.0, 0.0, 10.0, 10.0));

        manager.on_pointer_leave();
        tokio::time::sleep(Duration::from_millis(120)).await;
        manager.on_pointer_enter();
        assert!(!manager.hover_close_pending());
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(manager.is_open());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_hover_timer_spares_newer_overlay() {
        let (mut manager, _rx) = manager();
        let trigger = Rect::new(0.0, 0.0, 10.0, 10.0);
        manager.open(sort_menu(SortMode::NamesAsc), trigger);
        manager.on_pointer_leave();
        // Opening closes first, which disarms the timer.
        let second = manager.open(sort_menu(SortMode::NamesAsc), trigger);
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(manager.active_id(), Some(second));
    }

    #[test]
    fn test_photo_menu_labels() {
        let single = photo_menu(9, false, 0, true);
        assert_eq!(single.entry(MenuAction::HidePhotos).unwrap().label, "Hide photo");
        assert!(single.entry(MenuAction::MakePrimary).unwrap().enabled);
        assert!(single.entry(MenuAction::UnhidePhotos).is_none());

        let hidden = photo_menu(9, true, 0, false);
        assert!(hidden.entry(MenuAction::UnhidePhotos).is_some());
        assert!(!hidden.entry(MenuAction::MakePrimary).unwrap().enabled);

        let bulk = photo_menu(9, false, 3, true);
        assert_eq!(bulk.entry(MenuAction::HidePhotos).unwrap().label, "Hide 3 photos");
        assert!(bulk.entry(MenuAction::MakePrimary).is_none());
    }

    #[test]
    fn test_person_and_sort_menus() {
        let mut person = Person::new(1, 2, "Alice");
        assert!(person_menu(&person).entry(MenuAction::HidePerson).is_some());
        person.is_hidden = true;
        assert!(person_menu(&person).entry(MenuAction::UnhidePerson).is_some());

        let sort = sort_menu(SortMode::PhotosDesc);
        let checked: Vec<_> = sort.entries.iter().filter(|e| e.checked).collect();
        assert_eq!(checked.len(), 1);
        assert_eq!(checked[0].action, MenuAction::Sort(SortMode::PhotosDesc));
    }
}
