//! View events flowing from the controller to the renderer.
//!
//! The controller never touches widgets. It pushes `ViewEvent`s into an
//! unbounded flume channel and the front end drains them on its own loop,
//! keyed by `face_id` / `PersonKey` rather than by rendered text.

use flume::{Receiver, Sender};
use tracing::trace;

use crate::controller::{BulkReport, Prompt};
use crate::grid::GridStatus;
use crate::models::{FaceId, Person, PersonKey, Photo};
use crate::overlay::{MenuEntry, OverlayId, OverlayKind, Point};

#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    /// The visible roster changed (load, mutation, or settings change).
    PeopleChanged {
        people: Vec<Person>,
        active: Option<PersonKey>,
        letters: Vec<char>,
    },
    /// A person became the active one; the grid is about to reload.
    PersonActivated { key: PersonKey, title: String },
    /// The grid was emptied and a new session started.
    GridReset,
    /// Photos appended to the end of the grid, starting at absolute index `start`.
    TilesAppended { start: usize, photos: Vec<Photo> },
    /// Trailing status line under the grid.
    GridStatus(GridStatus),
    /// The person has no photos at all.
    GridEmpty,
    /// The first page failed; the grid shows an error instead of tiles.
    GridError(String),
    /// A tile's selected marker must follow the selection set.
    TileSelected { face_id: FaceId, selected: bool },
    /// Every listed tile lost its selected marker.
    SelectionCleared { face_ids: Vec<FaceId> },
    OverlayOpened {
        id: OverlayId,
        kind: OverlayKind,
        entries: Vec<MenuEntry>,
        position: Point,
    },
    OverlayClosed { id: OverlayId },
    /// The lightbox shows `photo` using `image` (thumbnail or cached preview).
    LightboxShown {
        index: usize,
        total: usize,
        photo: Photo,
        image: String,
        has_prev: bool,
        has_next: bool,
    },
    /// A higher resolution preview arrived for the photo still on screen.
    LightboxPreview { face_id: FaceId, image: String },
    LightboxClosed,
    /// An action needs input the controller had to fetch first.
    Prompt(Prompt),
    /// A photo operation over one or more faces finished.
    BulkFinished(BulkReport),
    /// One-line user-facing status message.
    Status(String),
}

/// Sending half of the view event channel. Cheap to clone.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: Sender<ViewEvent>,
}

impl EventSink {
    pub fn emit(&self, event: ViewEvent) {
        if self.tx.send(event).is_err() {
            trace!("View event dropped, receiver gone");
        }
    }

    pub fn status(&self, message: impl Into<String>) {
        self.emit(ViewEvent::Status(message.into()));
    }
}

/// Create a connected sink/receiver pair.
pub fn channel() -> (EventSink, Receiver<ViewEvent>) {
    let (tx, rx) = flume::unbounded();
    (EventSink { tx }, rx)
}

/// Collect every event currently queued (non-blocking).
pub fn drain(rx: &Receiver<ViewEvent>) -> Vec<ViewEvent> {
    rx.try_iter().collect()
}
