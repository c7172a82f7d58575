//! Multi-select state for the photo grid.
//!
//! Every membership change is mirrored to the view as a `TileSelected` or
//! `SelectionCleared` event, so a tile is marked selected exactly when its
//! face id is in the set.

use std::collections::HashSet;

use tracing::debug;

use crate::events::{EventSink, ViewEvent};
use crate::models::FaceId;

/// Modifier held during a grid click.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickModifier {
    None,
    /// Ctrl/Cmd: flip membership.
    Toggle,
    /// Shift: extend from the anchor.
    Range,
}

/// What a grid click did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickEffect {
    /// Nothing selected: the caller should open the lightbox here.
    OpenLightbox(usize),
    /// A plain click in bulk mode dropped the selection.
    SelectionCleared,
    Toggled { selected: bool },
    RangeSelected { added: usize },
    /// Range click without an anchor.
    Ignored,
}

#[derive(Debug)]
pub struct SelectionModel {
    members: HashSet<FaceId>,
    /// Selection order, used when acting on the set.
    order: Vec<FaceId>,
    anchor: Option<usize>,
    events: EventSink,
}

impl SelectionModel {
    pub fn new(events: EventSink) -> Self {
        Self {
            members: HashSet::new(),
            order: Vec::new(),
            anchor: None,
            events,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn contains(&self, face_id: FaceId) -> bool {
        self.members.contains(&face_id)
    }

    /// Selected ids in the order they were selected.
    pub fn ids(&self) -> Vec<FaceId> {
        self.order.clone()
    }

    /// Index of the last item added by a toggle, if any.
    pub fn anchor(&self) -> Option<usize> {
        self.anchor
    }

    /// Flip membership of `face_id`. Adding moves the anchor to `index`.
    pub fn toggle(&mut self, face_id: FaceId, index: usize) -> bool {
        let selected = if self.members.remove(&face_id) {
            self.order.retain(|id| *id != face_id);
            false
        } else {
            self.insert(face_id);
            self.anchor = Some(index);
            true
        };
        self.events
            .emit(ViewEvent::TileSelected { face_id, selected });
        selected
    }

    /// Add every item of `sequence` between `anchor` and `target` inclusive.
    /// Items outside the range stay selected. Returns how many were added.
    pub fn select_range(&mut self, anchor: usize, target: usize, sequence: &[FaceId]) -> usize {
        if sequence.is_empty() {
            return 0;
        }
        let last = sequence.len() - 1;
        let lo = anchor.min(target);
        if lo > last {
            return 0;
        }
        let hi = anchor.max(target).min(last);

        let mut added = 0;
        for &face_id in &sequence[lo..=hi] {
            if self.insert(face_id) {
                self.events.emit(ViewEvent::TileSelected {
                    face_id,
                    selected: true,
                });
                added += 1;
            }
        }
        debug!(lo, hi, added, "Range selected");
        added
    }

    /// Drop every member and the anchor. Returns the ids that were selected.
    pub fn clear(&mut self) -> Vec<FaceId> {
        self.anchor = None;
        if self.members.is_empty() {
            return Vec::new();
        }
        self.members.clear();
        let cleared = std::mem::take(&mut self.order);
        debug!(count = cleared.len(), "Selection cleared");
        self.events.emit(ViewEvent::SelectionCleared {
            face_ids: cleared.clone(),
        });
        cleared
    }

    /// Apply the grid click policy for the item at `index` of `sequence`.
    pub fn click(
        &mut self,
        face_id: FaceId,
        index: usize,
        modifier: ClickModifier,
        sequence: &[FaceId],
    ) -> ClickEffect {
        match modifier {
            ClickModifier::None if self.is_empty() => ClickEffect::OpenLightbox(index),
            ClickModifier::None => {
                self.clear();
                ClickEffect::SelectionCleared
            }
            ClickModifier::Toggle => ClickEffect::Toggled {
                selected: self.toggle(face_id, index),
            },
            ClickModifier::Range => match self.anchor {
                Some(anchor) => ClickEffect::RangeSelected {
                    added: self.select_range(anchor, index, sequence),
                },
                None => {
                    debug!(face_id, "Range click without anchor ignored");
                    ClickEffect::Ignored
                }
            },
        }
    }

    fn insert(&mut self, face_id: FaceId) -> bool {
        if self.members.insert(face_id) {
            self.order.push(face_id);
            true
        } else {
            false
        }
    }
}
