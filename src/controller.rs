//! Presentation-state controller for the people list and photo grid.
//!
//! `PhotoTagController` owns one instance of each component and routes
//! renderer input to them:
//! - selecting a person resets pagination and selection, then loads page 1
//! - grid clicks go through the selection model or open the lightbox
//! - kebab buttons open context menus whose labels depend on the selection
//! - menu actions call the bridge, then refetch what they changed
//!
//! Entry points never wait on the bridge. Requests run as spawned tasks and
//! report back over a completion channel, which the host drains from its
//! loop with `pump` (or `settle`, to wait until nothing is outstanding).
//! Input keeps flowing while requests are in flight; page results from a
//! session that has since been replaced are dropped by the loader.
//!
//! Bridge failures never escape as panics; they are logged and pushed to the
//! view as status messages.

use std::future::Future;

use flume::{Receiver, Sender};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::bridge::{BridgeResult, SharedBridge};
use crate::config::ControllerConfig;
use crate::error::{BridgeError, ControllerError, Result};
use crate::events::{self, EventSink, ViewEvent};
use crate::grid::{
    ClickEffect, ClickModifier, PageOutcome, PaginationLoader, ScrollMetrics, ScrollTrigger,
    SelectionModel,
};
use crate::lightbox::LightboxNavigator;
use crate::models::{ActionReply, FaceId, NamedPerson, Person, PersonKey, TransferTargets};
use crate::overlay::{
    person_menu, photo_menu, sort_menu, MenuAction, OverlayId, OverlayKind, OverlayManager,
    PointerTarget, Rect, Size,
};
use crate::people::{ListSettings, PeopleListModel, SortMode};

/// The item a context menu was opened for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuContext {
    Person(PersonKey),
    Photo(FaceId),
}

/// Input the renderer must collect before an action can finish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompt {
    Rename { key: PersonKey, current: String },
    Transfer { targets: Vec<NamedPerson> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// Nothing further happens.
    Done,
    NeedsInput(Prompt),
    /// A request went out; its result arrives as view events.
    Started,
    SortChanged(SortMode),
}

/// Result of running one photo operation over several faces.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkReport {
    pub succeeded: Vec<FaceId>,
    pub failed: Vec<(FaceId, String)>,
}

impl BulkReport {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// The aggregated failure, if any face failed.
    pub fn error(&self) -> Option<ControllerError> {
        (!self.failed.is_empty()).then(|| ControllerError::BulkPartial {
            failed: self.failed.len(),
            total: self.total(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PhotoOp {
    Hide,
    Unhide,
    Remove,
    Transfer(String),
}

impl PhotoOp {
    fn verb(&self) -> &'static str {
        match self {
            PhotoOp::Hide => "Hid",
            PhotoOp::Unhide => "Unhid",
            PhotoOp::Remove => "Removed tag from",
            PhotoOp::Transfer(_) => "Transferred",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PersonOp {
    Hide,
    Unhide,
    Untag,
}

impl PersonOp {
    fn label(self) -> &'static str {
        match self {
            PersonOp::Hide => "hide person",
            PersonOp::Unhide => "unhide person",
            PersonOp::Untag => "remove tags",
        }
    }
}

/// A bridge request that finished and waits to be applied.
#[derive(Debug)]
enum Completion {
    Roster {
        seq: u64,
        result: BridgeResult<Vec<Person>>,
    },
    Page(PageOutcome),
    Opened {
        face_id: FaceId,
        result: BridgeResult<()>,
    },
    Renamed {
        key: PersonKey,
        name: String,
        reply: BridgeResult<ActionReply>,
    },
    PersonUpdated {
        key: PersonKey,
        op: PersonOp,
        reply: BridgeResult<ActionReply>,
    },
    PrimarySet {
        reply: BridgeResult<ActionReply>,
    },
    TransferTargets {
        exclude: Option<String>,
        reply: BridgeResult<TransferTargets>,
    },
    PhotoOp {
        op: PhotoOp,
        person: PersonKey,
        session: u64,
        report: BulkReport,
    },
}

pub struct PhotoTagController {
    bridge: SharedBridge,
    events: EventSink,
    people: PeopleListModel,
    active: Option<PersonKey>,
    loader: PaginationLoader,
    scroll: ScrollTrigger,
    selection: SelectionModel,
    overlays: OverlayManager,
    lightbox: LightboxNavigator,
    menu_context: Option<MenuContext>,
    done_tx: Sender<Completion>,
    done_rx: Receiver<Completion>,
    tasks: Vec<JoinHandle<()>>,
    /// Requests started whose completion has not been applied yet.
    pending: usize,
    roster_seq: u64,
    roster_applied: u64,
}

impl PhotoTagController {
    /// Build a controller and the receiving end of its view events.
    pub fn new(
        bridge: SharedBridge,
        config: ControllerConfig,
        settings: ListSettings,
    ) -> (Self, Receiver<ViewEvent>) {
        let (events, rx) = events::channel();
        let (done_tx, done_rx) = flume::unbounded();
        let loader = PaginationLoader::new(
            bridge.clone(),
            events.clone(),
            config.page_size,
            config.large_count_threshold,
        );
        let scroll = ScrollTrigger::new(
            loader.clone(),
            config.scroll_threshold_px,
            config.scroll_debounce,
            config.safety_poll,
        );
        let controller = Self {
            people: PeopleListModel::new(settings),
            active: None,
            selection: SelectionModel::new(events.clone()),
            overlays: OverlayManager::new(
                events.clone(),
                config.menu_gap_px,
                config.viewport_margin_px,
                config.hover_close_delay,
            ),
            lightbox: LightboxNavigator::new(
                bridge.clone(),
                events.clone(),
                config.preview_cache_entries,
            ),
            loader,
            scroll,
            bridge,
            events,
            menu_context: None,
            done_tx,
            done_rx,
            tasks: Vec::new(),
            pending: 0,
            roster_seq: 0,
            roster_applied: 0,
        };
        (controller, rx)
    }

    /// Start background timers. Needs a running tokio runtime.
    pub fn start(&mut self) {
        self.scroll.start();
    }

    /// Cancel every timer and request, end the grid session and dismiss
    /// transient UI. Nothing reaches the view afterwards.
    pub fn shutdown(&mut self) {
        self.scroll.stop();
        self.loader.clear();
        for task in self.tasks.drain(..) {
            task.abort();
        }
        let dropped = self.done_rx.try_iter().count();
        self.pending = 0;
        self.overlays.close();
        self.lightbox.close();
        info!(dropped, "Controller shut down");
    }

    pub fn people(&self) -> &PeopleListModel {
        &self.people
    }

    pub fn active_person(&self) -> Option<PersonKey> {
        self.active
    }

    pub fn loader(&self) -> &PaginationLoader {
        &self.loader
    }

    pub fn selection(&self) -> &SelectionModel {
        &self.selection
    }

    pub fn overlays(&self) -> &OverlayManager {
        &self.overlays
    }

    pub fn lightbox(&self) -> &LightboxNavigator {
        &self.lightbox
    }

    // =========================================================================
    // Request plumbing
    // =========================================================================

    /// Apply every finished request without waiting. Meant for the host's
    /// loop tick; returns how many were applied.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(done) = self.done_rx.try_recv() {
            self.apply(done);
            applied += 1;
        }
        applied
    }

    /// Wait until no request is outstanding, applying each one as it
    /// finishes. Follow-up requests started while applying are waited for too.
    pub async fn settle(&mut self) {
        while self.pending > 0 {
            match self.done_rx.recv_async().await {
                Ok(done) => self.apply(done),
                Err(_) => break,
            }
        }
    }

    /// Whether any request is still outstanding.
    pub fn is_busy(&self) -> bool {
        self.pending > 0
    }

    fn run<F>(&mut self, request: F)
    where
        F: Future<Output = Completion> + Send + 'static,
    {
        let done = self.done_tx.clone();
        self.tasks.retain(|task| !task.is_finished());
        self.tasks.push(tokio::spawn(async move {
            if done.send(request.await).is_err() {
                trace!("Completion dropped, controller gone");
            }
        }));
        self.pending += 1;
    }

    fn apply(&mut self, done: Completion) {
        self.pending = self.pending.saturating_sub(1);
        match done {
            Completion::Roster { seq, result } => self.roster_loaded(seq, result),
            Completion::Page(outcome) => trace!(?outcome, "Page request finished"),
            Completion::Opened { face_id, result } => {
                if let Err(err) = result {
                    warn!(face_id, error = %err, "Failed to open photo");
                    self.events.status("Could not open photo");
                }
            }
            Completion::Renamed { key, name, reply } => self.renamed(key, &name, reply),
            Completion::PersonUpdated { key, op, reply } => self.person_updated(key, op, reply),
            Completion::PrimarySet { reply } => {
                let Ok(reply) = self.check_reply("set primary photo", reply) else {
                    return;
                };
                self.events.status(
                    reply
                        .message
                        .unwrap_or_else(|| "Primary photo set".to_string()),
                );
                self.load_people();
            }
            Completion::TransferTargets { exclude, reply } => {
                self.transfer_targets_loaded(exclude, reply)
            }
            Completion::PhotoOp {
                op,
                person,
                session,
                report,
            } => self.photo_op_finished(op, person, session, report),
        }
    }

    // =========================================================================
    // People list
    // =========================================================================

    /// Fetch the roster and replace it wholesale once it arrives.
    ///
    /// If the active person is gone the grid is cleared; if nobody is active
    /// afterwards the default person is selected.
    pub fn load_people(&mut self) {
        self.roster_seq += 1;
        let seq = self.roster_seq;
        let bridge = self.bridge.clone();
        self.run(async move {
            Completion::Roster {
                seq,
                result: bridge.get_people().await,
            }
        });
    }

    fn roster_loaded(&mut self, seq: u64, result: BridgeResult<Vec<Person>>) {
        if seq <= self.roster_applied {
            debug!(seq, applied = self.roster_applied, "Discarding an older roster");
            return;
        }
        self.roster_applied = seq;
        let roster = match result {
            Ok(roster) => roster,
            Err(err) => {
                warn!(error = %err, "Failed to load people");
                self.events.status("Error loading people");
                return;
            }
        };
        debug!(count = roster.len(), "Roster loaded");
        self.people.set_roster(roster);

        if let Some(active) = self.active {
            if self.people.find(active).is_none() {
                debug!(?active, "Active person no longer listed");
                self.deactivate();
            }
        }
        self.publish_people();

        if self.active.is_none() {
            if let Some(key) = self.people.default_selection() {
                self.select_person(key);
            }
        }
    }

    pub fn apply_list_settings(&mut self, settings: ListSettings) {
        self.people.set_settings(settings);
        self.publish_people();
    }

    pub fn set_sort_mode(&mut self, mode: SortMode) {
        self.people.set_sort_mode(mode);
        self.publish_people();
    }

    /// Position in the visible list of the first person under `letter`.
    pub fn jump_to_letter(&self, letter: char) -> Option<usize> {
        self.people.position_of_letter(letter)
    }

    fn publish_people(&self) {
        self.events.emit(ViewEvent::PeopleChanged {
            people: self.people.visible().into_iter().cloned().collect(),
            active: self.active,
            letters: self.people.alphabet_index(),
        });
    }

    // =========================================================================
    // Grid session
    // =========================================================================

    /// Make `key` the active person and start loading its first page.
    pub fn select_person(&mut self, key: PersonKey) {
        let title = match self.people.find(key) {
            Some(person) => format!("{}'s Photos", person.clean_name()),
            None => "Photos".to_string(),
        };
        info!(person = ?key, "Selecting person");

        self.active = Some(key);
        self.end_session();
        self.loader.reset(key);
        self.events.emit(ViewEvent::PersonActivated { key, title });
        self.events.emit(ViewEvent::GridReset);
        self.publish_people();

        self.load_more();
    }

    /// Start a fresh session for the active person.
    pub fn reload_current_photos(&mut self) -> bool {
        let Some(key) = self.active else {
            return false;
        };
        self.select_person(key);
        true
    }

    /// Explicitly request the next page.
    pub fn load_more(&mut self) {
        let loader = self.loader.clone();
        self.run(async move { Completion::Page(loader.load_next_page().await) });
    }

    pub fn on_scroll(&mut self, metrics: ScrollMetrics) {
        self.scroll.on_scroll(metrics);
    }

    /// Geometry after the renderer laid out tiles without a scroll event,
    /// e.g. right after a new session's first page.
    pub fn report_layout(&mut self, metrics: ScrollMetrics) {
        self.scroll.report_layout(metrics);
    }

    fn deactivate(&mut self) {
        self.active = None;
        self.end_session();
        self.loader.clear();
        self.events.emit(ViewEvent::GridReset);
    }

    fn end_session(&mut self) {
        self.overlays.close();
        self.lightbox.close();
        self.selection.clear();
        self.scroll.forget_metrics();
        self.menu_context = None;
    }

    // =========================================================================
    // Grid pointer input
    // =========================================================================

    /// Single click on a tile.
    pub fn click_photo(&mut self, face_id: FaceId, modifier: ClickModifier) -> ClickEffect {
        let Some(index) = self.loader.index_of(face_id) else {
            debug!(face_id, "Click on a photo outside the current session");
            return ClickEffect::Ignored;
        };
        let sequence = match modifier {
            ClickModifier::Range => self.loader.face_ids(),
            _ => Vec::new(),
        };
        let effect = self.selection.click(face_id, index, modifier, &sequence);
        if let ClickEffect::OpenLightbox(index) = effect {
            self.lightbox.open(self.loader.snapshot(), index);
        }
        effect
    }

    /// Double click on a tile: open the source image externally.
    pub fn activate_photo(&mut self, face_id: FaceId) -> Result<()> {
        let photo = self.loader.photo(face_id).ok_or(ControllerError::NoTarget)?;
        let bridge = self.bridge.clone();
        self.run(async move {
            Completion::Opened {
                face_id,
                result: bridge.open_photo(&photo.path).await,
            }
        });
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Escape closes the lightbox, else the open overlay, else the selection.
    pub fn press_escape(&mut self) -> bool {
        if self.lightbox.close() {
            return true;
        }
        if self.overlays.close().is_some() {
            return true;
        }
        !self.selection.clear().is_empty()
    }

    pub fn lightbox_next(&mut self) -> bool {
        self.lightbox.next()
    }

    pub fn lightbox_prev(&mut self) -> bool {
        self.lightbox.prev()
    }

    pub fn lightbox_close(&mut self) -> bool {
        self.lightbox.close()
    }

    // =========================================================================
    // Overlays
    // =========================================================================

    pub fn set_viewport(&mut self, viewport: Size) {
        self.overlays.set_viewport(viewport);
    }

    pub fn open_person_menu(&mut self, key: PersonKey, trigger: Rect) -> Option<OverlayId> {
        let content = person_menu(self.people.find(key)?);
        self.menu_context = Some(MenuContext::Person(key));
        Some(self.overlays.open(content, trigger))
    }

    pub fn open_photo_menu(&mut self, face_id: FaceId, trigger: Rect) -> Option<OverlayId> {
        let photo = self.loader.photo(face_id)?;
        let named = self.active_person_record().is_some_and(Person::is_named);
        let content = photo_menu(face_id, photo.is_hidden, self.selection.len(), named);
        self.menu_context = Some(MenuContext::Photo(face_id));
        Some(self.overlays.open(content, trigger))
    }

    /// Toggle the sort menu.
    pub fn open_sort_menu(&mut self, trigger: Rect) -> Option<OverlayId> {
        if self.overlays.active_kind() == Some(OverlayKind::SortMenu) {
            self.overlays.close();
            return None;
        }
        let content = sort_menu(self.people.settings().sort_mode);
        Some(self.overlays.open(content, trigger))
    }

    /// A pointer press anywhere; closes the overlay if it landed outside.
    pub fn pointer_down(&mut self, target: PointerTarget) -> bool {
        self.overlays
            .on_pointer_down(target, !self.selection.is_empty())
    }

    pub fn pointer_left_overlay(&mut self) {
        self.overlays.on_pointer_leave();
    }

    pub fn pointer_entered_overlay(&mut self) {
        self.overlays.on_pointer_enter();
    }

    // =========================================================================
    // Actions
    // =========================================================================

    /// Run an entry of the open overlay. Actions the open overlay does not
    /// offer, or offers disabled, do nothing.
    pub fn choose(&mut self, action: MenuAction) -> Result<ActionOutcome> {
        let Some(content) = self.overlays.active_content() else {
            debug!(?action, "No menu open, ignoring action");
            return Ok(ActionOutcome::Done);
        };
        match content.entry(action) {
            None => {
                debug!(?action, kind = ?content.kind, "Action not offered by the open menu");
                return Ok(ActionOutcome::Done);
            }
            Some(entry) if !entry.enabled => {
                debug!(?action, "Ignoring disabled menu entry");
                return Ok(ActionOutcome::Done);
            }
            Some(_) => {}
        }
        self.overlays.close();

        match action {
            MenuAction::RenamePerson => {
                let key = self.person_context()?;
                let current = self
                    .people
                    .find(key)
                    .map(|p| p.clean_name().to_string())
                    .unwrap_or_default();
                Ok(ActionOutcome::NeedsInput(Prompt::Rename { key, current }))
            }
            MenuAction::HidePerson => {
                let key = self.person_context()?;
                self.hide_person(key);
                Ok(ActionOutcome::Started)
            }
            MenuAction::UnhidePerson => {
                let key = self.person_context()?;
                self.unhide_person(key);
                Ok(ActionOutcome::Started)
            }
            MenuAction::UntagPerson => {
                let key = self.person_context()?;
                self.untag_person(key);
                Ok(ActionOutcome::Started)
            }
            MenuAction::MakePrimary => {
                let face_id = match self.menu_context {
                    Some(MenuContext::Photo(face_id)) => face_id,
                    _ => return Err(ControllerError::NoTarget),
                };
                self.make_primary(face_id)?;
                Ok(ActionOutcome::Started)
            }
            MenuAction::HidePhotos => self.hide_photos().map(|()| ActionOutcome::Started),
            MenuAction::UnhidePhotos => self.unhide_photos().map(|()| ActionOutcome::Started),
            MenuAction::RemoveTags => self.remove_tags().map(|()| ActionOutcome::Started),
            MenuAction::TransferPhotos => {
                self.transfer_targets()?;
                Ok(ActionOutcome::Started)
            }
            MenuAction::Sort(mode) => {
                self.set_sort_mode(mode);
                Ok(ActionOutcome::SortChanged(mode))
            }
        }
    }

    /// Rename a person. Blank names are rejected before reaching the bridge.
    pub fn rename_person(&mut self, key: PersonKey, name: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            self.events.status("Name cannot be empty");
            return Err(ControllerError::EmptyName);
        }

        let name = name.to_string();
        let bridge = self.bridge.clone();
        self.run(async move {
            let reply = bridge
                .rename_person(key.clustering_id, key.person_id, &name)
                .await;
            Completion::Renamed { key, name, reply }
        });
        Ok(())
    }

    fn renamed(&mut self, key: PersonKey, name: &str, reply: BridgeResult<ActionReply>) {
        let Ok(reply) = self.check_reply("rename person", reply) else {
            return;
        };
        let tagged = reply.faces_tagged.unwrap_or(0);
        info!(person = ?key, name, tagged, "Person renamed");
        self.events
            .status(format!("Renamed to {name} ({tagged} faces tagged)"));
        self.load_people();
    }

    pub fn hide_person(&mut self, key: PersonKey) {
        self.person_action(key, PersonOp::Hide);
    }

    pub fn unhide_person(&mut self, key: PersonKey) {
        self.person_action(key, PersonOp::Unhide);
    }

    pub fn untag_person(&mut self, key: PersonKey) {
        self.person_action(key, PersonOp::Untag);
    }

    fn person_action(&mut self, key: PersonKey, op: PersonOp) {
        let bridge = self.bridge.clone();
        self.run(async move {
            let (clustering_id, person_id) = (key.clustering_id, key.person_id);
            let reply = match op {
                PersonOp::Hide => bridge.hide_person(clustering_id, person_id).await,
                PersonOp::Unhide => bridge.unhide_person(clustering_id, person_id).await,
                PersonOp::Untag => bridge.untag_person(clustering_id, person_id).await,
            };
            Completion::PersonUpdated { key, op, reply }
        });
    }

    fn person_updated(&mut self, key: PersonKey, op: PersonOp, reply: BridgeResult<ActionReply>) {
        let Ok(reply) = self.check_reply(op.label(), reply) else {
            return;
        };
        let message = match op {
            PersonOp::Hide => "Person hidden".to_string(),
            PersonOp::Unhide => "Person unhidden".to_string(),
            PersonOp::Untag => format!("Removed {} tags", reply.faces_untagged.unwrap_or(0)),
        };
        info!(person = ?key, ?op, "Person updated");
        self.events.status(message);
        self.load_people();
    }

    /// Use `face_id` as the avatar of the active (named) person.
    pub fn make_primary(&mut self, face_id: FaceId) -> Result<()> {
        let person = self
            .active_person_record()
            .ok_or(ControllerError::NoActivePerson)?;
        if !person.is_named() {
            self.events
                .status("Please name this person before setting a primary photo");
            return Err(ControllerError::UnnamedPerson);
        }

        let name = person.clean_name().to_string();
        let bridge = self.bridge.clone();
        self.run(async move {
            Completion::PrimarySet {
                reply: bridge.set_primary_photo(&name, face_id).await,
            }
        });
        Ok(())
    }

    pub fn hide_photos(&mut self) -> Result<()> {
        self.run_photo_op(PhotoOp::Hide)
    }

    pub fn unhide_photos(&mut self) -> Result<()> {
        self.run_photo_op(PhotoOp::Unhide)
    }

    pub fn remove_tags(&mut self) -> Result<()> {
        self.run_photo_op(PhotoOp::Remove)
    }

    /// Ask for the named people the current photos can be moved to. The list
    /// arrives as a `ViewEvent::Prompt`, without the active person.
    pub fn transfer_targets(&mut self) -> Result<()> {
        let key = self.active.ok_or(ControllerError::NoActivePerson)?;
        let exclude = self
            .active_person_record()
            .map(|p| p.clean_name().to_string());
        let bridge = self.bridge.clone();
        self.run(async move {
            Completion::TransferTargets {
                exclude,
                reply: bridge.get_named_people_for_transfer(key.clustering_id).await,
            }
        });
        Ok(())
    }

    fn transfer_targets_loaded(
        &mut self,
        exclude: Option<String>,
        reply: BridgeResult<TransferTargets>,
    ) {
        let reply = match reply {
            Ok(reply) if reply.success => reply,
            Ok(reply) => {
                let message = reply
                    .message
                    .unwrap_or_else(|| "Could not list people".to_string());
                warn!(%message, "Transfer targets rejected");
                self.events.status(message);
                return;
            }
            Err(err) => {
                warn!(error = %err, "Failed to list transfer targets");
                self.events.status("Could not list people");
                return;
            }
        };

        let targets: Vec<NamedPerson> = reply
            .people
            .into_iter()
            .filter(|p| Some(&p.name) != exclude.as_ref())
            .collect();
        if targets.is_empty() {
            self.events.status("No named people to transfer to");
            return;
        }
        self.events
            .emit(ViewEvent::Prompt(Prompt::Transfer { targets }));
    }

    /// Move the selection (or the menu's photo) to the person named `target`.
    pub fn transfer_to(&mut self, target: &str) -> Result<()> {
        let target = target.trim();
        if target.is_empty() {
            self.events.status("Name cannot be empty");
            return Err(ControllerError::EmptyName);
        }
        self.run_photo_op(PhotoOp::Transfer(target.to_string()))
    }

    /// Faces a photo action applies to: the selection if any, else the photo
    /// whose menu was opened.
    fn action_targets(&self) -> Vec<FaceId> {
        if !self.selection.is_empty() {
            return self.selection.ids();
        }
        match self.menu_context {
            Some(MenuContext::Photo(face_id)) => vec![face_id],
            _ => Vec::new(),
        }
    }

    fn run_photo_op(&mut self, op: PhotoOp) -> Result<()> {
        let person = self.active.ok_or(ControllerError::NoActivePerson)?;
        let targets = self.action_targets();
        if targets.is_empty() {
            return Err(ControllerError::NoTarget);
        }
        debug!(?op, count = targets.len(), "Running photo operation");

        let session = self.loader.session();
        let bridge = self.bridge.clone();
        self.run(async move {
            let report = apply_to_faces(&bridge, person, &op, targets).await;
            Completion::PhotoOp {
                op,
                person,
                session,
                report,
            }
        });
        Ok(())
    }

    fn photo_op_finished(
        &mut self,
        op: PhotoOp,
        person: PersonKey,
        session: u64,
        report: BulkReport,
    ) {
        if self.loader.session() == session {
            self.selection.clear();
            self.menu_context = None;
        }

        let noun = if report.succeeded.len() == 1 { "photo" } else { "photos" };
        let mut message = format!("{} {} {noun}", op.verb(), report.succeeded.len());
        if let PhotoOp::Transfer(name) = &op {
            message.push_str(&format!(" to {name}"));
        }
        if let Some(err) = report.error() {
            message.push_str(&format!(" ({err})"));
        }
        info!(
            ?op,
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "Photo operation finished"
        );
        self.events.status(message);
        self.events.emit(ViewEvent::BulkFinished(report));

        self.load_people();
        if self.active == Some(person) {
            self.reload_current_photos();
        }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn active_person_record(&self) -> Option<&Person> {
        self.people.find(self.active?)
    }

    fn person_context(&self) -> Result<PersonKey> {
        match self.menu_context {
            Some(MenuContext::Person(key)) => Ok(key),
            _ => Err(ControllerError::NoTarget),
        }
    }

    fn check_reply(
        &self,
        label: &str,
        reply: BridgeResult<ActionReply>,
    ) -> Result<ActionReply> {
        match reply {
            Ok(reply) if reply.success => Ok(reply),
            Ok(reply) => {
                let message = reply
                    .message
                    .unwrap_or_else(|| format!("Could not {label}"));
                warn!(label, %message, "Request rejected");
                self.events.status(message.clone());
                Err(BridgeError::Rejected(message).into())
            }
            Err(err) => {
                warn!(label, error = %err, "Request failed");
                self.events.status(format!("Could not {label}"));
                Err(err.into())
            }
        }
    }
}

impl Drop for PhotoTagController {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// One bridge call per face, in order. Failures are collected and the loop
/// carries on; nothing already applied is rolled back.
async fn apply_to_faces(
    bridge: &SharedBridge,
    person: PersonKey,
    op: &PhotoOp,
    targets: Vec<FaceId>,
) -> BulkReport {
    let mut report = BulkReport::default();
    for face_id in targets {
        let result = match op {
            PhotoOp::Hide => accept(bridge.hide_photo(face_id).await),
            PhotoOp::Unhide => accept(bridge.unhide_photo(face_id).await),
            PhotoOp::Remove => {
                bridge
                    .remove_face_to_unmatched(person.clustering_id, face_id)
                    .await
            }
            PhotoOp::Transfer(name) => {
                bridge
                    .transfer_face_to_person(person.clustering_id, face_id, name)
                    .await
            }
        };
        match result {
            Ok(()) => report.succeeded.push(face_id),
            Err(err) => {
                warn!(face_id, ?op, error = %err, "Photo operation failed");
                report.failed.push((face_id, err.to_string()));
            }
        }
    }
    report
}

fn accept(reply: BridgeResult<ActionReply>) -> BridgeResult<()> {
    let reply = reply?;
    if reply.success {
        Ok(())
    } else {
        Err(BridgeError::Rejected(
            reply.message.unwrap_or_else(|| "request rejected".to_string()),
        ))
    }
}
