//! In-memory `HostBridge` backed by plain collections.
//!
//! Mirrors the backend's observable behavior closely enough to drive the
//! controller end to end: paging math, hidden-person decoration, rename and
//! transfer semantics. Test hooks allow failure injection per operation or
//! per face, and holding `get_photos` responses until released.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tracing::{debug, trace};

use super::{BridgeResult, HostBridge};
use crate::error::BridgeError;
use crate::models::{
    ActionReply, ClusteringId, FaceId, NamedPerson, Person, PersonId, PersonKey, Photo,
    PhotoPage, TransferTargets, UNMATCHED_NAME, UNMATCHED_PERSON_ID,
};

#[derive(Debug, Clone)]
struct StoredFace {
    face_id: FaceId,
    person: PersonKey,
    path: PathBuf,
    hidden: bool,
}

#[derive(Debug, Default)]
struct Store {
    people: Vec<Person>,
    faces: Vec<StoredFace>,
    primary: HashMap<String, FaceId>,
    previews: HashMap<PathBuf, String>,
    opened: Vec<PathBuf>,
    next_face_id: FaceId,
}

impl Store {
    fn person_mut(&mut self, key: PersonKey) -> Option<&mut Person> {
        self.people.iter_mut().find(|p| p.key() == key)
    }

    fn faces_of(&self, key: PersonKey) -> impl Iterator<Item = &StoredFace> {
        self.faces.iter().filter(move |f| f.person == key)
    }

    fn ensure_unmatched(&mut self, clustering_id: ClusteringId) -> PersonKey {
        let key = PersonKey::new(clustering_id, UNMATCHED_PERSON_ID);
        if self.person_mut(key).is_none() {
            self.people
                .push(Person::new(clustering_id, UNMATCHED_PERSON_ID, UNMATCHED_NAME));
        }
        key
    }
}

#[derive(Debug, Default)]
pub struct MemoryBridge {
    store: Mutex<Store>,
    calls: Mutex<HashMap<&'static str, usize>>,
    failing: Mutex<HashSet<&'static str>>,
    failing_faces: Mutex<HashSet<FaceId>>,
    photo_gate: Mutex<Option<Arc<Semaphore>>>,
    skip_hidden: Mutex<bool>,
}

impl MemoryBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// A small roster for demos: a few named people, a placeholder cluster,
    /// and the unmatched bucket.
    pub fn sample() -> Self {
        let bridge = Self::new();
        bridge.add_person(1, 1, "Alice", 250);
        bridge.add_person(1, 2, "bob", 42);
        bridge.add_person(1, 3, "Carl", 7);
        bridge.add_person(1, 4, "Person 4", 1);
        bridge.add_person(1, UNMATCHED_PERSON_ID, UNMATCHED_NAME, 12);
        bridge
    }

    /// Add a person owning `photo_count` freshly numbered faces.
    pub fn add_person(
        &self,
        clustering_id: ClusteringId,
        person_id: PersonId,
        name: &str,
        photo_count: usize,
    ) -> PersonKey {
        let key = PersonKey::new(clustering_id, person_id);
        let mut store = self.store.lock();
        store.people.push(Person::new(clustering_id, person_id, name));
        for n in 0..photo_count {
            store.next_face_id += 1;
            let face_id = store.next_face_id;
            store.faces.push(StoredFace {
                face_id,
                person: key,
                path: PathBuf::from(format!("/photos/{}/{:05}.jpg", person_id, n)),
                hidden: false,
            });
        }
        key
    }

    pub fn set_preview(&self, path: impl Into<PathBuf>, image: impl Into<String>) {
        self.store.lock().previews.insert(path.into(), image.into());
    }

    /// Number of times `op` (the trait method name) was called.
    pub fn calls(&self, op: &str) -> usize {
        self.calls.lock().get(op).copied().unwrap_or(0)
    }

    /// Make every call to `op` fail with a transport error.
    pub fn set_failing(&self, op: &'static str, failing: bool) {
        let mut set = self.failing.lock();
        if failing {
            set.insert(op);
        } else {
            set.remove(op);
        }
    }

    /// Make per-face mutations on `face_id` fail.
    pub fn fail_face(&self, face_id: FaceId) {
        self.failing_faces.lock().insert(face_id);
    }

    /// Leave hidden faces out of `get_photos` pages. Paging still counts
    /// them, so a page can come back short or empty while more remain.
    pub fn skip_hidden_photos(&self, skip: bool) {
        *self.skip_hidden.lock() = skip;
    }

    /// Mark faces hidden without going through the recorded trait call.
    pub fn hide_faces(&self, face_ids: impl IntoIterator<Item = FaceId>) {
        let ids: HashSet<FaceId> = face_ids.into_iter().collect();
        for face in self.store.lock().faces.iter_mut() {
            if ids.contains(&face.face_id) {
                face.hidden = true;
            }
        }
    }

    /// Hold every subsequent `get_photos` response until released.
    pub fn hold_photos(&self) {
        *self.photo_gate.lock() = Some(Arc::new(Semaphore::new(0)));
    }

    /// Let `count` held `get_photos` responses through.
    pub fn release_photos(&self, count: usize) {
        if let Some(gate) = self.photo_gate.lock().as_ref() {
            gate.add_permits(count);
        }
    }

    /// Stop holding responses; anything still waiting is let through.
    pub fn open_gate(&self) {
        if let Some(gate) = self.photo_gate.lock().take() {
            gate.add_permits(Semaphore::MAX_PERMITS / 2);
        }
    }

    pub fn opened_paths(&self) -> Vec<PathBuf> {
        self.store.lock().opened.clone()
    }

    pub fn face_ids_of(&self, key: PersonKey) -> Vec<FaceId> {
        self.store.lock().faces_of(key).map(|f| f.face_id).collect()
    }

    pub fn is_face_hidden(&self, face_id: FaceId) -> bool {
        self.store
            .lock()
            .faces
            .iter()
            .any(|f| f.face_id == face_id && f.hidden)
    }

    pub fn person(&self, key: PersonKey) -> Option<Person> {
        self.store.lock().people.iter().find(|p| p.key() == key).cloned()
    }

    pub fn primary_photo(&self, name: &str) -> Option<FaceId> {
        self.store.lock().primary.get(name).copied()
    }

    fn record(&self, op: &'static str) -> BridgeResult<()> {
        *self.calls.lock().entry(op).or_insert(0) += 1;
        trace!(op, "Bridge call");
        if self.failing.lock().contains(op) {
            debug!(op, "Injected bridge failure");
            return Err(BridgeError::Transport(format!("{op} unavailable")));
        }
        Ok(())
    }

    fn check_face(&self, face_id: FaceId) -> BridgeResult<()> {
        if self.failing_faces.lock().contains(&face_id) {
            return Err(BridgeError::Transport(format!("face {face_id} locked")));
        }
        Ok(())
    }

    fn set_person_hidden(&self, key: PersonKey, hidden: bool) -> ActionReply {
        match self.store.lock().person_mut(key) {
            Some(person) => {
                person.is_hidden = hidden;
                ActionReply::ok()
            }
            None => ActionReply::failed("Person not found"),
        }
    }

    fn set_face_hidden(&self, face_id: FaceId, hidden: bool) -> BridgeResult<ActionReply> {
        self.check_face(face_id)?;
        let mut store = self.store.lock();
        match store.faces.iter_mut().find(|f| f.face_id == face_id) {
            Some(face) => {
                face.hidden = hidden;
                Ok(ActionReply::ok())
            }
            None => Ok(ActionReply::failed("Face not found")),
        }
    }
}

#[async_trait]
impl HostBridge for MemoryBridge {
    async fn get_people(&self) -> BridgeResult<Vec<Person>> {
        self.record("get_people")?;
        let store = self.store.lock();
        let people = store
            .people
            .iter()
            .map(|person| {
                let mut listed = person.clone();
                listed.count = store.faces_of(person.key()).count() as u32;
                listed.tagged_count = if person.is_named() { listed.count } else { 0 };
                if person.is_hidden {
                    listed.name = format!("{} (hidden)", person.name);
                }
                listed
            })
            .collect();
        Ok(people)
    }

    async fn get_photos(
        &self,
        clustering_id: ClusteringId,
        person_id: PersonId,
        page: u32,
        page_size: u32,
    ) -> BridgeResult<PhotoPage> {
        self.record("get_photos")?;

        let gate = self.photo_gate.lock().clone();
        if let Some(gate) = gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|_| BridgeError::Transport("gate closed".into()))?;
            permit.forget();
        }

        if page == 0 || page_size == 0 {
            return Err(BridgeError::InvalidResponse(format!(
                "page {page} of size {page_size}"
            )));
        }

        let key = PersonKey::new(clustering_id, person_id);
        let skip_hidden = *self.skip_hidden.lock();
        let store = self.store.lock();
        let faces: Vec<&StoredFace> = store.faces_of(key).collect();
        let total_count = faces.len();
        let offset = (page as usize - 1) * page_size as usize;
        let window: Vec<&StoredFace> = faces
            .iter()
            .skip(offset)
            .take(page_size as usize)
            .copied()
            .collect();
        let has_more = offset + window.len() < total_count;
        let photos: Vec<Photo> = window
            .into_iter()
            .filter(|face| !(skip_hidden && face.hidden))
            .map(|face| Photo {
                face_id: face.face_id,
                path: face.path.clone(),
                thumbnail: format!("thumb:{}", face.face_id),
                is_hidden: face.hidden,
            })
            .collect();

        Ok(PhotoPage {
            photos,
            total_count,
            has_more,
        })
    }

    async fn get_full_size_preview(&self, path: &Path) -> BridgeResult<Option<String>> {
        self.record("get_full_size_preview")?;
        Ok(self.store.lock().previews.get(path).cloned())
    }

    async fn open_photo(&self, path: &Path) -> BridgeResult<()> {
        self.record("open_photo")?;
        self.store.lock().opened.push(path.to_path_buf());
        Ok(())
    }

    async fn hide_person(
        &self,
        clustering_id: ClusteringId,
        person_id: PersonId,
    ) -> BridgeResult<ActionReply> {
        self.record("hide_person")?;
        Ok(self.set_person_hidden(PersonKey::new(clustering_id, person_id), true))
    }

    async fn unhide_person(
        &self,
        clustering_id: ClusteringId,
        person_id: PersonId,
    ) -> BridgeResult<ActionReply> {
        self.record("unhide_person")?;
        Ok(self.set_person_hidden(PersonKey::new(clustering_id, person_id), false))
    }

    async fn untag_person(
        &self,
        clustering_id: ClusteringId,
        person_id: PersonId,
    ) -> BridgeResult<ActionReply> {
        self.record("untag_person")?;
        let key = PersonKey::new(clustering_id, person_id);
        let mut store = self.store.lock();
        let faces = store.faces_of(key).count() as u32;
        if faces == 0 {
            return Ok(ActionReply::failed("No faces found for this person"));
        }
        if let Some(person) = store.person_mut(key) {
            person.name = format!("Person {person_id}");
        }
        Ok(ActionReply {
            faces_untagged: Some(faces),
            ..ActionReply::ok()
        })
    }

    async fn rename_person(
        &self,
        clustering_id: ClusteringId,
        person_id: PersonId,
        name: &str,
    ) -> BridgeResult<ActionReply> {
        self.record("rename_person")?;
        let name = name.trim();
        if name.is_empty() {
            return Ok(ActionReply::failed("Name cannot be empty"));
        }
        let key = PersonKey::new(clustering_id, person_id);
        let mut store = self.store.lock();
        let faces = store.faces_of(key).count() as u32;
        if faces == 0 {
            return Ok(ActionReply::failed("No faces found for this person"));
        }
        if let Some(person) = store.person_mut(key) {
            person.name = name.to_string();
        }
        Ok(ActionReply {
            faces_tagged: Some(faces),
            ..ActionReply::ok()
        })
    }

    async fn set_primary_photo(
        &self,
        person_name: &str,
        face_id: FaceId,
    ) -> BridgeResult<ActionReply> {
        self.record("set_primary_photo")?;
        let probe = Person::new(0, -1, person_name);
        if !probe.is_named() {
            return Ok(ActionReply::failed(
                "Please name this person before setting a primary photo",
            ));
        }
        self.store
            .lock()
            .primary
            .insert(person_name.to_string(), face_id);
        Ok(ActionReply {
            message: Some("Primary photo set successfully".into()),
            ..ActionReply::ok()
        })
    }

    async fn hide_photo(&self, face_id: FaceId) -> BridgeResult<ActionReply> {
        self.record("hide_photo")?;
        self.set_face_hidden(face_id, true)
    }

    async fn unhide_photo(&self, face_id: FaceId) -> BridgeResult<ActionReply> {
        self.record("unhide_photo")?;
        self.set_face_hidden(face_id, false)
    }

    async fn remove_face_to_unmatched(
        &self,
        clustering_id: ClusteringId,
        face_id: FaceId,
    ) -> BridgeResult<()> {
        self.record("remove_face_to_unmatched")?;
        self.check_face(face_id)?;
        let mut store = self.store.lock();
        let unmatched = store.ensure_unmatched(clustering_id);
        let face = store
            .faces
            .iter_mut()
            .find(|f| f.face_id == face_id)
            .ok_or_else(|| BridgeError::Rejected(format!("face {face_id} not found")))?;
        face.person = unmatched;
        Ok(())
    }

    async fn transfer_face_to_person(
        &self,
        clustering_id: ClusteringId,
        face_id: FaceId,
        target_name: &str,
    ) -> BridgeResult<()> {
        self.record("transfer_face_to_person")?;
        self.check_face(face_id)?;
        let mut store = self.store.lock();
        let target = store
            .people
            .iter()
            .find(|p| p.clustering_id == clustering_id && p.clean_name() == target_name)
            .map(Person::key)
            .ok_or_else(|| BridgeError::Rejected(format!("no person named {target_name}")))?;
        let face = store
            .faces
            .iter_mut()
            .find(|f| f.face_id == face_id)
            .ok_or_else(|| BridgeError::Rejected(format!("face {face_id} not found")))?;
        face.person = target;
        Ok(())
    }

    async fn get_named_people_for_transfer(
        &self,
        clustering_id: ClusteringId,
    ) -> BridgeResult<TransferTargets> {
        self.record("get_named_people_for_transfer")?;
        let store = self.store.lock();
        let people = store
            .people
            .iter()
            .filter(|p| p.clustering_id == clustering_id && p.is_named())
            .map(|p| NamedPerson {
                name: p.clean_name().to_string(),
                count: store.faces_of(p.key()).count() as u32,
            })
            .collect();
        Ok(TransferTargets {
            success: true,
            people,
            message: None,
        })
    }
}
