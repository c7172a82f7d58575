//! Request/response contract with the tagging backend.
//!
//! The backend runs face detection, clustering and persistence; the
//! controller only consumes this trait. `MemoryBridge` is an in-process
//! implementation for the demo binary and tests.

pub mod memory;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::BridgeError;
use crate::models::{
    ActionReply, ClusteringId, FaceId, Person, PersonId, PhotoPage, TransferTargets,
};

pub use memory::MemoryBridge;

pub type BridgeResult<T> = Result<T, BridgeError>;

/// Shared handle to a bridge implementation.
pub type SharedBridge = Arc<dyn HostBridge>;

#[async_trait]
pub trait HostBridge: Send + Sync {
    async fn get_people(&self) -> BridgeResult<Vec<Person>>;

    async fn get_photos(
        &self,
        clustering_id: ClusteringId,
        person_id: PersonId,
        page: u32,
        page_size: u32,
    ) -> BridgeResult<PhotoPage>;

    /// Higher resolution rendition of `path`, or `None` if it can't be produced.
    async fn get_full_size_preview(&self, path: &Path) -> BridgeResult<Option<String>>;

    /// Open the source image in the system viewer.
    async fn open_photo(&self, path: &Path) -> BridgeResult<()>;

    async fn hide_person(
        &self,
        clustering_id: ClusteringId,
        person_id: PersonId,
    ) -> BridgeResult<ActionReply>;

    async fn unhide_person(
        &self,
        clustering_id: ClusteringId,
        person_id: PersonId,
    ) -> BridgeResult<ActionReply>;

    async fn untag_person(
        &self,
        clustering_id: ClusteringId,
        person_id: PersonId,
    ) -> BridgeResult<ActionReply>;

    async fn rename_person(
        &self,
        clustering_id: ClusteringId,
        person_id: PersonId,
        name: &str,
    ) -> BridgeResult<ActionReply>;

    async fn set_primary_photo(&self, person_name: &str, face_id: FaceId)
        -> BridgeResult<ActionReply>;

    async fn hide_photo(&self, face_id: FaceId) -> BridgeResult<ActionReply>;

    async fn unhide_photo(&self, face_id: FaceId) -> BridgeResult<ActionReply>;

    async fn remove_face_to_unmatched(
        &self,
        clustering_id: ClusteringId,
        face_id: FaceId,
    ) -> BridgeResult<()>;

    async fn transfer_face_to_person(
        &self,
        clustering_id: ClusteringId,
        face_id: FaceId,
        target_name: &str,
    ) -> BridgeResult<()>;

    async fn get_named_people_for_transfer(
        &self,
        clustering_id: ClusteringId,
    ) -> BridgeResult<TransferTargets>;
}
