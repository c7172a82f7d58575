use std::path::PathBuf;

/// Identifier of one detected face.
pub type FaceId = i64;

/// One detected face within a source image, as shown in the grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Photo {
    pub face_id: FaceId,
    pub path: PathBuf,
    /// Encoded thumbnail image (data URL or equivalent) produced by the backend.
    pub thumbnail: String,
    pub is_hidden: bool,
}

impl Photo {
    pub fn new(face_id: FaceId, path: impl Into<PathBuf>, thumbnail: impl Into<String>) -> Self {
        Self {
            face_id,
            path: path.into(),
            thumbnail: thumbnail.into(),
            is_hidden: false,
        }
    }
}

/// One page of the ordered photo sequence for a person.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhotoPage {
    pub photos: Vec<Photo>,
    pub total_count: usize,
    pub has_more: bool,
}

/// Describes the most recent fetch of the active person's photo sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    /// 1-based number of the next page to request.
    pub page_number: u32,
    pub page_size: u32,
    pub total_count: usize,
    pub has_more: bool,
}
