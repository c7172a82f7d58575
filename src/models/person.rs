/// Identifier of a person within one clustering run.
pub type PersonId = i64;

/// Identifier of a clustering run on the backend.
pub type ClusteringId = i64;

/// Reserved person id for faces not yet assigned to anyone.
pub const UNMATCHED_PERSON_ID: PersonId = 0;

/// Display name the backend gives the unmatched bucket.
pub const UNMATCHED_NAME: &str = "Unmatched Faces";

/// Prefix of the placeholder names given to clusters nobody has named yet.
const PLACEHOLDER_PREFIX: &str = "Person ";

/// Suffix the backend appends to hidden persons when they are listed.
const HIDDEN_SUFFIX: &str = " (hidden)";

const AVATAR_COLORS: [&str; 15] = [
    "#667eea", "#f093fb", "#4facfe", "#43e97b", "#fa709a", "#30cfd0", "#a8edea", "#fed6e3",
    "#c1dfc4", "#d299c2", "#fda085", "#f6d365", "#96e6a1", "#764ba2", "#f79d00",
];

/// Identity of a person: the pair of clustering run and person id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PersonKey {
    pub clustering_id: ClusteringId,
    pub person_id: PersonId,
}

impl PersonKey {
    pub fn new(clustering_id: ClusteringId, person_id: PersonId) -> Self {
        Self {
            clustering_id,
            person_id,
        }
    }
}

/// A recognized person as listed by the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct Person {
    pub id: PersonId,
    pub clustering_id: ClusteringId,
    pub name: String,
    pub count: u32,
    pub tagged_count: u32,
    pub thumbnail: Option<String>,
    pub is_hidden: bool,
}

impl Person {
    pub fn new(clustering_id: ClusteringId, id: PersonId, name: impl Into<String>) -> Self {
        Self {
            id,
            clustering_id,
            name: name.into(),
            count: 0,
            tagged_count: 0,
            thumbnail: None,
            is_hidden: false,
        }
    }

    pub fn with_count(mut self, count: u32) -> Self {
        self.count = count;
        self
    }

    pub fn key(&self) -> PersonKey {
        PersonKey::new(self.clustering_id, self.id)
    }

    pub fn is_unmatched(&self) -> bool {
        self.id == UNMATCHED_PERSON_ID
    }

    /// Name without the hidden marker the backend decorates it with.
    pub fn clean_name(&self) -> &str {
        self.name
            .strip_suffix(HIDDEN_SUFFIX)
            .unwrap_or(self.name.as_str())
    }

    /// Whether a user has given this person a real name.
    ///
    /// Placeholder clusters ("Person 12") and the unmatched bucket can't carry
    /// a primary photo or receive transferred faces.
    pub fn is_named(&self) -> bool {
        let name = self.clean_name();
        !self.is_unmatched()
            && !name.trim().is_empty()
            && !name.starts_with(PLACEHOLDER_PREFIX)
            && name != UNMATCHED_NAME
    }

    /// Upper-cased first character of the name, used for the avatar and the
    /// alphabet index.
    pub fn initial(&self) -> Option<char> {
        self.name
            .trim_start()
            .chars()
            .next()
            .and_then(|c| c.to_uppercase().next())
    }

    /// Stable avatar colour for this person.
    pub fn avatar_color(&self) -> &'static str {
        AVATAR_COLORS[self.id.rem_euclid(AVATAR_COLORS.len() as i64) as usize]
    }
}
