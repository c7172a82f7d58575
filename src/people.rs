//! Roster of recognized persons with filtering, sorting and the alphabet
//! jump index.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use tracing::debug;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::models::{Person, PersonKey};

/// Default minimum photo count when the threshold filter is enabled.
pub const DEFAULT_MIN_PHOTOS: u32 = 2;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SortMode {
    #[default]
    NamesAsc,
    NamesDesc,
    PhotosAsc,
    PhotosDesc,
}

impl SortMode {
    pub const ALL: [SortMode; 4] = [
        SortMode::NamesAsc,
        SortMode::NamesDesc,
        SortMode::PhotosAsc,
        SortMode::PhotosDesc,
    ];

    /// Name used in the settings store.
    pub fn as_str(self) -> &'static str {
        match self {
            SortMode::NamesAsc => "names_asc",
            SortMode::NamesDesc => "names_desc",
            SortMode::PhotosAsc => "photos_asc",
            SortMode::PhotosDesc => "photos_desc",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SortMode::NamesAsc => "Name (A-Z)",
            SortMode::NamesDesc => "Name (Z-A)",
            SortMode::PhotosAsc => "Fewest photos",
            SortMode::PhotosDesc => "Most photos",
        }
    }

    /// Parse a stored name, falling back to the default for anything unknown.
    pub fn from_setting(value: &str) -> Self {
        value.parse().unwrap_or_else(|_| {
            debug!(value, "Unknown sort mode, using default");
            SortMode::default()
        })
    }
}

impl fmt::Display for SortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SortMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s.trim())
            .ok_or_else(|| format!("unknown sort mode: {s}"))
    }
}

/// User-facing filter and sort settings for the people list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListSettings {
    pub show_unmatched: bool,
    pub min_photos_enabled: bool,
    pub min_photos_count: u32,
    pub sort_mode: SortMode,
}

impl Default for ListSettings {
    fn default() -> Self {
        Self {
            show_unmatched: false,
            min_photos_enabled: false,
            min_photos_count: DEFAULT_MIN_PHOTOS,
            sort_mode: SortMode::default(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PeopleListModel {
    roster: Vec<Person>,
    settings: ListSettings,
}

impl PeopleListModel {
    pub fn new(settings: ListSettings) -> Self {
        Self {
            roster: Vec::new(),
            settings,
        }
    }

    /// Replace the roster wholesale.
    pub fn set_roster(&mut self, roster: Vec<Person>) {
        debug!(count = roster.len(), "Roster replaced");
        self.roster = roster;
    }

    pub fn roster(&self) -> &[Person] {
        &self.roster
    }

    pub fn settings(&self) -> &ListSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: ListSettings) {
        self.settings = settings;
    }

    pub fn set_sort_mode(&mut self, mode: SortMode) {
        self.settings.sort_mode = mode;
    }

    pub fn find(&self, key: PersonKey) -> Option<&Person> {
        self.roster.iter().find(|p| p.key() == key)
    }

    /// Filtered and sorted view of the roster.
    pub fn visible(&self) -> Vec<&Person> {
        let settings = &self.settings;
        let mut people: Vec<&Person> = self
            .roster
            .iter()
            .filter(|p| settings.show_unmatched || !p.is_unmatched())
            .filter(|p| !settings.min_photos_enabled || p.count >= settings.min_photos_count)
            .collect();

        match settings.sort_mode {
            SortMode::NamesAsc => people.sort_by(|a, b| collate(&a.name, &b.name)),
            SortMode::NamesDesc => people.sort_by(|a, b| collate(&b.name, &a.name)),
            SortMode::PhotosAsc => {
                people.sort_by(|a, b| a.count.cmp(&b.count).then_with(|| collate(&a.name, &b.name)))
            }
            SortMode::PhotosDesc => {
                people.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| collate(&a.name, &b.name)))
            }
        }
        people
    }

    /// Letters present among visible people, in the order the navigator shows
    /// them (Z to A when sorting names descending).
    pub fn alphabet_index(&self) -> Vec<char> {
        let mut letters: Vec<char> = self
            .visible()
            .into_iter()
            .filter_map(index_letter)
            .collect();
        letters.sort_unstable();
        letters.dedup();
        if self.settings.sort_mode == SortMode::NamesDesc {
            letters.reverse();
        }
        letters
    }

    /// Position in `visible()` of the first person filed under `letter`.
    pub fn position_of_letter(&self, letter: char) -> Option<usize> {
        let letter = letter.to_uppercase().next()?;
        self.visible()
            .into_iter()
            .position(|p| index_letter(p) == Some(letter))
    }

    /// Person to activate when nothing is selected yet: the first visible
    /// real person, else whatever is first.
    pub fn default_selection(&self) -> Option<PersonKey> {
        let visible = self.visible();
        visible
            .iter()
            .find(|p| !p.is_unmatched())
            .or_else(|| visible.first())
            .map(|p| p.key())
    }
}

/// Letter a person is filed under, with accents dropped.
fn index_letter(person: &Person) -> Option<char> {
    let initial = person.initial()?;
    let base = std::iter::once(initial).nfd().next()?;
    base.is_alphabetic().then_some(base)
}

/// Name ordering that ignores case and accents ("Émile" files with "Emile"),
/// with a stable tie-break on the raw text. Not a full locale collation:
/// letters outside Latin decomposition keep code point order.
fn collate(a: &str, b: &str) -> Ordering {
    fold(a).cmp(fold(b)).then_with(|| a.cmp(b))
}

fn fold(name: &str) -> impl Iterator<Item = char> + '_ {
    name.nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
}
