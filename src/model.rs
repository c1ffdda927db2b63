use serde::{Deserialize, Serialize};

/// Sentinel rule key meaning "the user manages the order by hand".
pub const MANUAL_ORDER: &str = "ManualOrder";

/// Reserved playlist identity carrying the default order for every playlist
/// without an explicit entry.
pub const ALL_PLAYLISTS: &str = "AllPlaylists";

/// One sort rule: an attribute key plus a direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRule {
    #[serde(alias = "Order")]
    pub key: String,
    #[serde(default, alias = "Descending")]
    pub descending: bool,
}

impl OrderRule {
    pub fn new(key: impl Into<String>, descending: bool) -> Self {
        Self {
            key: key.into(),
            descending,
        }
    }
}

/// An ordered rule chain for one playlist. The first rule is the primary
/// sort key, each following rule breaks ties within the preceding keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSet {
    #[serde(alias = "Orders")]
    pub rules: Vec<OrderRule>,
}

impl OrderSet {
    pub fn new(rules: Vec<OrderRule>) -> Self {
        Self { rules }
    }

    pub fn manual_ascending() -> Self {
        Self::new(vec![OrderRule::new(MANUAL_ORDER, false)])
    }

    pub fn manual_descending() -> Self {
        Self::new(vec![OrderRule::new(MANUAL_ORDER, true)])
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Single `ManualOrder` rule, ascending: leave the order untouched.
    pub fn is_manual_ascending(&self) -> bool {
        self.rules.len() == 1 && self.rules[0].key == MANUAL_ORDER && !self.rules[0].descending
    }

    /// Single `ManualOrder` rule, descending: push newly added items to the
    /// front, keep everything else in place.
    pub fn is_manual_descending(&self) -> bool {
        self.rules.len() == 1 && self.rules[0].key == MANUAL_ORDER && self.rules[0].descending
    }
}

/// File properties readable through the host, usable as sort keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileProperty {
    Url,
    Kind,
    Format,
    Size,
    Duration,
    Bitrate,
    DateAdded,
    DateModified,
    LastPlayed,
    PlayCount,
    SkipCount,
}

impl FileProperty {
    /// Date-valued properties compare as timestamps, not lexically.
    pub fn is_date_valued(self) -> bool {
        matches!(self, Self::DateAdded | Self::DateModified | Self::LastPlayed)
    }
}

/// Metadata tags readable through the host, usable as sort keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagField {
    Title,
    Artist,
    AlbumArtist,
    Album,
    Genre,
    Composer,
    Comment,
    Rating,
    TrackNo,
    TrackCount,
    DiscNo,
    DiscCount,
    Year,
    OriginalYear,
}

impl TagField {
    /// Count/number tags compare as integers (unparsable values sort as 0).
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            Self::TrackNo | Self::TrackCount | Self::DiscNo | Self::DiscCount
        )
    }

    /// Year tags accept a bare year or a full date and compare
    /// chronologically.
    pub fn is_year_valued(self) -> bool {
        matches!(self, Self::Year | Self::OriginalYear)
    }
}

/// A resolved sort key: either a file property or a metadata tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Property(FileProperty),
    Tag(TagField),
}

impl SortKey {
    /// Maps a rule key string to a known sort key. `None` means the key is
    /// not recognized and the rule chain is a configuration error.
    pub fn resolve(name: &str) -> Option<Self> {
        let property = match name {
            "Url" => Some(FileProperty::Url),
            "Kind" => Some(FileProperty::Kind),
            "Format" => Some(FileProperty::Format),
            "Size" => Some(FileProperty::Size),
            "Duration" => Some(FileProperty::Duration),
            "Bitrate" => Some(FileProperty::Bitrate),
            "DateAdded" => Some(FileProperty::DateAdded),
            "DateModified" => Some(FileProperty::DateModified),
            "LastPlayed" => Some(FileProperty::LastPlayed),
            "PlayCount" => Some(FileProperty::PlayCount),
            "SkipCount" => Some(FileProperty::SkipCount),
            _ => None,
        };
        if let Some(property) = property {
            return Some(Self::Property(property));
        }

        let tag = match name {
            "TrackTitle" | "Title" => Some(TagField::Title),
            "Artist" => Some(TagField::Artist),
            "AlbumArtist" => Some(TagField::AlbumArtist),
            "Album" => Some(TagField::Album),
            "Genre" => Some(TagField::Genre),
            "Composer" => Some(TagField::Composer),
            "Comment" => Some(TagField::Comment),
            "Rating" => Some(TagField::Rating),
            "TrackNo" => Some(TagField::TrackNo),
            "TrackCount" => Some(TagField::TrackCount),
            "DiscNo" => Some(TagField::DiscNo),
            "DiscCount" => Some(TagField::DiscCount),
            "Year" => Some(TagField::Year),
            "OriginalYear" => Some(TagField::OriginalYear),
            _ => None,
        };
        tag.map(Self::Tag)
    }
}
