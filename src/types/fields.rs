//! The content field whitelist and its value model
//!
//! Only the fields listed here participate in dirty-diffing, autosave
//! snapshots and default-forcing. Everything else on an item (lock ownership,
//! etag, session flags) is carried separately and never diffed.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The fixed set of content fields on an editable item.
///
/// Each field has a defined default value: empty string, empty list,
/// empty mapping, or null. A field that is not present in a `FieldMap`
/// is *unset*, which is distinct from being present with its default.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ContentField {
    #[serde(rename = "headline")]
    Headline,
    #[serde(rename = "slugline")]
    Slugline,
    #[serde(rename = "body_html")]
    BodyHtml,
    #[serde(rename = "abstract")]
    Abstract,
    #[serde(rename = "anpa_take_key")]
    AnpaTakeKey,
    #[serde(rename = "byline")]
    Byline,
    #[serde(rename = "urgency")]
    Urgency,
    #[serde(rename = "priority")]
    Priority,
    #[serde(rename = "subject")]
    Subject,
    #[serde(rename = "anpa-category")]
    AnpaCategory,
    #[serde(rename = "genre")]
    Genre,
    #[serde(rename = "groups")]
    Groups,
    #[serde(rename = "usageterms")]
    UsageTerms,
    #[serde(rename = "ednote")]
    EdNote,
    #[serde(rename = "place")]
    Place,
    #[serde(rename = "located")]
    Located,
    #[serde(rename = "dateline")]
    Dateline,
    #[serde(rename = "language")]
    Language,
    #[serde(rename = "unique_name")]
    UniqueName,
    #[serde(rename = "keywords")]
    Keywords,
}

impl ContentField {
    /// Every whitelisted field, in a stable order.
    pub const ALL: [ContentField; 20] = [
        ContentField::Headline,
        ContentField::Slugline,
        ContentField::BodyHtml,
        ContentField::Abstract,
        ContentField::AnpaTakeKey,
        ContentField::Byline,
        ContentField::Urgency,
        ContentField::Priority,
        ContentField::Subject,
        ContentField::AnpaCategory,
        ContentField::Genre,
        ContentField::Groups,
        ContentField::UsageTerms,
        ContentField::EdNote,
        ContentField::Place,
        ContentField::Located,
        ContentField::Dateline,
        ContentField::Language,
        ContentField::UniqueName,
        ContentField::Keywords,
    ];

    /// The defined default value for this field.
    pub fn default_value(&self) -> FieldValue {
        match self {
            ContentField::Headline
            | ContentField::Slugline
            | ContentField::Dateline
            | ContentField::UniqueName => FieldValue::text(""),
            ContentField::Subject
            | ContentField::Genre
            | ContentField::Groups
            | ContentField::Place
            | ContentField::Keywords => FieldValue::List(Vec::new()),
            ContentField::AnpaCategory => FieldValue::Map(BTreeMap::new()),
            _ => FieldValue::Null,
        }
    }

    /// The wire name of this field.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentField::Headline => "headline",
            ContentField::Slugline => "slugline",
            ContentField::BodyHtml => "body_html",
            ContentField::Abstract => "abstract",
            ContentField::AnpaTakeKey => "anpa_take_key",
            ContentField::Byline => "byline",
            ContentField::Urgency => "urgency",
            ContentField::Priority => "priority",
            ContentField::Subject => "subject",
            ContentField::AnpaCategory => "anpa-category",
            ContentField::Genre => "genre",
            ContentField::Groups => "groups",
            ContentField::UsageTerms => "usageterms",
            ContentField::EdNote => "ednote",
            ContentField::Place => "place",
            ContentField::Located => "located",
            ContentField::Dateline => "dateline",
            ContentField::Language => "language",
            ContentField::UniqueName => "unique_name",
            ContentField::Keywords => "keywords",
        }
    }
}

impl std::fmt::Display for ContentField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value stored in a content field
///
/// Equality is structural, so list- and mapping-valued fields compare by
/// content. That is what the dirty-diff pruning relies on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Int(i64),
    Text(String),
    List(Vec<FieldValue>),
    Map(BTreeMap<String, FieldValue>),
}

impl FieldValue {
    pub fn text(s: impl Into<String>) -> Self {
        FieldValue::Text(s.into())
    }

    pub fn int(n: i64) -> Self {
        FieldValue::Int(n)
    }

    pub fn list(values: impl IntoIterator<Item = FieldValue>) -> Self {
        FieldValue::List(values.into_iter().collect())
    }
}

/// The content fields of an item. A missing key means the field is unset.
pub type FieldMap = BTreeMap<ContentField, FieldValue>;
