use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub excerpt: Option<String>,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub series: Option<String>,
    pub series_order: Option<f64>,
    pub published: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Post {
    /// Creation time, or the Unix epoch when the stored value is missing.
    pub fn created_or_epoch(&self) -> DateTime<Utc> {
        self.created_at.unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }

    /// Series name, if the post belongs to a non-blank series.
    pub fn series_name(&self) -> Option<&str> {
        self.series.as_deref().filter(|s| !s.trim().is_empty())
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// Body of `POST /api/posts`. Required fields are optional here so that a
/// missing one surfaces as a 400 from validation rather than a decode error.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NewPost {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub content: Option<String>,
    pub excerpt: Option<String>,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub series: Option<String>,
    pub series_order: Option<f64>,
    pub published: bool,
}

/// A single field of a partial update.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Patch<T> {
    #[default]
    Unset,
    Set(T),
}

impl<T> Patch<T> {
    pub fn is_set(&self) -> bool {
        matches!(self, Patch::Set(_))
    }

    /// Overwrite `target` when the field is set.
    pub fn apply_to(self, target: &mut T) {
        if let Patch::Set(value) = self {
            *target = value;
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Patch<U> {
        match self {
            Patch::Unset => Patch::Unset,
            Patch::Set(value) => Patch::Set(f(value)),
        }
    }
}

// A present key always means `Set`; absent keys fall back to `Default` (`Unset`).
// For `Patch<Option<T>>` an explicit JSON null becomes `Set(None)`.
impl<'de, T: Deserialize<'de>> Deserialize<'de> for Patch<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        T::deserialize(deserializer).map(Patch::Set)
    }
}

/// Body of `PUT /api/posts/{id}`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PostPatch {
    pub title: Patch<String>,
    pub slug: Patch<String>,
    pub content: Patch<String>,
    pub excerpt: Patch<Option<String>>,
    pub category: Patch<Option<String>>,
    pub tags: Patch<Vec<String>>,
    pub series: Patch<Option<String>>,
    pub series_order: Patch<Option<f64>>,
    pub published: Patch<bool>,
}

impl PostPatch {
    pub fn is_empty(&self) -> bool {
        !(self.title.is_set()
            || self.slug.is_set()
            || self.content.is_set()
            || self.excerpt.is_set()
            || self.category.is_set()
            || self.tags.is_set()
            || self.series.is_set()
            || self.series_order.is_set()
            || self.published.is_set())
    }

    /// Apply every set field to `post`, normalizing tags on the way in.
    pub fn apply(self, post: &mut Post) {
        self.title.apply_to(&mut post.title);
        self.slug.apply_to(&mut post.slug);
        self.content.apply_to(&mut post.content);
        self.excerpt.apply_to(&mut post.excerpt);
        self.category.apply_to(&mut post.category);
        self.tags.map(normalize_tags).apply_to(&mut post.tags);
        self.series.apply_to(&mut post.series);
        self.series_order.apply_to(&mut post.series_order);
        self.published.apply_to(&mut post.published);
    }
}

/// Tags are stored trimmed, lowercased, deduplicated and sorted.
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = tags
        .into_iter()
        .map(|t| t.as_ref().trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();
    out.sort();
    out.dedup();
    out
}

pub fn normalize_tag(tag: &str) -> Option<String> {
    let tag = tag.trim().to_lowercase();
    (!tag.is_empty()).then_some(tag)
}

pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Accepts RFC 3339 and SQLite's `datetime('now')` layout.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationRecord {
    pub name: String,
    pub executed_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub username: String,
    pub token: String,
    pub expires_at: String,
    pub created_at: String,
}
