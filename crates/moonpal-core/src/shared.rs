//! Shared ritual types: sessions, curated content, resolver output, audio assets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Session and user ids starting with this prefix belong to the in-memory trial path.
pub const EPHEMERAL_PREFIX: &str = "demo-";

/// Energy level assigned to a freshly started ritual.
pub const DEFAULT_ENERGY: f64 = 0.5;

/// Stored magic notes are truncated to this many characters.
pub const MAGIC_NOTE_MAX_CHARS: usize = 20;

/// Number of presence-statement buckets spanning the 0–1 energy range.
pub const PRESENCE_BUCKETS: u8 = 5;

/// Source tags reported alongside resolved text.
pub const SOURCE_PRESENCE: &str = "presence_statements";
pub const SOURCE_PRESENCE_FALLBACK: &str = "presence_statements_fallback";
pub const SOURCE_TEMPLATES: &str = "content_templates";
pub const SOURCE_LLM_FALLBACK: &str = "llm_fallback";
pub const SOURCE_LLM: &str = "llm";

/// Asset type for the general bedtime clips served per arousal.
pub const GENERAL_ASSET_TYPE: &str = "general";

/// Five-way presence bucket: `floor(energy * 5)` clamped into `0..=4`, so 1.0 lands in 4.
/// Out-of-range energy clamps to the nearest bucket; NaN maps to 0.
pub fn presence_bucket(energy: f64) -> u8 {
    let raw = (energy * f64::from(PRESENCE_BUCKETS)).floor();
    // `as` saturates and maps NaN to 0.
    (raw as i64).clamp(0, i64::from(PRESENCE_BUCKETS - 1)) as u8
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Active,
    Completed,
}

/// One ritual turn sequence for a user (and optionally a child profile).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub child_id: Option<String>,
    pub energy_level: f64,
    #[serde(default)]
    pub magic_note: Option<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// A fresh active session with default energy and no tags.
    pub fn new(id: impl Into<String>, user_id: impl Into<String>, child_id: Option<String>) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            child_id,
            energy_level: DEFAULT_ENERGY,
            magic_note: None,
            tags: BTreeSet::new(),
            status: SessionStatus::Active,
            created_at: Utc::now(),
        }
    }

    pub fn is_ephemeral(&self) -> bool {
        self.id.starts_with(EPHEMERAL_PREFIX)
    }

    /// Apply one field update in place.
    pub fn apply(&mut self, patch: &SessionPatch) {
        match patch {
            SessionPatch::Energy(e) => self.energy_level = *e,
            SessionPatch::MagicNote(n) => self.magic_note = n.clone(),
            SessionPatch::Tags(t) => self.tags = t.clone(),
            SessionPatch::Status(s) => self.status = *s,
        }
    }
}

/// Single-field session mutation, mirroring a row update in the durable store.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionPatch {
    Energy(f64),
    MagicNote(Option<String>),
    Tags(BTreeSet<String>),
    Status(SessionStatus),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    #[default]
    Narrative,
    Greeting,
    Comfort,
}

fn default_true() -> bool {
    true
}

/// Curated narrative tied to an inclusive energy range and topical tags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentTemplate {
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub content: String,
    pub energy_min: f64,
    pub energy_max: f64,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(rename = "type", default)]
    pub content_type: ContentType,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl ContentTemplate {
    /// `energy_min <= energy <= energy_max`.
    pub fn covers(&self, energy: f64) -> bool {
        self.energy_min <= energy && energy <= self.energy_max
    }
}

/// Short canned companionship phrase for one presence bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceStatement {
    pub id: String,
    pub statement: String,
    /// Presence bucket in `0..=4`.
    pub energy_level: u8,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchTier {
    Template,
    Statement,
    Llm,
}

/// Resolver output. `text` is empty when the tier is [`MatchTier::Llm`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub tier: MatchTier,
    pub text: String,
    #[serde(default)]
    pub template_id: Option<String>,
    pub source: String,
}

impl MatchResult {
    pub fn statement(text: impl Into<String>, source: &str) -> Self {
        Self {
            tier: MatchTier::Statement,
            text: text.into(),
            template_id: None,
            source: source.to_string(),
        }
    }

    pub fn template(template: &ContentTemplate) -> Self {
        Self {
            tier: MatchTier::Template,
            text: template.content.clone(),
            template_id: Some(template.id.clone()),
            source: SOURCE_TEMPLATES.to_string(),
        }
    }

    pub fn llm() -> Self {
        Self {
            tier: MatchTier::Llm,
            text: String::new(),
            template_id: None,
            source: SOURCE_LLM_FALLBACK.to_string(),
        }
    }
}

/// Three-way arousal bucket used for pre-recorded playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arousal {
    Low,
    Mid,
    High,
}

impl Arousal {
    pub const ALL: [Arousal; 3] = [Arousal::Low, Arousal::Mid, Arousal::High];

    /// `< 0.33` low, `< 0.67` mid, otherwise high.
    pub fn from_energy(energy: f64) -> Self {
        if energy < 0.33 {
            Arousal::Low
        } else if energy < 0.67 {
            Arousal::Mid
        } else {
            Arousal::High
        }
    }

    /// Energy used when generating narrative for a whole bucket.
    pub fn representative_energy(self) -> f64 {
        match self {
            Arousal::Low => 0.1,
            Arousal::Mid => 0.5,
            Arousal::High => 0.9,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Arousal::Low => "low",
            Arousal::Mid => "mid",
            Arousal::High => "high",
        }
    }
}

impl fmt::Display for Arousal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Arousal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Arousal::Low),
            "mid" => Ok(Arousal::Mid),
            "high" => Ok(Arousal::High),
            other => Err(format!("Invalid arousal parameter: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetSource {
    Tts,
    Upload,
}

/// Recorded audio clip. At most one asset per (type, arousal) category is active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioAsset {
    pub id: String,
    pub asset_type: String,
    pub arousal: Arousal,
    pub storage_path: String,
    pub source: AssetSource,
    pub original_text: String,
    pub version: u32,
    pub is_active: bool,
    #[serde(default)]
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Insert request for [`AudioAsset`]; id, version, and activity are assigned by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAudioAsset {
    pub asset_type: String,
    pub arousal: Arousal,
    pub storage_path: String,
    pub source: AssetSource,
    pub original_text: String,
    pub note: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presence_bucket_is_total_and_clamped() {
        assert_eq!(presence_bucket(0.0), 0);
        assert_eq!(presence_bucket(0.05), 0);
        assert_eq!(presence_bucket(0.2), 1);
        assert_eq!(presence_bucket(0.5), 2);
        assert_eq!(presence_bucket(0.79), 3);
        assert_eq!(presence_bucket(0.99), 4);
        assert_eq!(presence_bucket(1.0), 4);
        assert_eq!(presence_bucket(-0.3), 0);
        assert_eq!(presence_bucket(7.0), 4);
        assert_eq!(presence_bucket(f64::NAN), 0);
    }

    #[test]
    fn presence_bucket_is_monotonic() {
        let mut last = 0;
        for step in 0..=1000 {
            let bucket = presence_bucket(f64::from(step) / 1000.0);
            assert!(bucket >= last, "bucket decreased at step {}", step);
            assert!(bucket <= 4);
            last = bucket;
        }
    }

    #[test]
    fn arousal_thresholds() {
        assert_eq!(Arousal::from_energy(0.0), Arousal::Low);
        assert_eq!(Arousal::from_energy(0.329), Arousal::Low);
        assert_eq!(Arousal::from_energy(0.33), Arousal::Mid);
        assert_eq!(Arousal::from_energy(0.669), Arousal::Mid);
        assert_eq!(Arousal::from_energy(0.67), Arousal::High);
        assert_eq!(Arousal::from_energy(1.0), Arousal::High);
    }

    #[test]
    fn arousal_parse_rejects_unknown() {
        assert_eq!("mid".parse::<Arousal>().unwrap(), Arousal::Mid);
        assert!("MID".parse::<Arousal>().is_err());
        assert!("sleepy".parse::<Arousal>().is_err());
    }

    #[test]
    fn template_range_is_inclusive() {
        let t = ContentTemplate {
            id: "t".to_string(),
            title: String::new(),
            content: "c".to_string(),
            energy_min: 0.2,
            energy_max: 0.8,
            tags: BTreeSet::new(),
            content_type: ContentType::Narrative,
            is_active: true,
            sort_order: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(t.covers(0.2));
        assert!(t.covers(0.8));
        assert!(!t.covers(0.81));
        assert!(!t.covers(0.19));
    }

    #[test]
    fn session_patch_applies_single_field() {
        let mut s = Session::new("demo-1", "demo-user", None);
        assert!(s.is_ephemeral());
        s.apply(&SessionPatch::Energy(0.9));
        s.apply(&SessionPatch::Status(SessionStatus::Completed));
        assert_eq!(s.energy_level, 0.9);
        assert_eq!(s.status, SessionStatus::Completed);
        assert!(s.tags.is_empty());
    }
}
