//! **ContentResolver**: picks the narrative text for one ritual turn.
//!
//! Tier order, first usable result wins:
//!
//! 1. No tags and no magic note: a random active presence statement in the energy bucket.
//! 2. Tags or a magic note: the best active template covering the energy level
//!    (see [`select_template`]).
//! 3. Otherwise a presence statement from the bucket, tagged as a fallback.
//! 4. Otherwise tier `llm` with empty text; the caller asks the text provider.
//!
//! Empty candidate sets are never errors. Store read failures are logged and treated as
//! empty sets, so `resolve` always returns a [`MatchResult`].

use crate::shared::{
    presence_bucket, ContentTemplate, MatchResult, PresenceStatement, SOURCE_PRESENCE,
    SOURCE_PRESENCE_FALLBACK,
};
use crate::store::ContentStore;
use rand::seq::SliceRandom;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Session attributes the resolver looks at.
#[derive(Debug, Clone, Copy)]
pub struct MatchContext<'a> {
    pub energy_level: f64,
    pub tags: &'a BTreeSet<String>,
    pub magic_note: Option<&'a str>,
}

impl<'a> MatchContext<'a> {
    /// Any non-empty note counts, whitespace included; notes are normalised upstream.
    fn note(&self) -> Option<&'a str> {
        self.magic_note.filter(|n| !n.is_empty())
    }

    /// True when the turn carries tags or a magic note.
    pub fn has_signal(&self) -> bool {
        !self.tags.is_empty() || self.note().is_some()
    }

    /// `tags ∪ {magic_note}`.
    pub fn search_tags(&self) -> BTreeSet<&'a str> {
        let mut search: BTreeSet<&'a str> = self.tags.iter().map(String::as_str).collect();
        if let Some(note) = self.note() {
            search.insert(note);
        }
        search
    }
}

/// Template tie-break over candidates already in sort order:
/// the first one sharing a tag with `search_tags`, else the first one with any tags,
/// else the first one.
pub fn select_template<'t>(
    templates: &'t [ContentTemplate],
    search_tags: &BTreeSet<&str>,
) -> Option<&'t ContentTemplate> {
    templates
        .iter()
        .find(|t| t.tags.iter().any(|tag| search_tags.contains(tag.as_str())))
        .or_else(|| templates.iter().find(|t| !t.tags.is_empty()))
        .or_else(|| templates.first())
}

pub struct ContentResolver {
    content: Arc<dyn ContentStore>,
}

impl ContentResolver {
    pub fn new(content: Arc<dyn ContentStore>) -> Self {
        Self { content }
    }

    pub async fn resolve(&self, ctx: &MatchContext<'_>) -> MatchResult {
        let bucket = presence_bucket(ctx.energy_level);

        if ctx.has_signal() {
            let templates = self.templates(ctx.energy_level).await;
            if let Some(template) = select_template(&templates, &ctx.search_tags()) {
                debug!(target: "moonpal::resolver", template_id = %template.id, "Template matched");
                return MatchResult::template(template);
            }
        } else if let Some(text) = self.pick_statement(bucket).await {
            return MatchResult::statement(text, SOURCE_PRESENCE);
        }

        // A no-signal turn already read this bucket and found nothing.
        if ctx.has_signal() {
            if let Some(text) = self.pick_statement(bucket).await {
                return MatchResult::statement(text, SOURCE_PRESENCE_FALLBACK);
            }
        }

        debug!(target: "moonpal::resolver", bucket, "No curated content; deferring to text provider");
        MatchResult::llm()
    }

    async fn templates(&self, energy: f64) -> Vec<ContentTemplate> {
        self.content.active_templates(energy).await.unwrap_or_else(|e| {
            warn!(target: "moonpal::resolver", error = %e, "Template lookup failed; treating as empty");
            Vec::new()
        })
    }

    async fn pick_statement(&self, bucket: u8) -> Option<String> {
        let statements: Vec<PresenceStatement> =
            self.content.active_statements(bucket).await.unwrap_or_else(|e| {
                warn!(target: "moonpal::resolver", error = %e, bucket, "Statement lookup failed; treating as empty");
                Vec::new()
            });
        statements
            .choose(&mut rand::thread_rng())
            .map(|s| s.statement.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::shared::{ContentType, MatchTier, SOURCE_LLM_FALLBACK, SOURCE_TEMPLATES};
    use chrono::Utc;

    #[derive(Default)]
    struct FixedContent {
        templates: Vec<ContentTemplate>,
        statements: Vec<PresenceStatement>,
    }

    #[async_trait::async_trait]
    impl ContentStore for FixedContent {
        async fn active_templates(&self, energy: f64) -> Result<Vec<ContentTemplate>, StoreError> {
            let mut rows: Vec<ContentTemplate> = self
                .templates
                .iter()
                .filter(|t| t.is_active && t.covers(energy))
                .cloned()
                .collect();
            rows.sort_by_key(|t| t.sort_order);
            Ok(rows)
        }

        async fn active_statements(&self, bucket: u8) -> Result<Vec<PresenceStatement>, StoreError> {
            Ok(self
                .statements
                .iter()
                .filter(|s| s.is_active && s.energy_level == bucket)
                .cloned()
                .collect())
        }
    }

    struct BrokenContent;

    #[async_trait::async_trait]
    impl ContentStore for BrokenContent {
        async fn active_templates(&self, _energy: f64) -> Result<Vec<ContentTemplate>, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }

        async fn active_statements(&self, _bucket: u8) -> Result<Vec<PresenceStatement>, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
    }

    fn template(id: &str, min: f64, max: f64, tags: &[&str], sort_order: i32) -> ContentTemplate {
        ContentTemplate {
            id: id.to_string(),
            title: id.to_string(),
            content: format!("content of {}", id),
            energy_min: min,
            energy_max: max,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            content_type: ContentType::Narrative,
            is_active: true,
            sort_order,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn statement(id: &str, text: &str, bucket: u8) -> PresenceStatement {
        PresenceStatement {
            id: id.to_string(),
            statement: text.to_string(),
            energy_level: bucket,
            is_active: true,
            sort_order: 0,
            created_at: Utc::now(),
        }
    }

    fn resolver(store: FixedContent) -> ContentResolver {
        ContentResolver::new(Arc::new(store))
    }

    fn tags(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|t| t.to_string()).collect()
    }

    #[tokio::test]
    async fn no_signal_picks_statement_from_bucket() {
        let store = FixedContent {
            statements: vec![
                statement("s1", "一", 0),
                statement("s2", "二", 0),
                statement("s3", "三", 0),
                statement("other", "别的桶", 2),
            ],
            templates: vec![template("t", 0.0, 1.0, &[], 0)],
        };
        let r = resolver(store);
        let empty = BTreeSet::new();
        for _ in 0..20 {
            let m = r
                .resolve(&MatchContext { energy_level: 0.05, tags: &empty, magic_note: None })
                .await;
            assert_eq!(m.tier, MatchTier::Statement);
            assert_eq!(m.source, SOURCE_PRESENCE);
            assert!(["一", "二", "三"].contains(&m.text.as_str()), "unexpected {}", m.text);
        }
    }

    #[tokio::test]
    async fn no_signal_never_returns_template() {
        let store = FixedContent {
            templates: vec![template("t", 0.0, 1.0, &["月亮"], 0)],
            statements: vec![],
        };
        let r = resolver(store);
        let empty = BTreeSet::new();
        let m = r
            .resolve(&MatchContext { energy_level: 0.5, tags: &empty, magic_note: Some("") })
            .await;
        assert_eq!(m.tier, MatchTier::Llm);
    }

    #[tokio::test]
    async fn whitespace_note_is_still_a_signal() {
        let store = FixedContent {
            templates: vec![template("t", 0.0, 1.0, &["月亮"], 0)],
            statements: vec![statement("s", "我在。", 2)],
        };
        let r = resolver(store);
        let empty = BTreeSet::new();
        let m = r
            .resolve(&MatchContext { energy_level: 0.5, tags: &empty, magic_note: Some("  ") })
            .await;
        assert_eq!(m.tier, MatchTier::Template);
        assert_eq!(m.template_id.as_deref(), Some("t"));
    }

    #[tokio::test]
    async fn tag_match_outranks_sort_order() {
        let store = FixedContent {
            templates: vec![
                template("untagged", 0.0, 1.0, &[], 0),
                template("other-tag", 0.0, 1.0, &["太阳"], 1),
                template("moon", 0.2, 0.8, &["月亮"], 5),
            ],
            statements: vec![],
        };
        let r = resolver(store);
        let t = tags(&["月亮"]);
        let m = r
            .resolve(&MatchContext { energy_level: 0.5, tags: &t, magic_note: None })
            .await;
        assert_eq!(m.tier, MatchTier::Template);
        assert_eq!(m.source, SOURCE_TEMPLATES);
        assert_eq!(m.template_id.as_deref(), Some("moon"));
        assert_eq!(m.text, "content of moon");
    }

    #[tokio::test]
    async fn magic_note_counts_as_search_tag() {
        let store = FixedContent {
            templates: vec![
                template("plain", 0.0, 1.0, &["太阳"], 0),
                template("cat", 0.0, 1.0, &["小猫"], 1),
            ],
            statements: vec![],
        };
        let r = resolver(store);
        let empty = BTreeSet::new();
        let m = r
            .resolve(&MatchContext { energy_level: 0.3, tags: &empty, magic_note: Some("小猫") })
            .await;
        assert_eq!(m.template_id.as_deref(), Some("cat"));
    }

    #[test]
    fn tie_break_prefers_tagged_then_first() {
        let search: BTreeSet<&str> = ["星星"].into_iter().collect();
        let list = vec![
            template("a", 0.0, 1.0, &[], 0),
            template("b", 0.0, 1.0, &["太阳"], 1),
        ];
        assert_eq!(select_template(&list, &search).map(|t| t.id.as_str()), Some("b"));

        let untagged = vec![template("a", 0.0, 1.0, &[], 0), template("c", 0.0, 1.0, &[], 1)];
        assert_eq!(select_template(&untagged, &search).map(|t| t.id.as_str()), Some("a"));
        assert!(select_template(&[], &search).is_none());
    }

    #[tokio::test]
    async fn signal_without_templates_falls_back_to_statement() {
        let store = FixedContent {
            templates: vec![template("far", 0.9, 1.0, &["月亮"], 0)],
            statements: vec![statement("s", "我在这里。", 1)],
        };
        let r = resolver(store);
        let t = tags(&["月亮"]);
        let m = r
            .resolve(&MatchContext { energy_level: 0.25, tags: &t, magic_note: None })
            .await;
        assert_eq!(m.tier, MatchTier::Statement);
        assert_eq!(m.source, SOURCE_PRESENCE_FALLBACK);
        assert_eq!(m.text, "我在这里。");
    }

    #[tokio::test]
    async fn empty_stores_defer_to_llm() {
        let r = resolver(FixedContent::default());
        let t = tags(&["星星"]);
        let m = r
            .resolve(&MatchContext { energy_level: 0.5, tags: &t, magic_note: None })
            .await;
        assert_eq!(m.tier, MatchTier::Llm);
        assert_eq!(m.text, "");
        assert_eq!(m.source, SOURCE_LLM_FALLBACK);
        assert!(m.template_id.is_none());
    }

    #[tokio::test]
    async fn full_energy_uses_top_bucket() {
        let store = FixedContent {
            templates: vec![],
            statements: vec![statement("top", "有我在。", 4)],
        };
        let r = resolver(store);
        let empty = BTreeSet::new();
        let m = r
            .resolve(&MatchContext { energy_level: 1.0, tags: &empty, magic_note: None })
            .await;
        assert_eq!(m.text, "有我在。");
    }

    #[tokio::test]
    async fn store_failures_are_not_errors() {
        let r = ContentResolver::new(Arc::new(BrokenContent));
        let t = tags(&["月亮"]);
        let m = r
            .resolve(&MatchContext { energy_level: 0.5, tags: &t, magic_note: Some("猫") })
            .await;
        assert_eq!(m.tier, MatchTier::Llm);
    }
}
