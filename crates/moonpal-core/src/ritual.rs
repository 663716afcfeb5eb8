//! **RitualOrchestrator**: one session's lifecycle.
//! start → energy / tags / magic note → text → speech → complete.
//!
//! Ids starting with `demo-` are routed to a process-local map and never touch the
//! durable store. That map is last-writer-wins per session; concurrent updates of the
//! same trial session may overwrite each other.

use crate::error::RitualResult;
use crate::llm::{CompanionContext, TextGenerator};
use crate::resolver::{ContentResolver, MatchContext};
use crate::shared::{
    MatchTier, Session, SessionPatch, SessionStatus, EPHEMERAL_PREFIX, MAGIC_NOTE_MAX_CHARS, SOURCE_LLM,
};
use crate::store::{ContentStore, SessionStore};
use dashmap::DashMap;
use moonpal_voice::{SpeechAudio, SpeechSynthesizer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Routing predicate for the in-memory trial path.
pub fn is_ephemeral(id: &str) -> bool {
    id.starts_with(EPHEMERAL_PREFIX)
}

/// Text chosen for one turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedText {
    pub text: String,
    pub source: String,
    /// True when the text provider was consulted.
    pub used_llm: bool,
    #[serde(default)]
    pub template_id: Option<String>,
}

pub struct RitualOrchestrator {
    sessions: Arc<dyn SessionStore>,
    resolver: ContentResolver,
    text: Arc<dyn TextGenerator>,
    speech: Arc<dyn SpeechSynthesizer>,
    ephemeral: DashMap<String, Session>,
}

impl RitualOrchestrator {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        content: Arc<dyn ContentStore>,
        text: Arc<dyn TextGenerator>,
        speech: Arc<dyn SpeechSynthesizer>,
    ) -> Self {
        Self {
            sessions,
            resolver: ContentResolver::new(content),
            text,
            speech,
            ephemeral: DashMap::new(),
        }
    }

    /// Start a ritual with energy 0.5, no tags, status active. Trial users (`demo-` user
    /// ids) get a `demo-` session held in memory only. Store failures are fatal.
    pub async fn start(&self, user_id: &str, child_id: Option<&str>) -> RitualResult<String> {
        let child_id = child_id.map(str::to_string);
        if is_ephemeral(user_id) {
            let id = format!("{}{}", EPHEMERAL_PREFIX, uuid::Uuid::new_v4());
            let session = Session::new(id.clone(), user_id, child_id);
            self.ephemeral.insert(id.clone(), session);
            info!(target: "moonpal::ritual", session_id = %id, "Trial ritual started");
            return Ok(id);
        }

        let session = Session::new(uuid::Uuid::new_v4().to_string(), user_id, child_id);
        self.sessions.insert_session(&session).await?;
        info!(target: "moonpal::ritual", session_id = %session.id, user_id = %user_id, "Ritual started");
        Ok(session.id)
    }

    /// Overwrite the energy level, clamped to `[0, 1]`. Non-finite values are ignored.
    pub async fn update_energy(&self, session_id: &str, energy: f64) -> RitualResult<()> {
        if !energy.is_finite() {
            warn!(target: "moonpal::ritual", session_id = %session_id, energy, "Ignoring non-finite energy");
            return Ok(());
        }
        self.patch(session_id, SessionPatch::Energy(energy.clamp(0.0, 1.0))).await
    }

    /// Replace the tag set. Tags are trimmed; blanks and duplicates are dropped.
    pub async fn update_tags<I, S>(&self, session_id: &str, tags: I) -> RitualResult<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tags: BTreeSet<String> = tags
            .into_iter()
            .map(|t| t.as_ref().trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        self.patch(session_id, SessionPatch::Tags(tags)).await
    }

    /// Paid callers store up to 20 characters; anyone else stores nothing.
    pub async fn update_magic_note(&self, session_id: &str, note: Option<&str>, is_paid: bool) -> RitualResult<()> {
        let stored = if is_paid {
            note.map(str::trim)
                .filter(|n| !n.is_empty())
                .map(|n| n.chars().take(MAGIC_NOTE_MAX_CHARS).collect::<String>())
        } else {
            None
        };
        self.patch(session_id, SessionPatch::MagicNote(stored)).await
    }

    /// Mark completed. Harmless on completed or missing sessions. Trial sessions are
    /// dropped from memory once completed, so later reads see them as missing.
    pub async fn complete(&self, session_id: &str) -> RitualResult<()> {
        self.patch(session_id, SessionPatch::Status(SessionStatus::Completed)).await?;
        if is_ephemeral(session_id) {
            self.ephemeral.remove(session_id);
        }
        info!(target: "moonpal::ritual", session_id = %session_id, "Ritual completed");
        Ok(())
    }

    /// Current session state. Missing sessions and store read failures yield `None`.
    pub async fn session(&self, session_id: &str) -> Option<Session> {
        if is_ephemeral(session_id) {
            return self.ephemeral.get(session_id).map(|s| s.value().clone());
        }
        self.sessions.get_session(session_id).await.unwrap_or_else(|e| {
            warn!(target: "moonpal::ritual", session_id = %session_id, error = %e, "Session read failed; treating as absent");
            None
        })
    }

    /// Resolve this turn's narrative. Consults the text provider only when the resolver
    /// defers to it. `None` when the session does not exist.
    pub async fn generate_text(&self, session_id: &str) -> Option<GeneratedText> {
        let session = self.session(session_id).await?;
        let matched = self
            .resolver
            .resolve(&MatchContext {
                energy_level: session.energy_level,
                tags: &session.tags,
                magic_note: session.magic_note.as_deref(),
            })
            .await;

        if matched.tier != MatchTier::Llm {
            debug!(target: "moonpal::ritual", session_id = %session_id, source = %matched.source, "Curated text");
            return Some(GeneratedText {
                text: matched.text,
                source: matched.source,
                used_llm: false,
                template_id: matched.template_id,
            });
        }

        let ctx = CompanionContext {
            energy_level: session.energy_level,
            magic_note: session.magic_note.clone(),
            tags: session.tags.iter().cloned().collect(),
            session_id: session.id.clone(),
        };
        let text = self.text.generate_companion_text(&ctx).await;
        debug!(target: "moonpal::ritual", session_id = %session_id, provider = %self.text.kind(), "Generated text");
        Some(GeneratedText {
            text,
            source: SOURCE_LLM.to_string(),
            used_llm: true,
            template_id: None,
        })
    }

    /// Synthesis failures are surfaced; there is no silent audio fallback here.
    pub async fn synthesize_speech(&self, text: &str) -> RitualResult<SpeechAudio> {
        Ok(self.speech.synthesize(text).await?)
    }

    pub fn audio_url(&self, audio_id: &str) -> String {
        self.speech.audio_url(audio_id)
    }

    async fn patch(&self, session_id: &str, patch: SessionPatch) -> RitualResult<()> {
        if is_ephemeral(session_id) {
            match self.ephemeral.get_mut(session_id) {
                Some(mut session) => session.apply(&patch),
                None => debug!(target: "moonpal::ritual", session_id = %session_id, "Update on unknown trial session ignored"),
            }
            return Ok(());
        }
        self.sessions.update_session(session_id, patch).await?;
        Ok(())
    }
}
