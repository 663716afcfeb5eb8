//! moonpal-core: the bedtime ritual core.
//!
//! Content resolution (template → presence statement → text provider), companion text
//! providers with a shared local fallback, the session orchestrator with its in-memory
//! trial path, and the pre-recorded audio library. Storage is reached only through the
//! contracts in [`store`]; [`SledStore`] is the bundled implementation.

mod audio_library;
mod config;
mod error;
pub mod llm;
mod resolver;
mod ritual;
mod shared;
pub mod store;

pub use audio_library::{AudioLibrary, PlayableAudio};
pub use config::{LlmConfig, LlmProviderKind, MoonpalConfig, ProviderSettings, DEFAULT_SOCKET_TIMEOUT_SECS};
pub use error::{RitualError, RitualResult, StoreError};
pub use llm::{create_text_generator, fallback_narrative, CompanionContext, FallbackGenerator, TextGenerator};
pub use resolver::{select_template, ContentResolver, MatchContext};
pub use ritual::{is_ephemeral, GeneratedText, RitualOrchestrator};
pub use shared::{
    presence_bucket, Arousal, AssetSource, AudioAsset, ContentTemplate, ContentType, MatchResult, MatchTier,
    NewAudioAsset, PresenceStatement, Session, SessionPatch, SessionStatus, DEFAULT_ENERGY, EPHEMERAL_PREFIX,
    GENERAL_ASSET_TYPE, MAGIC_NOTE_MAX_CHARS, PRESENCE_BUCKETS, SOURCE_LLM, SOURCE_LLM_FALLBACK, SOURCE_PRESENCE,
    SOURCE_PRESENCE_FALLBACK, SOURCE_TEMPLATES,
};
pub use store::{AssetStore, ContentStore, SeedFile, SessionStore, SledStore};

pub use moonpal_voice::{create_speech_synthesizer, SpeechAudio, SpeechSynthesizer, TtsConfig, TtsProviderKind, VoiceError};
