//! **SpeechSynthesizer**: text in, playable audio handle out.
//!
//! Every vendor adapter implements [`SpeechVendor`] (one network round-trip, no caching).
//! [`CachedSynthesizer`] wraps a vendor with a per-instance cache keyed by [`cache_key`],
//! so the cache lives and dies with the provider instance.

use crate::config::TtsProviderKind;
use crate::error::{VoiceError, VoiceResult};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Playable audio produced for one piece of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeechAudio {
    /// Cache key of the source text; doubles as the audio id.
    pub id: String,
    /// Fetchable URL (http(s) or `data:` URL for vendors that return raw bytes).
    pub url: String,
    pub text: String,
    /// Reported duration; 0.0 when the vendor does not report one.
    pub duration_seconds: f64,
}

/// What a vendor hands back for one synthesis call.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedAudio {
    pub url: String,
    pub duration_seconds: f64,
}

/// Uniform speech interface used by the ritual orchestrator.
#[async_trait::async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text`. Vendor failures and empty payloads are returned as errors.
    async fn synthesize(&self, text: &str) -> VoiceResult<SpeechAudio>;

    /// URL for a previously produced audio id. Unknown ids are returned unchanged,
    /// since ids and URLs share one representation space.
    fn audio_url(&self, audio_id: &str) -> String;

    fn kind(&self) -> TtsProviderKind;
}

/// One vendor TTS API. Implementations perform exactly one request per call.
#[async_trait::async_trait]
pub trait SpeechVendor: Send + Sync {
    async fn render(&self, text: &str) -> VoiceResult<RenderedAudio>;

    fn kind(&self) -> TtsProviderKind;
}

/// Rolling 31-multiplier hash over UTF-16 code units, rendered as `tts_<abs>`.
///
/// Not cryptographic. Two texts may collide and then share a cached clip; for short
/// bedtime phrases that is an accepted approximation.
pub fn cache_key(text: &str) -> String {
    let hash = text
        .encode_utf16()
        .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(i32::from(unit)));
    format!("tts_{}", hash.unsigned_abs())
}

/// Vendor adapter plus its audio cache.
pub struct CachedSynthesizer<V> {
    vendor: V,
    cache: DashMap<String, SpeechAudio>,
}

impl<V: SpeechVendor> CachedSynthesizer<V> {
    pub fn new(vendor: V) -> Self {
        Self {
            vendor,
            cache: DashMap::new(),
        }
    }

    /// Number of cached clips.
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }
}

#[async_trait::async_trait]
impl<V: SpeechVendor> SpeechSynthesizer for CachedSynthesizer<V> {
    async fn synthesize(&self, text: &str) -> VoiceResult<SpeechAudio> {
        if text.trim().is_empty() {
            return Err(VoiceError::EmptyAudio);
        }
        let id = cache_key(text);
        if let Some(hit) = self.cache.get(&id) {
            debug!(target: "moonpal::voice", audio_id = %id, "TTS cache hit");
            return Ok(SpeechAudio {
                text: text.to_string(),
                ..hit.value().clone()
            });
        }

        let rendered = self.vendor.render(text).await?;
        if rendered.url.is_empty() {
            return Err(VoiceError::EmptyAudio);
        }
        let audio = SpeechAudio {
            id: id.clone(),
            url: rendered.url,
            text: text.to_string(),
            duration_seconds: rendered.duration_seconds,
        };
        self.cache.insert(id, audio.clone());
        Ok(audio)
    }

    fn audio_url(&self, audio_id: &str) -> String {
        self.cache
            .get(audio_id)
            .map(|a| a.url.clone())
            .unwrap_or_else(|| audio_id.to_string())
    }

    fn kind(&self) -> TtsProviderKind {
        self.vendor.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingVendor {
        calls: Arc<AtomicUsize>,
        url: String,
    }

    #[async_trait::async_trait]
    impl SpeechVendor for CountingVendor {
        async fn render(&self, _text: &str) -> VoiceResult<RenderedAudio> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(RenderedAudio {
                url: self.url.clone(),
                duration_seconds: 2.5,
            })
        }

        fn kind(&self) -> TtsProviderKind {
            TtsProviderKind::MiniMax
        }
    }

    #[test]
    fn cache_key_matches_rolling_hash() {
        assert_eq!(cache_key(""), "tts_0");
        // 'a' = 97; "ab" = 97 * 31 + 98
        assert_eq!(cache_key("a"), "tts_97");
        assert_eq!(cache_key("ab"), format!("tts_{}", 97 * 31 + 98));
        assert_eq!(cache_key("我在这里"), cache_key("我在这里"));
        assert_ne!(cache_key("我在这里"), cache_key("我一直在"));
    }

    #[test]
    fn cache_key_wraps_instead_of_overflowing() {
        let long = "夜深了，我陪着你。".repeat(64);
        assert!(cache_key(&long).starts_with("tts_"));
    }

    #[tokio::test]
    async fn second_synthesis_is_served_from_cache() {
        let calls = Arc::new(AtomicUsize::new(0));
        let synth = CachedSynthesizer::new(CountingVendor {
            calls: Arc::clone(&calls),
            url: "https://cdn.example/a.mp3".to_string(),
        });

        let first = synth.synthesize("我在这里，陪你。").await.unwrap();
        let second = synth.synthesize("我在这里，陪你。").await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first, second);
        assert_eq!(synth.audio_url(&first.id), "https://cdn.example/a.mp3");
    }

    #[tokio::test]
    async fn empty_vendor_url_is_an_error_and_not_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let synth = CachedSynthesizer::new(CountingVendor {
            calls: Arc::clone(&calls),
            url: String::new(),
        });

        assert!(matches!(synth.synthesize("有我在。").await, Err(VoiceError::EmptyAudio)));
        assert!(synth.synthesize("有我在。").await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(synth.cached_len(), 0);
    }

    #[tokio::test]
    async fn blank_text_never_reaches_the_vendor() {
        let calls = Arc::new(AtomicUsize::new(0));
        let synth = CachedSynthesizer::new(CountingVendor {
            calls: Arc::clone(&calls),
            url: "x".to_string(),
        });
        assert!(synth.synthesize("   ").await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unknown_id_is_returned_unchanged() {
        let synth = CachedSynthesizer::new(CountingVendor {
            calls: Arc::new(AtomicUsize::new(0)),
            url: String::new(),
        });
        assert_eq!(synth.audio_url("https://x/y.mp3"), "https://x/y.mp3");
    }
}
