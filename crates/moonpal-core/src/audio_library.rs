//! Pre-recorded bedtime clips per arousal bucket.
//!
//! `playable` serves the newest active `general` clip for an arousal (any arousal when
//! that bucket is empty); `regenerate` produces a fresh clip through the text and speech
//! providers and records it as the bucket's single active version. Regeneration needs a
//! real text vendor: the local fallback phrases never replace a recorded clip.

use crate::config::LlmProviderKind;
use crate::error::{RitualError, RitualResult};
use crate::llm::{CompanionContext, TextGenerator};
use crate::shared::{Arousal, AssetSource, AudioAsset, NewAudioAsset, GENERAL_ASSET_TYPE};
use crate::store::AssetStore;
use moonpal_voice::SpeechSynthesizer;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

const GENERATED_NOTE: &str = "AI 生成";

/// Clip handed to the player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayableAudio {
    pub url: String,
    pub arousal: Arousal,
    pub text: String,
}

pub struct AudioLibrary {
    assets: Arc<dyn AssetStore>,
    text: Arc<dyn TextGenerator>,
    speech: Arc<dyn SpeechSynthesizer>,
}

impl AudioLibrary {
    pub fn new(assets: Arc<dyn AssetStore>, text: Arc<dyn TextGenerator>, speech: Arc<dyn SpeechSynthesizer>) -> Self {
        Self { assets, text, speech }
    }

    /// Newest active clip for `arousal`, else newest active clip of any arousal.
    pub async fn playable(&self, arousal: Arousal) -> RitualResult<Option<PlayableAudio>> {
        let asset = match self.assets.latest_active_asset(GENERAL_ASSET_TYPE, Some(arousal)).await? {
            Some(a) => Some(a),
            None => {
                debug!(target: "moonpal::audio", arousal = %arousal, "No clip for arousal; trying any");
                self.assets.latest_active_asset(GENERAL_ASSET_TYPE, None).await?
            }
        };
        Ok(asset.map(|a| PlayableAudio {
            url: self.assets.public_url(&a.storage_path),
            arousal: a.arousal,
            text: a.original_text,
        }))
    }

    /// Generate narrative at the bucket's representative energy, synthesize it and record
    /// the result as the bucket's active clip. Synthesis and store failures are surfaced.
    pub async fn regenerate(&self, arousal: Arousal) -> RitualResult<AudioAsset> {
        if self.text.kind() == LlmProviderKind::Fallback {
            warn!(target: "moonpal::audio", arousal = %arousal, "Regeneration refused: no text vendor configured");
            return Err(RitualError::NotConfigured("text generation vendor (LLM_PROVIDER / LLM_API_KEY)".to_string()));
        }

        let ctx = CompanionContext {
            energy_level: arousal.representative_energy(),
            ..CompanionContext::default()
        };
        let text = self.text.generate_companion_text(&ctx).await;
        let audio = self.speech.synthesize(&text).await?;

        let asset = self
            .assets
            .record_active_asset(NewAudioAsset {
                asset_type: GENERAL_ASSET_TYPE.to_string(),
                arousal,
                storage_path: audio.url,
                source: AssetSource::Tts,
                original_text: text,
                note: Some(GENERATED_NOTE.to_string()),
            })
            .await?;
        info!(target: "moonpal::audio", arousal = %arousal, version = asset.version, asset_id = %asset.id, "Clip regenerated");
        Ok(asset)
    }

    /// Fill every arousal bucket, low to high. Stops at the first failure.
    pub async fn regenerate_all(&self) -> RitualResult<Vec<AudioAsset>> {
        let mut assets = Vec::with_capacity(Arousal::ALL.len());
        for arousal in Arousal::ALL {
            assets.push(self.regenerate(arousal).await?);
        }
        Ok(assets)
    }
}
