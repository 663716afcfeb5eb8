//! Data-access contracts the ritual core needs from its storage collaborator.
//!
//! The core never manages curated content or assets itself; it only reads templates and
//! statements, reads/writes session rows, and records generated audio. [`SledStore`] is
//! the bundled durable implementation.

mod sled_store;

pub use sled_store::{SeedFile, SledStore};

use crate::error::StoreError;
use crate::shared::{
    Arousal, AudioAsset, ContentTemplate, NewAudioAsset, PresenceStatement, Session, SessionPatch,
};

/// Read-only curated content.
#[async_trait::async_trait]
pub trait ContentStore: Send + Sync {
    /// Active templates whose inclusive energy range contains `energy`, by sort order ascending.
    async fn active_templates(&self, energy: f64) -> Result<Vec<ContentTemplate>, StoreError>;

    /// Active presence statements in `bucket`, by sort order ascending.
    async fn active_statements(&self, bucket: u8) -> Result<Vec<PresenceStatement>, StoreError>;
}

/// Durable session rows keyed by id.
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert_session(&self, session: &Session) -> Result<(), StoreError>;

    async fn get_session(&self, id: &str) -> Result<Option<Session>, StoreError>;

    /// Apply one field update. Updating a missing row is a no-op, not an error.
    async fn update_session(&self, id: &str, patch: SessionPatch) -> Result<(), StoreError>;
}

/// Recorded audio clips, one active per (type, arousal) category.
#[async_trait::async_trait]
pub trait AssetStore: Send + Sync {
    /// Deactivate the category's current actives, then insert `asset` as the active version.
    async fn record_active_asset(&self, asset: NewAudioAsset) -> Result<AudioAsset, StoreError>;

    /// Newest active asset of `asset_type`; restricted to `arousal` when given.
    async fn latest_active_asset(
        &self,
        asset_type: &str,
        arousal: Option<Arousal>,
    ) -> Result<Option<AudioAsset>, StoreError>;

    /// Publicly fetchable URL for a storage path.
    fn public_url(&self, storage_path: &str) -> String;
}
