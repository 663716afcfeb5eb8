//! Sled-backed collaborator store: one tree per table, JSON rows keyed by id.

use super::{AssetStore, ContentStore, SessionStore};
use crate::error::StoreError;
use crate::shared::{
    Arousal, AudioAsset, ContentTemplate, NewAudioAsset, PresenceStatement, Session, SessionPatch,
    PRESENCE_BUCKETS,
};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

const TEMPLATES_TREE: &str = "mp_content_templates";
const STATEMENTS_TREE: &str = "mp_presence_statements";
const SESSIONS_TREE: &str = "mp_sessions";
const ASSETS_TREE: &str = "audio_assets";

/// Curated content seed, loaded from TOML (`[[templates]]`, `[[statements]]`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub templates: Vec<ContentTemplate>,
    #[serde(default)]
    pub statements: Vec<PresenceStatement>,
}

pub struct SledStore {
    db: sled::Db,
    templates: sled::Tree,
    statements: sled::Tree,
    sessions: sled::Tree,
    assets: sled::Tree,
    /// Prefix for relative storage paths in [`AssetStore::public_url`].
    public_base_url: String,
    /// Serializes deactivate-then-insert so each category keeps one active asset.
    asset_lock: Mutex<()>,
}

impl SledStore {
    /// Opens or creates a sled database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        Ok(Self {
            templates: db.open_tree(TEMPLATES_TREE)?,
            statements: db.open_tree(STATEMENTS_TREE)?,
            sessions: db.open_tree(SESSIONS_TREE)?,
            assets: db.open_tree(ASSETS_TREE)?,
            public_base_url: String::new(),
            asset_lock: Mutex::new(()),
            db,
        })
    }

    /// Force pending writes to disk.
    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }

    pub fn with_public_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.public_base_url = base_url.into();
        self
    }

    /// Insert or replace a template. Rejects `energy_min > energy_max`.
    pub fn upsert_template(&self, template: &ContentTemplate) -> Result<(), StoreError> {
        if template.energy_min > template.energy_max {
            return Err(StoreError::Seed(format!(
                "template {}: energy_min {} > energy_max {}",
                template.id, template.energy_min, template.energy_max
            )));
        }
        put_row(&self.templates, &template.id, template)
    }

    /// Insert or replace a presence statement. Rejects buckets outside `0..=4`.
    pub fn upsert_statement(&self, statement: &PresenceStatement) -> Result<(), StoreError> {
        if statement.energy_level >= PRESENCE_BUCKETS {
            return Err(StoreError::Seed(format!(
                "statement {}: bucket {} outside 0..={}",
                statement.id,
                statement.energy_level,
                PRESENCE_BUCKETS - 1
            )));
        }
        put_row(&self.statements, &statement.id, statement)
    }

    /// Load a TOML seed file. Returns `(templates, statements)` imported.
    pub fn import_seed<P: AsRef<Path>>(&self, path: P) -> Result<(usize, usize), StoreError> {
        let raw = std::fs::read_to_string(path.as_ref())
            .map_err(|e| StoreError::Seed(format!("{}: {}", path.as_ref().display(), e)))?;
        let seed: SeedFile = toml::from_str(&raw).map_err(|e| StoreError::Seed(e.to_string()))?;
        for t in &seed.templates {
            self.upsert_template(t)?;
        }
        for s in &seed.statements {
            self.upsert_statement(s)?;
        }
        info!(
            target: "moonpal::store",
            templates = seed.templates.len(),
            statements = seed.statements.len(),
            "Seed imported"
        );
        Ok((seed.templates.len(), seed.statements.len()))
    }
}

fn put_row<T: Serialize>(tree: &sled::Tree, id: &str, row: &T) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec(row)?;
    tree.insert(id.as_bytes(), bytes)?;
    Ok(())
}

fn get_row<T: DeserializeOwned>(tree: &sled::Tree, id: &str) -> Result<Option<T>, StoreError> {
    match tree.get(id.as_bytes())? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

fn scan<T: DeserializeOwned>(tree: &sled::Tree) -> Result<Vec<T>, StoreError> {
    tree.iter()
        .values()
        .map(|v| -> Result<T, StoreError> { Ok(serde_json::from_slice(&v?)?) })
        .collect()
}

#[async_trait::async_trait]
impl ContentStore for SledStore {
    async fn active_templates(&self, energy: f64) -> Result<Vec<ContentTemplate>, StoreError> {
        let mut rows: Vec<ContentTemplate> = scan::<ContentTemplate>(&self.templates)?
            .into_iter()
            .filter(|t| t.is_active && t.covers(energy))
            .collect();
        rows.sort_by_key(|t| t.sort_order);
        Ok(rows)
    }

    async fn active_statements(&self, bucket: u8) -> Result<Vec<PresenceStatement>, StoreError> {
        let mut rows: Vec<PresenceStatement> = scan::<PresenceStatement>(&self.statements)?
            .into_iter()
            .filter(|s| s.is_active && s.energy_level == bucket)
            .collect();
        rows.sort_by_key(|s| s.sort_order);
        Ok(rows)
    }
}

#[async_trait::async_trait]
impl SessionStore for SledStore {
    async fn insert_session(&self, session: &Session) -> Result<(), StoreError> {
        put_row(&self.sessions, &session.id, session)
    }

    async fn get_session(&self, id: &str) -> Result<Option<Session>, StoreError> {
        get_row(&self.sessions, id)
    }

    async fn update_session(&self, id: &str, patch: SessionPatch) -> Result<(), StoreError> {
        let Some(mut session) = get_row::<Session>(&self.sessions, id)? else {
            debug!(target: "moonpal::store", session_id = %id, "Update on missing session ignored");
            return Ok(());
        };
        session.apply(&patch);
        put_row(&self.sessions, id, &session)
    }
}

#[async_trait::async_trait]
impl AssetStore for SledStore {
    async fn record_active_asset(&self, asset: NewAudioAsset) -> Result<AudioAsset, StoreError> {
        let _guard = self
            .asset_lock
            .lock()
            .map_err(|e| StoreError::Unavailable(format!("asset lock poisoned: {}", e)))?;

        let mut previous_version = 0;
        for mut row in scan::<AudioAsset>(&self.assets)? {
            if row.asset_type != asset.asset_type || row.arousal != asset.arousal {
                continue;
            }
            previous_version = previous_version.max(row.version);
            if row.is_active {
                row.is_active = false;
                put_row(&self.assets, &row.id, &row)?;
            }
        }

        let record = AudioAsset {
            id: uuid::Uuid::new_v4().to_string(),
            asset_type: asset.asset_type,
            arousal: asset.arousal,
            storage_path: asset.storage_path,
            source: asset.source,
            original_text: asset.original_text,
            version: previous_version + 1,
            is_active: true,
            note: asset.note,
            created_at: Utc::now(),
        };
        put_row(&self.assets, &record.id, &record)?;
        Ok(record)
    }

    async fn latest_active_asset(
        &self,
        asset_type: &str,
        arousal: Option<Arousal>,
    ) -> Result<Option<AudioAsset>, StoreError> {
        let newest = scan::<AudioAsset>(&self.assets)?
            .into_iter()
            .filter(|a| a.is_active && a.asset_type == asset_type)
            .filter(|a| arousal.map_or(true, |want| a.arousal == want))
            .max_by(|a, b| a.created_at.cmp(&b.created_at).then(a.version.cmp(&b.version)));
        Ok(newest)
    }

    fn public_url(&self, storage_path: &str) -> String {
        let already_url = ["http://", "https://", "data:"]
            .iter()
            .any(|p| storage_path.starts_with(p));
        if already_url || self.public_base_url.is_empty() {
            return storage_path.to_string();
        }
        format!(
            "{}/{}",
            self.public_base_url.trim_end_matches('/'),
            storage_path.trim_start_matches('/')
        )
    }
}
