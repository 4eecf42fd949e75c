//! **Artifact Store** - transient synthesized-audio hand-off to the
//! telephony layer.
//!
//! The telephony layer can only play audio it fetches by URL, so every
//! synthesized clip is written under a collision-free name and served back
//! on a later GET. Names combine the sanitized call reference with a UUID
//! token; concurrent turns across any number of calls never collide and no
//! shared counter or lock is involved. Artifacts are immutable once stored.

use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::{VoiceError, VoiceResult};
use crate::tts::{AudioClip, AudioContainer};

const DEFAULT_MAX_RETAINED: usize = 256;
const MAX_REF_STEM_LEN: usize = 64;

/// A stored artifact: its name and the URL the telephony layer fetches.
#[derive(Debug, Clone)]
pub struct StoredArtifact {
    pub name: String,
    pub public_url: String,
}

/// Filesystem-backed store serving artifacts under `{public_base_url}/audio/{name}`.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
    public_base_url: String,
    max_retained: usize,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            public_base_url: public_base_url.into(),
            max_retained: DEFAULT_MAX_RETAINED,
        }
    }

    /// Build from environment: PUBLIC_BASE_URL (required), ARTIFACT_DIR and
    /// ARTIFACT_MAX_RETAINED (optional).
    pub fn from_env() -> VoiceResult<Self> {
        let public_base_url = crate::telephony::require_env("PUBLIC_BASE_URL")?;
        let dir = std::env::var("ARTIFACT_DIR").unwrap_or_else(|_| "./artifacts".to_string());
        let max_retained = std::env::var("ARTIFACT_MAX_RETAINED")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_RETAINED);
        Ok(Self::new(dir, public_base_url).with_max_retained(max_retained))
    }

    /// Cap on retained artifacts; oldest files are pruned past it.
    pub fn with_max_retained(mut self, max_retained: usize) -> Self {
        self.max_retained = max_retained.max(1);
        self
    }

    /// Base URL under which artifacts are publicly served.
    pub fn public_base_url(&self) -> &str {
        &self.public_base_url
    }

    /// Persist a clip under a fresh unique name and return its public URL.
    pub async fn store(&self, call_ref: &str, clip: &AudioClip) -> VoiceResult<StoredArtifact> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let name = format!(
            "{}-{}.{}",
            sanitize_ref(call_ref),
            Uuid::new_v4().simple(),
            clip.format.container.extension()
        );

        // Write to a partial name and rename, so a failed write is never
        // visible under a fetchable name.
        let partial = self.dir.join(format!("{name}.part"));
        let dest = self.dir.join(&name);
        tokio::fs::write(&partial, &clip.bytes).await?;
        tokio::fs::rename(&partial, &dest).await?;

        if let Err(e) = self.prune_oldest().await {
            tracing::warn!("artifact pruning failed: {}", e);
        }

        let public_url = format!(
            "{}/audio/{}",
            self.public_base_url.trim_end_matches('/'),
            name
        );
        tracing::info!("stored artifact {} ({} bytes)", name, clip.bytes.len());
        Ok(StoredArtifact { name, public_url })
    }

    /// Read an artifact back for the telephony layer's GET. Returns the
    /// bytes and the content type matching the stored container.
    pub async fn fetch(&self, name: &str) -> VoiceResult<(Vec<u8>, &'static str)> {
        validate_name(name)?;
        let path = self.dir.join(name);
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|_| VoiceError::Artifact(format!("no artifact named {name}")))?;
        Ok((bytes, content_type_for(name)))
    }

    /// Delete oldest files past the retention cap, by modification time.
    async fn prune_oldest(&self) -> VoiceResult<()> {
        let mut entries = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = dir.next_entry().await? {
            let meta = match entry.metadata().await {
                Ok(m) if m.is_file() => m,
                _ => continue,
            };
            let modified = meta
                .modified()
                .unwrap_or(std::time::SystemTime::UNIX_EPOCH);
            entries.push((modified, entry.path()));
        }
        if entries.len() <= self.max_retained {
            return Ok(());
        }
        entries.sort_by_key(|(modified, _)| *modified);
        let excess = entries.len() - self.max_retained;
        for (_, path) in entries.into_iter().take(excess) {
            if let Err(e) = tokio::fs::remove_file(&path).await {
                tracing::warn!("could not remove old artifact {:?}: {}", path, e);
            }
        }
        Ok(())
    }
}

/// Reduce an opaque call reference to a safe file-name stem.
fn sanitize_ref(call_ref: &str) -> String {
    let stem: String = call_ref
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(MAX_REF_STEM_LEN)
        .collect();
    if stem.is_empty() {
        "call".to_string()
    } else {
        stem
    }
}

/// Artifact names are exactly what `store` generates; anything else (path
/// separators, dot segments, partial files) is rejected before touching the
/// filesystem.
fn validate_name(name: &str) -> VoiceResult<()> {
    let well_formed = !name.is_empty()
        && !name.starts_with('.')
        && !name.ends_with(".part")
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
        && !name.contains("..");
    if well_formed {
        Ok(())
    } else {
        Err(VoiceError::Artifact(format!(
            "invalid artifact name: {name}"
        )))
    }
}

fn content_type_for(name: &str) -> &'static str {
    match Path::new(name).extension().and_then(|e| e.to_str()) {
        Some("mp3") => AudioContainer::Mp3.content_type(),
        Some("wav") => AudioContainer::Wav.content_type(),
        _ => "application/octet-stream",
    }
}
