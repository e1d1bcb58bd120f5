//! Playlist aus einem lokalen JSON-Index
//!
//! Der Index ist ein JSON-Objekt, dessen Werte Eintraege der Form
//! `{ "id": ..., "name": ..., "date": ... }` sind (`date` wird ignoriert).
//! Die Bytes eines Clips liegen unter `<audio_verzeichnis>/<id>`.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use brainswap_core::{AudioRef, BrainswapError, Playlist, Result};
use bytes::Bytes;
use serde::Deserialize;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct IndexEintrag {
    id: String,
    #[serde(default)]
    name: Option<String>,
}

/// Playlist-Kollaborateur ueber Dateisystem
#[derive(Debug, Clone)]
pub struct JsonPlaylist {
    index: PathBuf,
    audio_verzeichnis: PathBuf,
}

impl JsonPlaylist {
    pub fn neu(index: impl Into<PathBuf>, audio_verzeichnis: impl Into<PathBuf>) -> Self {
        Self {
            index: index.into(),
            audio_verzeichnis: audio_verzeichnis.into(),
        }
    }

    /// Wertet einen Index-Text aus
    fn index_auswerten(&self, inhalt: &str) -> Result<Vec<AudioRef>> {
        let eintraege: BTreeMap<String, IndexEintrag> = serde_json::from_str(inhalt)
            .map_err(|e| {
                BrainswapError::Playlist(format!(
                    "Index '{}' ungueltig: {e}",
                    self.index.display()
                ))
            })?;

        Ok(eintraege
            .into_values()
            .map(|e| {
                let locator = self.audio_verzeichnis.join(&e.id);
                let name = e.name.unwrap_or_else(|| e.id.clone());
                AudioRef::new(e.id, name, locator.to_string_lossy())
            })
            .collect())
    }
}

#[async_trait]
impl Playlist for JsonPlaylist {
    async fn list_audio_refs(&self) -> Result<Vec<AudioRef>> {
        let inhalt = match tokio::fs::read_to_string(&self.index).await {
            Ok(inhalt) => inhalt,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(index = %self.index.display(), "Playlist-Index fehlt, Liste ist leer");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };
        let refs = self.index_auswerten(&inhalt)?;
        debug!(anzahl = refs.len(), "Playlist geladen");
        Ok(refs)
    }

    async fn fetch_bytes(&self, reference: &AudioRef) -> Result<Bytes> {
        tokio::fs::read(&reference.locator)
            .await
            .map(Bytes::from)
            .map_err(|e| BrainswapError::Abruf {
                id: reference.id.as_str().to_string(),
                grund: e.to_string(),
            })
    }
}
