//! Playlist-Kollaborateur
//!
//! Der Kern braucht vom Playlist-Speicher nur zwei Dinge: die Liste der
//! verfuegbaren Referenzen und die Bytes zu einer Referenz. Upload und
//! Remote-Speicherung liegen ausserhalb.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::{BrainswapError, Result};
use crate::types::AudioRef;

/// Schnittstelle zur Audio-Playlist
#[async_trait]
pub trait Playlist: Send + Sync {
    /// Alle verfuegbaren Referenzen (darf leer sein)
    async fn list_audio_refs(&self) -> Result<Vec<AudioRef>>;

    /// Rohe Audio-Bytes fuer eine Referenz
    async fn fetch_bytes(&self, reference: &AudioRef) -> Result<Bytes>;
}

/// Waehlt gleichverteilt eine Referenz aus der Liste. `None` bei leerer Liste.
pub fn pick_random<R: Rng + ?Sized>(list: &[AudioRef], rng: &mut R) -> Option<AudioRef> {
    list.choose(rng).cloned()
}

/// In-Memory Playlist (Tests, Offline-Betrieb)
#[derive(Debug, Clone, Default)]
pub struct MemoryPlaylist {
    refs: Vec<AudioRef>,
    daten: HashMap<String, Bytes>,
}

impl MemoryPlaylist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fuegt eine Referenz samt Bytes hinzu
    pub fn with_clip(mut self, reference: AudioRef, bytes: impl Into<Bytes>) -> Self {
        self.daten.insert(reference.locator.clone(), bytes.into());
        self.refs.push(reference);
        self
    }

    /// Fuegt eine Referenz ohne Bytes hinzu (Abruf schlaegt fehl)
    pub fn with_missing(mut self, reference: AudioRef) -> Self {
        self.refs.push(reference);
        self
    }
}

#[async_trait]
impl Playlist for MemoryPlaylist {
    async fn list_audio_refs(&self) -> Result<Vec<AudioRef>> {
        Ok(self.refs.clone())
    }

    async fn fetch_bytes(&self, reference: &AudioRef) -> Result<Bytes> {
        self.daten
            .get(&reference.locator)
            .cloned()
            .ok_or_else(|| BrainswapError::Abruf {
                id: reference.id.0.clone(),
                grund: "keine Daten hinterlegt".into(),
            })
    }
}
