//! Fehlertypen fuer den Audio-Mix

use brainswap_core::BrainswapError;
use thiserror::Error;

use crate::toolkit::{NodeId, Param};

/// Alle moeglichen Fehler des Audio-Mix
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("Unbekannter Audio-Knoten: {0}")]
    KnotenUnbekannt(NodeId),

    #[error("Knoten {node} hat keinen Parameter {param:?}")]
    ParameterNichtUnterstuetzt { node: NodeId, param: Param },

    #[error("Knoten {0} ist keine Quelle")]
    KeineQuelle(NodeId),

    #[error("Dekodierung fehlgeschlagen: {0}")]
    Dekodierung(String),

    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),
}

pub type AudioResult<T> = Result<T, AudioError>;

impl From<hound::Error> for AudioError {
    fn from(e: hound::Error) -> Self {
        AudioError::Dekodierung(e.to_string())
    }
}

impl From<AudioError> for BrainswapError {
    fn from(e: AudioError) -> Self {
        BrainswapError::Audio(e.to_string())
    }
}
