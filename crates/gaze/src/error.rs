//! Fehlertypen fuer die Blick-Erkennung

use brainswap_core::BrainswapError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GazeError {
    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),
}

pub type GazeResult<T> = Result<T, GazeError>;

impl From<GazeError> for BrainswapError {
    fn from(e: GazeError) -> Self {
        match e {
            GazeError::Konfiguration(msg) => BrainswapError::Konfiguration(msg),
        }
    }
}
