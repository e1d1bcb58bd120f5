//! brainswap-core – Gemeinsame Typen, Traits und Fehlertypen
//!
//! Dieses Crate stellt die Bausteine bereit, die von Gaze-, Audio- und
//! App-Crate gemeinsam genutzt werden: Sitzungszustand, Audio-Referenzen,
//! das Playlist-Kollaborateur-Trait und den Event-Typ fuer die UI.

pub mod error;
pub mod event;
pub mod playlist;
pub mod session;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use error::{BrainswapError, Result};
pub use event::SessionEvent;
pub use playlist::{pick_random, MemoryPlaylist, Playlist};
pub use session::{SessionMode, SessionState};
pub use types::{AudioId, AudioRef, SessionId};
