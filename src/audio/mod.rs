//! Audio capture: sources, modem voice mode and windowing.

#[cfg(feature = "modem")]
pub use modem::ModemAudioSource;
pub use modem::{ModemConfig, ModemSession, PcmDecoder};
pub use source::{AudioSource, MockAudioSource};
pub use wav::{WavAudioSource, write_wav};
pub use window::{AudioWindower, WindowConfig};

pub mod modem;
pub mod source;
pub mod wav;
pub mod window;
