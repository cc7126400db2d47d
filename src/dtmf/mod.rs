//! DTMF tone detection: spectral analysis, keypad table, debouncing and synthesis.

pub mod debounce;
pub mod detector;
pub mod goertzel;
pub mod synth;
pub mod table;

pub use debounce::{DebounceConfig, DebounceError, DebounceState, DigitDebouncer, Observation};
pub use detector::{DetectorConfig, Rejection, ToneDetector};
pub use synth::ToneSynth;
pub use table::{STANDARD, ToneTable};
