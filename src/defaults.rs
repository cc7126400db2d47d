//! Default configuration constants for dialwatch.
//!
//! Shared by the TOML configuration, the runtime component configs and the
//! CLI so every layer agrees on the same numbers.

use std::time::Duration;

/// Voice-mode PCM sample rate of the modem in Hz (`AT+VSM=1,8000`).
pub const SAMPLE_RATE: u32 = 8000;

/// Analysis window length in samples.
///
/// 205 samples at 8 kHz (25.6 ms) is the classic DTMF Goertzel block: long
/// enough to separate adjacent keypad frequencies, short enough that the
/// 40 ms minimum tone duration spans more than one window.
pub const WINDOW_SIZE: usize = 205;

/// Distance between the starts of consecutive windows, in samples (10 ms).
pub const HOP_SIZE: usize = 80;

/// Minimum normalized amplitude (full scale = 1.0) for a tone bin.
pub const NOISE_FLOOR: f32 = 0.01;

/// Maximum allowed level difference between the low and high tone, in dB.
pub const MAX_TWIST_DB: f32 = 8.0;

/// Margin by which the selected bin must exceed every other bin of its group, in dB.
pub const DOMINANCE_MARGIN_DB: f32 = 6.0;

/// Minimum share of the window energy carried by the two detected tones.
pub const MIN_ENERGY_RATIO: f32 = 0.6;

/// Consecutive windows carrying the same symbol before a digit is confirmed.
pub const MIN_TONE_FRAMES: u32 = 3;

/// Consecutive silent windows before the same digit may be confirmed again.
pub const MIN_GAP_FRAMES: u32 = 3;

/// Minimum time between two alarm notifications.
pub const TRIGGER_COOLDOWN: Duration = Duration::from_secs(60);

/// Fixed spacing between webhook delivery attempts.
pub const RETRY_INTERVAL: Duration = Duration::from_secs(20);

/// Total time a notification keeps being retried before giving up.
pub const RETRY_DEADLINE: Duration = Duration::from_secs(6 * 60 * 60);

/// Timeout for a single webhook request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Default serial device of the voice modem.
pub const MODEM_PORT: &str = "/dev/ttyACM0";

/// USB voice modems always talk 9600 baud on the command channel.
pub const MODEM_BAUD: u32 = 9600;

/// Receive gain passed as `AT+VGR=<gain>`.
pub const MODEM_GAIN: u8 = 3;

/// Timeout for modem command responses and sample reads.
pub const MODEM_IO_TIMEOUT: Duration = Duration::from_secs(2);

/// Windows buffered between capture and detection before new ones are dropped.
pub const WINDOW_CHANNEL_CAPACITY: usize = 256;
