//! Voice modem capture: puts a modem in voice receive mode and streams the
//! line audio as PCM.
//!
//! Only the handful of AT commands needed to reach voice receive mode are
//! sent; the modem answers each with a final result code (`OK`, `CONNECT`,
//! `ERROR`, ...) which is all that is checked. After `AT+VRX` answers
//! `CONNECT` the port carries 8-bit unsigned PCM with `DLE` (0x10) shielding.

use crate::defaults;
use crate::error::{DialwatchError, Result};
use std::io::{ErrorKind, Read, Write};
use std::thread;
use std::time::{Duration, Instant};

/// Data link escape: shields in-band events in the voice data stream.
const DLE: u8 = 0x10;
/// `DLE !` aborts voice receive mode.
const RECEIVE_ABORT: [u8; 2] = [DLE, b'!'];

const FINAL_RESULT_CODES: [&str; 7] = [
    "OK",
    "CONNECT",
    "ERROR",
    "NO CARRIER",
    "BUSY",
    "NO DIALTONE",
    "VCON",
];

/// Pause between polls while waiting for a command response.
const RESPONSE_POLL: Duration = Duration::from_millis(10);

/// Modem connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModemConfig {
    /// Serial device path (e.g., `/dev/ttyACM0` or `COM3`).
    pub port: String,
    pub baud: u32,
    /// Receive gain for `AT+VGR`.
    pub gain: u8,
    /// PCM sample rate requested with `AT+VSM`.
    pub sample_rate: u32,
    /// Response and read timeout.
    pub io_timeout: Duration,
}

impl Default for ModemConfig {
    fn default() -> Self {
        Self {
            port: defaults::MODEM_PORT.to_string(),
            baud: defaults::MODEM_BAUD,
            gain: defaults::MODEM_GAIN,
            sample_rate: defaults::SAMPLE_RATE,
            io_timeout: defaults::MODEM_IO_TIMEOUT,
        }
    }
}

/// Converts the voice data stream into signed samples, removing DLE shielding.
#[derive(Debug, Default)]
pub struct PcmDecoder {
    dle_pending: bool,
}

impl PcmDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes `bytes`, appending samples to `out`.
    ///
    /// `DLE DLE` is a literal 0x10 sample; `DLE x` is an in-band event from
    /// the modem and carries no audio.
    pub fn decode(&mut self, bytes: &[u8], out: &mut Vec<i16>) {
        out.reserve(bytes.len());
        for &byte in bytes {
            if self.dle_pending {
                self.dle_pending = false;
                if byte == DLE {
                    out.push(u8_to_i16(DLE));
                } else {
                    tracing::trace!(code = %(byte as char), "modem in-band event");
                }
            } else if byte == DLE {
                self.dle_pending = true;
            } else {
                out.push(u8_to_i16(byte));
            }
        }
    }
}

/// 8-bit unsigned linear PCM to 16-bit signed.
fn u8_to_i16(byte: u8) -> i16 {
    (byte as i16 - 128) << 8
}

/// Command and data exchange with a modem over any byte port.
pub struct ModemSession<P: Read + Write> {
    port: P,
    io_timeout: Duration,
    decoder: PcmDecoder,
    receiving: bool,
}

impl<P: Read + Write> ModemSession<P> {
    pub fn new(port: P, io_timeout: Duration) -> Self {
        Self {
            port,
            io_timeout,
            decoder: PcmDecoder::new(),
            receiving: false,
        }
    }

    /// Whether the modem is in voice receive mode.
    pub fn is_receiving(&self) -> bool {
        self.receiving
    }

    /// Sends one command and returns the final result code line.
    pub fn send_command(&mut self, command: &str) -> Result<String> {
        tracing::debug!(command, "sending modem command");
        self.port.write_all(format!("{command}\r").as_bytes())?;
        self.port.flush()?;

        let start = Instant::now();
        let mut response = Vec::new();
        let mut buf = [0u8; 256];
        loop {
            if let Some(code) = final_result_code(&response) {
                tracing::debug!(command, response = %code, "modem response");
                return Ok(code);
            }
            if start.elapsed() > self.io_timeout {
                return Err(DialwatchError::ModemTimeout {
                    command: command.to_string(),
                });
            }
            match self.port.read(&mut buf) {
                Ok(0) => thread::sleep(RESPONSE_POLL),
                Ok(n) => response.extend_from_slice(&buf[..n]),
                Err(e) if is_transient(e.kind()) => thread::sleep(RESPONSE_POLL),
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Sends `command` and fails unless the modem answers `expected`.
    pub fn expect(&mut self, command: &str, expected: &str) -> Result<()> {
        let actual = self.send_command(command)?;
        if actual != expected {
            return Err(DialwatchError::ModemCommand {
                command: command.to_string(),
                expected: expected.to_string(),
                actual,
            });
        }
        Ok(())
    }

    /// Resets the modem, switches to voice mode and starts receiving.
    pub fn enter_voice_receive(&mut self, gain: u8, sample_rate: u32) -> Result<()> {
        // ATZ may answer before or after echoing; only the later commands are checked.
        if let Err(e) = self.send_command("ATZ") {
            tracing::warn!(error = %e, "modem reset did not answer, continuing");
        }

        let setup = [
            "ATE0".to_string(),
            "AT+FCLASS=8".to_string(),
            "AT+VLS=1".to_string(),
            format!("AT+VGR={gain}"),
            format!("AT+VSM=1,{sample_rate}"),
            "AT".to_string(),
        ];
        for command in &setup {
            self.expect(command, "OK")?;
        }

        self.expect("AT+VRX", "CONNECT")?;
        self.receiving = true;
        tracing::info!(sample_rate, "modem in voice receive mode");
        Ok(())
    }

    /// Reads whatever PCM is available. Timeouts yield an empty batch.
    pub fn read_pcm(&mut self) -> Result<Vec<i16>> {
        let mut buf = [0u8; 1024];
        match self.port.read(&mut buf) {
            Ok(n) => {
                let mut samples = Vec::with_capacity(n);
                self.decoder.decode(&buf[..n], &mut samples);
                Ok(samples)
            }
            Err(e) if is_transient(e.kind()) => Ok(Vec::new()),
            Err(e) => Err(DialwatchError::AudioSourceLost {
                message: format!("modem read failed: {e}"),
            }),
        }
    }

    /// Leaves voice receive mode and hangs up. Best effort.
    pub fn hang_up(&mut self) -> Result<()> {
        if self.receiving {
            self.port.write_all(&RECEIVE_ABORT)?;
            self.port.flush()?;
            self.receiving = false;
        }
        self.send_command("ATH").map(|_| ())
    }
}

fn is_transient(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
    )
}

/// Returns the first final result code among the complete lines of `response`.
fn final_result_code(response: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(response);
    let complete = match text.rfind(['\r', '\n']) {
        Some(end) => &text[..end],
        None => return None,
    };
    complete
        .split(['\r', '\n'])
        .map(str::trim)
        .find(|line| FINAL_RESULT_CODES.contains(line))
        .map(str::to_string)
}

/// Modem voice line as an [`AudioSource`](crate::audio::AudioSource).
#[cfg(feature = "modem")]
pub struct ModemAudioSource {
    config: ModemConfig,
    session: Option<ModemSession<Box<dyn serialport::SerialPort>>>,
}

#[cfg(feature = "modem")]
impl ModemAudioSource {
    pub fn new(config: ModemConfig) -> Self {
        Self {
            config,
            session: None,
        }
    }
}

#[cfg(feature = "modem")]
impl crate::audio::AudioSource for ModemAudioSource {
    fn start(&mut self) -> Result<()> {
        tracing::info!(port = %self.config.port, baud = self.config.baud, "opening modem");
        let port = serialport::new(&self.config.port, self.config.baud)
            .timeout(self.config.io_timeout)
            .open()
            .map_err(|e| DialwatchError::AudioCapture {
                message: format!("Failed to open serial port {}: {e}", self.config.port),
            })?;

        let mut session = ModemSession::new(port, self.config.io_timeout);
        session.enter_voice_receive(self.config.gain, self.config.sample_rate)?;
        self.session = Some(session);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        match self.session.take() {
            Some(mut session) => session.hang_up(),
            None => Ok(()),
        }
    }

    fn read_samples(&mut self) -> Result<Vec<i16>> {
        match self.session.as_mut() {
            Some(session) => session.read_pcm(),
            None => Err(DialwatchError::AudioCapture {
                message: "modem not started".to_string(),
            }),
        }
    }

    fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }
}
