use crate::error::{DialwatchError, Result};

/// Trait for audio sources feeding the detection pipeline.
///
/// This trait allows swapping implementations (modem line vs WAV file vs mock).
pub trait AudioSource: Send {
    /// Start capturing audio from the source.
    fn start(&mut self) -> Result<()>;

    /// Stop capturing audio from the source.
    fn stop(&mut self) -> Result<()>;

    /// Read the next batch of mono 16-bit PCM samples.
    ///
    /// An empty batch means "nothing yet" for live sources and "end of
    /// stream" for finite ones. [`DialwatchError::AudioSourceLost`] is fatal;
    /// any other error is retried by the caller.
    fn read_samples(&mut self) -> Result<Vec<i16>>;

    /// Sample rate of the returned samples in Hz.
    fn sample_rate(&self) -> u32;

    /// Returns true if this source has a finite amount of audio (file, pipe).
    fn is_finite(&self) -> bool {
        false
    }
}

/// Mock audio source for testing
#[derive(Debug, Clone)]
pub struct MockAudioSource {
    is_started: bool,
    chunks: Vec<Vec<i16>>,
    position: usize,
    sample_rate: u32,
    should_fail_start: bool,
    should_fail_read: bool,
    lose_after: Option<usize>,
    error_message: String,
}

impl MockAudioSource {
    /// Create a new, empty, finite mock audio source
    pub fn new(sample_rate: u32) -> Self {
        Self {
            is_started: false,
            chunks: Vec::new(),
            position: 0,
            sample_rate,
            should_fail_start: false,
            should_fail_read: false,
            lose_after: None,
            error_message: "mock audio error".to_string(),
        }
    }

    /// Serve `samples` in chunks of `chunk_size`
    pub fn with_samples(mut self, samples: &[i16], chunk_size: usize) -> Self {
        self.chunks = samples
            .chunks(chunk_size.max(1))
            .map(|c| c.to_vec())
            .collect();
        self
    }

    /// Configure the mock to fail on start
    pub fn with_start_failure(mut self) -> Self {
        self.should_fail_start = true;
        self
    }

    /// Configure every read to fail with a recoverable error
    pub fn with_read_failure(mut self) -> Self {
        self.should_fail_read = true;
        self
    }

    /// Report the source as lost after `chunks` successful reads
    pub fn with_loss_after(mut self, chunks: usize) -> Self {
        self.lose_after = Some(chunks);
        self
    }

    /// Configure the error message for failures
    pub fn with_error_message(mut self, message: &str) -> Self {
        self.error_message = message.to_string();
        self
    }

    /// Check if the audio source is started
    pub fn is_started(&self) -> bool {
        self.is_started
    }
}

impl AudioSource for MockAudioSource {
    fn start(&mut self) -> Result<()> {
        if self.should_fail_start {
            return Err(DialwatchError::AudioCapture {
                message: self.error_message.clone(),
            });
        }
        self.is_started = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.is_started = false;
        Ok(())
    }

    fn read_samples(&mut self) -> Result<Vec<i16>> {
        if self.should_fail_read {
            return Err(DialwatchError::AudioCapture {
                message: self.error_message.clone(),
            });
        }
        if self.lose_after.is_some_and(|n| self.position >= n) {
            return Err(DialwatchError::AudioSourceLost {
                message: self.error_message.clone(),
            });
        }
        let chunk = self.chunks.get(self.position).cloned().unwrap_or_default();
        self.position += 1;
        Ok(chunk)
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn is_finite(&self) -> bool {
        self.lose_after.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_serves_chunks_then_empty() {
        let mut source = MockAudioSource::new(8000).with_samples(&[1, 2, 3, 4, 5], 2);
        source.start().unwrap();
        assert!(source.is_started());
        assert_eq!(source.read_samples().unwrap(), vec![1, 2]);
        assert_eq!(source.read_samples().unwrap(), vec![3, 4]);
        assert_eq!(source.read_samples().unwrap(), vec![5]);
        assert!(source.read_samples().unwrap().is_empty());
        assert!(source.is_finite());
    }

    #[test]
    fn test_mock_start_failure() {
        let mut source = MockAudioSource::new(8000)
            .with_start_failure()
            .with_error_message("no modem");
        let err = source.start().unwrap_err();
        assert!(err.to_string().contains("no modem"));
    }

    #[test]
    fn test_mock_loss_is_fatal_error() {
        let mut source = MockAudioSource::new(8000)
            .with_samples(&[0; 10], 5)
            .with_loss_after(1);
        assert!(!source.is_finite());
        assert!(source.read_samples().is_ok());
        assert!(matches!(
            source.read_samples(),
            Err(DialwatchError::AudioSourceLost { .. })
        ));
    }

    #[test]
    fn test_mock_read_failure() {
        let mut source = MockAudioSource::new(8000).with_read_failure();
        assert!(matches!(
            source.read_samples(),
            Err(DialwatchError::AudioCapture { .. })
        ));
        source.stop().unwrap();
        assert_eq!(source.sample_rate(), 8000);
    }
}
