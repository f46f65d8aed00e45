//! Playback of synthesized speech on the default output device.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::sleep;
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};
use parking_lot::Mutex;
use tracing::{debug, error};

use crate::convert::{decode_mp3, decode_wav, resample};
use crate::{AudioError, Result};

/// Plays audio to the default output device, blocking until it is done.
#[derive(Debug, Default, Clone, Copy)]
pub struct Playback;

impl Playback {
    pub fn new() -> Self {
        Self
    }

    /// Play a WAV file.
    pub fn play_wav(&self, wav: &[u8]) -> Result<()> {
        let (samples, rate) = decode_wav(wav)?;
        self.play_samples(samples, rate)
    }

    /// Play an MP3 file.
    pub fn play_mp3(&self, mp3: &[u8]) -> Result<()> {
        let (samples, rate) = decode_mp3(mp3)?;
        self.play_samples(samples, rate)
    }

    /// Play mono samples at `rate`, blocking until they have been played.
    pub fn play_samples(&self, samples: Vec<f32>, rate: u32) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }

        let device = cpal::default_host()
            .default_output_device()
            .ok_or(AudioError::NoOutputDevice)?;

        let config = output_config(&device, rate)?;
        let channels = config.channels as usize;
        let samples = if config.sample_rate.0 == rate {
            samples
        } else {
            resample(&samples, rate, config.sample_rate.0)?
        };

        let sample_count = samples.len();
        let out_rate = config.sample_rate.0;
        let samples = Arc::new(samples);
        let position = Arc::new(Mutex::new(0usize));
        let finished = Arc::new(AtomicBool::new(false));

        let samples_2 = samples.clone();
        let finished_2 = finished.clone();

        let stream = device.build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let mut pos = position.lock();
                for frame in data.chunks_mut(channels) {
                    let sample = samples_2.get(*pos).copied().unwrap_or_else(|| {
                        finished_2.store(true, Ordering::SeqCst);
                        0.0
                    });
                    frame.fill(sample);
                    if *pos < samples_2.len() {
                        *pos += 1;
                    }
                }
            },
            |err| error!(error = %err, "audio playback error"),
            None,
        )?;

        stream
            .play()
            .map_err(|e| AudioError::Anyhow(anyhow::anyhow!("failed to play stream: {e}")))?;

        let expected = Duration::from_millis(sample_count as u64 * 1000 / u64::from(out_rate));
        let timeout = expected + Duration::from_millis(500);
        let start = Instant::now();
        while !finished.load(Ordering::SeqCst) && start.elapsed() < timeout {
            sleep(Duration::from_millis(50));
        }

        drop(stream);
        debug!(samples = sample_count, rate = out_rate, "playback complete");

        Ok(())
    }
}

/// Prefer a config running at the source rate, mono first, then stereo, and
/// fall back to the device default.
fn output_config(device: &cpal::Device, rate: u32) -> Result<StreamConfig> {
    let wanted = SampleRate(rate);
    let supports = |channels: u16| {
        device.supported_output_configs().ok()?.find(|c| {
            c.channels() == channels
                && c.sample_format() == cpal::SampleFormat::F32
                && c.min_sample_rate() <= wanted
                && c.max_sample_rate() >= wanted
        })
    };

    if let Some(config) = supports(1).or_else(|| supports(2)) {
        return Ok(config.with_sample_rate(wanted).config());
    }

    device
        .default_output_config()
        .map(|c| c.config())
        .map_err(|_| AudioError::NoOutputDevice)
}
