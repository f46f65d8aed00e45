//! Microphone capture. There can only be one active recording at a time; the
//! input stream lives exactly as long as one [`Microphone::capture`] call.
//!
//! ## Format notes
//!
//! Samples are written untouched into a WAV container in the device's native
//! format. 5 seconds of 16-bit mono at 16kHz is ~160KiB, well within what the
//! speech endpoints accept in a single request.

use std::io::{self, Cursor, Seek, SeekFrom, Write};
use std::sync::Arc;
use std::thread::sleep;
use std::time::{Duration, Instant};

use anyhow::anyhow;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Host, Sample};
use hark_core::CancelToken;
use hound::WavWriter;
use parking_lot::Mutex;
use tracing::{debug, error, info};

use crate::{AudioError, AudioSource, Result};

type WavWriterHandle = Arc<Mutex<Option<WavWriter<MemoryWriter>>>>;

/// How often the capturing thread checks for cancellation and end of phrase.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Silence after speech that ends the phrase early.
const PAUSE_THRESHOLD: Duration = Duration::from_millis(800);

pub const MIN_DB: f32 = -96.0;

/// A cheaply cloneable handle to the inner data that is being recorded. The
/// finalize method for the wav writer does not return the inner data, so we
/// store it behind an Arc<Mutex> to allow for cheap cloning and access to the
/// inner data.
#[derive(Clone)]
struct MemoryWriter {
    inner: Arc<Mutex<Cursor<Vec<u8>>>>,
}

impl MemoryWriter {
    fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Cursor::new(Vec::with_capacity(8 * 1024)))),
        }
    }

    fn try_into_inner(self) -> Result<Vec<u8>> {
        let owned = Arc::try_unwrap(self.inner).map_err(|_| {
            AudioError::Anyhow(anyhow!("Failed to unwrap inner Arc in MemoryWriter"))
        })?;
        Ok(owned.into_inner().into_inner())
    }
}

impl Seek for MemoryWriter {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.lock().seek(pos)
    }
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.lock().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.lock().flush()
    }
}

/// One captured phrase, encoded as WAV.
#[derive(Debug, Clone)]
pub struct Recording {
    data: Vec<u8>,
    duration: Duration,
    heard_speech: bool,
}

impl Recording {
    pub fn new(data: Vec<u8>, duration: Duration, heard_speech: bool) -> Self {
        Self {
            data,
            duration,
            heard_speech,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Whether any chunk rose above the energy threshold.
    pub fn heard_speech(&self) -> bool {
        self.heard_speech
    }
}

/// Voice activity seen by the stream callback.
#[derive(Debug, Default)]
struct Activity {
    heard_speech: bool,
    last_voice: Option<Instant>,
}

type ActivityHandle = Arc<Mutex<Activity>>;

/// The default input device.
pub struct Microphone {
    host: Host,
    energy_threshold: f32,
}

impl Microphone {
    /// `energy_threshold` is the dBFS level above which a chunk counts as
    /// speech.
    pub fn new(energy_threshold: f32) -> Self {
        Self {
            host: cpal::default_host(),
            energy_threshold,
        }
    }

    fn start_recording(&self) -> Result<ActiveRecording> {
        let device = self
            .host
            .default_input_device()
            .ok_or(AudioError::NoInputDevice)?;
        let config = device
            .default_input_config()
            .map_err(|_| AudioError::NoInputDevice)?;

        info!(device_name = %device.name().unwrap_or_default(), config = ?config, "Recording from device");

        let spec = wav_spec_from_config(&config);

        let buffer = MemoryWriter::new();
        let writer =
            WavWriter::new(buffer.clone(), spec).map_err(|e| AudioError::Anyhow(e.into()))?;
        let writer = Arc::new(Mutex::new(Some(writer)));
        let activity: ActivityHandle = Arc::default();

        // The input stream runs on cpal's own thread.
        let writer_2 = writer.clone();
        let activity_2 = activity.clone();
        let threshold = self.energy_threshold;

        let err_fn = move |err| {
            error!("an error occurred on stream: {}", err);
        };

        let stream = match config.sample_format() {
            cpal::SampleFormat::I8 => device.build_input_stream(
                &config.into(),
                move |data, _: &_| {
                    write_input_data::<i8, i8>(data, &writer_2, &activity_2, threshold)
                },
                err_fn,
                None,
            )?,
            cpal::SampleFormat::I16 => device.build_input_stream(
                &config.into(),
                move |data, _: &_| {
                    write_input_data::<i16, i16>(data, &writer_2, &activity_2, threshold)
                },
                err_fn,
                None,
            )?,
            cpal::SampleFormat::I32 => device.build_input_stream(
                &config.into(),
                move |data, _: &_| {
                    write_input_data::<i32, i32>(data, &writer_2, &activity_2, threshold)
                },
                err_fn,
                None,
            )?,
            cpal::SampleFormat::F32 => device.build_input_stream(
                &config.into(),
                move |data, _: &_| {
                    write_input_data::<f32, f32>(data, &writer_2, &activity_2, threshold)
                },
                err_fn,
                None,
            )?,
            sample_format => {
                return Err(AudioError::SampleFormatNotSupported(format!(
                    "{:?}",
                    sample_format
                )));
            }
        };

        stream
            .play()
            .map_err(|_| anyhow!("failed to play stream"))?;

        Ok(ActiveRecording {
            stream,
            writer,
            buffer: Some(buffer),
            activity,
            started: Instant::now(),
        })
    }
}

impl AudioSource for Microphone {
    fn capture(&self, limit: Duration, cancel: &CancelToken) -> Result<Recording> {
        let mut recording = self.start_recording()?;

        loop {
            if cancel.is_cancelled() {
                debug!("capture cancelled");
                return Err(AudioError::Cancelled);
            }

            let elapsed = recording.started.elapsed();
            if elapsed >= limit {
                debug!(?elapsed, "phrase time limit reached");
                break;
            }

            if recording.paused_after_speech() {
                debug!(?elapsed, "pause after speech, ending phrase");
                break;
            }

            sleep(POLL_INTERVAL);
        }

        recording.finish()
    }
}

/// Handle to the active recording. When dropped or finished, the recording
/// will end and the device is released.
struct ActiveRecording {
    stream: cpal::Stream,
    writer: WavWriterHandle,
    // The buffer the data is being written to. Presence of this buffer
    // indicates if the recording has been finalized or not.
    buffer: Option<MemoryWriter>,
    activity: ActivityHandle,
    started: Instant,
}

impl ActiveRecording {
    fn paused_after_speech(&self) -> bool {
        let activity = self.activity.lock();
        activity.heard_speech
            && activity
                .last_voice
                .is_some_and(|t| t.elapsed() >= PAUSE_THRESHOLD)
    }

    fn finish(&mut self) -> Result<Recording> {
        let buffer = self
            .buffer
            .take()
            .ok_or_else(|| AudioError::Anyhow(anyhow!("recording already finished")))?;
        self.stream.pause().ok();

        // Finalize the writer so it writes the proper framing information.
        let writer = self
            .writer
            .lock()
            .take()
            .ok_or_else(|| AudioError::Anyhow(anyhow!("wav writer already finalized")))?;
        writer
            .finalize()
            .map_err(|e| AudioError::Anyhow(anyhow!("Failed to finalize writer: {}", e)))?;

        let data = buffer.try_into_inner()?;
        let heard_speech = self.activity.lock().heard_speech;
        let duration = self.started.elapsed();

        info!(
            bytes = data.len(),
            duration = ?duration,
            heard_speech,
            "Recording finished"
        );

        Ok(Recording::new(data, duration, heard_speech))
    }
}

impl Drop for ActiveRecording {
    fn drop(&mut self) {
        if self.buffer.is_some() {
            self.stream.pause().ok();
            if let Some(writer) = self.writer.lock().take() {
                writer.finalize().ok();
            }
        }
    }
}

fn wav_spec_from_config(config: &cpal::SupportedStreamConfig) -> hound::WavSpec {
    hound::WavSpec {
        channels: config.channels(),
        sample_rate: config.sample_rate().0,
        bits_per_sample: (config.sample_format().sample_size() * 8) as _,
        sample_format: sample_format(config.sample_format()),
    }
}

fn sample_format(format: cpal::SampleFormat) -> hound::SampleFormat {
    if format.is_float() {
        hound::SampleFormat::Float
    } else {
        hound::SampleFormat::Int
    }
}

fn write_input_data<T, U>(
    input: &[T],
    writer: &WavWriterHandle,
    activity: &ActivityHandle,
    threshold: f32,
) where
    T: Sample,
    U: Sample + hound::Sample + FromSample<T>,
    f32: FromSample<T>,
{
    let level: Vec<f32> = input.iter().map(|&s| s.to_sample::<f32>()).collect();
    if db_fs(&level) > threshold {
        let mut activity = activity.lock();
        activity.heard_speech = true;
        activity.last_voice = Some(Instant::now());
    }

    if let Some(mut guard) = writer.try_lock() {
        if let Some(writer) = guard.as_mut() {
            for &sample in input.iter() {
                let sample: U = U::from_sample(sample);
                writer.write_sample(sample).ok();
            }
        }
    }
}

/// Convert a slice of f32 samples to dBFS.
pub fn db_fs(data: &[f32]) -> f32 {
    let max_sample = data
        .iter()
        .fold(f32::EQUILIBRIUM, |max, &sample| sample.abs().max(max));

    (20.0 * max_sample.log10()).clamp(MIN_DB, 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_fs_silence_is_floor() {
        assert_eq!(db_fs(&[0.0; 64]), MIN_DB);
        assert_eq!(db_fs(&[]), MIN_DB);
    }

    #[test]
    fn test_db_fs_full_scale_is_zero() {
        assert_eq!(db_fs(&[0.1, -1.0, 0.5]), 0.0);
    }

    #[test]
    fn test_db_fs_half_scale() {
        let db = db_fs(&[0.5, -0.25]);
        assert!((db - -6.02).abs() < 0.01, "got {db}");
    }

    #[test]
    fn test_write_input_data_marks_speech() {
        let buffer = MemoryWriter::new();
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16_000,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let writer: WavWriterHandle = Arc::new(Mutex::new(Some(
            WavWriter::new(buffer.clone(), spec).unwrap(),
        )));
        let activity: ActivityHandle = Arc::default();

        write_input_data::<f32, f32>(&[0.0001; 32], &writer, &activity, -40.0);
        assert!(!activity.lock().heard_speech);

        write_input_data::<f32, f32>(&[0.5; 32], &writer, &activity, -40.0);
        assert!(activity.lock().heard_speech);
        assert!(activity.lock().last_voice.is_some());

        writer.lock().take().unwrap().finalize().unwrap();
        let data = buffer.try_into_inner().unwrap();
        let reader = hound::WavReader::new(Cursor::new(data)).unwrap();
        assert_eq!(reader.len(), 64);
    }
}
