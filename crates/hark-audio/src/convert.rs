//! Decoding and re-encoding of speech audio.
//!
//! Synthesized speech arrives as WAV or MP3; recognizers want 16-bit PCM.
//! Everything in between is mono f32.

use std::io::Cursor;

use rubato::{FftFixedIn, Resampler};

use crate::{AudioError, Result};

/// Mono f32 samples and their sample rate.
pub type Decoded = (Vec<f32>, u32);

/// Decode WAV bytes into mono f32 samples.
pub fn decode_wav(wav: &[u8]) -> Result<Decoded> {
    let reader =
        hound::WavReader::new(Cursor::new(wav)).map_err(|e| AudioError::Decode(e.to_string()))?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| AudioError::Decode(e.to_string()))?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|s| s as f32 / scale))
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| AudioError::Decode(e.to_string()))?
        }
    };

    Ok((downmix(&interleaved, spec.channels as usize), spec.sample_rate))
}

/// Decode MP3 bytes into mono f32 samples.
pub fn decode_mp3(mp3: &[u8]) -> Result<Decoded> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3));
    let mut samples = Vec::new();
    let mut rate = 0u32;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                rate = frame.sample_rate as u32;
                let pcm: Vec<f32> = frame.data.iter().map(|&s| f32::from(s) / 32768.0).collect();
                samples.extend(downmix(&pcm, frame.channels));
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(AudioError::Decode(format!("MP3 decode error: {e:?}"))),
        }
    }

    if rate == 0 {
        return Err(AudioError::Decode("no MP3 frames found".to_string()));
    }

    Ok((samples, rate))
}

fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// Requested input frames per resampler call.
const RESAMPLE_CHUNK: usize = 1024;

/// Band-limited sample rate conversion. Content above the target Nyquist
/// frequency is filtered out rather than folded back into the speech band.
pub fn resample(samples: &[f32], from: u32, to: u32) -> Result<Vec<f32>> {
    if from == 0 || to == 0 {
        return Err(AudioError::Resample(format!(
            "invalid sample rates {} -> {}",
            from, to
        )));
    }
    if samples.is_empty() || from == to {
        return Ok(samples.to_vec());
    }

    let mut resampler =
        FftFixedIn::<f32>::new(from as usize, to as usize, RESAMPLE_CHUNK, 2, 1)
            .map_err(|e| AudioError::Resample(format!("resampler init failed: {e}")))?;

    let delay = resampler.output_delay();
    let expected = (samples.len() as u64 * u64::from(to) / u64::from(from)) as usize;
    let mut output = Vec::with_capacity(expected + delay + RESAMPLE_CHUNK);

    // The resampler rounds its chunk size to fit the FFT, so ask it each time.
    let mut position = 0;
    while samples.len() - position >= resampler.input_frames_next() {
        let needed = resampler.input_frames_next();
        let frames = resampler
            .process(&[&samples[position..position + needed]], None)
            .map_err(|e| AudioError::Resample(e.to_string()))?;
        output.extend_from_slice(&frames[0]);
        position += needed;
    }

    let rest = &samples[position..];
    if !rest.is_empty() {
        let frames = resampler
            .process_partial(Some(&[rest]), None)
            .map_err(|e| AudioError::Resample(e.to_string()))?;
        output.extend_from_slice(&frames[0]);
    }

    // Flush the samples still held back by the filter delay.
    while output.len() < expected + delay {
        let frames = resampler
            .process_partial(None::<&[&[f32]]>, None)
            .map_err(|e| AudioError::Resample(e.to_string()))?;
        if frames[0].is_empty() {
            break;
        }
        output.extend_from_slice(&frames[0]);
    }

    output.drain(..delay.min(output.len()));
    output.truncate(expected);
    Ok(output)
}

/// Decode a captured WAV and convert it to mono 16-bit samples at `rate`,
/// the format every speech endpoint accepts.
pub fn to_pcm16(wav: &[u8], rate: u32) -> Result<Vec<i16>> {
    let (samples, source_rate) = decode_wav(wav)?;
    let samples = if source_rate == rate {
        samples
    } else {
        resample(&samples, source_rate, rate)?
    };
    Ok(samples
        .iter()
        .map(|s| (s.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16)
        .collect())
}

/// Encode mono 16-bit samples as a WAV file.
pub fn encode_wav16(samples: &[i16], rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::with_capacity(44 + samples.len() * 2));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| AudioError::Decode(e.to_string()))?;
        for &sample in samples {
            writer
                .write_sample(sample)
                .map_err(|e| AudioError::Decode(e.to_string()))?;
        }
        writer
            .finalize()
            .map_err(|e| AudioError::Decode(e.to_string()))?;
    }
    Ok(cursor.into_inner())
}
