//! Minimal RIFF/WAVE reader and writer.
//!
//! Accepts format 1 (PCM, 8 or 16 bit) and format 3 (IEEE float32).
//! Stereo is averaged to mono; more than two channels takes channel 0.
//! Chunks other than `fmt ` and `data` are skipped.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::AudioError;

/// Reads a WAV file into float samples plus the declared sample rate.
pub fn read_wav<P: AsRef<Path>>(path: P) -> Result<(Vec<f32>, u32), AudioError> {
    let path = path.as_ref();
    let file = File::open(path)
        .map_err(|_| AudioError::FileNotFound(path.display().to_string()))?;
    let mut r = BufReader::new(file);

    let mut tag = [0u8; 4];
    r.read_exact(&mut tag)
        .map_err(|_| AudioError::WavFormat("truncated header".into()))?;
    if &tag != b"RIFF" {
        return Err(AudioError::WavFormat("missing RIFF header".into()));
    }
    r.seek(SeekFrom::Current(4))?; // overall size, unused
    r.read_exact(&mut tag)
        .map_err(|_| AudioError::WavFormat("truncated header".into()))?;
    if &tag != b"WAVE" {
        return Err(AudioError::WavFormat("missing WAVE header".into()));
    }

    let mut audio_format = 0u16;
    let mut num_channels = 0u16;
    let mut sample_rate = 0u32;
    let mut bits_per_sample = 0u16;
    let mut data: Vec<u8> = Vec::new();

    loop {
        let mut chunk_id = [0u8; 4];
        if r.read_exact(&mut chunk_id).is_err() {
            break;
        }
        let chunk_size = read_u32(&mut r)?;

        match &chunk_id {
            b"fmt " => {
                audio_format = read_u16(&mut r)?;
                num_channels = read_u16(&mut r)?;
                sample_rate = read_u32(&mut r)?;
                let _byte_rate = read_u32(&mut r)?;
                let _block_align = read_u16(&mut r)?;
                bits_per_sample = read_u16(&mut r)?;
                if chunk_size > 16 {
                    r.seek(SeekFrom::Current(i64::from(chunk_size) - 16))?;
                }
            }
            b"data" => {
                data.resize(chunk_size as usize, 0);
                r.read_exact(&mut data)
                    .map_err(|_| AudioError::WavFormat("truncated data chunk".into()))?;
                break;
            }
            _ => {
                // Chunk sizes are padded to even byte counts.
                let skip = i64::from(chunk_size) + i64::from(chunk_size & 1);
                r.seek(SeekFrom::Current(skip))?;
            }
        }
    }

    if data.is_empty() {
        return Err(AudioError::WavFormat("no data chunk found".into()));
    }
    if num_channels == 0 || sample_rate == 0 {
        return Err(AudioError::WavFormat("no fmt chunk found".into()));
    }

    tracing::debug!(
        format = audio_format,
        channels = num_channels,
        rate = sample_rate,
        bits = bits_per_sample,
        "wav header"
    );

    let samples = match (audio_format, bits_per_sample) {
        (1, 16) => data
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]) as f32 / 32768.0)
            .collect::<Vec<f32>>(),
        (1, 8) => data
            .iter()
            .map(|&b| (b as f32 - 128.0) / 128.0)
            .collect::<Vec<f32>>(),
        (3, 32) => data
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect::<Vec<f32>>(),
        _ => {
            return Err(AudioError::WavFormat(format!(
                "unsupported format {audio_format} at {bits_per_sample} bits"
            )))
        }
    };

    let mono = downmix(samples, num_channels);
    Ok((mono, sample_rate))
}

/// Writes 16-bit PCM mono samples to a WAV file.
///
/// Samples are clamped to [-1, 1] before quantization.
pub fn write_wav_i16<P: AsRef<Path>>(
    path: P,
    samples: &[f32],
    sample_rate: u32,
) -> Result<(), AudioError> {
    let file = File::create(path.as_ref())?;
    let mut w = BufWriter::new(file);

    let data_len = (samples.len() * 2) as u32;
    let byte_rate = sample_rate * 2;

    w.write_all(b"RIFF")?;
    w.write_all(&(36 + data_len).to_le_bytes())?;
    w.write_all(b"WAVE")?;
    w.write_all(b"fmt ")?;
    w.write_all(&16u32.to_le_bytes())?;
    w.write_all(&1u16.to_le_bytes())?; // PCM
    w.write_all(&1u16.to_le_bytes())?; // mono
    w.write_all(&sample_rate.to_le_bytes())?;
    w.write_all(&byte_rate.to_le_bytes())?;
    w.write_all(&2u16.to_le_bytes())?; // block align
    w.write_all(&16u16.to_le_bytes())?;
    w.write_all(b"data")?;
    w.write_all(&data_len.to_le_bytes())?;

    for &s in samples {
        let q = (s.clamp(-1.0, 1.0) * 32767.0).round() as i16;
        w.write_all(&q.to_le_bytes())?;
    }
    w.flush()?;
    Ok(())
}

fn downmix(samples: Vec<f32>, channels: u16) -> Vec<f32> {
    match channels {
        0 | 1 => samples,
        2 => samples
            .chunks_exact(2)
            .map(|p| (p[0] + p[1]) * 0.5)
            .collect(),
        n => samples
            .chunks_exact(n as usize)
            .map(|frame| frame[0])
            .collect(),
    }
}

fn read_u16<R: Read>(r: &mut R) -> Result<u16, AudioError> {
    let mut b = [0u8; 2];
    r.read_exact(&mut b)
        .map_err(|_| AudioError::WavFormat("truncated chunk".into()))?;
    Ok(u16::from_le_bytes(b))
}

fn read_u32<R: Read>(r: &mut R) -> Result<u32, AudioError> {
    let mut b = [0u8; 4];
    r.read_exact(&mut b)
        .map_err(|_| AudioError::WavFormat("truncated chunk".into()))?;
    Ok(u32::from_le_bytes(b))
}
