// Copyright (C) 2022 Christoph Reichenbach (creichen@gmail.com)
// Licenced under the GNU General Public Licence, v3.  Please refer to the file "COPYING" for details.

//! DVI (IMA) ADPCM WAV files
//!
//! Each block of `block_align` bytes starts with a 4-byte header per channel (first sample
//! as i16, step index, reserved byte), followed by interleaved 4-byte chunks of eight
//! samples per channel.

#[allow(unused)]
use log::{Level, log_enabled, trace, debug, info, warn, error};
#[allow(unused)]
use crate::{ptrace, pdebug, pinfo, pwarn, perror};

use std::io::{Read, Write};

use crate::dsp::adpcm::{AdpcmState, MAX_STEP_INDEX};
use crate::error::{DspError, Result};

pub const WAVE_FORMAT_DVI_ADPCM : u16 = 0x0011;

const CHUNK_BYTES : usize = 4;
const SAMPLES_PER_CHUNK : usize = 2 * CHUNK_BYTES;

/// Decoded DVI ADPCM WAV contents
#[derive(Clone, Debug, PartialEq)]
pub struct DviAdpcmWav {
    pub sample_rate : u32,
    pub channels : u16,
    pub block_align : u16,
    /// Interleaved PCM
    pub samples : Vec<i16>,
}

fn format_err(message : impl Into<String>) -> DspError {
    return DspError::WavFormat { message : message.into() };
}

fn u16_at(b : &[u8], pos : usize) -> u16 {
    return u16::from_le_bytes([b[pos], b[pos + 1]]);
}

fn u32_at(b : &[u8], pos : usize) -> u32 {
    return u32::from_le_bytes([b[pos], b[pos + 1], b[pos + 2], b[pos + 3]]);
}

/// Chunks of eight samples per channel that follow the headers in one block
pub fn nb_batches_per_block(block_align : usize, channels : usize) -> usize {
    return (block_align / (CHUNK_BYTES * channels)).saturating_sub(1);
}

pub fn samples_per_block(block_align : usize, channels : usize) -> usize {
    return 1 + SAMPLES_PER_CHUNK * nb_batches_per_block(block_align, channels);
}

/// Decodes one block (or a truncated final block) into interleaved PCM
fn decode_block(block : &[u8], channels : usize, out : &mut Vec<i16>) -> Result<()> {
    let header_size = CHUNK_BYTES * channels;
    if block.len() < header_size {
	return Err(format_err("truncated block header"));
    }
    let mut states = Vec::with_capacity(channels);
    for ch in 0..channels {
	let h = &block[ch * CHUNK_BYTES..];
	let predicted = u16_at(h, 0) as i16;
	let step_index = h[2];
	if step_index > MAX_STEP_INDEX {
	    return Err(DspError::Adpcm { message : format!("step index {step_index} in block header") });
	}
	states.push(AdpcmState { step_index, predicted });
	out.push(predicted);
    }

    let batches = (block.len() - header_size) / header_size;
    let mut pcm = vec![0i16; SAMPLES_PER_CHUNK * channels];
    for batch in 0..batches {
	let data = &block[header_size * (batch + 1)..header_size * (batch + 2)];
	for ch in 0..channels {
	    let mut decoded = [0i16; SAMPLES_PER_CHUNK];
	    states[ch].decode(&mut decoded, &data[ch * CHUNK_BYTES..(ch + 1) * CHUNK_BYTES]);
	    for (i, s) in decoded.iter().enumerate() {
		pcm[i * channels + ch] = *s;
	    }
	}
	out.extend_from_slice(&pcm);
    }
    return Ok(());
}

pub fn read_dvi_wav<R : Read>(reader : &mut R) -> Result<DviAdpcmWav> {
    let mut bytes = vec![];
    reader.read_to_end(&mut bytes)?;
    if bytes.len() < 12 || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
	return Err(format_err("not a RIFF/WAVE file"));
    }

    let mut fmt : Option<(u16, u32, u16, u16)> = None;
    let mut data : Option<&[u8]> = None;
    let mut pos = 12;
    while pos + 8 <= bytes.len() {
	let id = &bytes[pos..pos + 4];
	let size = u32_at(&bytes, pos + 4) as usize;
	let body_start = pos + 8;
	let body_end = usize::min(body_start + size, bytes.len());
	let body = &bytes[body_start..body_end];
	match id {
	    b"fmt " => {
		if body.len() < 16 {
		    return Err(format_err("short fmt chunk"));
		}
		let format_tag = u16_at(body, 0);
		if format_tag != WAVE_FORMAT_DVI_ADPCM {
		    return Err(format_err(format!("format tag {format_tag:#06x} is not DVI ADPCM")));
		}
		let bits = u16_at(body, 14);
		if bits != 4 {
		    return Err(format_err(format!("{bits} bits per sample, expected 4")));
		}
		fmt = Some((u16_at(body, 2), u32_at(body, 4), u16_at(body, 12), bits));
	    },
	    b"data" => data = Some(body),
	    _ => ptrace!("[read_dvi_wav] skipping chunk {:?}", String::from_utf8_lossy(id)),
	}
	// chunks are padded to even sizes
	pos = body_start + size + (size & 1);
    }

    let (channels, sample_rate, block_align, _) = fmt.ok_or_else(|| format_err("missing fmt chunk"))?;
    let data = data.ok_or_else(|| format_err("missing data chunk"))?;
    if channels == 0 || (block_align as usize) < 2 * CHUNK_BYTES * channels as usize
	|| block_align as usize % (CHUNK_BYTES * channels as usize) != 0 {
	return Err(format_err(format!("block alignment {block_align} invalid for {channels} channel(s)")));
    }

    let mut samples = Vec::with_capacity(data.len() * 2);
    for block in data.chunks(block_align as usize) {
	decode_block(block, channels as usize, &mut samples)?;
    }
    pdebug!("[read_dvi_wav] {} Hz, {} channel(s), {} samples per block, {} frames",
	    sample_rate, channels, samples_per_block(block_align as usize, channels as usize), samples.len() / channels as usize);
    return Ok(DviAdpcmWav { sample_rate, channels, block_align, samples });
}

/// Writes interleaved PCM as DVI ADPCM; a trailing partial block is padded with its last sample
pub fn write_dvi_wav<W : Write>(writer : &mut W, sample_rate : u32, channels : u16, block_align : u16, samples : &[i16]) -> Result<()> {
    let nch = channels as usize;
    if nch == 0 || samples.len() % nch != 0 {
	return Err(DspError::config("sample count does not match the channel count"));
    }
    if (block_align as usize) < 2 * CHUNK_BYTES * nch || block_align as usize % (CHUNK_BYTES * nch) != 0 {
	return Err(DspError::config(format!("block alignment {block_align} invalid for {channels} channel(s)")));
    }
    let per_block = samples_per_block(block_align as usize, nch);
    let frames = samples.len() / nch;
    let nb_blocks = (frames + per_block - 1) / per_block;

    let mut data = Vec::with_capacity(nb_blocks * block_align as usize);
    // step indices carry over between blocks; the predictor restarts from the exact first sample
    let mut states = vec![AdpcmState::default(); nch];
    for b in 0..nb_blocks {
	let frame = |i : usize, ch : usize| -> i16 {
	    let f = usize::min(b * per_block + i, frames - 1);
	    return samples[f * nch + ch];
	};
	for ch in 0..nch {
	    let first = frame(0, ch);
	    states[ch].predicted = first;
	    data.extend_from_slice(&first.to_le_bytes());
	    data.push(states[ch].step_index);
	    data.push(0);
	}
	for batch in 0..nb_batches_per_block(block_align as usize, nch) {
	    for ch in 0..nch {
		let mut chunk = [0u8; CHUNK_BYTES];
		let pcm : Vec<i16> = (0..SAMPLES_PER_CHUNK).map(|i| frame(1 + batch * SAMPLES_PER_CHUNK + i, ch)).collect();
		states[ch].encode(&mut chunk, &pcm);
		data.extend_from_slice(&chunk);
	    }
	}
    }

    let byte_rate = sample_rate as u64 * block_align as u64 / per_block as u64;
    let fmt_size : u32 = 20;
    let riff_size = 4 + (8 + fmt_size) + (8 + data.len() as u32);
    writer.write_all(b"RIFF")?;
    writer.write_all(&riff_size.to_le_bytes())?;
    writer.write_all(b"WAVE")?;
    writer.write_all(b"fmt ")?;
    writer.write_all(&fmt_size.to_le_bytes())?;
    writer.write_all(&WAVE_FORMAT_DVI_ADPCM.to_le_bytes())?;
    writer.write_all(&channels.to_le_bytes())?;
    writer.write_all(&sample_rate.to_le_bytes())?;
    writer.write_all(&(byte_rate as u32).to_le_bytes())?;
    writer.write_all(&block_align.to_le_bytes())?;
    writer.write_all(&4u16.to_le_bytes())?;
    writer.write_all(&2u16.to_le_bytes())?;
    writer.write_all(&(per_block as u16).to_le_bytes())?;
    writer.write_all(b"data")?;
    writer.write_all(&(data.len() as u32).to_le_bytes())?;
    writer.write_all(&data)?;
    if data.len() % 2 == 1 {
	writer.write_all(&[0])?;
    }
    return Ok(());
}

// ----------------------------------------
// Tests

#[cfg(test)]
use crate::dsp::adpcm::{test_signal, rms};

#[cfg(test)]
fn write_to_vec(sample_rate : u32, channels : u16, block_align : u16, samples : &[i16]) -> Vec<u8> {
    let mut out = vec![];
    write_dvi_wav(&mut out, sample_rate, channels, block_align, samples).unwrap();
    return out;
}

#[cfg(test)]
#[test]
fn test_block_geometry() {
    assert_eq!(63, nb_batches_per_block(256, 1));
    assert_eq!(505, samples_per_block(256, 1));
    assert_eq!(505, samples_per_block(512, 2));
    assert_eq!(1017, samples_per_block(1024, 2));
}

#[cfg(test)]
#[test]
fn test_mono_round_trip() {
    let signal = test_signal(1200);
    let bytes = write_to_vec(8000, 1, 256, &signal);
    assert_eq!(WAVE_FORMAT_DVI_ADPCM, u16_at(&bytes, 20));

    let wav = read_dvi_wav(&mut &bytes[..]).unwrap();
    assert_eq!(8000, wav.sample_rate);
    assert_eq!(1, wav.channels);
    assert_eq!(256, wav.block_align);
    // three blocks of 505 samples, the last one padded
    assert_eq!(3 * 505, wav.samples.len());
    // block headers carry exact samples
    assert_eq!(signal[0], wav.samples[0]);
    assert_eq!(signal[505], wav.samples[505]);
    assert_eq!(signal[1010], wav.samples[1010]);

    let signal_rms = rms(signal[100..].iter().map(|x| *x as i32));
    let error_rms = rms(signal[100..].iter().zip(&wav.samples[100..1200]).map(|(a, b)| *a as i32 - *b as i32));
    assert!(error_rms < 0.15 * signal_rms, "error {error_rms}, signal {signal_rms}");
}

#[cfg(test)]
#[test]
fn test_stereo_channels_stay_apart() {
    let left = test_signal(600);
    let mut interleaved = vec![];
    for l in left.iter() {
	interleaved.push(*l);
	interleaved.push(-1000);
    }
    let wav = read_dvi_wav(&mut &write_to_vec(8000, 2, 512, &interleaved)[..]).unwrap();
    assert_eq!(2, wav.channels);
    assert_eq!(2 * 2 * 505, wav.samples.len());

    // the constant right channel settles quickly and stays near its level
    for frame in wav.samples.chunks(2).skip(50).take(550) {
	assert!((frame[1] as i32 + 1000).abs() < 64, "right channel drifted to {}", frame[1]);
    }
    let left_out : Vec<i32> = wav.samples.chunks(2).take(600).map(|f| f[0] as i32).collect();
    let signal_rms = rms(left[100..].iter().map(|x| *x as i32));
    let error_rms = rms(left[100..].iter().zip(&left_out[100..]).map(|(a, b)| *a as i32 - *b));
    assert!(error_rms < 0.15 * signal_rms, "error {error_rms}, signal {signal_rms}");
}

#[cfg(test)]
#[test]
fn test_truncated_final_block() {
    let signal = test_signal(505);
    let bytes = write_to_vec(8000, 1, 256, &signal);
    // the data chunk size still claims a full block
    let cut = &bytes[..bytes.len() - 100];
    let wav = read_dvi_wav(&mut &cut[..]).unwrap();
    assert_eq!(1 + 8 * (63 - 25), wav.samples.len());
}

#[cfg(test)]
#[test]
fn test_rejects_bad_files() {
    assert!(matches!(read_dvi_wav(&mut &b"RIFX\0\0\0\0WAVE"[..]), Err(DspError::WavFormat { .. })));

    let mut pcm = write_to_vec(8000, 1, 256, &[0; 10]);
    pcm[20] = 1;
    assert!(matches!(read_dvi_wav(&mut &pcm[..]), Err(DspError::WavFormat { .. })));

    let mut bad_index = write_to_vec(8000, 1, 256, &[0; 10]);
    // first block header step index
    bad_index[12 + 8 + 20 + 8 + 2] = 100;
    assert!(matches!(read_dvi_wav(&mut &bad_index[..]), Err(DspError::Adpcm { .. })));

    let mut out = vec![];
    assert!(write_dvi_wav(&mut out, 8000, 2, 256, &[0; 3]).is_err());
    assert!(write_dvi_wav(&mut out, 8000, 1, 6, &[0; 4]).is_err());
}
