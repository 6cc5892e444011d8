// Copyright (C) 2022 Christoph Reichenbach (creichen@gmail.com)
// Licenced under the GNU General Public Licence, v3.  Please refer to the file "COPYING" for details.

// 16-bit PCM WAV files

#[allow(unused)]
use log::{Level, log_enabled, trace, debug, info, warn, error};

use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use qdsp::{Dsp16, DspError, Result};

pub struct Pcm {
    pub sample_rate : u32,
    pub channels : u16,
    /// Interleaved
    pub samples : Vec<Dsp16>,
}

impl Pcm {
    pub fn mono(sample_rate : u32, samples : Vec<Dsp16>) -> Pcm {
	return Pcm { sample_rate, channels : 1, samples };
    }

    pub fn frames(&self) -> usize {
	return self.samples.len() / self.channels as usize;
    }

    /// De-interleaves into one vector per channel
    pub fn channel_data(&self) -> Vec<Vec<Dsp16>> {
	let nch = self.channels as usize;
	return (0..nch).map(|ch| self.samples.iter().skip(ch).step_by(nch).copied().collect()).collect();
    }

    pub fn from_channels(sample_rate : u32, channels : &[Vec<Dsp16>]) -> Pcm {
	let len = channels.iter().map(|c| c.len()).min().unwrap_or(0);
	let mut samples = Vec::with_capacity(len * channels.len());
	for i in 0..len {
	    for c in channels {
		samples.push(c[i]);
	    }
	}
	return Pcm { sample_rate, channels : channels.len() as u16, samples };
    }

    pub fn read(path : &Path) -> Result<Pcm> {
	let mut reader = WavReader::open(path)?;
	let spec = reader.spec();
	if spec.sample_format != SampleFormat::Int || spec.bits_per_sample != 16 {
	    return Err(DspError::WavFormat {
		message : format!("{}: {} bit {:?} samples, expected 16 bit integers",
				  path.display(), spec.bits_per_sample, spec.sample_format),
	    });
	}
	let samples = reader.samples::<i16>().collect::<std::result::Result<Vec<_>, _>>()?;
	info!("Read {}: {} Hz, {} channel(s), {} samples", path.display(), spec.sample_rate, spec.channels, samples.len());
	return Ok(Pcm { sample_rate : spec.sample_rate, channels : spec.channels, samples });
    }

    pub fn write(&self, path : &Path) -> Result<()> {
	let spec = WavSpec {
	    channels : self.channels,
	    sample_rate : self.sample_rate,
	    bits_per_sample : 16,
	    sample_format : SampleFormat::Int,
	};
	let mut writer = WavWriter::create(path, spec)?;
	for s in self.samples.iter() {
	    writer.write_sample(*s)?;
	}
	writer.finalize()?;
	info!("Wrote {}: {} Hz, {} channel(s), {} frames", path.display(), self.sample_rate, self.channels, self.frames());
	return Ok(());
    }
}
