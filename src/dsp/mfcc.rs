// Copyright (C) 2022 Christoph Reichenbach (creichen@gmail.com)
// Licenced under the GNU General Public Licence, v3.  Please refer to the file "COPYING" for details.

//! Mel-frequency cepstral coefficients
//!
//! Per frame: pre-emphasis, Hamming window, zero-padded 1024-point FFT, power spectrum,
//! triangular mel filter bank, natural log and a DCT-II.
//!
//! Log energies and coefficients are Q15 values held in `i32`, since they leave [-1, 1).

#[allow(unused)]
use log::{Level, log_enabled, trace, debug, info, warn, error};
#[allow(unused)]
use crate::{ptrace, pdebug, pinfo, pwarn, perror};

use crate::dsp::qformat::{Q, Dsp16, Complex16, q16};
use crate::dsp::operators::{self, ln_q30, F};
use crate::dsp::vectors;
use crate::dsp::transforms;
use crate::dsp::windowing::Window;
use crate::error::{DspError, Result};

pub const FFT_NLOG : u32 = 10;
pub const FFT_SIZE : usize = 1 << FFT_NLOG;
/// Bins 0..=FFT_SIZE/2 carry the spectrum of a real signal
pub const NB_BINS : usize = FFT_SIZE / 2 + 1;

/// Number of fractional bits in log energies and coefficients
pub const COEFFICIENT_QB : u32 = 15;

pub fn coefficient_to_f64(c : i32) -> f64 {
    return c as f64 / (1u32 << COEFFICIENT_QB) as f64;
}

#[derive(Clone, Debug, PartialEq)]
pub struct MfccConfig {
    pub sample_rate : u32,
    pub frame_ms : u32,
    pub shift_ms : u32,
    pub nb_filters : usize,
    pub nb_coefficients : usize,
    pub pre_emphasis : f64,
}

impl Default for MfccConfig {
    fn default() -> MfccConfig {
	return MfccConfig {
	    sample_rate : 8000,
	    frame_ms : 32,
	    shift_ms : 10,
	    nb_filters : 24,
	    nb_coefficients : 13,
	    pre_emphasis : 0.97,
	};
    }
}

impl MfccConfig {
    pub fn frame_len(&self) -> usize {
	return (self.sample_rate as u64 * self.frame_ms as u64 / 1000) as usize;
    }

    pub fn shift_len(&self) -> usize {
	return (self.sample_rate as u64 * self.shift_ms as u64 / 1000) as usize;
    }

    pub fn validate(&self) -> Result<()> {
	if self.sample_rate == 0 {
	    return Err(DspError::config("MFCC sample rate must be positive"));
	}
	let frame_len = self.frame_len();
	if frame_len == 0 || frame_len > FFT_SIZE {
	    return Err(DspError::config(format!("MFCC frame of {frame_len} samples, must be in 1..={FFT_SIZE}")));
	}
	if self.shift_len() == 0 {
	    return Err(DspError::config("MFCC frame shift must be at least one sample"));
	}
	if self.nb_filters == 0 {
	    return Err(DspError::config("MFCC needs at least one mel filter"));
	}
	if self.nb_coefficients == 0 || self.nb_coefficients > self.nb_filters {
	    return Err(DspError::config(format!("{} MFCC coefficients from {} filters",
						self.nb_coefficients, self.nb_filters)));
	}
	if !(self.pre_emphasis >= 0.0 && self.pre_emphasis < 1.0) {
	    return Err(DspError::config(format!("pre-emphasis {} outside [0, 1)", self.pre_emphasis)));
	}
	return Ok(());
    }
}

fn lin_to_mel(f_hz : f64) -> f64 {
    return 2595.0 * (1.0 + f_hz / 700.0).log10();
}

fn mel_to_lin(m : f64) -> f64 {
    return 700.0 * (10f64.powf(m / 2595.0) - 1.0);
}

/// Triangular filter over bins `start..start + weights.len()`
#[derive(Clone, Debug)]
struct MelFilter {
    start : usize,
    weights : Vec<Dsp16>,
}

pub struct Mfcc {
    config : MfccConfig,
    alpha : Dsp16,
    window : Vec<Dsp16>,
    /// Filter edges as FFT bins; filter `i` rises over `points[i]..points[i+1]` and falls to `points[i+2]`
    points : Vec<usize>,
    filters : Vec<MelFilter>,
    // scratch
    frame : Vec<Dsp16>,
    spectrum : Vec<Complex16>,
}

impl Mfcc {
    pub fn new(config : MfccConfig) -> Result<Mfcc> {
	config.validate()?;
	let n = config.nb_filters;
	let fs = config.sample_rate as f64;
	let mel_high = lin_to_mel(fs / 2.0);
	let mut points = Vec::with_capacity(n + 2);
	for i in 0..n + 2 {
	    let f = mel_to_lin(i as f64 * mel_high / (n + 1) as f64);
	    points.push(usize::min(NB_BINS - 1, (f * FFT_SIZE as f64 / fs).round() as usize));
	}
	if points.windows(2).any(|w| w[0] >= w[1]) {
	    return Err(DspError::config(format!("{n} mel filters exceed the resolution of a {FFT_SIZE}-point FFT at {} Hz",
						config.sample_rate)));
	}

	let mut filters = Vec::with_capacity(n);
	for i in 0..n {
	    let (lo, mid, hi) = (points[i], points[i + 1], points[i + 2]);
	    let weights = (lo..=hi).map(|b| {
		let w = if b <= mid {
		    (b - lo) as f64 / (mid - lo) as f64
		} else {
		    (hi - b) as f64 / (hi - mid) as f64
		};
		q16(w)
	    }).collect();
	    filters.push(MelFilter { start : lo, weights });
	}

	let frame_len = config.frame_len();
	pdebug!("[Mfcc::new] {} Hz, frames of {} samples every {}, {} filters over bins {:?}",
		config.sample_rate, frame_len, config.shift_len(), n, points);
	return Ok(Mfcc {
	    alpha : q16(config.pre_emphasis),
	    window : Window::Hamming.generate(frame_len)?,
	    points,
	    filters,
	    frame : vec![0; FFT_SIZE],
	    spectrum : vec![Complex16::default(); FFT_SIZE],
	    config,
	});
    }

    pub fn config(&self) -> &MfccConfig {
	return &self.config;
    }

    /// FFT bin at the peak of each filter
    pub fn center_bins(&self) -> &[usize] {
	return &self.points[1..self.points.len() - 1];
    }

    pub fn filter_weight(&self, filter : usize, bin : usize) -> Dsp16 {
	let f = &self.filters[filter];
	if bin < f.start || bin >= f.start + f.weights.len() {
	    return 0;
	}
	return f.weights[bin - f.start];
    }

    /// Log mel energies of one frame
    ///
    /// `previous` is the sample before the frame, for pre-emphasis.
    pub fn log_mel(&mut self, frame : &[Dsp16], previous : Dsp16) -> Result<Vec<i32>> {
	assert_eq!(self.config.frame_len(), frame.len(), "MFCC frame length");

	// s'(n) = (s(n) - alpha s(n-1)) / 2
	let mut prev = previous;
	for (o, x) in self.frame.iter_mut().zip(frame) {
	    *o = ((*x as i32 - operators::mul(self.alpha, prev) as i32) >> 1) as Dsp16;
	    prev = *x;
	}
	for (o, w) in self.frame.iter_mut().zip(&self.window) {
	    *o = operators::mul(*o, *w);
	}
	vectors::zeropad(&mut self.frame, FFT_SIZE - frame.len());
	transforms::real_complex_fft(&mut self.spectrum, &self.frame, FFT_NLOG)?;

	// power spectrum as Q30
	let power : Vec<i64> = self.spectrum[..NB_BINS].iter()
	    .map(|c| {
		let (re, im) = (c.re as i64, c.im as i64);
		re * re + im * im
	    })
	    .collect();

	let mut result = Vec::with_capacity(self.filters.len());
	for f in self.filters.iter() {
	    let mut energy : i64 = 0;
	    for (w, p) in f.weights.iter().zip(&power[f.start..]) {
		energy += *w as i64 * p;
	    }
	    // Q30; silent bands sit at the smallest representable energy
	    let energy = i64::max(1, energy >> Dsp16::QB);
	    result.push((ln_q30(energy, 2 * Dsp16::QB) >> (F - COEFFICIENT_QB)) as i32);
	}
	return Ok(result);
    }

    /// DCT-II of log mel energies: `c[k] = sum_n e[n] cos(pi k (n + 1/2) / N)`
    pub fn cepstrum(&self, log_mel : &[i32]) -> Vec<i32> {
	let n = log_mel.len() as i64;
	return (0..self.config.nb_coefficients as i64).map(|k| {
	    let mut sum : i64 = 0;
	    for (i, e) in log_mel.iter().enumerate() {
		// angle in units of pi; Q15 wraps every 2 pi
		let angle = (((2 * i as i64 + 1) * k) << Dsp16::QB) / (2 * n);
		let c = operators::cos(Dsp16::wrap(angle));
		sum += (*e as i64 * c as i64) >> Dsp16::QB;
	    }
	    sum.clamp(i32::MIN as i64, i32::MAX as i64) as i32
	}).collect();
    }

    pub fn process_frame(&mut self, frame : &[Dsp16], previous : Dsp16) -> Result<Vec<i32>> {
	let log_mel = self.log_mel(frame, previous)?;
	return Ok(self.cepstrum(&log_mel));
    }

    /// Coefficients for every complete frame of `signal`
    pub fn process(&mut self, signal : &[Dsp16]) -> Result<Vec<Vec<i32>>> {
	let len = self.config.frame_len();
	let shift = self.config.shift_len();
	let mut result = vec![];
	let mut start = 0;
	while start + len <= signal.len() {
	    let previous = if start > 0 { signal[start - 1] } else { 0 };
	    result.push(self.process_frame(&signal[start..start + len], previous)?);
	    start += shift;
	}
	pdebug!("[Mfcc::process] {} samples -> {} frames", signal.len(), result.len());
	return Ok(result);
    }
}

// ----------------------------------------
// Deltas

/// First and second differences of a cepstrum stream
///
/// Both refer to the frame pushed two frames earlier:
/// `delta = c[t] - c[t-4]`, `delta2 = c[t] - 2 c[t-2] + c[t-4]`.
#[derive(Clone, Debug, Default)]
pub struct Deltas {
    history : Vec<Vec<i32>>,
}

impl Deltas {
    pub fn new() -> Deltas {
	return Deltas::default();
    }

    /// `None` until four earlier frames have been seen
    pub fn push(&mut self, cepstrum : &[i32]) -> Option<(Vec<i32>, Vec<i32>)> {
	let result = if self.history.len() == 4 {
	    let (c2, c4) = (&self.history[1], &self.history[3]);
	    let delta = cepstrum.iter().zip(c4).map(|(a, b)| a.wrapping_sub(*b)).collect();
	    let delta2 = cepstrum.iter().zip(c2).zip(c4)
		.map(|((a, b), c)| a.wrapping_sub(b.wrapping_mul(2)).wrapping_add(*c))
		.collect();
	    Some((delta, delta2))
	} else {
	    None
	};
	self.history.insert(0, cepstrum.to_vec());
	self.history.truncate(4);
	return result;
    }
}

// ----------------------------------------
// Tests

#[cfg(test)]
use crate::dsp::generation;

#[cfg(test)]
fn tone(len : usize, f : u32, amp : f64) -> Vec<Dsp16> {
    let mut v = vec![0; len];
    generation::sin(&mut v, f, 8000, 0);
    let a = q16(amp);
    return v.iter().map(|x| operators::mul(*x, a)).collect();
}

#[cfg(test)]
#[test]
fn test_config_validation() {
    assert!(MfccConfig::default().validate().is_ok());
    assert_eq!(256, MfccConfig::default().frame_len());
    assert_eq!(80, MfccConfig::default().shift_len());
    assert!(Mfcc::new(MfccConfig { frame_ms : 200, ..MfccConfig::default() }).is_err());
    assert!(Mfcc::new(MfccConfig { nb_coefficients : 30, ..MfccConfig::default() }).is_err());
    assert!(Mfcc::new(MfccConfig { pre_emphasis : 1.0, ..MfccConfig::default() }).is_err());
    assert!(Mfcc::new(MfccConfig { nb_filters : 400, ..MfccConfig::default() }).is_err());
}

#[cfg(test)]
#[test]
fn test_filter_bank_shape() {
    let mfcc = Mfcc::new(MfccConfig::default()).unwrap();
    let centers = mfcc.center_bins();
    assert_eq!(24, centers.len());
    assert!(centers.windows(2).all(|w| w[0] < w[1]));
    // mel spacing widens with frequency
    assert!(centers[1] - centers[0] < centers[23] - centers[22]);
    for (i, c) in centers.iter().enumerate() {
	assert_eq!(Dsp16::MAX, mfcc.filter_weight(i, *c));
    }
    // neighbouring triangles cross over and add up to one
    let b = (centers[9] + centers[10]) / 2;
    let sum = mfcc.filter_weight(9, b) as i32 + mfcc.filter_weight(10, b) as i32;
    assert!((sum - 32768).abs() <= 2, "{sum}");
    assert_eq!(0, mfcc.filter_weight(0, centers[5]));
}

#[cfg(test)]
#[test]
fn test_tone_peaks_in_its_band() {
    let mut mfcc = Mfcc::new(MfccConfig::default()).unwrap();
    let log_mel = mfcc.log_mel(&tone(256, 1000, 0.4), 0).unwrap();
    let (peak, _) = log_mel.iter().enumerate().max_by_key(|(_, e)| **e).unwrap();
    // 1000 Hz is bin 128 of 1024 at 8 kHz
    let center = mfcc.center_bins()[peak] as i64;
    assert!((center - 128).abs() <= 20, "peak filter {peak} centred at bin {center}");
}

#[cfg(test)]
#[test]
fn test_louder_tone_adds_log_energy() {
    let mut mfcc = Mfcc::new(MfccConfig::default()).unwrap();
    let soft = mfcc.log_mel(&tone(256, 1000, 0.2), 0).unwrap();
    let loud = mfcc.log_mel(&tone(256, 1000, 0.4), 0).unwrap();
    let (peak, _) = loud.iter().enumerate().max_by_key(|(_, e)| **e).unwrap();
    // doubling the amplitude quadruples the power
    let gain = coefficient_to_f64(loud[peak] - soft[peak]);
    assert!((gain - 4f64.ln()).abs() < 0.1, "gain {gain}");
}

#[cfg(test)]
#[test]
fn test_silence() {
    let mut mfcc = Mfcc::new(MfccConfig::default()).unwrap();
    let log_mel = mfcc.log_mel(&vec![0; 256], 0).unwrap();
    let floor = coefficient_to_f64(log_mel[0]);
    assert!((floor - (2f64.powi(-30)).ln()).abs() < 0.01, "floor {floor}");
    assert!(log_mel.iter().all(|e| *e == log_mel[0]));

    // the DCT of a constant only has a DC term
    let c = mfcc.cepstrum(&log_mel);
    assert_eq!(13, c.len());
    assert!((coefficient_to_f64(c[0]) - 24.0 * floor).abs() < 0.1);
    for k in 1..13 {
	assert!(coefficient_to_f64(c[k]).abs() < 0.2, "c[{k}] = {}", coefficient_to_f64(c[k]));
    }
}

#[cfg(test)]
#[test]
fn test_dct_matches_float() {
    let mfcc = Mfcc::new(MfccConfig::default()).unwrap();
    let log_mel : Vec<i32> = (0..24).map(|n| ((n as f64 * 0.7).sin() * 3.0 * 32768.0) as i32 - 200000).collect();
    let c = mfcc.cepstrum(&log_mel);
    for k in 0..13 {
	let expected : f64 = log_mel.iter().enumerate()
	    .map(|(n, e)| coefficient_to_f64(*e) * (std::f64::consts::PI * k as f64 * (n as f64 + 0.5) / 24.0).cos())
	    .sum();
	assert!((coefficient_to_f64(c[k]) - expected).abs() < 0.05, "c[{k}] {} vs {expected}", coefficient_to_f64(c[k]));
    }
}

#[cfg(test)]
#[test]
fn test_process_frames() {
    let mut mfcc = Mfcc::new(MfccConfig::default()).unwrap();
    let signal = tone(1000, 440, 0.5);
    let frames = mfcc.process(&signal).unwrap();
    // (1000 - 256) / 80 + 1
    assert_eq!(10, frames.len());
    assert!(frames.iter().all(|c| c.len() == 13));
    // frames start every 80 samples and pre-emphasise against the sample before them
    assert_eq!(frames[3], mfcc.process_frame(&signal[240..496], signal[239]).unwrap());
    assert_eq!(frames[0], mfcc.process_frame(&signal[0..256], 0).unwrap());
}

#[cfg(test)]
#[test]
fn test_deltas() {
    let mut d = Deltas::new();
    for t in 0..4 {
	assert_eq!(None, d.push(&[10 * t, t * t]));
    }
    let (delta, delta2) = d.push(&[40, 16]).unwrap();
    assert_eq!(vec![40, 16], delta);
    assert_eq!(vec![0, 8], delta2);
}
