// Copyright (C) 2022 Christoph Reichenbach (creichen@gmail.com)
// Licenced under the GNU General Public Licence, v3.  Please refer to the file "COPYING" for details.

//! Streaming polyphase resampler
//!
//! Converts `fs_in` to `fs_out` by interpolating with `L = fs_out / gcd` and decimating by
//! `M = fs_in / gcd` in one polyphase pass.  Input arrives in blocks of `buffer_size`
//! samples per channel; every channel keeps the last `order` input samples and its
//! position within the polyphase cycle, so consecutive blocks join up.
//!
//! Equal rates bypass the filter and blend neighbouring samples linearly.  That path still
//! honours a fractional position inherited from [`Resampler::link`].

#[allow(unused)]
use log::{Level, log_enabled, trace, debug, info, warn, error};
#[allow(unused)]
use crate::{ptrace, pdebug, pinfo, pwarn, perror};

use crate::dsp::qformat::{Q, Dsp16};
use crate::dsp::{filters, operators, windowing::Window};
use crate::error::{DspError, Result};
use crate::util::gcd;

/// Points re-computed after [`Resampler::link`] to smooth the seam
const NB_PTS_TO_INTERPOLATE : usize = 3;

/// Low-pass designer: `(coefficients, fc_hz, fs_hz)`
pub type FilterDesignFn = fn(&mut [Dsp16], u32, u32) -> Result<()>;

#[derive(Clone, Debug)]
pub struct DynamicCoefficients {
    /// Scale so that no polyphase sub-filter has an absolute coefficient sum above 1
    pub normalize : bool,
    /// Defaults to half the lower of the two rates
    pub custom_fc_hz : Option<u32>,
    pub filter : FilterDesignFn,
    pub window : Window,
}

impl Default for DynamicCoefficients {
    fn default() -> DynamicCoefficients {
	return DynamicCoefficients {
	    normalize : true,
	    custom_fc_hz : None,
	    filter : filters::lpfirdesign_windowed_sinc::<Dsp16>,
	    window : Window::Hann,
	};
    }
}

#[derive(Clone, Debug)]
pub enum Coefficients {
    /// Designed at setup time
    Dynamic(DynamicCoefficients),
    /// `order * L` coefficients, already sorted with `interpolation_coefsort`
    Fixed(Vec<Dsp16>),
}

impl Default for Coefficients {
    fn default() -> Coefficients {
	return Coefficients::Dynamic(DynamicCoefficients::default());
    }
}

#[derive(Clone, Debug)]
struct ChannelState {
    /// `order` samples of history followed by the current block
    ext : Vec<Dsp16>,
    /// Polyphase position, 0 <= counter < L
    counter : usize,
    /// Input offset at which the next block starts
    index : usize,
    link_required : bool,
}

#[derive(Clone, Debug)]
pub struct Resampler {
    fs_in : u32,
    fs_out : u32,
    l : usize,
    m : usize,
    order : usize,
    /// Block size plus `order`
    buffer_size : usize,
    coefs : Vec<Dsp16>,
    channels : Vec<ChannelState>,
    current_buffer_size : usize,
}

fn design(coefs : &mut [Dsp16], options : &DynamicCoefficients, fs_in : u32, fs_out : u32, order : usize, l : usize) -> Result<()> {
    let fc_hz = options.custom_fc_hz.unwrap_or(u32::min(fs_in, fs_out) / 2);
    let fs_design = u32::try_from(fs_in as u64 * l as u64)
	.map_err(|_| DspError::ResamplingRatio { fs_in, fs_out })?;
    (options.filter)(coefs, fc_hz, fs_design)?;
    let shaped = coefs.to_vec();
    options.window.apply(coefs, &shaped)?;
    filters::interpolation_coefsort(coefs, order, l);

    if options.normalize {
	let mut sum_max : i32 = 0;
	for phase in coefs.chunks(order) {
	    let sum : i32 = phase.iter().map(|c| operators::abs(*c) as i32).sum();
	    if sum > sum_max {
		sum_max = sum + 1;
	    }
	}
	if sum_max == 0 {
	    return Ok(());
	}
	pdebug!("[Resampler] normalising by {}", sum_max as f64 / 32768.0);
	if sum_max < (1 << Dsp16::QB) {
	    for c in coefs.iter_mut() {
		*c = operators::div(*c, sum_max as Dsp16);
	    }
	} else {
	    let scale = (((1i64 << Dsp16::QB) << Dsp16::QB) / sum_max as i64) as Dsp16;
	    for c in coefs.iter_mut() {
		*c = operators::mul(*c, scale);
	    }
	}
    }
    return Ok(());
}

/// Cubic Newton polynomial through `(0, y0) (1, y1) (5, y2) (6, y3)`, evaluated at 2, 3, 4
fn link_interpolation(y : [Dsp16; 4], out : &mut [Dsp16]) {
    const SCALE : u32 = 8;
    let x = [0i64, 1, NB_PTS_TO_INTERPOLATE as i64 + 2, NB_PTS_TO_INTERPOLATE as i64 + 3];
    let v : Vec<i64> = y.iter().map(|s| (*s as i64) << SCALE).collect();

    let f01 = (v[1] - v[0]) / (x[1] - x[0]);
    let f12 = (v[2] - v[1]) / (x[2] - x[1]);
    let f23 = (v[3] - v[2]) / (x[3] - x[2]);
    let f012 = (f12 - f01) / (x[2] - x[0]);
    let f123 = (f23 - f12) / (x[3] - x[1]);
    let f0123 = (f123 - f012) / (x[3] - x[0]);

    for (i, o) in out.iter_mut().take(NB_PTS_TO_INTERPOLATE).enumerate() {
	let xi = i as i64 + 2;
	let e1 = xi - x[0];
	let e2 = e1 * (xi - x[1]);
	let e3 = e2 * (xi - x[2]);
	let p = v[0] + f01 * e1 + f012 * e2 + f0123 * e3;
	*o = Dsp16::saturate((p + (1 << (SCALE - 1))) >> SCALE);
    }
}

impl Resampler {
    /// Sets up a resampler for blocks of `buffer_size` input samples per channel
    ///
    /// Fails for ratios whose decimation factor is 1 (pure integer up-sampling), as the
    /// polyphase kernel needs at least two input samples per cycle.
    pub fn new(fs_in : u32, fs_out : u32, buffer_size : usize, order : usize, nb_channels : usize, coefficients : Coefficients) -> Result<Resampler> {
	if fs_in == 0 || fs_out == 0 {
	    return Err(DspError::ResamplingRatio { fs_in, fs_out });
	}
	if buffer_size == 0 || nb_channels == 0 {
	    return Err(DspError::config("resampler needs a non-empty buffer and at least one channel"));
	}
	let divisor = gcd(fs_in, fs_out);
	let l = (fs_out / divisor) as usize;
	let m = (fs_in / divisor) as usize;
	if m < 2 && fs_in != fs_out {
	    return Err(DspError::ResamplingRatio { fs_in, fs_out });
	}

	let coefs = match coefficients {
	    Coefficients::Fixed(c) => {
		if c.len() != order * l {
		    return Err(DspError::config(format!("expected {} fixed coefficients, got {}", order * l, c.len())));
		}
		c
	    },
	    Coefficients::Dynamic(options) => {
		let mut c = vec![0; order * l];
		if order > 0 {
		    design(&mut c, &options, fs_in, fs_out, order, l)?;
		}
		c
	    },
	};

	let internal_size = buffer_size + order;
	pinfo!("[Resampler] {fs_in} Hz -> {fs_out} Hz: L={l}, M={m}, {order} taps per phase, {nb_channels} channel(s)");
	return Ok(Resampler {
	    fs_in,
	    fs_out,
	    l,
	    m,
	    order,
	    buffer_size : internal_size,
	    coefs,
	    channels : vec![ChannelState {
		ext : vec![0; usize::max(internal_size, order + 2)],
		counter : 0,
		index : 0,
		link_required : false,
	    }; nb_channels],
	    current_buffer_size : 0,
	});
    }

    pub fn input_sample_rate(&self) -> u32 {
	return self.fs_in;
    }

    pub fn output_sample_rate(&self) -> u32 {
	return self.fs_out;
    }

    pub fn input_buffer_size(&self) -> usize {
	return self.buffer_size - self.order;
    }

    pub fn nb_channels(&self) -> usize {
	return self.channels.len();
    }

    /// Upper bound on the samples one `compute` call produces
    pub fn output_max_buffer_size(&self) -> usize {
	return (self.buffer_size * self.l - self.order * self.l) / self.m + 1;
    }

    /// Samples produced by the latest `compute` call
    pub fn output_current_buffer_size(&self) -> usize {
	return self.current_buffer_size;
    }

    /// Polyphase coefficients in use
    pub fn coefficients(&self) -> &[Dsp16] {
	return &self.coefs;
    }

    pub fn reset(&mut self) {
	for st in &mut self.channels {
	    st.ext.fill(0);
	    st.counter = 0;
	    st.index = 0;
	    st.link_required = false;
	}
	self.current_buffer_size = 0;
    }

    /// Resamples one block of `channel`; returns the number of samples written to `output`
    pub fn compute(&mut self, output : &mut [Dsp16], input : &[Dsp16], channel : usize) -> usize {
	let n_tap = self.order;
	let bs = self.buffer_size;
	assert_eq!(input.len(), bs - n_tap, "Resampler::compute: wrong input block size");
	assert!(output.len() >= self.output_max_buffer_size(),
		"Resampler::compute: output holds {} samples, need {}", output.len(), self.output_max_buffer_size());
	let (l, m) = (self.l, self.m);
	let coefs = &self.coefs;
	let st = &mut self.channels[channel];

	let mut link_y = [0 as Dsp16; 4];
	if st.link_required {
	    link_y[0] = st.ext[n_tap];
	    link_y[1] = st.ext[n_tap + 1];
	}
	st.ext[n_tap..bs].copy_from_slice(input);

	let size = if l == m {
	    let data = &st.ext[(n_tap + 1) / 2..bs];
	    let w1 = (l - st.counter) as i32;
	    let w2 = st.counter as i32;
	    let size = bs - n_tap;
	    for i in 0..size {
		let next = *data.get(i + 1).unwrap_or(&data[i]) as i32;
		output[i] = ((data[i] as i32 * w1 + next * w2) / l as i32) as Dsp16;
	    }
	    size
	} else {
	    let limit = if n_tap == 0 { bs } else { bs - n_tap };
	    let mut n = st.index;
	    let mut counter = st.counter;
	    let mut size = 0;
	    while n < limit {
		let mut k = counter;
		while k < l {
		    output[size] = if n_tap == 0 {
			st.ext[n]
		    } else {
			let phase = &coefs[k * n_tap..(k + 1) * n_tap];
			let mut sum : i64 = 0;
			for (i, h) in phase.iter().enumerate() {
			    sum += *h as i64 * st.ext[n + n_tap - i] as i64;
			}
			Dsp16::wrap(sum >> Dsp16::QB)
		    };
		    size += 1;
		    k += m;
		}
		n += k / l;
		counter = k % l;
	    }
	    st.index = n - limit;
	    st.counter = counter;
	    size
	};

	if st.link_required {
	    if size >= NB_PTS_TO_INTERPOLATE + 2 {
		link_y[2] = output[NB_PTS_TO_INTERPOLATE];
		link_y[3] = output[NB_PTS_TO_INTERPOLATE + 1];
		link_interpolation(link_y, output);
	    } else {
		pwarn!("[Resampler] block too short to smooth the link ({size} samples)");
	    }
	    st.link_required = false;
	}

	st.ext.copy_within(bs - n_tap..bs, 0);
	if size >= 2 {
	    st.ext[n_tap] = output[size - 2];
	    st.ext[n_tap + 1] = output[size - 1];
	}
	self.current_buffer_size = size;
	return size;
    }

    /// Continues the streams of `previous` in `self`, e.g. after a change of input rate
    ///
    /// Both resamplers must agree on filter order, block size and channel count.  The next
    /// `compute` on each channel smooths the seam between the two streams.
    pub fn link(&mut self, previous : &Resampler) -> Result<()> {
	if self.order != previous.order {
	    return Err(DspError::ResamplingLink { message : format!("filter orders differ ({} vs {})", self.order, previous.order) });
	}
	if self.buffer_size != previous.buffer_size {
	    return Err(DspError::ResamplingLink { message : "buffer sizes differ".to_string() });
	}
	if self.channels.len() != previous.channels.len() {
	    return Err(DspError::ResamplingLink { message : "channel counts differ".to_string() });
	}
	if self.l == self.m {
	    self.l = previous.l;
	    self.m = previous.l;
	}
	let n = self.order + 2;
	for (st, prev) in self.channels.iter_mut().zip(&previous.channels) {
	    st.ext[..n].copy_from_slice(&prev.ext[..n]);
	    st.index = prev.index;
	    st.counter = prev.counter * self.l / previous.l;
	    st.link_required = true;
	}
	pdebug!("[Resampler] linked {} Hz stream into {} Hz -> {} Hz", previous.fs_in, self.fs_in, self.fs_out);
	return Ok(());
    }
}

#[cfg(test)]
use crate::dsp::qformat::q16;

#[cfg(test)]
fn tone(f : f64, fs : f64, amp : f64, start : usize, len : usize) -> Vec<Dsp16> {
    return (start..start + len).map(|n| q16(amp * (2.0 * std::f64::consts::PI * f * n as f64 / fs).sin())).collect();
}

#[cfg(test)]
fn run(r : &mut Resampler, input : &[Dsp16], channel : usize) -> Vec<Dsp16> {
    let bs = r.input_buffer_size();
    let mut result = vec![];
    let mut out = vec![0; r.output_max_buffer_size()];
    for block in input.chunks_exact(bs) {
	let size = r.compute(&mut out, block, channel);
	assert_eq!(size, r.output_current_buffer_size());
	result.extend_from_slice(&out[..size]);
    }
    return result;
}

#[cfg(test)]
fn zero_crossings(v : &[Dsp16]) -> usize {
    return v.windows(2).filter(|w| (w[0] < 0) != (w[1] < 0)).count();
}

#[cfg(test)]
fn rms(v : &[Dsp16]) -> f64 {
    return (v.iter().map(|x| x.to_f64() * x.to_f64()).sum::<f64>() / v.len() as f64).sqrt();
}

#[cfg(test)]
#[test]
fn test_setup_ratios() {
    assert!(Resampler::new(16000, 48000, 256, 12, 1, Coefficients::default()).is_err());
    assert!(Resampler::new(0, 48000, 256, 12, 1, Coefficients::default()).is_err());
    assert!(Resampler::new(48000, 16000, 0, 12, 1, Coefficients::default()).is_err());
    let r = Resampler::new(44100, 48000, 441, 12, 2, Coefficients::default()).unwrap();
    assert_eq!((160, 147), (r.l, r.m));
    assert_eq!(12 * 160, r.coefficients().len());
    assert_eq!(441 * 160 / 147 + 1, r.output_max_buffer_size());
    assert_eq!(2, r.nb_channels());
    assert!(Resampler::new(48000, 16000, 480, 4, 1, Coefficients::Fixed(vec![0; 3])).is_err());
}

#[cfg(test)]
#[test]
fn test_normalised_phases() {
    let r = Resampler::new(44100, 48000, 441, 12, 1, Coefficients::default()).unwrap();
    for phase in r.coefficients().chunks(12) {
	let sum : i32 = phase.iter().map(|c| (*c as i32).abs()).sum();
	assert!(sum <= 32768, "phase sum {sum}");
    }
}

#[cfg(test)]
#[test]
fn test_downsample_tone() {
    let mut r = Resampler::new(48000, 16000, 480, 24, 1, Coefficients::default()).unwrap();
    let input = tone(1000.0, 48000.0, 0.5, 0, 480 * 6);
    let out = run(&mut r, &input, 0);
    assert_eq!(160 * 6, out.len());
    // normalisation leaves the signed coefficient sum as passband gain
    let gain = r.coefficients().iter().map(|c| *c as f64).sum::<f64>() / 32768.0;
    assert!(gain > 0.7 && gain <= 1.0, "gain {gain}");
    // skip the filter transient
    let steady = &out[160..];
    assert!((rms(steady) - gain * 0.5 / 2f64.sqrt()).abs() < 0.02, "rms {}, gain {gain}", rms(steady));
    let crossings = zero_crossings(steady);
    assert!((crossings as i64 - 100).abs() <= 2, "{crossings} zero crossings");
}

#[cfg(test)]
#[test]
fn test_fractional_ratio_streaming() {
    let mut r = Resampler::new(3000, 4000, 300, 8, 1, Coefficients::default()).unwrap();
    let input = tone(200.0, 3000.0, 0.5, 0, 300 * 8);
    let out = run(&mut r, &input, 0);
    assert!((out.len() as i64 - 3200).abs() <= 2, "{} samples", out.len());
    let steady = &out[400..];
    let expected = 2.0 * 200.0 * steady.len() as f64 / 4000.0;
    assert!((zero_crossings(steady) as f64 - expected).abs() <= 2.0);
    // no discontinuities at block borders
    let max_step = (0.5 * 2.0 * std::f64::consts::PI * 200.0 / 4000.0 * 32768.0) as i32;
    for w in steady.windows(2) {
	assert!((w[1] as i32 - w[0] as i32).abs() < max_step * 3 / 2, "jump {} -> {}", w[0], w[1]);
    }
}

#[cfg(test)]
#[test]
fn test_equal_rates_delay_line() {
    let mut r = Resampler::new(8000, 8000, 16, 4, 1, Coefficients::default()).unwrap();
    let input : Vec<Dsp16> = (0..48).map(|i| i * 100).collect();
    let out = run(&mut r, &input, 0);
    assert_eq!(48, out.len());
    assert_eq!([0, 0], out[..2]);
    for i in 2..48 {
	assert_eq!(input[i - 2], out[i]);
    }
}

#[cfg(test)]
#[test]
fn test_channels_are_independent() {
    let mut r = Resampler::new(48000, 16000, 96, 12, 2, Coefficients::default()).unwrap();
    let a = tone(500.0, 48000.0, 0.4, 0, 96 * 4);
    let silence = vec![0; 96 * 4];
    let mut out = vec![0; r.output_max_buffer_size()];
    let mut left = vec![];
    let mut right = vec![];
    for (la, lb) in a.chunks(96).zip(silence.chunks(96)) {
	let n = r.compute(&mut out, la, 0);
	left.extend_from_slice(&out[..n]);
	let n = r.compute(&mut out, lb, 1);
	right.extend_from_slice(&out[..n]);
    }
    assert!(right.iter().all(|x| *x == 0));
    assert_eq!(left, run(&mut Resampler::new(48000, 16000, 96, 12, 1, Coefficients::default()).unwrap(), &a, 0));
}

#[cfg(test)]
#[test]
fn test_link_checks_compatibility() {
    let a = Resampler::new(32000, 16000, 160, 8, 1, Coefficients::default()).unwrap();
    let mut b = Resampler::new(48000, 16000, 160, 12, 1, Coefficients::default()).unwrap();
    assert!(b.link(&a).is_err());
    let mut c = Resampler::new(48000, 16000, 80, 8, 1, Coefficients::default()).unwrap();
    assert!(c.link(&a).is_err());
    let mut d = Resampler::new(48000, 16000, 160, 8, 2, Coefficients::default()).unwrap();
    assert!(d.link(&a).is_err());
}

#[cfg(test)]
#[test]
fn test_link_smooth_seam() {
    // 32 kHz stream switching to 48 kHz input, both producing 16 kHz
    let mut a = Resampler::new(32000, 16000, 192, 8, 1, Coefficients::default()).unwrap();
    let mut b = Resampler::new(48000, 16000, 192, 8, 1, Coefficients::default()).unwrap();
    let first = run(&mut a, &tone(200.0, 32000.0, 0.5, 0, 192 * 4), 0);
    b.link(&a).unwrap();
    let t0 = 192 * 4 * 3 / 2;
    let second = run(&mut b, &tone(200.0, 48000.0, 0.5, t0, 192 * 2), 0);
    let last = *first.last().unwrap() as i32;
    // the seam stays within a few sample steps of a 200 Hz tone at 16 kHz
    let max_step = (0.5 * 2.0 * std::f64::consts::PI * 200.0 / 16000.0 * 32768.0) as i32;
    assert!((second[0] as i32 - last).abs() < 4 * max_step + 200, "seam {} -> {}", last, second[0]);
    for w in second[..8].windows(2) {
	assert!((w[1] as i32 - w[0] as i32).abs() < 4 * max_step + 200);
    }
}

#[cfg(test)]
#[test]
fn test_link_interpolation_cubic() {
    // samples of a cubic are reproduced exactly
    let f = |x : i64| (x * x * x - 6 * x * x + 20 * x) as Dsp16;
    let mut out = [0 as Dsp16; 5];
    link_interpolation([f(0), f(1), f(5), f(6)], &mut out);
    assert_eq!([f(2), f(3), f(4)], out[..3]);
}
