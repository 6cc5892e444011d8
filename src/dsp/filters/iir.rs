// Copyright (C) 2022 Christoph Reichenbach (creichen@gmail.com)
// Licenced under the GNU General Public Licence, v3.  Please refer to the file "COPYING" for details.

#[allow(unused)]
use log::{Level, log_enabled, trace, debug, info, warn, error};
#[allow(unused)]
use crate::{ptrace, pdebug, pinfo, pwarn, perror};

use crate::dsp::qformat::Q;
use crate::error::{DspError, Result};

/// Infinite impulse response filter
///
/// ```text
/// y[n] = (sum_k num[k] x[n - k]     >> (QB - num_prediv))
///      - (sum_k den[k] y[n - 1 - k] >> (QB - den_prediv))
/// ```
///
/// `den` omits the leading unity coefficient.  The `*_prediv` shifts let the coefficients
/// be stored divided by a power of two when their magnitude exceeds 1.
#[derive(Clone, Debug)]
pub struct Iir<T : Q> {
    num : Vec<T>,
    den : Vec<T>,
    num_prediv : u32,
    den_prediv : u32,
    x_hist : Vec<T>, // x_hist[k] = x[n - k]
    y_hist : Vec<T>, // y_hist[k] = y[n - 1 - k]
}

fn check_prediv<T : Q>(prediv : u32) -> Result<()> {
    if prediv >= T::QB {
	return Err(DspError::FilterDesign {
	    message : format!("predivisor 2^{prediv} out of range for {} fractional bits", T::QB) });
    }
    return Ok(());
}

#[inline]
fn iir_sum<T : Q>(coefs : &[T], hist : impl Iterator<Item = T>, prediv : u32) -> i64 {
    let mut acc : i64 = 0;
    for (c, v) in coefs.iter().zip(hist) {
	acc = acc.wrapping_add(c.to_i64() * v.to_i64());
    }
    return acc >> (T::QB - prediv);
}

impl<T : Q> Iir<T> {
    pub fn new(num : &[T], den : &[T], num_prediv : u32, den_prediv : u32) -> Result<Iir<T>> {
	if num.is_empty() {
	    return Err(DspError::FilterDesign { message : "IIR filter needs at least one numerator coefficient".to_string() });
	}
	check_prediv::<T>(num_prediv)?;
	check_prediv::<T>(den_prediv)?;
	pdebug!("[Iir] {} zeros, {} poles", num.len() - 1, den.len());
	return Ok(Iir {
	    num : num.to_vec(),
	    den : den.to_vec(),
	    num_prediv,
	    den_prediv,
	    x_hist : vec![T::ZERO; num.len()],
	    y_hist : vec![T::ZERO; den.len()],
	});
    }

    pub fn reset(&mut self) {
	self.x_hist.fill(T::ZERO);
	self.y_hist.fill(T::ZERO);
    }

    pub fn step(&mut self, x : T) -> T {
	self.x_hist.rotate_right(1);
	self.x_hist[0] = x;
	let acc = iir_sum(&self.num, self.x_hist.iter().copied(), self.num_prediv)
	    - iir_sum(&self.den, self.y_hist.iter().copied(), self.den_prediv);
	let y = T::wrap(acc);
	if !self.y_hist.is_empty() {
	    self.y_hist.rotate_right(1);
	    self.y_hist[0] = y;
	}
	return y;
    }

    /// Filters a block, continuing from the history of earlier blocks
    pub fn process(&mut self, out : &mut [T], x : &[T]) {
	assert_eq!(out.len(), x.len(), "Iir::process: output and input lengths differ");
	for (o, v) in out.iter_mut().zip(x) {
	    *o = self.step(*v);
	}
    }
}

/// IIR filter over a block, using the first `num.len() - 1` samples of `x` as input history
///
/// `out.len()` must be `x.len() - num.len() + 1`.  Outputs before the block count as zero.
pub fn iirpart<T : Q>(out : &mut [T], x : &[T], num : &[T], den : &[T], num_prediv : u32, den_prediv : u32) {
    assert!(!num.is_empty() && x.len() >= num.len(),
	    "iirpart: input of {} elements is shorter than the {}-tap numerator", x.len(), num.len());
    assert_eq!(out.len(), x.len() - num.len() + 1, "iirpart: wrong output length");
    assert!(num_prediv < T::QB && den_prediv < T::QB, "iirpart: predivisor out of range");
    let offset = num.len() - 1;
    for n in 0..out.len() {
	let feed = iir_sum(num, (0..num.len()).map(|k| x[n + offset - k]), num_prediv);
	let back = iir_sum(den, (0..usize::min(den.len(), n)).map(|k| out[n - 1 - k]), den_prediv);
	out[n] = T::wrap(feed - back);
    }
}

#[cfg(test)]
use crate::dsp::qformat::{q16, q32, Dsp16};

#[cfg(test)]
#[test]
fn test_iir_first_order_lowpass() {
    // y[n] = x[n] / 2 + y[n - 1] / 2
    let mut iir = Iir::<Dsp16>::new(&[q16(0.5)], &[q16(-0.5)], 0, 0).unwrap();
    let x = [q16(0.5); 40];
    let mut y = [0; 40];
    iir.process(&mut y, &x);
    assert_eq!(q16(0.25), y[0]);
    assert_eq!(q16(0.375), y[1]);
    assert!((y[39].to_f64() - 0.5).abs() < 0.001);
}

#[cfg(test)]
#[test]
fn test_iir_prediv() {
    // coefficient 1.5, stored as 0.75 with one bit of predivision
    let mut iir = Iir::new(&[q32(0.75)], &[], 1, 0).unwrap();
    assert_eq!(q32(0.375), iir.step(q32(0.25)));
    assert!(Iir::<Dsp16>::new(&[q16(0.5)], &[], 15, 0).is_err());
    assert!(Iir::<Dsp16>::new(&[], &[q16(0.5)], 0, 0).is_err());
}

#[cfg(test)]
#[test]
fn test_iir_blocks_match_single_pass() {
    let num = [q16(0.2), q16(0.3), q16(0.2)];
    let den = [q16(-0.6), q16(0.2)];
    let x : Vec<Dsp16> = (0..64).map(|i| q16(((i * 37) % 19) as f64 / 40.0 - 0.2)).collect();

    let mut whole = Iir::new(&num, &den, 0, 0).unwrap();
    let mut expected = vec![0; 64];
    whole.process(&mut expected, &x);

    let mut blocks = Iir::new(&num, &den, 0, 0).unwrap();
    let mut actual = vec![0; 64];
    for (o, i) in actual.chunks_mut(10).zip(x.chunks(10)) {
	blocks.process(o, i);
    }
    assert_eq!(expected, actual);

    blocks.reset();
    let mut again = vec![0; 64];
    blocks.process(&mut again, &x);
    assert_eq!(expected, again);
}

#[cfg(test)]
#[test]
fn test_iirpart_matches_streaming() {
    let num = [q16(0.2), q16(0.3), q16(0.2)];
    let den = [q16(-0.6), q16(0.2)];
    let x : Vec<Dsp16> = (0..32).map(|i| q16(((i * 11) % 7) as f64 / 20.0 - 0.1)).collect();

    // Streaming over x[2..] with x[0..2] pre-loaded as input history
    let mut iir = Iir::new(&num, &den, 0, 0).unwrap();
    iir.x_hist[0] = x[1];
    iir.x_hist[1] = x[0];
    let mut expected = vec![0; 30];
    iir.process(&mut expected, &x[2..]);

    let mut out = vec![0; 30];
    iirpart(&mut out, &x, &num, &den, 0, 0);
    assert_eq!(expected, out);
}
