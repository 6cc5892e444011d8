// Copyright (C) 2022 Christoph Reichenbach (creichen@gmail.com)
// Licenced under the GNU General Public Licence, v3.  Please refer to the file "COPYING" for details.

//! Low-pass FIR design
//!
//! Coefficients are computed in floating point and converted once; `c.len()` is the order.
//! No care is taken against overflow when the filter is later applied.

#[allow(unused)]
use log::{Level, log_enabled, trace, debug, info, warn, error};
#[allow(unused)]
use crate::{ptrace, pdebug, pinfo, pwarn, perror};

use std::f64::consts::PI;

use crate::dsp::qformat::Q;
use crate::error::{DspError, Result};

fn check_design(order : usize, fc_hz : u32, fs_hz : u32) -> Result<f64> {
    if order == 0 {
	return Err(DspError::FilterDesign { message : "filter order must be positive".to_string() });
    }
    if fc_hz == 0 || fs_hz == 0 || 2 * fc_hz as u64 > fs_hz as u64 {
	return Err(DspError::FilterDesign {
	    message : format!("cut-off {fc_hz} Hz invalid for sample rate {fs_hz} Hz") });
    }
    return Ok(fc_hz as f64 / fs_hz as f64);
}

/// Ideal low-pass impulse response, centred on the middle tap
fn sinc_tap(n : usize, order : usize, fc : f64) -> f64 {
    let t = n as f64 - (order - 1) as f64 / 2.0;
    if t == 0.0 {
	return 2.0 * fc;
    }
    return (2.0 * PI * fc * t).sin() / (PI * t);
}

fn blackman(n : usize, order : usize) -> f64 {
    if order == 1 {
	return 1.0;
    }
    let r = n as f64 / (order - 1) as f64;
    return 0.42 - 0.5 * (2.0 * PI * r).cos() + 0.08 * (4.0 * PI * r).cos();
}

/// Truncated sinc low-pass filter
pub fn lpfirdesign<T : Q>(c : &mut [T], fc_hz : u32, fs_hz : u32) -> Result<()> {
    let fc = check_design(c.len(), fc_hz, fs_hz)?;
    let order = c.len();
    for (n, v) in c.iter_mut().enumerate() {
	*v = T::from_f64(sinc_tap(n, order, fc));
    }
    pdebug!("[lpfirdesign] order {order}, fc/fs = {fc}");
    return Ok(());
}

/// Blackman-windowed sinc low-pass filter
pub fn lpfirdesign_windowed_sinc<T : Q>(c : &mut [T], fc_hz : u32, fs_hz : u32) -> Result<()> {
    let fc = check_design(c.len(), fc_hz, fs_hz)?;
    let order = c.len();
    for (n, v) in c.iter_mut().enumerate() {
	*v = T::from_f64(sinc_tap(n, order, fc) * blackman(n, order));
    }
    pdebug!("[lpfirdesign_windowed_sinc] order {order}, fc/fs = {fc}");
    return Ok(());
}

#[cfg(test)]
use crate::dsp::qformat::{Dsp16, Dsp32};

#[cfg(test)]
fn gain_at(c : &[f64], f : f64) -> f64 {
    let (mut re, mut im) = (0.0, 0.0);
    for (n, v) in c.iter().enumerate() {
	re += v * (2.0 * PI * f * n as f64).cos();
	im -= v * (2.0 * PI * f * n as f64).sin();
    }
    return (re * re + im * im).sqrt();
}

#[cfg(test)]
#[test]
fn test_windowed_sinc_response() {
    let mut c = [0 as Dsp16; 63];
    lpfirdesign_windowed_sinc(&mut c, 1000, 8000).unwrap();
    let f : Vec<f64> = c.iter().map(|v| v.to_f64()).collect();
    // symmetric, linear phase
    for n in 0..31 {
	assert!((c[n] - c[62 - n]).abs() <= 1);
    }
    assert!((gain_at(&f, 0.0) - 1.0).abs() < 0.01);
    assert!(gain_at(&f, 0.05) > 0.98);
    assert!(gain_at(&f, 0.25) < 0.01);
    assert!(gain_at(&f, 0.4) < 0.01);
}

#[cfg(test)]
#[test]
fn test_truncated_sinc_centre() {
    let mut c = [0 as Dsp32; 31];
    lpfirdesign(&mut c, 2000, 8000).unwrap();
    assert!((c[15].to_f64() - 0.5).abs() < 1e-6);
    assert!(c[17].to_f64().abs() < 1e-6);
    let f : Vec<f64> = c.iter().map(|v| v.to_f64()).collect();
    assert!((gain_at(&f, 0.0) - 1.0).abs() < 0.05);
}

#[cfg(test)]
#[test]
fn test_design_rejects_bad_parameters() {
    let mut c = [0 as Dsp16; 8];
    assert!(lpfirdesign(&mut c, 5000, 8000).is_err());
    assert!(lpfirdesign(&mut c, 0, 8000).is_err());
    assert!(lpfirdesign_windowed_sinc(&mut c, 100, 0).is_err());
    assert!(lpfirdesign_windowed_sinc::<Dsp16>(&mut [], 100, 8000).is_err());
}
