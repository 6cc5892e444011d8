// Copyright (C) 2022 Christoph Reichenbach (creichen@gmail.com)
// Licenced under the GNU General Public Licence, v3.  Please refer to the file "COPYING" for details.

//! Signal generators
//!
//! Frequencies are in Hz, relative to the sample rate `fs`.  Phases are angles in the
//! operator convention ([-1, 1) covers one period), while `duty` and `delay` are fractions
//! of a period in [0, 1].  Periodic generators return the value to pass in for the next
//! block so that consecutive blocks join up.

use crate::dsp::qformat::Q;
use crate::dsp::operators::{self, Rng, widen, narrow, sin_q30, ONE, F};

/// Wraps a Q30 angle into [-1, 1)
#[inline]
fn wrap_angle(p : i64) -> i64 {
    return (p + ONE).rem_euclid(2 * ONE) - ONE;
}

/// Fractional part of `n * f / fs`, Q30 in [0, 1)
///
/// Whole periods are dropped before scaling, so `n` may be arbitrarily large.
#[inline]
fn cycle_fraction(n : usize, f : u32, fs : u32) -> i64 {
    let cycles = (n as i128 * f as i128) % fs as i128;
    return ((cycles << F) / fs as i128) as i64;
}

/// Position within the period of sample `n`, Q30 in [0, 1)
#[inline]
fn period_position(n : usize, f : u32, fs : u32, delay : i64) -> i64 {
    return (delay + cycle_fraction(n, f, fs)).rem_euclid(ONE);
}

fn check_rates(f : u32, fs : u32) {
    assert!(fs > 0, "sample rate must be positive");
    assert!(f <= fs, "frequency {f} Hz exceeds the sample rate {fs} Hz");
}

/// Sine wave; returns the phase following the last sample
pub fn sin<T : Q>(out : &mut [T], f : u32, fs : u32, phase : T) -> T {
    check_rates(f, fs);
    let start = widen(phase);
    for (n, o) in out.iter_mut().enumerate() {
	let advance = 2 * cycle_fraction(n, f, fs);
	*o = narrow(sin_q30(wrap_angle(start + advance)));
    }
    let advance = 2 * cycle_fraction(out.len(), f, fs);
    return narrow(wrap_angle(start + advance));
}

/// Cosine wave; returns the phase following the last sample
pub fn cos<T : Q>(out : &mut [T], f : u32, fs : u32, phase : T) -> T {
    let quarter = widen(T::wrap(1 << (T::QB - 1)));
    let shifted = narrow::<T>(wrap_angle(widen(phase) + quarter));
    let next = sin(out, f, fs, shifted);
    return narrow(wrap_angle(widen(next) - quarter));
}

/// White noise in [-amp, amp)
pub fn noise<T : Q>(out : &mut [T], amp : T, rng : &mut Rng) {
    for o in out.iter_mut() {
	*o = operators::mul(rng.rand::<T>(), amp);
    }
}

/// Rectangular wave: `MAX` for the first `duty` of every period, `MIN` otherwise
pub fn rect<T : Q>(out : &mut [T], f : u32, fs : u32, duty : T, delay : T) {
    check_rates(f, fs);
    let (duty, delay) = (widen(duty), widen(delay));
    for (n, o) in out.iter_mut().enumerate() {
	*o = if period_position(n, f, fs, delay) < duty { T::MAX } else { T::MIN };
    }
}

/// Square wave: rectangular with a duty cycle of one half
pub fn sqr<T : Q>(out : &mut [T], f : u32, fs : u32, delay : T) {
    rect(out, f, fs, T::wrap(1 << (T::QB - 1)), delay);
}

/// Saw tooth rising from -1 to 1 over the first `duty` of every period and falling back
/// over the rest; returns the delay for the next block
pub fn saw<T : Q>(out : &mut [T], f : u32, fs : u32, duty : T, delay : T) -> T {
    check_rates(f, fs);
    let (duty, delay) = (widen(duty), widen(delay));
    for (n, o) in out.iter_mut().enumerate() {
	let pos = period_position(n, f, fs, delay);
	let v = if pos < duty {
	    -ONE + ((2 * pos) << F) / duty
	} else {
	    ONE - ((2 * (pos - duty)) << F) / (ONE - duty)
	};
	*o = narrow(v);
    }
    return narrow(period_position(out.len(), f, fs, delay));
}

/// Dirac comb: `MAX` on the first sample of every period, 0 elsewhere
pub fn dcomb<T : Q>(out : &mut [T], f : u32, fs : u32, delay : T) {
    check_rates(f, fs);
    let delay = widen(delay);
    let step = ((f as i64) << F) / fs as i64;
    for (n, o) in out.iter_mut().enumerate() {
	*o = if period_position(n, f, fs, delay) < step.max(1) { T::MAX } else { T::ZERO };
    }
}

/// `out[n] = n * increment`, saturated
pub fn ramp<T : Q>(out : &mut [T], increment : T) {
    for (n, o) in out.iter_mut().enumerate() {
	*o = T::saturate(n as i64 * increment.to_i64());
    }
}

/// `initial` before `index`, `final_value` from `index` onwards
pub fn step<T : Q>(out : &mut [T], initial : T, final_value : T, index : usize) {
    for (n, o) in out.iter_mut().enumerate() {
	*o = if n < index { initial } else { final_value };
    }
}

/// `MAX` at `index`, 0 elsewhere
pub fn dirac<T : Q>(out : &mut [T], index : usize) {
    out.fill(T::ZERO);
    if let Some(o) = out.get_mut(index) {
	*o = T::MAX;
    }
}

#[cfg(test)]
use crate::dsp::qformat::{q16, q32, Dsp16, Dsp32};

#[cfg(test)]
#[test]
fn test_sin_continuous_across_blocks() {
    let mut whole = [0 as Dsp16; 100];
    sin(&mut whole, 440, 8000, 0);
    let mut a = [0 as Dsp16; 37];
    let mut b = [0 as Dsp16; 63];
    let phase = sin(&mut a, 440, 8000, 0);
    sin(&mut b, 440, 8000, phase);
    for (i, (x, y)) in whole.iter().zip(a.iter().chain(b.iter())).enumerate() {
	assert!((x - y).abs() <= 2, "sample {i}: {x} vs {y}");
    }
    for (n, x) in whole.iter().enumerate() {
	let expected = (2.0 * std::f64::consts::PI * 440.0 * n as f64 / 8000.0).sin();
	assert!((x.to_f64() - expected).abs() < 0.001);
    }
}

#[cfg(test)]
#[test]
fn test_long_buffers_keep_phase() {
    let mut v = vec![0 as Dsp16; 1_000_000];
    let next = sin(&mut v, 10000, 48000, 0);
    for n in (0..v.len()).step_by(997).chain([v.len() - 1]) {
	let turns = ((n as u64 * 10000) % 48000) as f64 / 48000.0;
	let expected = (2.0 * std::f64::consts::PI * turns).sin();
	assert!((v[n].to_f64() - expected).abs() < 0.001, "sample {n}: {} vs {expected}", v[n].to_f64());
    }
    // 1e6 * 10000 / 48000 = 208333 + 1/3 periods
    assert!((next.to_f64() - 2.0 / 3.0).abs() < 0.001, "next phase {}", next.to_f64());

    sqr(&mut v, 1000, 8000, 0);
    assert!(v.iter().enumerate().all(|(n, x)| *x == if n % 8 < 4 { i16::MAX } else { i16::MIN }));
    let mut w = vec![0 as Dsp32; 600_000];
    let next = saw(&mut w, 7000, 8000, i32::MAX, 0);
    // 600000 * 7 / 8 = 525000 whole periods
    assert!(next.abs() < 4);
    assert!((w[599_999].to_f64() - (-1.0 + 2.0 * 0.125)).abs() < 1e-6);
}

#[cfg(test)]
#[test]
fn test_cos() {
    let mut v = [0 as Dsp32; 16];
    let next = cos(&mut v, 1000, 8000, 0);
    assert_eq!(i32::MAX, v[0]);
    assert!(v[2].to_f64().abs() < 1e-6);
    assert!((v[4].to_f64() + 1.0).abs() < 1e-6);
    // two full periods: back to the start
    assert!(next.abs() < 4);
}

#[cfg(test)]
#[test]
fn test_rect_and_sqr() {
    let mut v = [0 as Dsp16; 8];
    rect(&mut v, 1000, 8000, q16(0.25), 0);
    assert_eq!([i16::MAX, i16::MAX, i16::MIN, i16::MIN, i16::MIN, i16::MIN, i16::MIN, i16::MIN], v);
    sqr(&mut v, 2000, 8000, q16(0.5));
    assert_eq!([i16::MIN, i16::MIN, i16::MAX, i16::MAX, i16::MIN, i16::MIN, i16::MAX, i16::MAX], v);
}

#[cfg(test)]
#[test]
fn test_saw() {
    let mut v = [0 as Dsp32; 8];
    let next = saw(&mut v, 1000, 8000, i32::MAX, 0);
    for (n, x) in v.iter().enumerate() {
	assert!((x.to_f64() - (-1.0 + n as f64 / 4.0)).abs() < 1e-6, "{:?}", v);
    }
    assert!(next.abs() < 4);

    let mut tri = [0 as Dsp16; 4];
    saw(&mut tri, 2000, 8000, q16(0.5), 0);
    assert_eq!([i16::MIN, 0, i16::MAX, 0], tri);
}

#[cfg(test)]
#[test]
fn test_dcomb_ramp_step_dirac() {
    let mut v = [0 as Dsp16; 10];
    dcomb(&mut v, 2000, 8000, 0);
    assert_eq!([i16::MAX, 0, 0, 0, i16::MAX, 0, 0, 0, i16::MAX, 0], v);

    ramp(&mut v, q16(0.125));
    assert_eq!(q16(0.5), v[4]);
    assert_eq!(i16::MAX, v[9]);

    step(&mut v, q16(-0.5), q16(0.5), 3);
    assert_eq!([q16(-0.5), q16(-0.5), q16(-0.5), q16(0.5)], v[..4]);

    dirac(&mut v, 2);
    assert_eq!([0, 0, i16::MAX, 0], v[..4]);
    dirac(&mut v, 100);
    assert!(v.iter().all(|x| *x == 0));
}

#[cfg(test)]
#[test]
fn test_noise_amplitude() {
    let mut rng = Rng::new(99);
    let mut v = [0 as Dsp32; 1000];
    noise(&mut v, q32(0.25), &mut rng);
    assert!(v.iter().all(|x| x.to_f64().abs() <= 0.25));
    assert!(v.iter().any(|x| x.to_f64() > 0.2));
}
