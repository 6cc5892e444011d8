// Copyright (C) 2022 Christoph Reichenbach (creichen@gmail.com)
// Licenced under the GNU General Public Licence, v3.  Please refer to the file "COPYING" for details.

// Twiddle factor tables: TWIDDLE[n] = e^(-2 pi i n / TWIDDLE_SIZE)

use std::f64::consts::PI;

use crate::dsp::qformat::{Q, Complex, Dsp16, Dsp32};

pub const TWIDDLE_NLOG : u32 = 10;
pub const TWIDDLE_SIZE : usize = 1 << TWIDDLE_NLOG;

fn build<T : Q>() -> Vec<Complex<T>> {
    return (0..TWIDDLE_SIZE).map(|n| {
	let phi = -2.0 * PI * n as f64 / TWIDDLE_SIZE as f64;
	Complex::new(T::from_f64(phi.cos()), T::from_f64(phi.sin()))
    }).collect();
}

lazy_static! {
    static ref TWIDDLE16 : Vec<Complex<Dsp16>> = build();
    static ref TWIDDLE32 : Vec<Complex<Dsp32>> = build();
}

/// Sample types with a twiddle table
pub trait FftSample : Q {
    fn twiddles() -> &'static [Complex<Self>];
}

impl FftSample for Dsp16 {
    fn twiddles() -> &'static [Complex<Dsp16>] {
	return &TWIDDLE16;
    }
}

impl FftSample for Dsp32 {
    fn twiddles() -> &'static [Complex<Dsp32>] {
	return &TWIDDLE32;
    }
}

#[cfg(test)]
#[test]
fn test_twiddle_quadrants() {
    let t = Dsp16::twiddles();
    assert_eq!(TWIDDLE_SIZE, t.len());
    assert_eq!(Complex::new(i16::MAX, 0), t[0]);
    assert_eq!(i16::MIN, t[TWIDDLE_SIZE / 4].im);
    assert_eq!(i16::MIN, t[TWIDDLE_SIZE / 2].re);
    assert_eq!(i32::MAX, Dsp32::twiddles()[3 * TWIDDLE_SIZE / 4].im);
}
