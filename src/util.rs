// Copyright (C) 2022 Christoph Reichenbach (creichen@gmail.com)
// Licenced under the GNU General Public Licence, v3.  Please refer to the file "COPYING" for details.

// General utilities

pub const LOGGING : bool = false;
pub const WARNING : bool = true;
pub const CARGO_TEST : bool = cfg!(test);

#[macro_export]
macro_rules! ptrace {
    ($($a:tt)*) => {
	if $crate::util::LOGGING {
	    if $crate::util::CARGO_TEST {
		println!($($a)*)
	    } else {
		trace!($($a)*)
	    }
	}
    }
}

#[macro_export]
macro_rules! pdebug {
    ($($a:tt)*) => {
	if $crate::util::LOGGING {
	    if $crate::util::CARGO_TEST {
		println!($($a)*)
	    } else {
		debug!($($a)*)
	    }
	}
    }
}

#[macro_export]
macro_rules! pinfo {
    ($($a:tt)*) => {
	if $crate::util::LOGGING {
	    if $crate::util::CARGO_TEST {
		println!($($a)*)
	    } else {
		info!($($a)*)
	    }
	}
    }
}

#[macro_export]
macro_rules! pwarn {
    ($($a:tt)*) => {
	if $crate::util::WARNING {
	    if $crate::util::CARGO_TEST {
		println!($($a)*)
	    } else {
		warn!($($a)*)
	    }
	}
    }
}

#[macro_export]
macro_rules! perror {
    ($($a:tt)*) => {
	if $crate::util::CARGO_TEST {
	    println!($($a)*)
	} else {
	    error!($($a)*)
	}
    }
}

/// Greatest common divisor
pub fn gcd(a : u32, b : u32) -> u32 {
    let (mut a, mut b) = (a, b);
    while b != 0 {
	let r = a % b;
	a = b;
	b = r;
    }
    return a;
}

/// Shifts left for positive `shift`, arithmetically right otherwise
#[inline]
pub fn shift(v : i64, shift : i32) -> i64 {
    if shift >= 0 {
	return v << shift;
    }
    return v >> (-shift);
}

/// Integer square root: largest `r` with `r * r <= v`
pub fn isqrt(v : u64) -> u64 {
    if v < 2 {
	return v;
    }
    let mut bit = 1u64 << ((63 - v.leading_zeros()) & !1);
    let mut rem = v;
    let mut root = 0u64;
    while bit != 0 {
	if rem >= root + bit {
	    rem -= root + bit;
	    root = (root >> 1) + bit;
	} else {
	    root >>= 1;
	}
	bit >>= 2;
    }
    return root;
}

#[cfg(test)]
#[test]
fn test_gcd() {
    assert_eq!(300, gcd(48000, 44100));
    assert_eq!(8000, gcd(16000, 8000));
    assert_eq!(7, gcd(7, 0));
    assert_eq!(1, gcd(17, 8));
}

#[cfg(test)]
#[test]
fn test_isqrt() {
    for v in [0u64, 1, 2, 3, 4, 15, 16, 17, 1 << 40, (1 << 62) + 12345, u64::MAX >> 1] {
	let r = isqrt(v);
	assert!(r * r <= v, "isqrt({v}) = {r}");
	assert!((r + 1).checked_mul(r + 1).map(|s| s > v).unwrap_or(true), "isqrt({v}) = {r}");
    }
}

#[cfg(test)]
#[test]
fn test_shift() {
    assert_eq!(-2, shift(-8, -2));
    assert_eq!(-32, shift(-8, 2));
    assert_eq!(-1, shift(-1, -5));
}
