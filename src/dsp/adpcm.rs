// Copyright (C) 2022 Christoph Reichenbach (creichen@gmail.com)
// Licenced under the GNU General Public Licence, v3.  Please refer to the file "COPYING" for details.

//! IMA/DVI ADPCM
//!
//! Four bits per 16-bit sample.  Encoder and decoder track the same `AdpcmState`, so a
//! decoder that starts from the encoder's state reproduces the encoder's prediction.

pub mod packet;
pub mod wav;

pub use packet::{PacketEncoder, PacketDecoder, PACKET_SIZE, PACKET_HEADER_SIZE, SAMPLES_PER_PACKET};
pub use wav::{DviAdpcmWav, read_dvi_wav, write_dvi_wav, WAVE_FORMAT_DVI_ADPCM};

pub const MAX_STEP_INDEX : u8 = 88;

const INDEX_TABLE : [i8; 16] = [
    -1, -1, -1, -1, 2, 4, 6, 8,
    -1, -1, -1, -1, 2, 4, 6, 8,
];

const STEP_TABLE : [i32; 89] = [
    7, 8, 9, 10, 11, 12, 13, 14, 16, 17,
    19, 21, 23, 25, 28, 31, 34, 37, 41, 45,
    50, 55, 60, 66, 73, 80, 88, 97, 107, 118,
    130, 143, 157, 173, 190, 209, 230, 253, 279, 307,
    337, 371, 408, 449, 494, 544, 598, 658, 724, 796,
    876, 963, 1060, 1166, 1282, 1411, 1552, 1707, 1878, 2066,
    2272, 2499, 2749, 3024, 3327, 3660, 4026, 4428, 4871, 5358,
    5894, 6484, 7132, 7845, 8630, 9493, 10442, 11487, 12635, 13899,
    15289, 16818, 18500, 20350, 22385, 24623, 27086, 29794, 32767,
];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AdpcmState {
    pub step_index : u8,
    pub predicted : i16,
}

impl AdpcmState {
    pub fn new(step_index : u8, predicted : i16) -> AdpcmState {
	return AdpcmState { step_index : u8::min(step_index, MAX_STEP_INDEX), predicted };
    }

    fn advance(&mut self, nibble : u8, vpdiff : i32) {
	let p = if nibble & 8 != 0 {
	    self.predicted as i32 - vpdiff
	} else {
	    self.predicted as i32 + vpdiff
	};
	self.predicted = p.clamp(i16::MIN as i32, i16::MAX as i32) as i16;
	let index = self.step_index as i32 + INDEX_TABLE[nibble as usize] as i32;
	self.step_index = index.clamp(0, MAX_STEP_INDEX as i32) as u8;
    }

    pub fn encode_nibble(&mut self, sample : i16) -> u8 {
	let mut step = STEP_TABLE[self.step_index as usize];
	let mut diff = sample as i32 - self.predicted as i32;
	let mut nibble = 0u8;
	if diff < 0 {
	    nibble = 8;
	    diff = -diff;
	}
	let mut vpdiff = step >> 3;
	for bit in [4u8, 2, 1] {
	    if diff >= step {
		nibble |= bit;
		diff -= step;
		vpdiff += step;
	    }
	    step >>= 1;
	}
	self.advance(nibble, vpdiff);
	return nibble;
    }

    pub fn decode_nibble(&mut self, nibble : u8) -> i16 {
	let nibble = nibble & 0x0f;
	let step = STEP_TABLE[self.step_index as usize];
	let mut vpdiff = step >> 3;
	if nibble & 4 != 0 {
	    vpdiff += step;
	}
	if nibble & 2 != 0 {
	    vpdiff += step >> 1;
	}
	if nibble & 1 != 0 {
	    vpdiff += step >> 2;
	}
	self.advance(nibble, vpdiff);
	return self.predicted;
    }

    /// Encodes two samples per byte, the first one in the low nibble
    ///
    /// `out` must hold `(samples.len() + 1) / 2` bytes; an odd tail leaves the high nibble clear.
    pub fn encode(&mut self, out : &mut [u8], samples : &[i16]) {
	assert_eq!(out.len(), (samples.len() + 1) / 2, "adpcm encode: wrong output size");
	for (o, pair) in out.iter_mut().zip(samples.chunks(2)) {
	    let lo = self.encode_nibble(pair[0]);
	    let hi = if pair.len() > 1 { self.encode_nibble(pair[1]) } else { 0 };
	    *o = lo | (hi << 4);
	}
    }

    /// Decodes two samples per byte, low nibble first; `out` must hold `2 * data.len()` samples
    pub fn decode(&mut self, out : &mut [i16], data : &[u8]) {
	assert_eq!(out.len(), 2 * data.len(), "adpcm decode: wrong output size");
	for (pair, byte) in out.chunks_mut(2).zip(data) {
	    pair[0] = self.decode_nibble(byte & 0x0f);
	    pair[1] = self.decode_nibble(byte >> 4);
	}
    }
}

#[cfg(test)]
pub(crate) fn test_signal(len : usize) -> Vec<i16> {
    return (0..len).map(|n| {
	let t = n as f64 / 8000.0;
	(6000.0 * (2.0 * std::f64::consts::PI * 300.0 * t).sin()
	 + 2000.0 * (2.0 * std::f64::consts::PI * 1100.0 * t).sin()) as i16
    }).collect();
}

#[cfg(test)]
pub(crate) fn rms(v : impl Iterator<Item = i32>) -> f64 {
    let (mut sum, mut n) = (0.0, 0);
    for x in v {
	sum += x as f64 * x as f64;
	n += 1;
    }
    return (sum / n as f64).sqrt();
}

#[cfg(test)]
#[test]
fn test_nibble_steps() {
    let mut s = AdpcmState::default();
    // diff 100 at step 7: all three magnitude bits, index +8
    assert_eq!(7, s.encode_nibble(100));
    assert_eq!(AdpcmState::new(8, 7 + 3 + 1), s);

    let mut d = AdpcmState::default();
    assert_eq!(11, d.decode_nibble(7));
    assert_eq!(s, d);
    // sign bit alone at step 16: subtract 16 / 8, index -1
    assert_eq!(9, d.decode_nibble(8));
    assert_eq!(7, d.step_index);
}

#[cfg(test)]
#[test]
fn test_state_clamps() {
    let mut s = AdpcmState::new(200, i16::MAX);
    assert_eq!(MAX_STEP_INDEX, s.step_index);
    s.decode_nibble(7);
    assert_eq!(i16::MAX, s.predicted);
    assert_eq!(MAX_STEP_INDEX, s.step_index);
    let mut z = AdpcmState::default();
    z.decode_nibble(0);
    assert_eq!(0, z.step_index);
}

#[cfg(test)]
#[test]
fn test_round_trip_tracks_signal() {
    let signal = test_signal(2000);
    let mut enc = AdpcmState::default();
    let mut bytes = vec![0u8; 1000];
    enc.encode(&mut bytes, &signal);
    let mut dec = AdpcmState::default();
    let mut decoded = vec![0i16; 2000];
    dec.decode(&mut decoded, &bytes);
    assert_eq!(enc, dec);
    // after the step size has adapted, the error stays well below the signal level
    let signal_rms = rms(signal[100..].iter().map(|x| *x as i32));
    let error_rms = rms(signal[100..].iter().zip(&decoded[100..]).map(|(a, b)| *a as i32 - *b as i32));
    assert!(error_rms < 0.15 * signal_rms, "error {error_rms}, signal {signal_rms}");
}

#[cfg(test)]
#[test]
fn test_odd_length_encode() {
    let mut s = AdpcmState::default();
    let mut out = [0xffu8; 2];
    s.encode(&mut out, &[100, 200, 300]);
    assert_eq!(0, out[1] >> 4);
}
