// Copyright (C) 2022 Christoph Reichenbach (creichen@gmail.com)
// Licenced under the GNU General Public Licence, v3.  Please refer to the file "COPYING" for details.

// Fixed-size ADPCM packets for streaming:
//
//   bytes 0..2    predicted value at packet start (i16, little endian)
//   byte  2       step index at packet start
//   byte  3       0
//   bytes 4..256  504 samples, two per byte, low nibble first
//
// Every packet carries the codec state it starts from, so a receiver can join mid-stream.

use crate::dsp::adpcm::{AdpcmState, MAX_STEP_INDEX};
use crate::error::{DspError, Result};

pub const PACKET_SIZE : usize = 256;
pub const PACKET_HEADER_SIZE : usize = 4;
pub const PACKET_DATA_SIZE : usize = PACKET_SIZE - PACKET_HEADER_SIZE;
pub const SAMPLES_PER_PACKET : usize = 2 * PACKET_DATA_SIZE;

#[derive(Clone, Debug, Default)]
pub struct PacketEncoder {
    state : AdpcmState,
}

impl PacketEncoder {
    pub fn new() -> PacketEncoder {
	return PacketEncoder::default();
    }

    pub fn state(&self) -> AdpcmState {
	return self.state;
    }

    /// Encodes exactly `SAMPLES_PER_PACKET` samples
    pub fn encode_packet(&mut self, samples : &[i16]) -> [u8; PACKET_SIZE] {
	assert_eq!(SAMPLES_PER_PACKET, samples.len(), "ADPCM packet needs {SAMPLES_PER_PACKET} samples");
	let mut packet = [0u8; PACKET_SIZE];
	packet[0..2].copy_from_slice(&self.state.predicted.to_le_bytes());
	packet[2] = self.state.step_index;
	packet[3] = 0;
	self.state.encode(&mut packet[PACKET_HEADER_SIZE..], samples);
	return packet;
    }

    /// Encodes a whole signal, padding the last packet with silence
    pub fn encode_stream(&mut self, samples : &[i16]) -> Vec<u8> {
	let mut out = Vec::with_capacity((samples.len() / SAMPLES_PER_PACKET + 1) * PACKET_SIZE);
	for chunk in samples.chunks(SAMPLES_PER_PACKET) {
	    if chunk.len() == SAMPLES_PER_PACKET {
		out.extend_from_slice(&self.encode_packet(chunk));
	    } else {
		let mut padded = chunk.to_vec();
		padded.resize(SAMPLES_PER_PACKET, 0);
		out.extend_from_slice(&self.encode_packet(&padded));
	    }
	}
	return out;
    }
}

#[derive(Clone, Debug, Default)]
pub struct PacketDecoder {
    state : AdpcmState,
}

impl PacketDecoder {
    pub fn new() -> PacketDecoder {
	return PacketDecoder::default();
    }

    /// Codec state at the end of the last decoded packet
    pub fn state(&self) -> AdpcmState {
	return self.state;
    }

    pub fn decode_packet(&mut self, packet : &[u8]) -> Result<Vec<i16>> {
	if packet.len() != PACKET_SIZE {
	    return Err(DspError::Adpcm { message : format!("packet of {} bytes, expected {PACKET_SIZE}", packet.len()) });
	}
	let predicted = i16::from_le_bytes([packet[0], packet[1]]);
	let step_index = packet[2];
	if step_index > MAX_STEP_INDEX {
	    return Err(DspError::Adpcm { message : format!("step index {step_index} out of range") });
	}
	self.state = AdpcmState { step_index, predicted };
	let mut samples = vec![0; SAMPLES_PER_PACKET];
	self.state.decode(&mut samples, &packet[PACKET_HEADER_SIZE..]);
	return Ok(samples);
    }

    pub fn decode_stream(&mut self, data : &[u8]) -> Result<Vec<i16>> {
	if data.len() % PACKET_SIZE != 0 {
	    return Err(DspError::Adpcm { message : format!("stream of {} bytes is not a whole number of packets", data.len()) });
	}
	let mut out = Vec::with_capacity(data.len() / PACKET_SIZE * SAMPLES_PER_PACKET);
	for packet in data.chunks(PACKET_SIZE) {
	    out.extend(self.decode_packet(packet)?);
	}
	return Ok(out);
    }
}

#[cfg(test)]
use crate::dsp::adpcm::test_signal;

#[cfg(test)]
#[test]
fn test_packet_header() {
    let mut enc = PacketEncoder::new();
    let signal = test_signal(SAMPLES_PER_PACKET * 2);
    let first = enc.encode_packet(&signal[..SAMPLES_PER_PACKET]);
    assert_eq!([0, 0, 0, 0], first[..4]);
    let state = enc.state();
    let second = enc.encode_packet(&signal[SAMPLES_PER_PACKET..]);
    assert_eq!(state.predicted.to_le_bytes(), second[..2]);
    assert_eq!(state.step_index, second[2]);
    assert_eq!(0, second[3]);
}

#[cfg(test)]
#[test]
fn test_stream_matches_nibble_codec() {
    let signal = test_signal(1500);
    let stream = PacketEncoder::new().encode_stream(&signal);
    assert_eq!(3 * PACKET_SIZE, stream.len());

    let mut reference = AdpcmState::default();
    let mut bytes = vec![0u8; 750];
    reference.encode(&mut bytes, &signal);
    let mut expected = vec![0i16; 1500];
    AdpcmState::default().decode(&mut expected, &bytes);

    let decoded = PacketDecoder::new().decode_stream(&stream).unwrap();
    assert_eq!(3 * SAMPLES_PER_PACKET, decoded.len());
    assert_eq!(expected, decoded[..1500]);
}

#[cfg(test)]
#[test]
fn test_join_mid_stream() {
    let signal = test_signal(SAMPLES_PER_PACKET * 3);
    let stream = PacketEncoder::new().encode_stream(&signal);
    let all = PacketDecoder::new().decode_stream(&stream).unwrap();
    let tail = PacketDecoder::new().decode_stream(&stream[PACKET_SIZE..]).unwrap();
    assert_eq!(all[SAMPLES_PER_PACKET..], tail[..]);
}

#[cfg(test)]
#[test]
fn test_malformed_packets() {
    let mut dec = PacketDecoder::new();
    assert!(dec.decode_packet(&[0u8; 10]).is_err());
    let mut bad = [0u8; PACKET_SIZE];
    bad[2] = 100;
    assert!(dec.decode_packet(&bad).is_err());
    assert!(dec.decode_stream(&[0u8; PACKET_SIZE + 1]).is_err());
}
