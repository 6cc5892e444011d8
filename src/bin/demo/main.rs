// Copyright (C) 2022 Christoph Reichenbach (creichen@gmail.com)
// Licenced under the GNU General Public Licence, v3.  Please refer to the file "COPYING" for details.

use cli::{Command, FilterKind, Waveform};
#[allow(unused)]
use log::{Level, log_enabled, trace, debug, info, warn, error};

use std::{fs, path::Path};

use rubato::{Resampler as _, SincFixedIn, SincInterpolationType, SincInterpolationParameters, WindowFunction};
use rustfft::FftPlanner;

use qdsp::{Q, Dsp16, Dsp32, Complex, DspError, Result};
use qdsp::dsp::{adpcm, filters, generation, transforms, vectors};
use qdsp::dsp::operators::Rng;
use qdsp::dsp::qformat::{q16, q32};
use qdsp::dsp::resampling::{Resampler, Coefficients};
use qdsp::dsp::mfcc::{self, Mfcc, MfccConfig, Deltas};

use clap::Parser;
use wavio::Pcm;
mod cli;
mod shell;
mod wavio;

fn rms(v : &[f64]) -> f64 {
    if v.is_empty() {
	return 0.0;
    }
    return (v.iter().map(|x| x * x).sum::<f64>() / v.len() as f64).sqrt();
}

fn check_frequency(f : u32, fs : u32) -> Result<()> {
    if fs == 0 || 2 * f as u64 > fs as u64 {
	return Err(DspError::config(format!("{f} Hz cannot be represented at {fs} Hz")));
    }
    return Ok(());
}

/// First channel only, warning if there are more
fn mono(pcm : &Pcm) -> Vec<Dsp16> {
    if pcm.channels > 1 {
	warn!("Using the first of {} channels", pcm.channels);
    }
    return pcm.samples.iter().step_by(pcm.channels as usize).copied().collect();
}

// ================================================================================
// Signals and filters

fn gen(output : &Path, fs : u32, waveform : Waveform, f : u32, amplitude : f64, duration_ms : u32) -> Result<()> {
    check_frequency(f, fs)?;
    let len = (fs as u64 * duration_ms as u64 / 1000) as usize;
    let amp = q16(amplitude);
    let mut v = vec![0 as Dsp16; len];
    match waveform {
	Waveform::Sine   => { generation::sin(&mut v, f, fs, 0); },
	Waveform::Cosine => { generation::cos(&mut v, f, fs, 0); },
	Waveform::Square => generation::sqr(&mut v, f, fs, 0),
	Waveform::Saw    => { generation::saw(&mut v, f, fs, Dsp16::MAX, 0); },
	Waveform::Comb   => generation::dcomb(&mut v, f, fs, 0),
	Waveform::Noise  => generation::noise(&mut v, Dsp16::MAX, &mut Rng::default()),
    }
    let shaped = v.clone();
    vectors::realmul(&mut v, &shaped, amp);
    return Pcm::mono(fs, v).write(output);
}

fn filter(input : &Path, output : &Path, cutoff : u32, kind : FilterKind, taps : usize) -> Result<()> {
    let pcm = Pcm::read(input)?;
    check_frequency(cutoff, pcm.sample_rate)?;
    let mut channels = pcm.channel_data();
    match kind {
	FilterKind::Fir => {
	    if taps == 0 {
		return Err(DspError::config("FIR filter needs at least one tap"));
	    }
	    let mut h = vec![0 as Dsp16; taps];
	    filters::lpfirdesign_windowed_sinc(&mut h, cutoff, pcm.sample_rate)?;
	    info!("FIR low-pass at {cutoff} Hz with {taps} taps");
	    for x in channels.iter_mut().filter(|x| !x.is_empty()) {
		// zero history so that the output keeps the input length
		let mut ext = vec![0 as Dsp16; taps - 1];
		ext.extend_from_slice(x);
		filters::fir(x, &ext, &h);
	    }
	},
	FilterKind::Iir => {
	    // y[n] = a x[n] + (1 - a) y[n-1]
	    let a = 1.0 - (-2.0 * std::f64::consts::PI * cutoff as f64 / pcm.sample_rate as f64).exp();
	    info!("First-order IIR low-pass at {cutoff} Hz, a = {a:.5}");
	    for x in channels.iter_mut() {
		let mut iir = filters::Iir::new(&[q16(a)], &[q16(a - 1.0)], 0, 0)?;
		let input = x.clone();
		iir.process(x, &input);
	    }
	},
    }
    return Pcm::from_channels(pcm.sample_rate, &channels).write(output);
}

fn fft(input : Option<&Path>, fs : u32, f : u32, nlog : u32, reference : bool) -> Result<()> {
    let n = transforms::check_nlog(nlog)?;
    let (fs, mut signal) = match input {
	Some(path) => {
	    let pcm = Pcm::read(path)?;
	    (pcm.sample_rate, mono(&pcm))
	},
	None => {
	    check_frequency(f, fs)?;
	    let mut v = vec![0 as Dsp16; n];
	    generation::sin(&mut v, f, fs, 0);
	    (fs, v)
	},
    };
    signal.resize(n, 0);

    let mut spectrum = vec![Complex::<Dsp16>::default(); n];
    transforms::real_complex_fft(&mut spectrum, &signal, nlog)?;
    let mut magnitude = vec![0 as Dsp16; n];
    vectors::complex_abs(&mut magnitude, &spectrum);

    let float_magnitude : Option<Vec<f64>> = if reference {
	let mut buf : Vec<Complex<f64>> = signal.iter().map(|x| Complex::new(x.to_f64(), 0.0)).collect();
	FftPlanner::<f64>::new().plan_fft_forward(n).process(&mut buf);
	Some(buf.iter().map(|c| c.norm() / n as f64).collect())
    } else {
	None
    };

    println!("{:>6} {:>10} {:>10}", "bin", "Hz", "|X|");
    for k in 0..=n / 2 {
	let hz = k as f64 * fs as f64 / n as f64;
	match &float_magnitude {
	    Some(fm) => println!("{k:6} {hz:10.1} {:10.6} {:10.6}", magnitude[k].to_f64(), fm[k]),
	    None     => println!("{k:6} {hz:10.1} {:10.6}", magnitude[k].to_f64()),
	}
    }
    if let Some(fm) = float_magnitude {
	let diff : Vec<f64> = (0..n).map(|k| magnitude[k].to_f64() - fm[k]).collect();
	let max_diff = diff.iter().fold(0.0f64, |a, d| a.max(d.abs()));
	println!("max deviation from floating point: {max_diff:.6}, rms {:.6}", rms(&diff));
    }
    return Ok(());
}

// ================================================================================
// Resampling

fn rubato_reference(x : &[f64], fs_in : u32, fs_out : u32) -> Result<Vec<f64>> {
    let params = SincInterpolationParameters {
	sinc_len: 256,
	f_cutoff: 0.95,
	interpolation: SincInterpolationType::Linear,
	oversampling_factor: 128,
	window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler = SincFixedIn::<f64>::new(fs_out as f64 / fs_in as f64, 1.0, params, x.len(), 1)
	.map_err(|e| DspError::config(format!("rubato: {e}")))?;
    let waves_in = vec![x.to_vec()];
    let mut waves_out = resampler.process(&waves_in, None)
	.map_err(|e| DspError::config(format!("rubato: {e}")))?;
    return Ok(waves_out.swap_remove(0));
}

fn resample(input : &Path, output : &Path, fs_out : u32, order : usize, block : usize, reference : bool) -> Result<()> {
    let pcm = Pcm::read(input)?;
    let channels = pcm.channel_data();
    let nch = channels.len();
    let mut resampler = Resampler::new(pcm.sample_rate, fs_out, block, order, nch, Coefficients::default())?;

    let mut out : Vec<Vec<Dsp16>> = vec![vec![]; nch];
    let mut buf = vec![0 as Dsp16; resampler.output_max_buffer_size()];
    let mut chunk = vec![0 as Dsp16; block];
    for start in (0..pcm.frames()).step_by(block) {
	for (ch, x) in channels.iter().enumerate() {
	    let end = usize::min(start + block, x.len());
	    chunk.fill(0);
	    chunk[..end - start].copy_from_slice(&x[start..end]);
	    let size = resampler.compute(&mut buf, &chunk, ch);
	    out[ch].extend_from_slice(&buf[..size]);
	}
    }
    info!("Resampled {} frames at {} Hz to {} frames at {} Hz",
	  pcm.frames(), pcm.sample_rate, out[0].len(), fs_out);

    if reference {
	let x : Vec<f64> = channels[0].iter().map(|s| s.to_f64()).collect();
	let float_out = rubato_reference(&x, pcm.sample_rate, fs_out)?;
	let ours : Vec<f64> = out[0].iter().map(|s| s.to_f64()).collect();
	println!("fixed point: {} samples, rms {:.6}", ours.len(), rms(&ours));
	println!("rubato:      {} samples, rms {:.6}", float_out.len(), rms(&float_out));
    }
    return Pcm::from_channels(fs_out, &out).write(output);
}

// ================================================================================
// Adaptive filters

const UNKNOWN_SYSTEM : [f64; 8] = [0.3, -0.2, 0.1, 0.05, -0.05, 0.02, 0.01, -0.01];

fn lms(taps : usize, iterations : usize, seed : u32) -> Result<()> {
    if taps == 0 || taps > UNKNOWN_SYSTEM.len() {
	return Err(DspError::config(format!("taps must be in 1..={}", UNKNOWN_SYSTEM.len())));
    }
    let h = &UNKNOWN_SYSTEM[..taps];
    let mut rng = Rng::new(seed);
    let mut lms = filters::Lms::<Dsp32>::new(taps);
    let mut nlms = filters::Nlms::<Dsp16>::new(taps);
    let mut history = vec![0.0; taps];
    let (mut lms_err, mut nlms_err) = (vec![], vec![]);

    for _ in 0..iterations {
	let x = rng.rand::<Dsp16>() / 2;
	history.rotate_right(1);
	history[0] = x.to_f64();
	let d : f64 = history.iter().zip(h).map(|(x, h)| x * h).sum();
	let (_, e) = lms.step(q32(x.to_f64()), q32(d));
	lms_err.push(e.to_f64());
	let (_, e) = nlms.step(x, q16(d));
	nlms_err.push(e.to_f64());
    }

    let tail = usize::min(iterations, 500);
    println!("{:>4} {:>10} {:>10} {:>10}", "tap", "system", "LMS", "NLMS");
    for k in 0..taps {
	println!("{k:4} {:10.5} {:10.5} {:10.5}", h[k], lms.weights()[k].to_f64(), nlms.weights()[k].to_f64());
    }
    println!("error rms over the last {tail} steps: LMS {:.6}, NLMS {:.6}",
	     rms(&lms_err[iterations - tail..]), rms(&nlms_err[iterations - tail..]));
    return Ok(());
}

// ================================================================================
// ADPCM

fn adpcm_encode(input : &Path, output : &Path) -> Result<()> {
    let pcm = Pcm::read(input)?;
    let samples = mono(&pcm);
    let data = adpcm::PacketEncoder::new().encode_stream(&samples);
    fs::write(output, &data)?;
    info!("Encoded {} samples into {} packets", samples.len(), data.len() / adpcm::PACKET_SIZE);
    return Ok(());
}

fn adpcm_decode(input : &Path, output : &Path, fs : u32) -> Result<()> {
    let data = fs::read(input)?;
    let samples = adpcm::PacketDecoder::new().decode_stream(&data)?;
    return Pcm::mono(fs, samples).write(output);
}

fn adpcm_wav(input : &Path, output : &Path) -> Result<()> {
    let mut file = fs::File::open(input)?;
    let wav = adpcm::read_dvi_wav(&mut file)?;
    let pcm = Pcm { sample_rate : wav.sample_rate, channels : wav.channels, samples : wav.samples };
    return pcm.write(output);
}

// ================================================================================
// MFCC

fn print_row(label : &str, v : &[i32]) {
    let row : Vec<String> = v.iter().map(|c| format!("{:8.3}", mfcc::coefficient_to_f64(*c))).collect();
    println!("{label:>8} {}", row.join(" "));
}

fn mfcc(input : &Path, nb_filters : usize, nb_coefficients : usize, deltas : bool) -> Result<()> {
    let pcm = Pcm::read(input)?;
    let config = MfccConfig {
	sample_rate : pcm.sample_rate,
	nb_filters,
	nb_coefficients,
	..MfccConfig::default()
    };
    let mut mfcc = Mfcc::new(config)?;
    let frames = mfcc.process(&mono(&pcm))?;
    let mut d = Deltas::new();
    for (i, c) in frames.iter().enumerate() {
	print_row(&format!("{i}"), c);
	if deltas {
	    if let Some((delta, delta2)) = d.push(c) {
		print_row("d", &delta);
		print_row("dd", &delta2);
	    }
	}
    }
    return Ok(());
}

// ================================================================================

fn main() {
    env_logger::init();
    let cli = cli::Cli::parse();
    let command = match cli.command {
	None    => Command::Shell,
	Some(c) => c,
    };

    let result = match command {
	Command::Gen { output, waveform, frequency, amplitude, duration } =>
	    gen(&output, cli.rate, waveform, frequency, amplitude, duration),
	Command::Filter { input, output, cutoff, kind, taps } =>
	    filter(&input, &output, cutoff, kind, taps),
	Command::Fft { input, frequency, nlog, reference } =>
	    fft(input.as_deref(), cli.rate, frequency, nlog, reference),
	Command::Resample { input, output, to, order, block, reference } =>
	    resample(&input, &output, to, order, block, reference),
	Command::Lms { taps, iterations, seed } => lms(taps, iterations, seed),
	Command::AdpcmEncode { input, output } => adpcm_encode(&input, &output),
	Command::AdpcmDecode { input, output, rate } => adpcm_decode(&input, &output, rate),
	Command::AdpcmWav { input, output } => adpcm_wav(&input, &output),
	Command::Mfcc { input, filters, coefficients, deltas } => mfcc(&input, filters, coefficients, deltas),
	Command::Shell => shell::shell(),
    };

    if let Err(e) = result {
	error!("{e}");
	eprintln!("qdsp-demo: {e}");
	std::process::exit(1);
    }
}

#[cfg(test)]
fn scratch_path(name : &str) -> std::path::PathBuf {
    return std::env::temp_dir().join(format!("qdsp-demo-{}-{name}", std::process::id()));
}

#[cfg(test)]
#[test]
fn test_fft_rejects_sizes_before_allocating() {
    for nlog in [3, 40, 64] {
	assert!(matches!(fft(None, 8000, 1000, nlog, false), Err(DspError::FftSize { .. })), "nlog {nlog}");
    }
}

#[cfg(test)]
#[test]
fn test_filter_empty_file() {
    let input = scratch_path("empty-in.wav");
    let output = scratch_path("empty-out.wav");
    Pcm::from_channels(8000, &[vec![], vec![]]).write(&input).unwrap();
    for kind in [FilterKind::Fir, FilterKind::Iir] {
	filter(&input, &output, 1000, kind, 31).unwrap();
	let pcm = Pcm::read(&output).unwrap();
	assert_eq!((8000, 2, 0), (pcm.sample_rate, pcm.channels, pcm.frames()));
    }
    fs::remove_file(&input).unwrap();
    fs::remove_file(&output).unwrap();
}

#[cfg(test)]
#[test]
fn test_filter_keeps_length() {
    let input = scratch_path("tone-in.wav");
    let output = scratch_path("tone-out.wav");
    let mut v = vec![0 as Dsp16; 500];
    generation::sin(&mut v, 200, 8000, 0);
    Pcm::mono(8000, v).write(&input).unwrap();
    filter(&input, &output, 1000, FilterKind::Fir, 31).unwrap();
    assert_eq!(500, Pcm::read(&output).unwrap().frames());
    fs::remove_file(&input).unwrap();
    fs::remove_file(&output).unwrap();
}
