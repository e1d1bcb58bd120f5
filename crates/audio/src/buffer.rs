//! PCM-Puffer, WAV-Dekodierung und synthetische Puffer
//!
//! Synthetische Puffer: Hall-Impulsantwort, Rausch-Ersatz fuer
//! nicht ladbare Clips und der "Snap"-Rauschstoss des Abschluss-Cues.

use std::io::Cursor;

use rand::Rng;

use crate::error::{AudioError, AudioResult};

/// Deinterleavter PCM-Puffer (f32, -1.0..1.0)
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    sample_rate: u32,
    channels: Vec<Vec<f32>>,
}

impl AudioBuffer {
    /// Alle Kanaele muessen gleich lang sein
    pub fn new(sample_rate: u32, channels: Vec<Vec<f32>>) -> AudioResult<Self> {
        if sample_rate == 0 {
            return Err(AudioError::Konfiguration("Samplerate 0".into()));
        }
        if channels.is_empty() {
            return Err(AudioError::Konfiguration("Puffer ohne Kanaele".into()));
        }
        let len = channels[0].len();
        if channels.iter().any(|c| c.len() != len) {
            return Err(AudioError::Konfiguration(
                "Kanaele unterschiedlich lang".into(),
            ));
        }
        Ok(Self {
            sample_rate,
            channels,
        })
    }

    pub fn mono(sample_rate: u32, samples: Vec<f32>) -> AudioResult<Self> {
        Self::new(sample_rate, vec![samples])
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Laenge in Frames
    pub fn len(&self) -> usize {
        self.channels[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    pub fn duration_secs(&self) -> f64 {
        self.len() as f64 / self.sample_rate as f64
    }
}

/// Dekodiert eine WAV-Datei (PCM int oder float) in einen [`AudioBuffer`]
pub fn decode_wav(bytes: &[u8]) -> AudioResult<AudioBuffer> {
    let mut reader = hound::WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();
    let channel_count = spec.channels as usize;
    if channel_count == 0 {
        return Err(AudioError::Dekodierung("WAV ohne Kanaele".into()));
    }

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
        hound::SampleFormat::Int => {
            let scale = (1_i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()?
        }
    };

    let frames = interleaved.len() / channel_count;
    let mut channels = vec![Vec::with_capacity(frames); channel_count];
    for frame in interleaved.chunks_exact(channel_count) {
        for (c, s) in frame.iter().enumerate() {
            channels[c].push(*s);
        }
    }
    AudioBuffer::new(spec.sample_rate, channels)
}

/// Mono-Rauschen, 2 s, Werte gleichverteilt in [0, 0.2)
pub fn fallback_noise<R: Rng + ?Sized>(sample_rate: u32, rng: &mut R) -> AudioResult<AudioBuffer> {
    let len = sample_rate as usize * 2;
    let samples = (0..len).map(|_| rng.gen::<f32>() * 0.2).collect();
    AudioBuffer::mono(sample_rate, samples)
}

/// Stereo-Impulsantwort: `(r*2 - 1) * (1 - i/len)^3`
pub fn reverb_impulse<R: Rng + ?Sized>(
    sample_rate: u32,
    seconds: f32,
    rng: &mut R,
) -> AudioResult<AudioBuffer> {
    let len = ((sample_rate as f32 * seconds) as usize).max(1);
    let channels = (0..2)
        .map(|_| {
            (0..len)
                .map(|i| {
                    let decay = 1.0 - i as f32 / len as f32;
                    (rng.gen::<f32>() * 2.0 - 1.0) * decay.powi(3)
                })
                .collect()
        })
        .collect();
    AudioBuffer::new(sample_rate, channels)
}

/// 50 ms Rauschstoss mit Abklingen `(1 - i/len)^4`
pub fn snap_burst<R: Rng + ?Sized>(sample_rate: u32, rng: &mut R) -> AudioResult<AudioBuffer> {
    let len = ((sample_rate as f32 * 0.05) as usize).max(1);
    let samples = (0..len)
        .map(|i| {
            let decay = 1.0 - i as f32 / len as f32;
            (rng.gen::<f32>() * 2.0 - 1.0) * decay.powi(4)
        })
        .collect();
    AudioBuffer::mono(sample_rate, samples)
}

#[cfg(test)]
pub(crate) fn wav_bytes(sample_rate: u32, channels: u16, samples: &[i16]) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut out = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut out, spec).unwrap();
        for s in samples {
            writer.write_sample(*s).unwrap();
        }
        writer.finalize().unwrap();
    }
    out.into_inner()
}
