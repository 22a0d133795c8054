//! Feedback beeps through the default audio output.
//!
//! The engine owns a cpal output stream whose callback mixes a handful of
//! short voices. Beeps are sent to it over a channel and never block the
//! caller. If no output device is available the engine stays silent.

use std::sync::mpsc;

use anyhow::{Context, anyhow};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::host::Cue;

/// Envelope floor; exponential ramps cannot start or end at zero.
const FLOOR: f64 = 0.0001;
const ATTACK_SECS: f64 = 0.01;
/// Voice keeps sounding this long after its nominal duration.
const TAIL_SECS: f64 = 0.02;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Triangle,
    Square,
    Sawtooth,
}

impl Waveform {
    /// One cycle, `phase` in `[0, 1)`.
    pub fn sample(self, phase: f64) -> f64 {
        match self {
            Waveform::Sine => (phase * std::f64::consts::TAU).sin(),
            Waveform::Triangle => 1.0 - 4.0 * (phase - 0.5).abs(),
            Waveform::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Sawtooth => 2.0 * phase - 1.0,
        }
    }
}

/// A single short tone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Beep {
    pub freq: f64,
    pub duration_secs: f64,
    pub waveform: Waveform,
    pub gain: f64,
    /// Start this long after the beep is queued.
    pub delay_secs: f64,
}

impl Beep {
    const fn new(freq: f64, duration_secs: f64, waveform: Waveform, gain: f64) -> Self {
        Self {
            freq,
            duration_secs,
            waveform,
            gain,
            delay_secs: 0.0,
        }
    }

    /// Level at `t` seconds into the beep: a 10 ms exponential rise to
    /// `gain`, then an exponential fall back to the floor at `duration_secs`.
    pub fn envelope(&self, t: f64) -> f64 {
        let ramp = |from: f64, to: f64, frac: f64| from * (to / from).powf(frac.clamp(0.0, 1.0));
        if t < 0.0 || t > self.duration_secs + TAIL_SECS {
            0.0
        } else if t < ATTACK_SECS {
            ramp(FLOOR, self.gain, t / ATTACK_SECS)
        } else if t < self.duration_secs {
            ramp(self.gain, FLOOR, (t - ATTACK_SECS) / (self.duration_secs - ATTACK_SECS))
        } else {
            FLOOR
        }
    }
}

/// The beeps that make up each cue.
pub fn cue_beeps(cue: Cue) -> Vec<Beep> {
    match cue {
        Cue::Correct => vec![
            Beep::new(660.0, 0.10, Waveform::Sine, 0.07),
            Beep {
                delay_secs: 0.07,
                ..Beep::new(990.0, 0.08, Waveform::Triangle, 0.06)
            },
        ],
        Cue::Wrong => vec![Beep::new(170.0, 0.16, Waveform::Sawtooth, 0.06)],
        Cue::Tick => vec![Beep::new(1200.0, 0.03, Waveform::Square, 0.03)],
    }
}

/// A beep being rendered, counted in samples.
struct Voice {
    beep: Beep,
    sample_rate: f64,
    /// Samples since the beep was queued (including the delay).
    elapsed: usize,
    phase: f64,
}

impl Voice {
    fn new(beep: Beep, sample_rate: f64) -> Self {
        Self {
            beep,
            sample_rate,
            elapsed: 0,
            phase: 0.0,
        }
    }

    fn finished(&self) -> bool {
        let t = self.elapsed as f64 / self.sample_rate - self.beep.delay_secs;
        t > self.beep.duration_secs + TAIL_SECS
    }

    fn next_sample(&mut self) -> f64 {
        let t = self.elapsed as f64 / self.sample_rate - self.beep.delay_secs;
        self.elapsed += 1;
        if t < 0.0 {
            return 0.0;
        }
        let value = self.beep.waveform.sample(self.phase) * self.beep.envelope(t);
        self.phase = (self.phase + self.beep.freq / self.sample_rate).fract();
        value
    }
}

enum AudioCommand {
    Play(Beep),
    Shutdown,
}

/// Handle to the audio thread. Dropping it stops the stream.
pub struct AudioEngine {
    tx: Option<mpsc::Sender<AudioCommand>>,
    _stream: Option<cpal::Stream>,
}

impl AudioEngine {
    /// Open the default output device.
    pub fn new() -> anyhow::Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| anyhow!("no output audio device available"))?;

        let config = device
            .default_output_config()
            .context("failed to get default output config")?;

        let sample_rate = config.sample_rate() as f64;
        let channels = config.channels().max(1) as usize;

        let (tx, rx) = mpsc::channel::<AudioCommand>();
        let mut voices: Vec<Voice> = Vec::new();

        let stream = device
            .build_output_stream(
                &config.into(),
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    while let Ok(cmd) = rx.try_recv() {
                        match cmd {
                            AudioCommand::Play(beep) => voices.push(Voice::new(beep, sample_rate)),
                            AudioCommand::Shutdown => voices.clear(),
                        }
                    }

                    for frame in data.chunks_mut(channels) {
                        let mixed: f64 = voices.iter_mut().map(Voice::next_sample).sum();
                        let value = mixed.clamp(-1.0, 1.0) as f32;
                        for sample in frame.iter_mut() {
                            *sample = value;
                        }
                    }
                    voices.retain(|v| !v.finished());
                },
                move |err| {
                    tracing::warn!("audio stream error: {}", err);
                },
                None,
            )
            .context("failed to build output stream")?;

        stream.play().context("failed to play stream")?;
        tracing::debug!(sample_rate, channels, "audio output open");

        Ok(Self {
            tx: Some(tx),
            _stream: Some(stream),
        })
    }

    /// An engine that discards everything.
    pub fn silent() -> Self {
        Self {
            tx: None,
            _stream: None,
        }
    }

    /// Open the default device, or fall back to silence with a warning.
    pub fn open_or_silent() -> Self {
        match Self::new() {
            Ok(engine) => engine,
            Err(e) => {
                tracing::warn!("audio unavailable, playing silently: {:#}", e);
                Self::silent()
            }
        }
    }

    pub fn play_cue(&self, cue: Cue) {
        let Some(tx) = &self.tx else {
            return;
        };
        for beep in cue_beeps(cue) {
            if tx.send(AudioCommand::Play(beep)).is_err() {
                tracing::debug!("audio thread disconnected");
                return;
            }
        }
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(AudioCommand::Shutdown);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: f64 = 48_000.0;

    fn render(beep: Beep) -> Vec<f64> {
        let mut voice = Voice::new(beep, RATE);
        let mut out = Vec::new();
        while !voice.finished() {
            out.push(voice.next_sample());
        }
        out
    }

    #[test]
    fn test_waveform_shapes() {
        assert!((Waveform::Sine.sample(0.25) - 1.0).abs() < 1e-9);
        assert!(Waveform::Sine.sample(0.0).abs() < 1e-9);
        assert_eq!(Waveform::Square.sample(0.25), 1.0);
        assert_eq!(Waveform::Square.sample(0.75), -1.0);
        assert_eq!(Waveform::Sawtooth.sample(0.0), -1.0);
        assert_eq!(Waveform::Sawtooth.sample(0.5), 0.0);
        assert_eq!(Waveform::Triangle.sample(0.0), -1.0);
        assert_eq!(Waveform::Triangle.sample(0.5), 1.0);
    }

    #[test]
    fn test_cue_beeps() {
        let correct = cue_beeps(Cue::Correct);
        assert_eq!(correct.len(), 2);
        assert_eq!(correct[0].freq, 660.0);
        assert_eq!(correct[1].waveform, Waveform::Triangle);
        assert_eq!(correct[1].delay_secs, 0.07);

        let wrong = cue_beeps(Cue::Wrong);
        assert_eq!(wrong.len(), 1);
        assert_eq!(wrong[0].waveform, Waveform::Sawtooth);

        let tick = cue_beeps(Cue::Tick);
        assert_eq!(tick[0].freq, 1200.0);
        assert!(tick[0].gain < wrong[0].gain);
    }

    #[test]
    fn test_envelope_peaks_at_gain() {
        let beep = Beep::new(440.0, 0.12, Waveform::Sine, 0.08);
        assert!((beep.envelope(0.0) - FLOOR).abs() < 1e-12);
        assert!((beep.envelope(ATTACK_SECS) - 0.08).abs() < 1e-9);
        assert!(beep.envelope(0.06) < 0.08);
        assert!(beep.envelope(0.06) > beep.envelope(0.1));
        assert_eq!(beep.envelope(0.2), 0.0);
        assert_eq!(beep.envelope(-0.01), 0.0);
    }

    #[test]
    fn test_voice_respects_delay_and_gain() {
        let beep = Beep {
            delay_secs: 0.05,
            ..Beep::new(990.0, 0.08, Waveform::Triangle, 0.06)
        };
        let samples = render(beep);
        let delay = (0.05 * RATE) as usize;
        assert!(samples[..delay].iter().all(|s| *s == 0.0));
        assert!(samples[delay..].iter().any(|s| *s != 0.0));
        assert!(samples.iter().all(|s| s.abs() <= 0.06 + 1e-9));
        let expected = ((0.05 + 0.08 + TAIL_SECS) * RATE) as usize;
        assert!(samples.len().abs_diff(expected) <= 2);
    }

    #[test]
    fn test_silent_engine_accepts_cues() {
        let engine = AudioEngine::silent();
        engine.play_cue(Cue::Correct);
        engine.play_cue(Cue::Tick);
    }
}
