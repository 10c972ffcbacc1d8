//! Audio output: completion alert and background keepalive stream
//!
//! Audio goes to an external raw-PCM player (`aplay` by default) fed over
//! stdin. One [`AudioContext`] is created lazily on the first user-initiated
//! start and shared by the alert and the keepalive.

use std::{
    process::Stdio,
    sync::{Arc, Mutex},
};
use tokio::{
    io::AsyncWriteExt,
    process::{Child, Command},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

pub const SAMPLE_RATE: u32 = 8000;

/// One square-wave burst
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pulse {
    pub frequency_hz: u32,
    pub duration_ms: u32,
}

/// Two short pulses then a longer one, rising in pitch
pub const ALERT_PULSES: [Pulse; 3] = [
    Pulse { frequency_hz: 660, duration_ms: 150 },
    Pulse { frequency_hz: 880, duration_ms: 150 },
    Pulse { frequency_hz: 1320, duration_ms: 450 },
];

pub const PULSE_GAP_MS: u32 = 100;

const ALERT_AMPLITUDE: i16 = 6_000;

/// Length of each block of silence written to the keepalive stream
const KEEPALIVE_CHUNK_MS: u32 = 250;

fn sample_count(duration_ms: u32) -> usize {
    (SAMPLE_RATE as u64 * duration_ms as u64 / 1000) as usize
}

pub fn square_wave(pulse: Pulse, amplitude: i16) -> Vec<i16> {
    let period = SAMPLE_RATE as f64 / pulse.frequency_hz as f64;
    (0..sample_count(pulse.duration_ms))
        .map(|i| {
            if (i as f64 % period) < period / 2.0 {
                amplitude
            } else {
                -amplitude
            }
        })
        .collect()
}

pub fn silence(duration_ms: u32) -> Vec<i16> {
    vec![0; sample_count(duration_ms)]
}

/// Render the full completion alert
pub fn render_alert() -> Vec<i16> {
    let mut samples = Vec::new();
    for (i, pulse) in ALERT_PULSES.iter().enumerate() {
        if i > 0 {
            samples.extend(silence(PULSE_GAP_MS));
        }
        samples.extend(square_wave(*pulse, ALERT_AMPLITUDE));
    }
    samples
}

pub fn to_pcm_bytes(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// Handle on the audio output device
#[derive(Debug)]
pub struct AudioContext {
    player: String,
}

impl AudioContext {
    pub fn new(player: &str) -> Self {
        Self { player: player.to_string() }
    }

    fn spawn_player(&self) -> Result<Child, String> {
        Command::new(&self.player)
            .args(["-q", "-t", "raw", "-f", "S16_LE", "-c", "1", "-r"])
            .arg(SAMPLE_RATE.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| format!("Failed to start audio player {}: {}", self.player, e))
    }

    /// Play samples to completion
    pub async fn play(&self, samples: &[i16]) -> Result<(), String> {
        let mut child = self.spawn_player()?;
        let mut stdin = child.stdin.take().ok_or("Audio player has no stdin")?;

        stdin
            .write_all(&to_pcm_bytes(samples))
            .await
            .map_err(|e| format!("Failed to write audio: {}", e))?;
        drop(stdin);

        let status = child
            .wait()
            .await
            .map_err(|e| format!("Failed to wait for audio player: {}", e))?;
        if !status.success() {
            return Err(format!("Audio player exited with {}", status));
        }
        Ok(())
    }
}

/// A running stream of zero-amplitude samples. Stops when dropped.
#[derive(Debug)]
pub struct Keepalive {
    child: Child,
    pump: JoinHandle<()>,
}

impl Keepalive {
    pub fn start(context: &AudioContext) -> Result<Self, String> {
        let mut child = context.spawn_player()?;
        let mut stdin = child.stdin.take().ok_or("Audio player has no stdin")?;
        let chunk = to_pcm_bytes(&silence(KEEPALIVE_CHUNK_MS));

        // The player drains stdin in real time, so this loop is paced by playback
        let pump = tokio::spawn(async move {
            while stdin.write_all(&chunk).await.is_ok() {}
            debug!("Keepalive stream closed");
        });

        Ok(Self { child, pump })
    }
}

impl Drop for Keepalive {
    fn drop(&mut self) {
        self.pump.abort();
        if let Err(e) = self.child.start_kill() {
            debug!("Keepalive player already gone: {}", e);
        }
    }
}

/// Shared audio output used by both the alert and the keepalive
#[derive(Debug)]
pub struct AudioOutput {
    player: String,
    context: Mutex<Option<Arc<AudioContext>>>,
    keepalive: Mutex<Option<Keepalive>>,
}

impl AudioOutput {
    pub fn new(player: &str) -> Self {
        Self {
            player: player.to_string(),
            context: Mutex::new(None),
            keepalive: Mutex::new(None),
        }
    }

    fn context(&self) -> Option<Arc<AudioContext>> {
        self.context.lock().ok().and_then(|ctx| ctx.clone())
    }

    pub fn is_active(&self) -> bool {
        self.context().is_some()
    }

    pub fn is_keepalive_running(&self) -> bool {
        self.keepalive.lock().map(|k| k.is_some()).unwrap_or(false)
    }

    /// Create the shared context on first use
    pub fn prepare(&self) {
        let Ok(mut context) = self.context.lock() else {
            warn!("Audio context lock poisoned");
            return;
        };
        if context.is_none() {
            info!("Opening audio output via {}", self.player);
            *context = Some(Arc::new(AudioContext::new(&self.player)));
        }
    }

    pub fn play_alert(&self) {
        let Some(context) = self.context() else {
            debug!("Audio output not active, skipping alert");
            return;
        };
        tokio::spawn(async move {
            if let Err(e) = context.play(&render_alert()).await {
                warn!("Alert tone failed: {}", e);
            }
        });
    }

    pub fn start_keepalive(&self) {
        let Some(context) = self.context() else {
            debug!("Audio output not active, skipping keepalive");
            return;
        };
        let Ok(mut keepalive) = self.keepalive.lock() else {
            warn!("Keepalive lock poisoned");
            return;
        };
        if keepalive.is_some() {
            return;
        }
        match Keepalive::start(&context) {
            Ok(stream) => {
                debug!("Keepalive stream started");
                *keepalive = Some(stream);
            }
            Err(e) => warn!("Keepalive stream failed: {}", e),
        }
    }

    pub fn stop_keepalive(&self) {
        if let Ok(mut keepalive) = self.keepalive.lock() {
            if keepalive.take().is_some() {
                debug!("Keepalive stream stopped");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign_changes(samples: &[i16]) -> usize {
        samples.windows(2).filter(|w| (w[0] > 0) != (w[1] > 0)).count()
    }

    #[test]
    fn alert_has_three_rising_pulses() {
        let samples = render_alert();
        let expected_ms: u32 =
            ALERT_PULSES.iter().map(|p| p.duration_ms).sum::<u32>() + 2 * PULSE_GAP_MS;
        assert_eq!(samples.len(), sample_count(expected_ms));

        let rates: Vec<f64> = ALERT_PULSES
            .iter()
            .map(|p| {
                let wave = square_wave(*p, ALERT_AMPLITUDE);
                sign_changes(&wave) as f64 / p.duration_ms as f64
            })
            .collect();
        assert!(rates[0] < rates[1] && rates[1] < rates[2]);
        assert!(ALERT_PULSES[2].duration_ms > ALERT_PULSES[0].duration_ms);
    }

    #[test]
    fn alert_is_audible() {
        assert!(render_alert().iter().any(|s| s.unsigned_abs() == ALERT_AMPLITUDE as u16));
    }

    #[test]
    fn keepalive_chunk_is_silent() {
        let chunk = silence(KEEPALIVE_CHUNK_MS);
        assert_eq!(chunk.len(), 2000);
        assert!(to_pcm_bytes(&chunk).iter().all(|b| *b == 0));
    }

    #[test]
    fn pcm_is_little_endian() {
        assert_eq!(to_pcm_bytes(&[1, -2]), vec![0x01, 0x00, 0xfe, 0xff]);
    }

    #[test]
    fn nothing_plays_before_prepare() {
        let output = AudioOutput::new("aplay");
        assert!(!output.is_active());
        output.play_alert();
        output.start_keepalive();
        assert!(!output.is_keepalive_running());
    }

    #[tokio::test]
    async fn missing_player_is_tolerated() {
        let output = AudioOutput::new("/nonexistent/surge-timer-player");
        output.prepare();
        assert!(output.is_active());

        output.start_keepalive();
        assert!(!output.is_keepalive_running());
        output.stop_keepalive();
    }
}
