//! Encoder-side choice of codec mode (SILK/CELT/Hybrid) and bandwidth, with
//! hysteresis so the encoder doesn't flap between modes frame-to-frame.

use crate::{Application, Bandwidth, CodecMode, SignalHint};

/// Number of consecutive frames a candidate mode must win before the
/// controller actually switches, damping single-frame noise in the signal
/// classifier.
const HYSTERESIS_FRAMES: u8 = 3;

/// Tracks the encoder's current mode/bandwidth decision plus the state
/// needed to apply hysteresis and drive mode-transition glue (CELT
/// redundancy frames, the hybrid-to-SILK 2.5 ms null frame).
#[derive(Clone, Debug)]
pub(crate) struct ModeController {
    application: Application,
    current_mode: CodecMode,
    current_bandwidth: Bandwidth,
    candidate_mode: Option<CodecMode>,
    candidate_streak: u8,
}

impl ModeController {
    /// Creates a controller for the given application profile, starting in
    /// the mode that profile favors.
    pub(crate) fn new(application: Application) -> Self {
        let current_mode = match application {
            Application::Voip => CodecMode::Silk,
            Application::Audio => CodecMode::Celt,
            Application::LowDelay => CodecMode::Celt,
        };
        Self {
            application,
            current_mode,
            current_bandwidth: Bandwidth::Auto,
            candidate_mode: None,
            candidate_streak: 0,
        }
    }

    /// Returns the current committed mode (post-hysteresis).
    pub(crate) fn mode(&self) -> CodecMode {
        self.current_mode
    }

    /// Returns the current committed bandwidth.
    pub(crate) fn bandwidth(&self) -> Bandwidth {
        self.current_bandwidth
    }

    /// Picks the mode per spec's bitrate-driven thresholds:
    /// `LowDelay` always forces CELT; below ~17 kbps mono this is SILK
    /// NB/MB/WB; between 17-40 kbps a speech hint prefers SILK/Hybrid and a
    /// music hint prefers CELT; above ~40 kbps stereo this is CELT. Within
    /// the 17-40 kbps band with no signal hint, the existing per-bandwidth
    /// split is used as a tie-breaker.
    fn mode_for_signal(&self, signal: SignalHint, bandwidth: Bandwidth, bitrate: i32, channels: u8) -> CodecMode {
        if self.application == Application::LowDelay {
            return CodecMode::Celt;
        }

        let stereo = channels > 1;
        let low_delay_threshold = 17_000;
        let high_threshold = 40_000;

        if bitrate < low_delay_threshold && !stereo {
            return CodecMode::Silk;
        }
        if bitrate > high_threshold && stereo {
            return CodecMode::Celt;
        }

        if bitrate >= low_delay_threshold && bitrate <= high_threshold {
            return match signal {
                SignalHint::Music => CodecMode::Celt,
                SignalHint::Voice => {
                    if bandwidth == Bandwidth::Fullband || bandwidth == Bandwidth::Superwideband {
                        CodecMode::Hybrid
                    } else {
                        CodecMode::Silk
                    }
                }
                SignalHint::Auto => match self.application {
                    Application::Voip => CodecMode::Silk,
                    Application::Audio | Application::LowDelay => CodecMode::Celt,
                },
            };
        }

        match signal {
            SignalHint::Music => CodecMode::Celt,
            SignalHint::Voice => {
                if bandwidth == Bandwidth::Fullband || bandwidth == Bandwidth::Superwideband {
                    CodecMode::Hybrid
                } else {
                    CodecMode::Silk
                }
            }
            SignalHint::Auto => match self.application {
                Application::Voip => CodecMode::Silk,
                Application::Audio | Application::LowDelay => CodecMode::Celt,
            },
        }
    }

    /// Feeds one frame's signal classification (bandwidth request, a voice
    /// vs. music hint, e.g. from spectral flatness, target `bitrate` in
    /// bits per second, and `channels`) into the controller, returning the
    /// mode that frame should actually be coded with. The return value only
    /// changes after `HYSTERESIS_FRAMES` consecutive frames agree on a
    /// different mode than the one currently committed.
    pub(crate) fn decide(
        &mut self,
        signal: SignalHint,
        bandwidth: Bandwidth,
        bitrate: i32,
        channels: u8,
    ) -> CodecMode {
        self.current_bandwidth = bandwidth;
        let wanted = self.mode_for_signal(signal, bandwidth, bitrate, channels);

        if wanted == self.current_mode {
            self.candidate_mode = None;
            self.candidate_streak = 0;
            return self.current_mode;
        }

        if self.candidate_mode == Some(wanted) {
            self.candidate_streak += 1;
        } else {
            self.candidate_mode = Some(wanted);
            self.candidate_streak = 1;
        }

        if self.candidate_streak >= HYSTERESIS_FRAMES {
            self.current_mode = wanted;
            self.candidate_mode = None;
            self.candidate_streak = 0;
        }

        self.current_mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_frame_blip_does_not_switch_mode() {
        let mut mc = ModeController::new(Application::Voip);
        assert_eq!(mc.mode(), CodecMode::Silk);
        let mode = mc.decide(SignalHint::Music, Bandwidth::Wideband, 24_000, 1);
        assert_eq!(mode, CodecMode::Silk);
    }

    #[test]
    fn sustained_signal_change_switches_mode_after_hysteresis() {
        let mut mc = ModeController::new(Application::Voip);
        for _ in 0..HYSTERESIS_FRAMES - 1 {
            assert_eq!(
                mc.decide(SignalHint::Music, Bandwidth::Wideband, 24_000, 1),
                CodecMode::Silk
            );
        }
        assert_eq!(
            mc.decide(SignalHint::Music, Bandwidth::Wideband, 24_000, 1),
            CodecMode::Celt
        );
    }

    #[test]
    fn low_delay_application_always_uses_celt() {
        let mut mc = ModeController::new(Application::LowDelay);
        assert_eq!(
            mc.decide(SignalHint::Voice, Bandwidth::Narrowband, 12_000, 1),
            CodecMode::Celt
        );
    }

    #[test]
    fn low_bitrate_mono_forces_silk() {
        let mut mc = ModeController::new(Application::Audio);
        for _ in 0..HYSTERESIS_FRAMES {
            mc.decide(SignalHint::Auto, Bandwidth::Wideband, 12_000, 1);
        }
        assert_eq!(mc.mode(), CodecMode::Silk);
    }

    #[test]
    fn high_bitrate_stereo_forces_celt() {
        let mut mc = ModeController::new(Application::Voip);
        for _ in 0..HYSTERESIS_FRAMES {
            mc.decide(SignalHint::Auto, Bandwidth::Fullband, 96_000, 2);
        }
        assert_eq!(mc.mode(), CodecMode::Celt);
    }
}
