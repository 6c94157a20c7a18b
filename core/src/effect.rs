//! Fadeout and day-cycle overlays as independent tick-driven state
//! machines (spec §4.9), grounded on `original_source/src/effect.h`
//! (fadeout kind/reverse/keep) and `client/src/legacy_engine.rs`'s
//! tick-counter-driven overlay style.

const FADEOUT_GRANULARITY: u32 = 16;
const DAYCYCLE_CLOCK_CHECK_MS: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeoutKind {
    BlackScreen,
    ToCenter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeoutOutcome {
    InProgress,
    Completed,
}

pub struct FadeoutEffect {
    pub kind: FadeoutKind,
    pub reverse: bool,
    pub keep: bool,
    pub delay: u32,
    pub active: bool,
    /// Opacity 0..=255 for `black_screen`.
    pub alpha: u8,
    /// Four quad heights for `to_center`.
    pub heights: [i32; 4],
    /// Two per-tick deltas for `to_center`.
    pub deltas: [i32; 2],
    ticks_amt: u32,
    ticks: u32,
}

impl FadeoutEffect {
    pub fn new() -> Self {
        Self {
            kind: FadeoutKind::BlackScreen,
            reverse: false,
            keep: false,
            delay: 0,
            active: false,
            alpha: 0,
            heights: [0; 4],
            deltas: [0; 2],
            ticks_amt: 1,
            ticks: 0,
        }
    }

    /// Programs a fadeout: `ticks_amt = time / FADEOUT_GRANULARITY`,
    /// clamped to 1.
    pub fn set_update(&mut self, time_ms: u32, kind: FadeoutKind, reverse: bool, delay: u32) {
        self.kind = kind;
        self.reverse = reverse;
        self.delay = delay;
        self.ticks_amt = (time_ms / FADEOUT_GRANULARITY).max(1);
        self.ticks = 0;
        self.active = true;
        self.alpha = if reverse { 255 } else { 0 };
        self.heights = if reverse { [i32::MAX / 2; 4] } else { [0; 4] };
    }

    /// Advances the fadeout by one tick's worth of `elapsed_ticks`. If
    /// `reverse`, the delay counts down first; then either alpha walks
    /// toward 0/1 or the four heights close on / open from center.
    pub fn update(&mut self, elapsed_ticks: u32) -> FadeoutOutcome {
        if !self.active {
            return FadeoutOutcome::Completed;
        }
        if self.reverse && self.delay > 0 {
            self.delay = self.delay.saturating_sub(elapsed_ticks);
            return FadeoutOutcome::InProgress;
        }

        self.ticks += elapsed_ticks;
        let times = self.ticks / self.ticks_amt.max(1);
        if times == 0 {
            return FadeoutOutcome::InProgress;
        }
        self.ticks %= self.ticks_amt.max(1);

        let step = ((2 * times) as i32 * 255 / (FADEOUT_GRANULARITY as i32)).max(1);
        match self.kind {
            FadeoutKind::BlackScreen => {
                if self.reverse {
                    self.alpha = self.alpha.saturating_sub(step.unsigned_abs() as u8);
                } else {
                    self.alpha = self.alpha.saturating_add(step.unsigned_abs() as u8);
                }
                let done = if self.reverse {
                    self.alpha == 0
                } else {
                    self.alpha >= 255
                };
                if done {
                    self.finish()
                } else {
                    FadeoutOutcome::InProgress
                }
            }
            FadeoutKind::ToCenter => {
                for (h, d) in self.heights.iter_mut().zip(self.deltas.iter().cycle()) {
                    if self.reverse {
                        *h = (*h + d).max(0);
                    } else {
                        *h = (*h - d).max(0);
                    }
                }
                if self.heights.iter().all(|h| *h == 0) {
                    self.finish()
                } else {
                    FadeoutOutcome::InProgress
                }
            }
        }
    }

    fn finish(&mut self) -> FadeoutOutcome {
        self.active = self.keep && !self.reverse;
        FadeoutOutcome::Completed
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

impl Default for FadeoutEffect {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaycyclePhase {
    Morning,
    Day,
    Night,
    Clock,
}

pub struct DaycycleEffect {
    last_check_ms: u64,
    pub phase: DaycyclePhase,
}

impl DaycycleEffect {
    pub fn new() -> Self {
        Self {
            last_check_ms: 0,
            phase: DaycyclePhase::Day,
        }
    }

    /// Maps an hour (0..24) to a phase: morning (5..8), day (8..19),
    /// night (19..24 and 0..5), clock otherwise (unreachable with a
    /// well-formed hour, kept for parity with the original's default
    /// arm).
    pub fn phase_for_hour(hour: u32) -> DaycyclePhase {
        match hour {
            5..=7 => DaycyclePhase::Morning,
            8..=18 => DaycyclePhase::Day,
            19..=23 | 0..=4 => DaycyclePhase::Night,
            _ => DaycyclePhase::Clock,
        }
    }

    /// Re-reads the wall-clock hour every `DAYCYCLE_CLOCK_CHECK` ms.
    pub fn tick(&mut self, now_ms: u64, hour: u32) {
        if now_ms.saturating_sub(self.last_check_ms) >= DAYCYCLE_CLOCK_CHECK_MS {
            self.last_check_ms = now_ms;
            self.phase = Self::phase_for_hour(hour);
        }
    }

    /// Translucent overlay color for the current phase; `None` for day
    /// (no overlay) and clock (unspecified presentation, left to the
    /// renderer).
    pub fn overlay_rgba(&self) -> Option<(u8, u8, u8, u8)> {
        match self.phase {
            DaycyclePhase::Morning => Some((255, 200, 150, 60)),
            DaycyclePhase::Night => Some((20, 20, 60, 120)),
            DaycyclePhase::Day | DaycyclePhase::Clock => None,
        }
    }
}

impl Default for DaycycleEffect {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn black_screen_reaches_full_opacity() {
        let mut fx = FadeoutEffect::new();
        fx.set_update(160, FadeoutKind::BlackScreen, false, 0);
        let mut outcome = FadeoutOutcome::InProgress;
        for _ in 0..500 {
            outcome = fx.update(1);
            if outcome == FadeoutOutcome::Completed {
                break;
            }
        }
        assert_eq!(outcome, FadeoutOutcome::Completed);
        assert_eq!(fx.alpha, 255);
    }

    #[test]
    fn keep_persists_overlay_when_not_reversed() {
        let mut fx = FadeoutEffect::new();
        fx.keep = true;
        fx.set_update(16, FadeoutKind::BlackScreen, false, 0);
        for _ in 0..500 {
            if fx.update(1) == FadeoutOutcome::Completed {
                break;
            }
        }
        assert!(fx.is_active());
    }

    #[test]
    fn daycycle_maps_hour_ranges() {
        assert_eq!(DaycycleEffect::phase_for_hour(6), DaycyclePhase::Morning);
        assert_eq!(DaycycleEffect::phase_for_hour(12), DaycyclePhase::Day);
        assert_eq!(DaycycleEffect::phase_for_hour(22), DaycyclePhase::Night);
    }
}
