use std::time::Duration;

use serde::{Deserialize, Serialize};

use brainstem_core::Timestamp;

/// Recharging ability gate, driven by the host clock.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CooldownTimer {
    cooldown: f64,
    last_use: f64,
}

impl CooldownTimer {
    /// Starts on cooldown, as if used at `now`.
    pub fn new(cooldown: Duration, now: Timestamp) -> Self {
        Self {
            cooldown: cooldown.as_secs_f64(),
            last_use: now.as_secs(),
        }
    }

    /// Starts `ready_in` away from being usable.
    pub fn with_initial_delay(cooldown: Duration, ready_in: Duration, now: Timestamp) -> Self {
        Self {
            cooldown: cooldown.as_secs_f64(),
            last_use: now.as_secs() - cooldown.as_secs_f64() + ready_in.as_secs_f64(),
        }
    }

    pub fn cooldown(&self) -> Duration {
        saturating_secs(self.cooldown)
    }

    pub fn set_cooldown(&mut self, cooldown: Duration) {
        self.cooldown = cooldown.as_secs_f64();
    }

    pub fn can_use(&self, now: Timestamp) -> bool {
        now.as_secs() - self.last_use >= self.cooldown
    }

    /// Consumes the charge if ready.
    pub fn use_now(&mut self, now: Timestamp) -> bool {
        if self.can_use(now) {
            self.last_use = now.as_secs();
            true
        } else {
            false
        }
    }

    /// 0 right after use, 1 when ready.
    pub fn charge_ratio(&self, now: Timestamp) -> f32 {
        let elapsed = now.as_secs() - self.last_use;
        if self.cooldown <= 0.0 || elapsed >= self.cooldown {
            1.0
        } else {
            (elapsed / self.cooldown).max(0.0) as f32
        }
    }

    /// Makes the timer ready immediately.
    pub fn clear(&mut self, now: Timestamp) {
        self.last_use = now.as_secs() - self.cooldown;
    }

    /// Restarts the cooldown without using the charge.
    pub fn reset(&mut self, now: Timestamp) {
        self.last_use = now.as_secs();
    }
}

/// Flag that stays set for a fixed duration after [`ExpirationTimer::set`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExpirationTimer {
    expiration: f64,
    last_set: f64,
}

impl ExpirationTimer {
    /// Starts expired.
    pub fn new(expiration: Duration, now: Timestamp) -> Self {
        let mut timer = Self {
            expiration: expiration.as_secs_f64(),
            last_set: 0.0,
        };
        timer.clear(now);
        timer
    }

    pub fn expiration(&self) -> Duration {
        saturating_secs(self.expiration)
    }

    pub fn set_expiration(&mut self, expiration: Duration) {
        self.expiration = expiration.as_secs_f64();
    }

    pub fn set(&mut self, now: Timestamp) {
        self.last_set = now.as_secs();
    }

    pub fn clear(&mut self, now: Timestamp) {
        self.last_set = now.as_secs() - self.expiration;
    }

    pub fn expired(&self, now: Timestamp) -> bool {
        now.as_secs() >= self.deadline()
    }

    /// True on the tick of length `dt` ending at `now` during which the
    /// timer ran out.
    pub fn expired_this_tick(&self, now: Timestamp, dt: Duration) -> bool {
        self.expired(now) && now.as_secs() - dt.as_secs_f64() <= self.deadline()
    }

    pub fn remaining(&self, now: Timestamp) -> Duration {
        saturating_secs(self.deadline() - now.as_secs())
    }

    /// 1 right after `set`, 0 once expired.
    pub fn remaining_ratio(&self, now: Timestamp) -> f32 {
        if self.expired(now) || self.expiration <= 0.0 {
            0.0
        } else {
            (1.0 - (now.as_secs() - self.last_set) / self.expiration).min(1.0) as f32
        }
    }

    fn deadline(&self) -> f64 {
        self.last_set + self.expiration
    }
}

/// Fixed clip of shots with a timed reload.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "MagazineState")]
pub struct Magazine {
    clip_size: u32,
    remaining: u32,
    reload: ExpirationTimer,
}

#[derive(Deserialize)]
struct MagazineState {
    clip_size: u32,
    remaining: u32,
    reload: ExpirationTimer,
}

impl From<MagazineState> for Magazine {
    fn from(state: MagazineState) -> Self {
        Self {
            clip_size: state.clip_size,
            remaining: state.remaining.min(state.clip_size),
            reload: state.reload,
        }
    }
}

impl Magazine {
    /// Starts full and not reloading.
    pub fn new(clip_size: u32, reload_time: Duration, now: Timestamp) -> Self {
        Self {
            clip_size,
            remaining: clip_size,
            reload: ExpirationTimer::new(reload_time, now),
        }
    }

    pub fn clip_size(&self) -> u32 {
        self.clip_size
    }

    pub fn remaining_shots(&self) -> u32 {
        self.remaining
    }

    pub fn reload_time(&self) -> Duration {
        self.reload.expiration()
    }

    pub fn can_fire(&self, now: Timestamp) -> bool {
        self.remaining > 0 && self.reload.expired(now)
    }

    /// Spends a shot if possible. Emptying the clip starts a reload.
    pub fn fire(&mut self, now: Timestamp) -> bool {
        if !self.can_fire(now) {
            return false;
        }
        self.remaining -= 1;
        if self.remaining == 0 {
            self.reload(now);
        }
        true
    }

    /// Refills the clip and starts the reload timer. A full clip is left alone.
    pub fn reload(&mut self, now: Timestamp) {
        if self.remaining < self.clip_size {
            self.remaining = self.clip_size;
            self.reload.set(now);
        }
    }

    pub fn reloading(&self, now: Timestamp) -> bool {
        !self.reload.expired(now)
    }

    /// 1 right after a reload starts, 0 once it is done.
    pub fn reload_remaining_ratio(&self, now: Timestamp) -> f32 {
        self.reload.remaining_ratio(now)
    }
}

fn saturating_secs(secs: f64) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        Duration::ZERO
    } else {
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }
}
