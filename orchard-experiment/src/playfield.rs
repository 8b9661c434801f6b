use crate::config::{GeometryConfig, TimingConfig};
use orchard_core::{Hands, Side};

/// A falling target. `x` is its left edge, `y` its top edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Target {
    pub side: Side,
    pub x: f32,
    pub y: f32,
}

/// Target kinematics and the catch and miss lines.
#[derive(Debug, Clone)]
pub struct Playfield {
    geometry: GeometryConfig,
    fall_per_tick: f32,
}

impl Playfield {
    pub fn new(geometry: &GeometryConfig, timing: &TimingConfig) -> Self {
        let ticks = timing.total_secs() as f32 * timing.fps.max(1) as f32;
        Self {
            fall_per_tick: geometry.screen_height / ticks,
            geometry: geometry.clone(),
        }
    }

    pub fn center_x(&self) -> f32 {
        (self.geometry.screen_width / 2.0).floor()
    }

    pub fn screen_width(&self) -> f32 {
        self.geometry.screen_width
    }

    pub fn fall_per_tick(&self) -> f32 {
        self.fall_per_tick
    }

    /// Top of the player sprite.
    pub fn catch_line(&self) -> f32 {
        self.geometry.screen_height - self.geometry.player_height
    }

    pub fn miss_line(&self) -> f32 {
        self.geometry.screen_height + self.geometry.load_bar_height
    }

    /// New target at the top of the screen, just inside the player's hand on
    /// `side`.
    pub fn spawn(&self, side: Side) -> Target {
        let g = &self.geometry;
        let x = match side {
            Side::Left => self.center_x() - g.apple_size - g.player_width / 2.0,
            Side::Right => self.center_x() + g.player_width / 2.0 - 10.0,
        };
        Target { side, x, y: 0.0 }
    }

    pub fn step(&self, target: &mut Target) {
        target.y += self.fall_per_tick;
    }

    /// At or below the catch line with the hand on the target's side of
    /// center open.
    pub fn is_caught(&self, target: &Target, hands: &Hands) -> bool {
        if target.y < self.catch_line() {
            return false;
        }
        let half = self.geometry.screen_width / 2.0;
        (hands.is_open(Side::Left) && target.x < half)
            || (hands.is_open(Side::Right) && target.x > half)
    }

    pub fn is_missed(&self, target: &Target) -> bool {
        target.y >= self.miss_line()
    }
}
