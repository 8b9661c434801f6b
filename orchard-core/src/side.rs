use serde::{Deserialize, Serialize};

/// Side of the playfield a target falls toward, doubling as the class label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub const ALL: [Side; 2] = [Side::Left, Side::Right];

    /// Binary class label: 0 = left, 1 = right.
    pub fn label(self) -> u8 {
        match self {
            Side::Left => 0,
            Side::Right => 1,
        }
    }

    pub fn from_label(label: u8) -> Option<Self> {
        match label {
            0 => Some(Side::Left),
            1 => Some(Side::Right),
            _ => None,
        }
    }

    /// Side of a horizontal screen coordinate. Only positions strictly past
    /// the center count as right.
    pub fn from_position(x: f32, screen_width: f32) -> Self {
        if x > screen_width / 2.0 {
            Side::Right
        } else {
            Side::Left
        }
    }

    /// Side chosen by a probability-like confidence. Above one half opens the
    /// right hand, everything else the left.
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence > 0.5 {
            Side::Right
        } else {
            Side::Left
        }
    }

    fn index(self) -> usize {
        self.label() as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HandState {
    Open,
    #[default]
    Closed,
}

/// `{left, right} × {open, closed}` lookup table for the two hands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Hands {
    states: [HandState; 2],
}

impl Hands {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, side: Side) -> HandState {
        self.states[side.index()]
    }

    pub fn is_open(&self, side: Side) -> bool {
        self.state(side) == HandState::Open
    }

    pub fn open(&mut self, side: Side) {
        self.states[side.index()] = HandState::Open;
    }

    pub fn close_all(&mut self) {
        self.states = [HandState::Closed; 2];
    }

    /// The open hand, if any. Only one hand is ever opened per trial.
    pub fn open_side(&self) -> Option<Side> {
        Side::ALL.into_iter().find(|s| self.is_open(*s))
    }
}
