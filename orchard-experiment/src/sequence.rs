use orchard_core::Side;
use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::VecDeque;

/// One entry of the target sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Target(Side),
    /// Past the planned trials.
    Sentinel,
}

/// Shuffled, balanced order of target sides.
#[derive(Debug, Clone)]
pub struct TargetSequence {
    slots: VecDeque<Slot>,
}

impl TargetSequence {
    /// `n / 2` of each side in random order, followed by a sentinel. An odd
    /// `n` drops the remainder.
    pub fn build<R: Rng + ?Sized>(n: usize, rng: &mut R) -> Self {
        let half = n / 2;
        let mut sides: Vec<Side> = std::iter::repeat_n(Side::Left, half)
            .chain(std::iter::repeat_n(Side::Right, half))
            .collect();
        sides.shuffle(rng);
        let mut slots: VecDeque<Slot> = sides.into_iter().map(Slot::Target).collect();
        slots.push_back(Slot::Sentinel);
        Self { slots }
    }

    /// Fixed order, mainly for replaying a known session.
    pub fn from_sides(sides: impl IntoIterator<Item = Side>) -> Self {
        let mut slots: VecDeque<Slot> = sides.into_iter().map(Slot::Target).collect();
        slots.push_back(Slot::Sentinel);
        Self { slots }
    }

    /// Pops the next slot. Once exhausted, every call returns the sentinel.
    pub fn next_target(&mut self) -> Slot {
        match self.slots.front() {
            Some(Slot::Sentinel) | None => Slot::Sentinel,
            Some(_) => self.slots.pop_front().unwrap_or(Slot::Sentinel),
        }
    }

    /// Targets left before the sentinel.
    pub fn remaining(&self) -> usize {
        self.slots.iter().filter(|s| matches!(s, Slot::Target(_))).count()
    }
}
