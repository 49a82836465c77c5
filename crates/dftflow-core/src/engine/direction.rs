use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Index, IndexMut};

/// One of the two independent legs of a reaction-path trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Forward,
    Reverse,
}

impl Direction {
    pub const ALL: [Direction; 2] = [Direction::Forward, Direction::Reverse];

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Forward => "forward",
            Direction::Reverse => "reverse",
        }
    }

    fn slot(self) -> usize {
        match self {
            Direction::Forward => 0,
            Direction::Reverse => 1,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed-size storage with one slot per [`Direction`].
///
/// Per-direction state (cadence counters, resume points, last cached step)
/// lives here instead of in string-keyed maps.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DirectionSlots<T> {
    slots: [T; 2],
}

impl<T> DirectionSlots<T> {
    pub fn new(forward: T, reverse: T) -> Self {
        Self {
            slots: [forward, reverse],
        }
    }

    pub fn from_fn(mut f: impl FnMut(Direction) -> T) -> Self {
        Self::new(f(Direction::Forward), f(Direction::Reverse))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Direction, &T)> {
        Direction::ALL.into_iter().zip(self.slots.iter())
    }

    pub fn map<U>(&self, mut f: impl FnMut(Direction, &T) -> U) -> DirectionSlots<U> {
        DirectionSlots::from_fn(|d| f(d, &self[d]))
    }
}

impl<T> Index<Direction> for DirectionSlots<T> {
    type Output = T;

    fn index(&self, direction: Direction) -> &T {
        &self.slots[direction.slot()]
    }
}

impl<T> IndexMut<Direction> for DirectionSlots<T> {
    fn index_mut(&mut self, direction: Direction) -> &mut T {
        &mut self.slots[direction.slot()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_are_indexed_independently_by_direction() {
        let mut slots: DirectionSlots<Option<u64>> = DirectionSlots::default();
        slots[Direction::Forward] = Some(10);
        slots[Direction::Reverse] = Some(7);

        assert_eq!(slots[Direction::Forward], Some(10));
        assert_eq!(slots[Direction::Reverse], Some(7));
    }

    #[test]
    fn iteration_follows_forward_then_reverse() {
        let slots = DirectionSlots::new("a", "b");
        let order: Vec<_> = slots.iter().map(|(d, v)| (d, *v)).collect();
        assert_eq!(
            order,
            vec![(Direction::Forward, "a"), (Direction::Reverse, "b")]
        );
    }

    #[test]
    fn direction_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&Direction::Reverse).unwrap(),
            "\"reverse\""
        );
        assert_eq!(Direction::Forward.to_string(), "forward");
    }
}
