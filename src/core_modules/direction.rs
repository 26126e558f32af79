//! Net travel direction, classified once a track ends (or is still live, for
//! introspection). Index order is fixed so movement counters can be a plain
//! `[u64; 5]` array rather than a map.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Direction {
    Left,
    Right,
    Up,
    Down,
    NoDirection,
}

impl Direction {
    pub const COUNT: usize = 5;

    /// Fixed layout: `[LEFT, RIGHT, UP, DOWN, NO_DIRECTION]`.
    pub fn index(self) -> usize {
        match self {
            Direction::Left => 0,
            Direction::Right => 1,
            Direction::Up => 2,
            Direction::Down => 3,
            Direction::NoDirection => 4,
        }
    }
}
