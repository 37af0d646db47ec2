use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GridCoord {
    pub row: u32,
    pub col: u32,
}

impl GridCoord {
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    #[inline]
    pub fn manhattan(&self, other: GridCoord) -> u32 {
        self.row.abs_diff(other.row) + self.col.abs_diff(other.col)
    }

    #[inline]
    pub fn is_adjacent(&self, other: GridCoord) -> bool {
        self.manhattan(other) == 1
    }
}

impl fmt::Display for GridCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manhattan_is_symmetric() {
        let a = GridCoord::new(0, 4);
        let b = GridCoord::new(3, 1);
        assert_eq!(a.manhattan(b), 6);
        assert_eq!(b.manhattan(a), 6);
        assert!(!a.is_adjacent(b));
        assert!(a.is_adjacent(GridCoord::new(1, 4)));
    }
}
