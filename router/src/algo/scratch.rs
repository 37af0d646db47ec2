use crate::grid::RoutingGrid;
use maze_common::geom::coord::GridCoord;

const NO_PARENT: u32 = u32::MAX;

/// Transient per-search state sized to the grid: visited markers, step
/// counts, and predecessor indices. Markers are generation-tagged, so starting
/// a new search invalidates everything left by the previous one in O(1).
#[derive(Clone, Default)]
pub struct SearchScratch {
    parents: Vec<u32>,
    g_score: Vec<u32>,
    visited_tag: Vec<u32>,
    current_tag: u32,
}

impl SearchScratch {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_capacity(&mut self, size: usize) {
        if size > self.visited_tag.len() {
            self.parents.resize(size, NO_PARENT);
            self.g_score.resize(size, u32::MAX);
            self.visited_tag.resize(size, 0);
        }
    }

    /// Starts a fresh search over a grid of `size` cells.
    pub fn begin(&mut self, size: usize) {
        self.ensure_capacity(size);
        self.current_tag = self.current_tag.wrapping_add(1);
        if self.current_tag == 0 {
            self.visited_tag.fill(0);
            self.current_tag = 1;
        }
    }

    #[inline(always)]
    pub fn is_visited(&self, idx: usize) -> bool {
        self.visited_tag[idx] == self.current_tag
    }

    #[inline(always)]
    pub fn visit(&mut self, idx: usize, parent: Option<usize>, g: u32) {
        self.visited_tag[idx] = self.current_tag;
        self.parents[idx] = parent.map_or(NO_PARENT, |p| p as u32);
        self.g_score[idx] = g;
    }

    /// Steps from the search origin, if `idx` was reached in this search.
    #[inline(always)]
    pub fn g(&self, idx: usize) -> Option<u32> {
        self.is_visited(idx).then(|| self.g_score[idx])
    }

    #[inline(always)]
    pub fn parent(&self, idx: usize) -> Option<usize> {
        if !self.is_visited(idx) {
            return None;
        }
        match self.parents[idx] {
            NO_PARENT => None,
            p => Some(p as usize),
        }
    }

    /// Follows predecessor links back from `end`, returning start..=end.
    pub fn reconstruct<G: RoutingGrid + ?Sized>(&self, grid: &G, end: usize) -> Vec<GridCoord> {
        let mut path = Vec::new();
        let mut curr = Some(end);
        while let Some(idx) = curr {
            path.push(grid.coord(idx));
            curr = self.parent(idx);
        }
        path.reverse();
        path
    }
}
