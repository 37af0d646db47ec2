pub mod astar;
pub mod bfs;
pub mod scratch;

use crate::grid::RoutingGrid;
use maze_common::db::core::RoutePath;
use maze_common::db::indices::NetId;
use maze_common::geom::coord::GridCoord;
pub use maze_common::util::config::SearchStrategy;
use scratch::SearchScratch;

/// Whether a search for `net` heading to `end` may step onto `c`.
#[inline(always)]
fn passable<G: RoutingGrid + ?Sized>(grid: &G, c: GridCoord, net: NetId, end: GridCoord) -> bool {
    if grid.is_obstacle(c) {
        return false;
    }
    c == end || grid.is_routable(c, net)
}

/// Single-net shortest path search. Owns its scratch buffers so repeated
/// searches on the same grid do not reallocate.
#[derive(Clone, Default)]
pub struct PathFinder {
    strategy: SearchStrategy,
    scratch: SearchScratch,
}

impl PathFinder {
    pub fn new(strategy: SearchStrategy) -> Self {
        Self {
            strategy,
            scratch: SearchScratch::new(),
        }
    }

    pub fn strategy(&self) -> SearchStrategy {
        self.strategy
    }

    /// Shortest path for `net` from `start` to `end` over obstacle-free cells
    /// that are unowned or already owned by `net`. `None` means unreachable.
    pub fn find_path<G: RoutingGrid + ?Sized>(
        &mut self,
        grid: &G,
        net: NetId,
        start: GridCoord,
        end: GridCoord,
    ) -> Option<RoutePath> {
        let in_grid = |c: GridCoord| c.row < grid.rows() && c.col < grid.cols();
        if !in_grid(start) || !in_grid(end) || grid.is_obstacle(start) || grid.is_obstacle(end) {
            log::debug!("Net {}: terminal outside the routable area", net);
            return None;
        }

        let cells = match self.strategy {
            SearchStrategy::Bfs => bfs::find_path(grid, &mut self.scratch, net, start, end),
            SearchStrategy::Astar => astar::find_path(grid, &mut self.scratch, net, start, end),
        }?;
        Some(RoutePath::new(net, cells))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maze_common::db::core::Grid;

    #[test]
    fn both_strategies_find_manhattan_length_on_open_grid() {
        let net = NetId::new(1);
        let (s, e) = (GridCoord::new(0, 0), GridCoord::new(2, 2));
        let grid = Grid::with_nets(3, 3, &[], &[(net, s, e)]).unwrap();
        for strategy in [SearchStrategy::Bfs, SearchStrategy::Astar] {
            let mut finder = PathFinder::new(strategy);
            let path = finder.find_path(&grid, net, s, e).unwrap();
            assert_eq!(path.steps(), 5, "{:?}", strategy);
            assert!(path.is_contiguous());
        }
    }

    #[test]
    fn out_of_grid_terminal_is_no_path() {
        let net = NetId::new(1);
        let grid = Grid::with_nets(
            2,
            2,
            &[],
            &[(net, GridCoord::new(0, 0), GridCoord::new(1, 1))],
        )
        .unwrap();
        let mut finder = PathFinder::new(SearchStrategy::Bfs);
        assert!(
            finder
                .find_path(&grid, net, GridCoord::new(0, 0), GridCoord::new(4, 4))
                .is_none()
        );
    }
}
