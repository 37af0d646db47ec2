use super::scratch::SearchScratch;
use crate::grid::RoutingGrid;
use maze_common::db::indices::NetId;
use maze_common::geom::coord::GridCoord;
use priority_queue::PriorityQueue;
use std::cmp::Reverse;

/// Frontier ordering: lowest `f = g + h` first, then lowest `h`, then row,
/// then column. Every cell has a distinct key, so expansion order is fully
/// deterministic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Key {
    f_score: u32,
    h_score: u32,
    row: u32,
    col: u32,
}

/// Best-first search with the Manhattan distance heuristic. On a
/// four-connected unit-cost grid the heuristic is consistent, so a cell's
/// step count is final once it leaves the frontier and the returned path is
/// minimal.
pub fn find_path<G: RoutingGrid + ?Sized>(
    grid: &G,
    scratch: &mut SearchScratch,
    net: NetId,
    start: GridCoord,
    end: GridCoord,
) -> Option<Vec<GridCoord>> {
    scratch.begin(grid.num_cells());

    let start_idx = grid.index(start);
    let end_idx = grid.index(end);
    scratch.visit(start_idx, None, 0);

    let mut open: PriorityQueue<usize, Reverse<Key>> = PriorityQueue::new();
    open.push(start_idx, Reverse(key(start, 0, end)));

    while let Some((curr, _)) = open.pop() {
        if curr == end_idx {
            return Some(scratch.reconstruct(grid, end_idx));
        }
        let position = grid.coord(curr);
        let current_g = scratch.g(curr).unwrap_or(0);

        let (neighbors, n_count) = grid.neighbors(position);
        for &neighbor in &neighbors[..n_count] {
            if !super::passable(grid, neighbor, net, end) {
                continue;
            }
            let idx = grid.index(neighbor);
            let tentative_g = current_g + 1;
            let improves = scratch.g(idx).is_none_or(|g| tentative_g < g);
            if improves {
                scratch.visit(idx, Some(curr), tentative_g);
                open.push_increase(idx, Reverse(key(neighbor, tentative_g, end)));
            }
        }
    }
    None
}

#[inline(always)]
fn key(c: GridCoord, g: u32, end: GridCoord) -> Key {
    let h = c.manhattan(end);
    Key {
        f_score: g + h,
        h_score: h,
        row: c.row,
        col: c.col,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maze_common::db::core::Grid;

    #[test]
    fn detours_around_a_wall() {
        let net = NetId::new(3);
        // . . .
        // S # E
        // . . .
        let grid = Grid::with_nets(
            3,
            3,
            &[GridCoord::new(1, 1)],
            &[(net, GridCoord::new(1, 0), GridCoord::new(1, 2))],
        )
        .unwrap();
        let mut scratch = SearchScratch::new();
        let path = find_path(
            &grid,
            &mut scratch,
            net,
            GridCoord::new(1, 0),
            GridCoord::new(1, 2),
        )
        .unwrap();
        assert_eq!(path.len(), 5);
        assert_eq!(path.first(), Some(&GridCoord::new(1, 0)));
        assert_eq!(path.last(), Some(&GridCoord::new(1, 2)));
        assert!(!path.contains(&GridCoord::new(1, 1)));
        assert!(path.windows(2).all(|w| w[0].is_adjacent(w[1])));
    }

    #[test]
    fn tie_break_prefers_lower_row() {
        let net = NetId::new(1);
        let grid = Grid::with_nets(
            2,
            2,
            &[],
            &[(net, GridCoord::new(0, 0), GridCoord::new(1, 1))],
        )
        .unwrap();
        let mut scratch = SearchScratch::new();
        let path = find_path(
            &grid,
            &mut scratch,
            net,
            GridCoord::new(0, 0),
            GridCoord::new(1, 1),
        )
        .unwrap();
        // (0,1) and (1,0) share f and h; row 0 wins.
        assert_eq!(path[1], GridCoord::new(0, 1));
    }

    #[test]
    fn sealed_target_is_unreachable() {
        let net = NetId::new(1);
        let grid = Grid::with_nets(
            1,
            3,
            &[GridCoord::new(0, 1)],
            &[(net, GridCoord::new(0, 0), GridCoord::new(0, 2))],
        )
        .unwrap();
        let mut scratch = SearchScratch::new();
        assert!(
            find_path(
                &grid,
                &mut scratch,
                net,
                GridCoord::new(0, 0),
                GridCoord::new(0, 2)
            )
            .is_none()
        );
    }
}
