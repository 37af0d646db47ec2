use super::scratch::SearchScratch;
use crate::grid::RoutingGrid;
use maze_common::db::indices::NetId;
use maze_common::geom::coord::GridCoord;
use std::collections::VecDeque;

/// Breadth-first search: cells are expanded in order of step count, so the
/// first time `end` is reached the path to it is minimal.
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

    let mut queue = VecDeque::new();
    queue.push_back(start_idx);

    while let Some(curr) = queue.pop_front() {
        if curr == end_idx {
            return Some(scratch.reconstruct(grid, end_idx));
        }
        let position = grid.coord(curr);
        let steps = scratch.g(curr).unwrap_or(0);

        let (neighbors, n_count) = grid.neighbors(position);
        for &neighbor in &neighbors[..n_count] {
            let idx = grid.index(neighbor);
            if scratch.is_visited(idx) {
                continue;
            }
            if !super::passable(grid, neighbor, net, end) {
                continue;
            }
            scratch.visit(idx, Some(curr), steps + 1);
            queue.push_back(idx);
        }
    }
    None
}
