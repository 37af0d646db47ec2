use maze_common::db::core::Grid;
use maze_common::db::indices::NetId;
use maze_common::geom::coord::GridCoord;

/// Read-only view of the grid that path search runs against.
pub trait RoutingGrid: Sync + Send {
    fn rows(&self) -> u32;
    fn cols(&self) -> u32;

    fn is_obstacle(&self, coord: GridCoord) -> bool;
    fn owner(&self, coord: GridCoord) -> Option<NetId>;

    #[inline]
    fn num_cells(&self) -> usize {
        (self.rows() as usize) * (self.cols() as usize)
    }

    #[inline(always)]
    fn index(&self, coord: GridCoord) -> usize {
        (coord.row as usize) * (self.cols() as usize) + (coord.col as usize)
    }

    #[inline(always)]
    fn coord(&self, idx: usize) -> GridCoord {
        let cols = self.cols() as usize;
        GridCoord::new((idx / cols) as u32, (idx % cols) as u32)
    }

    /// Obstacle-free and either unowned or already owned by `net`.
    #[inline]
    fn is_routable(&self, coord: GridCoord, net: NetId) -> bool {
        !self.is_obstacle(coord) && self.owner(coord).is_none_or(|owner| owner == net)
    }

    /// Four-connected neighbors inside the grid, in down, up, right, left order.
    fn neighbors(&self, c: GridCoord) -> ([GridCoord; 4], usize) {
        let mut out = [c; 4];
        let mut n = 0;
        if c.row + 1 < self.rows() {
            out[n] = GridCoord::new(c.row + 1, c.col);
            n += 1;
        }
        if c.row > 0 {
            out[n] = GridCoord::new(c.row - 1, c.col);
            n += 1;
        }
        if c.col + 1 < self.cols() {
            out[n] = GridCoord::new(c.row, c.col + 1);
            n += 1;
        }
        if c.col > 0 {
            out[n] = GridCoord::new(c.row, c.col - 1);
            n += 1;
        }
        (out, n)
    }
}

impl RoutingGrid for Grid {
    fn rows(&self) -> u32 {
        Grid::rows(self)
    }
    fn cols(&self) -> u32 {
        Grid::cols(self)
    }
    fn is_obstacle(&self, coord: GridCoord) -> bool {
        Grid::is_obstacle(self, coord)
    }
    fn owner(&self, coord: GridCoord) -> Option<NetId> {
        Grid::owner(self, coord)
    }
}
