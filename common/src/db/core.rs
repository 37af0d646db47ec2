use crate::db::indices::NetId;
use crate::geom::coord::GridCoord;
use std::collections::BTreeMap;
use std::fmt::Write;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GridError {
    #[error("grid dimensions must be non-zero (got {rows}x{cols})")]
    EmptyGrid { rows: u32, cols: u32 },
    #[error("cell {0} is outside the grid")]
    OutOfBounds(GridCoord),
    #[error("cell {0} is an obstacle")]
    Obstacle(GridCoord),
    #[error("cannot place an obstacle on occupied cell {0}")]
    OccupiedObstacle(GridCoord),
    #[error("cell {coord} already belongs to net {owner}, cannot assign it to net {net}")]
    CellOwned {
        coord: GridCoord,
        owner: NetId,
        net: NetId,
    },
    #[error("net {net} already has a {kind} terminal")]
    DuplicateTerminal { net: NetId, kind: TerminalKind },
    #[error("net {0} is missing its {1} terminal")]
    MissingTerminal(NetId, TerminalKind),
    #[error("net {0} is not registered on this grid")]
    UnknownNet(NetId),
    #[error("path for net {0} is empty or not contiguous")]
    BrokenPath(NetId),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TerminalKind {
    Start,
    End,
}

impl std::fmt::Display for TerminalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TerminalKind::Start => write!(f, "start"),
            TerminalKind::End => write!(f, "end"),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CellData {
    pub is_obstacle: bool,
    pub owner: Option<NetId>,
    pub is_start: bool,
    pub is_end: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NetPins {
    pub start: GridCoord,
    pub end: GridCoord,
}

/// Step count recorded for a net that could not be routed.
pub const FAILED_STEPS: i64 = -1;

/// A net's cell sequence from start to end inclusive. Produced by search and
/// consumed by a commit; it never touches the grid by itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoutePath {
    pub net: NetId,
    pub cells: Vec<GridCoord>,
}

impl RoutePath {
    pub fn new(net: NetId, cells: Vec<GridCoord>) -> Self {
        Self { net, cells }
    }

    /// Number of cells on the path, terminals included.
    pub fn steps(&self) -> usize {
        self.cells.len()
    }

    pub fn is_contiguous(&self) -> bool {
        !self.cells.is_empty() && self.cells.windows(2).all(|w| w[0].is_adjacent(w[1]))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderMode {
    Original,
    Solved,
}

/// Fixed-size obstacle/ownership grid plus the net terminal registry.
///
/// Ownership only ever grows during a run: once a cell is claimed by a net,
/// no other net can take it.
#[derive(Clone, Debug)]
pub struct Grid {
    rows: u32,
    cols: u32,
    cells: Vec<CellData>,
    nets: BTreeMap<NetId, NetPins>,
}

impl Grid {
    pub fn new(rows: u32, cols: u32) -> Result<Self, GridError> {
        if rows == 0 || cols == 0 {
            return Err(GridError::EmptyGrid { rows, cols });
        }
        let size = (rows as usize) * (cols as usize);
        if size > 50_000_000 {
            log::warn!(
                "Allocating large Grid: {} cells. Ensure sufficient RAM.",
                size
            );
        }
        Ok(Self {
            rows,
            cols,
            cells: vec![CellData::default(); size],
            nets: BTreeMap::new(),
        })
    }

    /// Builds a grid from terminal pairs, checking the same invariants the
    /// loader does.
    pub fn with_nets(
        rows: u32,
        cols: u32,
        obstacles: &[GridCoord],
        nets: &[(NetId, GridCoord, GridCoord)],
    ) -> Result<Self, GridError> {
        let mut grid = Self::new(rows, cols)?;
        for &c in obstacles {
            grid.set_obstacle(c)?;
        }
        for &(net, start, end) in nets {
            grid.add_terminal(net, start, TerminalKind::Start)?;
            grid.add_terminal(net, end, TerminalKind::End)?;
        }
        grid.validate_nets()?;
        Ok(grid)
    }

    #[inline]
    pub fn rows(&self) -> u32 {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> u32 {
        self.cols
    }

    #[inline]
    pub fn num_cells(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub fn in_bounds(&self, c: GridCoord) -> bool {
        c.row < self.rows && c.col < self.cols
    }

    #[inline(always)]
    pub fn index(&self, c: GridCoord) -> usize {
        (c.row as usize) * (self.cols as usize) + (c.col as usize)
    }

    #[inline(always)]
    pub fn coord(&self, idx: usize) -> GridCoord {
        let cols = self.cols as usize;
        GridCoord::new((idx / cols) as u32, (idx % cols) as u32)
    }

    pub fn cell(&self, c: GridCoord) -> Option<&CellData> {
        if !self.in_bounds(c) {
            return None;
        }
        self.cells.get(self.index(c))
    }

    pub fn is_obstacle(&self, c: GridCoord) -> bool {
        self.cell(c).is_none_or(|cell| cell.is_obstacle)
    }

    pub fn owner(&self, c: GridCoord) -> Option<NetId> {
        self.cell(c).and_then(|cell| cell.owner)
    }

    pub fn set_obstacle(&mut self, c: GridCoord) -> Result<(), GridError> {
        let idx = self.checked_index(c)?;
        let cell = &mut self.cells[idx];
        if cell.owner.is_some() {
            return Err(GridError::OccupiedObstacle(c));
        }
        cell.is_obstacle = true;
        Ok(())
    }

    /// Registers one terminal of `net`. The terminal cell becomes owned by the
    /// net immediately so that other nets route around it.
    pub fn add_terminal(
        &mut self,
        net: NetId,
        c: GridCoord,
        kind: TerminalKind,
    ) -> Result<(), GridError> {
        let idx = self.checked_index(c)?;
        if self.cells[idx].is_obstacle {
            return Err(GridError::Obstacle(c));
        }
        if let Some(owner) = self.cells[idx].owner {
            return Err(GridError::CellOwned {
                coord: c,
                owner,
                net,
            });
        }

        let pins = self.nets.entry(net).or_insert(NetPins {
            start: UNSET,
            end: UNSET,
        });
        let slot = match kind {
            TerminalKind::Start => &mut pins.start,
            TerminalKind::End => &mut pins.end,
        };
        if *slot != UNSET {
            return Err(GridError::DuplicateTerminal { net, kind });
        }
        *slot = c;

        let cell = &mut self.cells[idx];
        cell.owner = Some(net);
        match kind {
            TerminalKind::Start => cell.is_start = true,
            TerminalKind::End => cell.is_end = true,
        }
        Ok(())
    }

    /// Every registered net must have both terminals.
    pub fn validate_nets(&self) -> Result<(), GridError> {
        for (&net, pins) in &self.nets {
            if pins.start == UNSET {
                return Err(GridError::MissingTerminal(net, TerminalKind::Start));
            }
            if pins.end == UNSET {
                return Err(GridError::MissingTerminal(net, TerminalKind::End));
            }
        }
        Ok(())
    }

    pub fn nets(&self) -> &BTreeMap<NetId, NetPins> {
        &self.nets
    }

    pub fn net_ids(&self) -> impl Iterator<Item = NetId> + '_ {
        self.nets.keys().copied()
    }

    pub fn net_pins(&self, net: NetId) -> Option<NetPins> {
        self.nets.get(&net).copied()
    }

    pub fn num_nets(&self) -> usize {
        self.nets.len()
    }

    /// Marks every cell of `path` as owned by its net. Nothing is written
    /// unless the whole path is claimable.
    pub fn commit(&mut self, path: &RoutePath) -> Result<(), GridError> {
        let pins = self
            .net_pins(path.net)
            .ok_or(GridError::UnknownNet(path.net))?;
        if !path.is_contiguous()
            || path.cells.first() != Some(&pins.start)
            || path.cells.last() != Some(&pins.end)
        {
            return Err(GridError::BrokenPath(path.net));
        }

        for &c in &path.cells {
            let idx = self.checked_index(c)?;
            let cell = &self.cells[idx];
            if cell.is_obstacle {
                return Err(GridError::Obstacle(c));
            }
            match cell.owner {
                Some(owner) if owner != path.net => {
                    return Err(GridError::CellOwned {
                        coord: c,
                        owner,
                        net: path.net,
                    });
                }
                _ => {}
            }
        }

        for &c in &path.cells {
            let idx = self.index(c);
            self.cells[idx].owner = Some(path.net);
        }
        Ok(())
    }

    /// Cells currently owned by `net`, in row-major order.
    pub fn owned_cells(&self, net: NetId) -> Vec<GridCoord> {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, cell)| cell.owner == Some(net))
            .map(|(i, _)| self.coord(i))
            .collect()
    }

    /// Text rendering: `#` obstacles, `.` free cells. The original form shows
    /// terminals as `S<id>`/`E<id>`; the solved form shows the owning net id.
    pub fn render(&self, mode: RenderMode) -> String {
        let mut out = String::new();
        for row in 0..self.rows {
            for col in 0..self.cols {
                let cell = &self.cells[self.index(GridCoord::new(row, col))];
                if col > 0 {
                    out.push(' ');
                }
                let _ = match (cell.is_obstacle, cell.owner, mode) {
                    (true, _, _) => write!(out, "#"),
                    (false, Some(net), RenderMode::Original) if cell.is_start => {
                        write!(out, "S{}", net)
                    }
                    (false, Some(net), RenderMode::Original) if cell.is_end => {
                        write!(out, "E{}", net)
                    }
                    (false, Some(net), RenderMode::Solved) => write!(out, "{}", net),
                    _ => write!(out, "."),
                };
            }
            out.push('\n');
        }
        out
    }

    fn checked_index(&self, c: GridCoord) -> Result<usize, GridError> {
        if self.in_bounds(c) {
            Ok(self.index(c))
        } else {
            Err(GridError::OutOfBounds(c))
        }
    }
}

const UNSET: GridCoord = GridCoord {
    row: u32::MAX,
    col: u32::MAX,
};
