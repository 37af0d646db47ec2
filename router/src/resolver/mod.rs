pub mod branch_bound;
pub mod model;

use branch_bound::BranchAndBound;
use maze_common::db::core::RoutePath;
use maze_common::geom::coord::GridCoord;
pub use maze_common::util::config::SuboptimalPolicy;
use model::{BinaryProgram, MipBackend, Sense, SolveLimits, SolveStatus, VarId};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug)]
pub struct ResolverConfig {
    pub time_limit: Duration,
    pub threads: usize,
    pub suboptimal: SuboptimalPolicy,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            time_limit: Duration::from_secs(30),
            threads: 1,
            suboptimal: SuboptimalPolicy::Accept,
        }
    }
}

/// The conflict model for one candidate batch.
pub struct ConflictModel {
    pub program: BinaryProgram,
    /// Selection variable of each candidate, in batch order.
    pub selection: Vec<VarId>,
    /// Cells claimed by more than one candidate.
    pub contested_cells: usize,
}

/// Picks a largest subset of candidate paths such that no cell is used by
/// two selected paths.
pub struct ConflictResolver<B: MipBackend = BranchAndBound> {
    backend: B,
    config: ResolverConfig,
}

impl ConflictResolver<BranchAndBound> {
    pub fn new(config: ResolverConfig) -> Self {
        Self::with_backend(BranchAndBound::new(), config)
    }
}

impl<B: MipBackend> ConflictResolver<B> {
    pub fn with_backend(backend: B, config: ResolverConfig) -> Self {
        Self { backend, config }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// One selection variable `y_<net>` per candidate, one usage variable
    /// `x_<row>_<col>_<net>` per cell of each candidate tied to it by
    /// `x = y`, one `sum(x) <= 1` per cell, objective `max sum(y)`.
    pub fn build_model(batch: &[RoutePath]) -> ConflictModel {
        let mut program = BinaryProgram::new();
        let selection: Vec<VarId> = batch
            .iter()
            .map(|p| program.add_var(format!("y_{}", p.net)))
            .collect();

        let mut usage: BTreeMap<GridCoord, Vec<VarId>> = BTreeMap::new();
        for (path, &y) in batch.iter().zip(&selection) {
            for &c in &path.cells {
                let x = program.add_var(format!("x_{}_{}_{}", c.row, c.col, path.net));
                program.add_constraint(&[(x, 1), (y, -1)], Sense::Eq, 0);
                usage.entry(c).or_default().push(x);
            }
        }

        let mut contested_cells = 0;
        for vars in usage.values() {
            if vars.len() > 1 {
                contested_cells += 1;
            }
            let terms: Vec<(VarId, i64)> = vars.iter().map(|&x| (x, 1)).collect();
            program.add_constraint(&terms, Sense::Le, 1);
        }

        let objective: Vec<(VarId, i64)> = selection.iter().map(|&y| (y, 1)).collect();
        program.maximize(&objective);

        ConflictModel {
            program,
            selection,
            contested_cells,
        }
    }

    /// Indices into `batch` of the selected candidates, ascending. Solver
    /// failures select nothing.
    pub fn resolve(&self, batch: &[RoutePath]) -> Vec<usize> {
        if batch.is_empty() {
            return Vec::new();
        }

        let model = Self::build_model(batch);
        if model.contested_cells == 0 {
            log::debug!("Resolver: {} candidates, no conflicts", batch.len());
            return (0..batch.len()).collect();
        }

        let limits = SolveLimits {
            time_limit: self.config.time_limit,
            threads: self.config.threads.max(1),
        };
        let start = Instant::now();
        let solution = match self.backend.solve(&model.program, &limits) {
            Ok(s) => s,
            Err(e) => {
                log::warn!("Resolver: solver failed ({}), selecting nothing", e);
                return Vec::new();
            }
        };

        if solution.status == SolveStatus::TimeLimit {
            match self.config.suboptimal {
                SuboptimalPolicy::Accept => log::warn!(
                    "Resolver: time limit of {:.1}s reached, using best selection found ({} of {})",
                    limits.time_limit.as_secs_f64(),
                    solution.objective,
                    batch.len()
                ),
                SuboptimalPolicy::Discard => {
                    log::warn!(
                        "Resolver: time limit of {:.1}s reached, discarding unproven selection",
                        limits.time_limit.as_secs_f64()
                    );
                    return Vec::new();
                }
            }
        }

        let selected: Vec<usize> = model
            .selection
            .iter()
            .enumerate()
            .filter(|&(_, &y)| solution.values.get(y).copied().unwrap_or(false))
            .map(|(i, _)| i)
            .collect();

        log::debug!(
            "Resolver: {} candidates, {} contested cells, selected {} ({:?}) in {}ms",
            batch.len(),
            model.contested_cells,
            selected.len(),
            solution.status,
            start.elapsed().as_millis()
        );
        selected
    }
}
