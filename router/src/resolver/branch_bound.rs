use super::model::{
    BinaryProgram, MipBackend, MipSolution, Sense, SolveLimits, SolveStatus, SolverError, VarId,
};
use rayon::prelude::*;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, Instant};

const CLOCK_CHECK_INTERVAL: u64 = 256;
const MAX_SPLIT_DEPTH: u32 = 10;
const UNASSIGNED: i8 = -1;

/// Depth-first branch-and-bound over binary variables.
///
/// Every assignment is followed by bound propagation on the constraints it
/// touches, which fixes any variable whose other value would make a
/// constraint unsatisfiable. Nodes whose optimistic objective cannot beat the
/// incumbent are pruned. With more than one thread the tree is cut into
/// subtrees at a fixed depth and the subtrees are searched on a rayon pool,
/// sharing the best objective found so far.
#[derive(Clone, Copy, Debug, Default)]
pub struct BranchAndBound;

impl BranchAndBound {
    pub fn new() -> Self {
        Self
    }
}

impl MipBackend for BranchAndBound {
    fn solve(
        &self,
        program: &BinaryProgram,
        limits: &SolveLimits,
    ) -> Result<MipSolution, SolverError> {
        program.validate()?;
        let start = Instant::now();
        let layout = Layout::new(program);
        let hard_limit = limits
            .time_limit
            .checked_mul(2)
            .and_then(|d| d.checked_add(Duration::from_millis(100)))
            .unwrap_or(Duration::MAX);
        let shared = Shared {
            deadline: deadline_after(start, limits.time_limit),
            hard_deadline: deadline_after(start, hard_limit),
            best: AtomicI64::new(i64::MIN),
        };

        let mut root = Search::new(&layout);
        if !root.propagate_all() {
            return Err(SolverError::Infeasible);
        }

        let threads = limits.threads.max(1);
        let depth = split_depth(threads, root.unassigned_branch_vars());

        let results: Vec<Option<WorkerResult>> = if depth == 0 {
            vec![Some(root.run(&shared))]
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map_err(|e| SolverError::ThreadPool(e.to_string()))?;
            let prefix_vars = root.first_unassigned(depth as usize);
            pool.install(|| {
                (0..1u32 << depth)
                    .into_par_iter()
                    .map(|bits| {
                        let mut node = root.clone();
                        node.apply_prefix(&prefix_vars, bits)
                            .then(|| node.run(&shared))
                    })
                    .collect()
            })
        };

        let complete = results.iter().flatten().all(|r| r.complete);
        let mut best: Option<(i64, Vec<bool>)> = None;
        for (objective, values) in results.into_iter().flatten().filter_map(|r| r.best) {
            if best.as_ref().is_none_or(|(b, _)| objective > *b) {
                best = Some((objective, values));
            }
        }

        log::debug!(
            "Branch-and-bound: {} vars, {} constraints, {} subtrees, complete: {}, {:.3}s",
            program.num_vars(),
            program.constraints().len(),
            1u32 << depth,
            complete,
            start.elapsed().as_secs_f64()
        );

        match best {
            Some((objective, values)) => Ok(MipSolution {
                values,
                objective,
                status: if complete {
                    SolveStatus::Optimal
                } else {
                    SolveStatus::TimeLimit
                },
            }),
            None if complete => Err(SolverError::Infeasible),
            None => Err(SolverError::NoIncumbent),
        }
    }
}

// Budgets too large to represent as an `Instant` never expire.
fn deadline_after(start: Instant, budget: Duration) -> Instant {
    start.checked_add(budget).unwrap_or_else(|| {
        let mut far = Duration::from_secs(100 * 365 * 24 * 3600);
        loop {
            if let Some(t) = start.checked_add(far) {
                return t;
            }
            far /= 2;
        }
    })
}

fn split_depth(threads: usize, free_vars: usize) -> u32 {
    if threads <= 1 {
        return 0;
    }
    let depth = (threads as u32).next_power_of_two().trailing_zeros() + 2;
    depth.min(MAX_SPLIT_DEPTH).min(free_vars as u32)
}

/// Read-only indexes over the program, shared by every worker.
struct Layout<'a> {
    program: &'a BinaryProgram,
    occurrences: Vec<Vec<(usize, i64)>>,
    obj_coef: Vec<i64>,
    branch_order: Vec<VarId>,
}

impl<'a> Layout<'a> {
    fn new(program: &'a BinaryProgram) -> Self {
        let n = program.num_vars();
        let mut occurrences = vec![Vec::new(); n];
        for (ci, c) in program.constraints().iter().enumerate() {
            for &(v, coef) in &c.terms {
                occurrences[v].push((ci, coef));
            }
        }
        let mut obj_coef = vec![0; n];
        for &(v, coef) in program.objective() {
            obj_coef[v] += coef;
        }

        // Objective variables first, largest weight first; the rest follow in
        // index order and are normally fixed by propagation.
        let mut branch_order: Vec<VarId> = (0..n).collect();
        branch_order.sort_by_key(|&v| (obj_coef[v] == 0, std::cmp::Reverse(obj_coef[v].abs()), v));

        Self {
            program,
            occurrences,
            obj_coef,
            branch_order,
        }
    }
}

struct Shared {
    deadline: Instant,
    hard_deadline: Instant,
    best: AtomicI64,
}

struct WorkerResult {
    best: Option<(i64, Vec<bool>)>,
    complete: bool,
}

struct Frame {
    pos: usize,
    var: VarId,
    value: bool,
    alt_tried: bool,
    mark: usize,
}

#[derive(Clone)]
struct Search<'a> {
    layout: &'a Layout<'a>,
    values: Vec<i8>,
    fixed: Vec<i64>,
    min_rest: Vec<i64>,
    max_rest: Vec<i64>,
    obj_fixed: i64,
    obj_rest: i64,
    trail: Vec<VarId>,
    queue: Vec<usize>,
    queued: Vec<bool>,
}

impl<'a> Search<'a> {
    fn new(layout: &'a Layout<'a>) -> Self {
        let constraints = layout.program.constraints();
        let mut min_rest = vec![0; constraints.len()];
        let mut max_rest = vec![0; constraints.len()];
        for (ci, c) in constraints.iter().enumerate() {
            for &(_, coef) in &c.terms {
                if coef > 0 {
                    max_rest[ci] += coef;
                } else {
                    min_rest[ci] += coef;
                }
            }
        }
        Self {
            layout,
            values: vec![UNASSIGNED; layout.program.num_vars()],
            fixed: vec![0; constraints.len()],
            min_rest,
            max_rest,
            obj_fixed: 0,
            obj_rest: layout.obj_coef.iter().filter(|&&c| c > 0).sum(),
            trail: Vec::new(),
            queue: Vec::new(),
            queued: vec![false; constraints.len()],
        }
    }

    fn unassigned_branch_vars(&self) -> usize {
        self.values.iter().filter(|&&v| v == UNASSIGNED).count()
    }

    fn first_unassigned(&self, count: usize) -> Vec<VarId> {
        self.layout
            .branch_order
            .iter()
            .copied()
            .filter(|&v| self.values[v] == UNASSIGNED)
            .take(count)
            .collect()
    }

    /// Fixes `vars` to the choices encoded in `bits` (most significant bit
    /// first; a 0 bit picks the preferred value). Returns false when the
    /// subtree is empty.
    fn apply_prefix(&mut self, vars: &[VarId], bits: u32) -> bool {
        let k = vars.len();
        for (i, &var) in vars.iter().enumerate() {
            let alt = (bits >> (k - 1 - i)) & 1 == 1;
            let value = self.preferred(var) ^ alt;
            match self.values[var] {
                UNASSIGNED => {
                    self.assign(var, value);
                    if !self.propagate() {
                        return false;
                    }
                }
                v if (v == 1) != value => return false,
                _ => {}
            }
        }
        true
    }

    #[inline]
    fn preferred(&self, var: VarId) -> bool {
        self.layout.obj_coef[var] > 0
    }

    fn assign(&mut self, var: VarId, value: bool) {
        let layout = self.layout;
        self.values[var] = value as i8;
        self.trail.push(var);
        for &(ci, coef) in &layout.occurrences[var] {
            if coef > 0 {
                self.max_rest[ci] -= coef;
            } else {
                self.min_rest[ci] -= coef;
            }
            if value {
                self.fixed[ci] += coef;
            }
            if !self.queued[ci] {
                self.queued[ci] = true;
                self.queue.push(ci);
            }
        }
        let oc = layout.obj_coef[var];
        if oc > 0 {
            self.obj_rest -= oc;
        }
        if value {
            self.obj_fixed += oc;
        }
    }

    fn undo_to(&mut self, mark: usize) {
        let layout = self.layout;
        while self.trail.len() > mark {
            let Some(var) = self.trail.pop() else { break };
            let value = self.values[var] == 1;
            for &(ci, coef) in &layout.occurrences[var] {
                if coef > 0 {
                    self.max_rest[ci] += coef;
                } else {
                    self.min_rest[ci] += coef;
                }
                if value {
                    self.fixed[ci] -= coef;
                }
            }
            let oc = layout.obj_coef[var];
            if oc > 0 {
                self.obj_rest += oc;
            }
            if value {
                self.obj_fixed -= oc;
            }
            self.values[var] = UNASSIGNED;
        }
    }

    fn propagate_all(&mut self) -> bool {
        for ci in 0..self.queued.len() {
            if !self.queued[ci] {
                self.queued[ci] = true;
                self.queue.push(ci);
            }
        }
        self.propagate()
    }

    fn propagate(&mut self) -> bool {
        let layout = self.layout;
        let constraints = layout.program.constraints();
        while let Some(ci) = self.queue.pop() {
            self.queued[ci] = false;
            let c = &constraints[ci];
            let feasible = |lo: i64, hi: i64| match c.sense {
                Sense::Le => lo <= c.rhs,
                Sense::Ge => hi >= c.rhs,
                Sense::Eq => lo <= c.rhs && hi >= c.rhs,
            };

            let mut lo = self.fixed[ci] + self.min_rest[ci];
            let mut hi = self.fixed[ci] + self.max_rest[ci];
            if !feasible(lo, hi) {
                self.clear_queue();
                return false;
            }

            for &(var, coef) in &c.terms {
                if self.values[var] != UNASSIGNED {
                    continue;
                }
                let (one, zero) = if coef > 0 {
                    ((lo + coef, hi), (lo, hi - coef))
                } else {
                    ((lo, hi + coef), (lo - coef, hi))
                };
                let forced = match (feasible(one.0, one.1), feasible(zero.0, zero.1)) {
                    (true, true) => continue,
                    (true, false) => true,
                    (false, true) => false,
                    (false, false) => {
                        self.clear_queue();
                        return false;
                    }
                };
                self.assign(var, forced);
                lo = self.fixed[ci] + self.min_rest[ci];
                hi = self.fixed[ci] + self.max_rest[ci];
            }
        }
        true
    }

    fn clear_queue(&mut self) {
        for ci in self.queue.drain(..) {
            self.queued[ci] = false;
        }
    }

    fn next_branch(&self, from: usize) -> Option<(usize, VarId)> {
        self.layout.branch_order[from..]
            .iter()
            .enumerate()
            .find(|&(_, &v)| self.values[v] == UNASSIGNED)
            .map(|(i, &v)| (from + i, v))
    }

    fn run(&mut self, shared: &Shared) -> WorkerResult {
        let mut best: Option<(i64, Vec<bool>)> = None;
        let mut stack: Vec<Frame> = Vec::new();
        let mut nodes: u64 = 0;

        loop {
            nodes += 1;
            if nodes % CLOCK_CHECK_INTERVAL == 0 {
                let now = Instant::now();
                let has_incumbent =
                    best.is_some() || shared.best.load(Ordering::Relaxed) != i64::MIN;
                if (has_incumbent && now >= shared.deadline) || now >= shared.hard_deadline {
                    return WorkerResult {
                        best,
                        complete: false,
                    };
                }
            }

            if self.can_improve(best.as_ref().map(|(b, _)| *b), shared) {
                let from = stack.last().map_or(0, |f| f.pos + 1);
                match self.next_branch(from) {
                    None => {
                        let values: Vec<bool> = self.values.iter().map(|&v| v == 1).collect();
                        debug_assert!(self.layout.program.is_feasible(&values));
                        shared.best.fetch_max(self.obj_fixed, Ordering::Relaxed);
                        best = Some((self.obj_fixed, values));
                    }
                    Some((pos, var)) => {
                        let value = self.preferred(var);
                        let mark = self.trail.len();
                        stack.push(Frame {
                            pos,
                            var,
                            value,
                            alt_tried: false,
                            mark,
                        });
                        self.assign(var, value);
                        if self.propagate() {
                            continue;
                        }
                    }
                }
            }

            // Backtrack to the deepest frame with an untried value.
            loop {
                let Some(frame) = stack.last_mut() else {
                    return WorkerResult {
                        best,
                        complete: true,
                    };
                };
                let (var, alt, mark, tried) = (frame.var, !frame.value, frame.mark, frame.alt_tried);
                frame.alt_tried = true;
                self.undo_to(mark);
                if tried {
                    stack.pop();
                    continue;
                }
                self.assign(var, alt);
                if self.propagate() {
                    break;
                }
            }
        }
    }

    /// A node is worth expanding only if its optimistic objective beats this
    /// worker's incumbent and is not below any other worker's.
    fn can_improve(&self, local_best: Option<i64>, shared: &Shared) -> bool {
        let bound = self.obj_fixed + self.obj_rest;
        if local_best.is_some_and(|b| bound <= b) {
            return false;
        }
        bound >= shared.best.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits(threads: usize) -> SolveLimits {
        SolveLimits {
            time_limit: Duration::from_secs(10),
            threads,
        }
    }

    /// Maximum independent set on a 5-cycle is 2.
    fn five_cycle() -> BinaryProgram {
        let mut p = BinaryProgram::new();
        let vars: Vec<VarId> = (0..5).map(|i| p.add_var(format!("v{}", i))).collect();
        for i in 0..5 {
            p.add_constraint(&[(vars[i], 1), (vars[(i + 1) % 5], 1)], Sense::Le, 1);
        }
        let obj: Vec<(VarId, i64)> = vars.iter().map(|&v| (v, 1)).collect();
        p.maximize(&obj);
        p
    }

    #[test]
    fn solves_independent_set_to_optimality() {
        for threads in [1, 4] {
            let p = five_cycle();
            let sol = BranchAndBound::new().solve(&p, &limits(threads)).unwrap();
            assert_eq!(sol.status, SolveStatus::Optimal);
            assert_eq!(sol.objective, 2);
            assert!(p.is_feasible(&sol.values));
        }
    }

    #[test]
    fn parallel_and_sequential_agree() {
        let p = five_cycle();
        let seq = BranchAndBound::new().solve(&p, &limits(1)).unwrap();
        let par = BranchAndBound::new().solve(&p, &limits(3)).unwrap();
        assert_eq!(seq.values, par.values);
    }

    #[test]
    fn equality_links_propagate() {
        // y = x1 = x2, x1 + z <= 1, maximize y + z with weight on y.
        let mut p = BinaryProgram::new();
        let y = p.add_var("y");
        let x1 = p.add_var("x1");
        let x2 = p.add_var("x2");
        let z = p.add_var("z");
        p.add_constraint(&[(x1, 1), (y, -1)], Sense::Eq, 0);
        p.add_constraint(&[(x2, 1), (y, -1)], Sense::Eq, 0);
        p.add_constraint(&[(x1, 1), (z, 1)], Sense::Le, 1);
        p.maximize(&[(y, 2), (z, 1)]);

        let sol = BranchAndBound::new().solve(&p, &limits(1)).unwrap();
        assert_eq!(sol.objective, 2);
        assert_eq!(sol.values, vec![true, true, true, false]);
    }

    #[test]
    fn reports_infeasible_programs() {
        let mut p = BinaryProgram::new();
        let a = p.add_var("a");
        p.add_constraint(&[(a, 1)], Sense::Ge, 2);
        p.maximize(&[(a, 1)]);
        assert_eq!(
            BranchAndBound::new().solve(&p, &limits(1)).unwrap_err(),
            SolverError::Infeasible
        );
    }

    /// Dense random graph on 200 vertices; far too large to prove optimal in
    /// a fraction of a second.
    fn dense_independent_set() -> BinaryProgram {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        let mut rng = StdRng::seed_from_u64(2024);
        let mut p = BinaryProgram::new();
        let vars: Vec<VarId> = (0..200).map(|i| p.add_var(format!("v{}", i))).collect();
        for i in 0..vars.len() {
            for j in i + 1..vars.len() {
                if rng.gen_bool(0.1) {
                    p.add_constraint(&[(vars[i], 1), (vars[j], 1)], Sense::Le, 1);
                }
            }
        }
        let obj: Vec<(VarId, i64)> = vars.iter().map(|&v| (v, 1)).collect();
        p.maximize(&obj);
        p
    }

    #[test]
    fn time_limit_returns_best_feasible_assignment() {
        let p = dense_independent_set();
        let budget = Duration::from_millis(200);
        for threads in [1, 4] {
            let start = Instant::now();
            let sol = BranchAndBound::new()
                .solve(
                    &p,
                    &SolveLimits {
                        time_limit: budget,
                        threads,
                    },
                )
                .unwrap();
            let elapsed = start.elapsed();

            assert_eq!(sol.status, SolveStatus::TimeLimit, "threads {}", threads);
            assert!(p.is_feasible(&sol.values));
            assert_eq!(sol.objective, p.evaluate(&sol.values));
            assert!(sol.objective > 0);
            assert!(elapsed < budget * 2, "threads {}: {:?}", threads, elapsed);
        }
    }

    #[test]
    fn huge_time_limit_does_not_overflow() {
        let p = five_cycle();
        for threads in [1, 2] {
            let sol = BranchAndBound::new()
                .solve(
                    &p,
                    &SolveLimits {
                        time_limit: Duration::MAX,
                        threads,
                    },
                )
                .unwrap();
            assert_eq!(sol.status, SolveStatus::Optimal);
            assert_eq!(sol.objective, 2);
        }
    }

    #[test]
    fn ge_constraints_force_values() {
        let mut p = BinaryProgram::new();
        let a = p.add_var("a");
        let b = p.add_var("b");
        p.add_constraint(&[(a, 1), (b, 1)], Sense::Ge, 1);
        p.maximize(&[(a, -1), (b, -3)]);
        let sol = BranchAndBound::new().solve(&p, &limits(2)).unwrap();
        assert_eq!(sol.values, vec![true, false]);
        assert_eq!(sol.objective, -1);
    }
}
