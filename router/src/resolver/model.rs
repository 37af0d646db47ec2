use std::time::Duration;
use thiserror::Error;

pub type VarId = usize;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sense {
    Le,
    Ge,
    Eq,
}

#[derive(Clone, Debug)]
pub struct LinearConstraint {
    pub terms: Vec<(VarId, i64)>,
    pub sense: Sense,
    pub rhs: i64,
}

impl LinearConstraint {
    pub fn lhs(&self, values: &[bool]) -> i64 {
        self.terms
            .iter()
            .filter(|&&(v, _)| values[v])
            .map(|&(_, c)| c)
            .sum()
    }

    pub fn is_satisfied(&self, values: &[bool]) -> bool {
        let lhs = self.lhs(values);
        match self.sense {
            Sense::Le => lhs <= self.rhs,
            Sense::Ge => lhs >= self.rhs,
            Sense::Eq => lhs == self.rhs,
        }
    }
}

/// A maximization problem over named binary variables with integral linear
/// constraints.
#[derive(Clone, Debug, Default)]
pub struct BinaryProgram {
    names: Vec<String>,
    constraints: Vec<LinearConstraint>,
    objective: Vec<(VarId, i64)>,
}

impl BinaryProgram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_var(&mut self, name: impl Into<String>) -> VarId {
        self.names.push(name.into());
        self.names.len() - 1
    }

    /// Adds `sum(coef * var) <sense> rhs`. Repeated variables are merged.
    pub fn add_constraint(&mut self, terms: &[(VarId, i64)], sense: Sense, rhs: i64) {
        let terms = merge_terms(terms);
        self.constraints.push(LinearConstraint { terms, sense, rhs });
    }

    pub fn maximize(&mut self, terms: &[(VarId, i64)]) {
        self.objective = merge_terms(terms);
    }

    pub fn num_vars(&self) -> usize {
        self.names.len()
    }

    pub fn name(&self, var: VarId) -> &str {
        &self.names[var]
    }

    pub fn constraints(&self) -> &[LinearConstraint] {
        &self.constraints
    }

    pub fn objective(&self) -> &[(VarId, i64)] {
        &self.objective
    }

    pub fn evaluate(&self, values: &[bool]) -> i64 {
        self.objective
            .iter()
            .filter(|&&(v, _)| values[v])
            .map(|&(_, c)| c)
            .sum()
    }

    pub fn is_feasible(&self, values: &[bool]) -> bool {
        values.len() == self.num_vars() && self.constraints.iter().all(|c| c.is_satisfied(values))
    }

    /// Rejects terms that reference variables never added.
    pub fn validate(&self) -> Result<(), SolverError> {
        let n = self.num_vars();
        let bad = self
            .constraints
            .iter()
            .flat_map(|c| c.terms.iter())
            .chain(self.objective.iter())
            .find(|&&(v, _)| v >= n);
        match bad {
            Some(&(v, _)) => Err(SolverError::InvalidModel(format!(
                "variable index {} out of range ({} variables)",
                v, n
            ))),
            None => Ok(()),
        }
    }
}

fn merge_terms(terms: &[(VarId, i64)]) -> Vec<(VarId, i64)> {
    let mut sorted = terms.to_vec();
    sorted.sort_by_key(|&(v, _)| v);
    let mut merged: Vec<(VarId, i64)> = Vec::with_capacity(sorted.len());
    for (v, c) in sorted {
        match merged.last_mut() {
            Some(last) if last.0 == v => last.1 += c,
            _ => merged.push((v, c)),
        }
    }
    merged.retain(|&(_, c)| c != 0);
    merged
}

#[derive(Clone, Copy, Debug)]
pub struct SolveLimits {
    pub time_limit: Duration,
    pub threads: usize,
}

impl Default for SolveLimits {
    fn default() -> Self {
        Self {
            time_limit: Duration::from_secs(30),
            threads: 1,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SolveStatus {
    /// The search finished; no better assignment exists.
    Optimal,
    /// The time budget elapsed; the assignment is the best one found.
    TimeLimit,
}

#[derive(Clone, Debug)]
pub struct MipSolution {
    pub values: Vec<bool>,
    pub objective: i64,
    pub status: SolveStatus,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SolverError {
    #[error("the program has no feasible assignment")]
    Infeasible,
    #[error("no feasible assignment found within the time limit")]
    NoIncumbent,
    #[error("invalid model: {0}")]
    InvalidModel(String),
    #[error("failed to start solver threads: {0}")]
    ThreadPool(String),
}

/// Any solver able to maximize a linear objective over binary variables
/// subject to linear constraints, within a time and thread budget.
pub trait MipBackend: Send + Sync {
    fn solve(&self, program: &BinaryProgram, limits: &SolveLimits)
    -> Result<MipSolution, SolverError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merges_repeated_terms_and_checks_feasibility() {
        let mut p = BinaryProgram::new();
        let a = p.add_var("a");
        let b = p.add_var("b");
        p.add_constraint(&[(a, 1), (b, 1), (a, 1)], Sense::Le, 2);
        p.maximize(&[(a, 1), (b, 1)]);

        assert_eq!(p.constraints()[0].terms, vec![(a, 2), (b, 1)]);
        assert!(p.is_feasible(&[true, false]));
        assert!(!p.is_feasible(&[true, true]));
        assert_eq!(p.evaluate(&[false, true]), 1);
        assert_eq!(p.name(b), "b");
    }

    #[test]
    fn rejects_unknown_variables() {
        let mut p = BinaryProgram::new();
        p.add_var("a");
        p.add_constraint(&[(3, 1)], Sense::Le, 1);
        assert!(matches!(p.validate(), Err(SolverError::InvalidModel(_))));
    }
}
