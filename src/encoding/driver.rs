use crate::sat::{CnfWriter, Literal, SatSolver, SolvingResult};
use log::info;
use std::io;

/// The incremental interface between the encoder and the SAT backend.
///
/// Clauses are delivered literal by literal (the `append`/`end` pair) or
/// whole (`add`); every literal is also mirrored into the optional CNF
/// dump. Assumptions are one-shot: the list is cleared by each solve call,
/// but the most recent non-empty batch is remembered so it can be appended
/// to the dump at shutdown.
pub struct SatDriver {
    solver: Box<dyn SatSolver>,
    mirror: Option<CnfWriter>,
    current: Vec<Literal>,
    assumptions: Vec<Literal>,
    last_assumptions: Vec<isize>,
    n_clauses: usize,
    n_lits: usize,
}

impl SatDriver {
    /// Builds a driver over a solver, optionally mirroring to a CNF dump.
    pub fn new(solver: Box<dyn SatSolver>, mirror: Option<CnfWriter>) -> Self {
        SatDriver {
            solver,
            mirror,
            current: Vec::new(),
            assumptions: Vec::new(),
            last_assumptions: Vec::new(),
            n_clauses: 0,
            n_lits: 0,
        }
    }

    /// Adds a complete clause.
    pub fn add(&mut self, lits: &[isize]) {
        debug_assert!(self.current.is_empty(), "clause under construction");
        for l in lits {
            self.append(*l);
        }
        self.end();
    }

    /// Adds a unit clause.
    pub fn add_unit(&mut self, lit: isize) {
        self.add(&[lit]);
    }

    /// Appends a literal to the clause under construction.
    pub fn append(&mut self, lit: isize) {
        debug_assert_ne!(0, lit);
        self.current.push(Literal::from(lit));
        if let Some(m) = &mut self.mirror {
            m.write_lit(lit);
        }
        self.n_lits += 1;
    }

    /// Appends several literals to the clause under construction.
    pub fn append_all(&mut self, lits: &[isize]) {
        for l in lits {
            self.append(*l);
        }
    }

    /// Terminates the clause under construction.
    pub fn end(&mut self) {
        assert!(!self.current.is_empty(), "ending an empty clause");
        if let Some(m) = &mut self.mirror {
            m.write_lit(0);
        }
        let cl = std::mem::take(&mut self.current);
        self.solver.add_clause(cl);
        self.n_clauses += 1;
    }

    /// Registers an assumption for the next solve call.
    pub fn assume(&mut self, lit: isize) {
        if self.assumptions.is_empty() {
            self.last_assumptions.clear();
        }
        self.assumptions.push(Literal::from(lit));
        self.last_assumptions.push(lit);
    }

    /// Solves under the registered assumptions, clearing them.
    pub fn solve(&mut self) -> SolvingResult {
        info!(
            "solving formula with {} clauses ({} literals) under {} assumptions",
            self.n_clauses,
            self.n_lits,
            self.assumptions.len()
        );
        let assumptions = std::mem::take(&mut self.assumptions);
        if assumptions.is_empty() {
            self.last_assumptions.clear();
        }
        self.solver.solve_under_assumptions(&assumptions)
    }

    /// After an unsatisfiable solve, tests whether the assumption on `var`
    /// was part of the reason.
    pub fn is_failed(&mut self, lit: isize) -> bool {
        self.solver.is_failed_assumption(Literal::from(lit))
    }

    /// Installs the cooperative termination callback.
    pub fn set_terminate(&mut self, callback: Box<dyn Fn() -> bool>) {
        self.solver.set_terminate(callback);
    }

    /// The number of clauses added so far.
    pub fn n_clauses(&self) -> usize {
        self.n_clauses
    }

    /// The number of literals added so far (clause terminators excluded).
    pub fn n_lits(&self) -> usize {
        self.n_lits
    }

    /// The number of assumptions registered for the next solve.
    pub fn n_assumptions(&self) -> usize {
        self.assumptions.len()
    }

    /// `true` iff an assumption batch survives from the last solve.
    pub fn has_last_assumptions(&self) -> bool {
        !self.last_assumptions.is_empty()
    }

    /// Writes the CNF dump, if one was requested.
    ///
    /// Unless `skip_assumptions` is set, the last assumption batch is
    /// appended as unit clauses.
    pub fn finish(&mut self, max_var: usize, skip_assumptions: bool) -> io::Result<()> {
        if let Some(m) = self.mirror.take() {
            let assumptions: &[isize] = if skip_assumptions {
                &[]
            } else {
                &self.last_assumptions
            };
            m.finish(max_var, assumptions)?;
        }
        Ok(())
    }
}
