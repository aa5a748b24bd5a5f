use super::solver::{Assignment, Literal, SatSolver, SolvingResult};
use cadical::Solver as CadicalCSolver;

/// Callback adapter polling an external stop condition during solving.
#[derive(Default)]
pub struct StopCondition {
    stop: Option<Box<dyn Fn() -> bool>>,
}

impl cadical::Callbacks for StopCondition {
    fn started(&mut self) {}

    fn terminate(&mut self) -> bool {
        match &self.stop {
            Some(f) => f(),
            None => false,
        }
    }
}

/// A wrapper around the CaDiCaL SAT solver.
///
/// See CaDiCaL on [crates.io](https://crates.io/crates/cadical).
pub struct CadicalSolver {
    solver: CadicalCSolver<StopCondition>,
}

impl Default for CadicalSolver {
    fn default() -> Self {
        CadicalSolver {
            solver: CadicalCSolver::new(),
        }
    }
}

impl SatSolver for CadicalSolver {
    fn add_clause(&mut self, cl: Vec<Literal>) {
        self.solver
            .add_clause(cl.into_iter().map(|l| isize::from(l) as i32))
    }

    fn solve(&mut self) -> SolvingResult {
        self.solve_under_assumptions(&[])
    }

    fn solve_under_assumptions(&mut self, assumptions: &[Literal]) -> SolvingResult {
        match self
            .solver
            .solve_with(assumptions.iter().map(|l| isize::from(*l) as i32))
        {
            Some(true) => {
                let assignment = Assignment::new(
                    (1..=self.solver.max_variable())
                        .map(|i| self.solver.value(i))
                        .collect(),
                );
                SolvingResult::Satisfiable(assignment)
            }
            Some(false) => SolvingResult::Unsatisfiable,
            None => SolvingResult::Unknown,
        }
    }

    fn n_vars(&self) -> usize {
        self.solver.max_variable() as usize
    }

    fn reserve(&mut self, new_max_id: usize) {
        self.solver.reserve(new_max_id as i32);
    }

    fn is_failed_assumption(&mut self, l: Literal) -> bool {
        self.solver.failed(isize::from(l) as i32)
    }

    fn set_terminate(&mut self, callback: Box<dyn Fn() -> bool>) {
        self.solver.set_callbacks(Some(StopCondition {
            stop: Some(callback),
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clause;

    #[test]
    fn test_sat() {
        let mut s = CadicalSolver::default();
        s.add_clause(clause![-1, 2]);
        let assignment = s.solve().unwrap_model().unwrap();
        assert!(assignment.value_of(1usize) == Some(false) || assignment.value_of(2usize) == Some(true))
    }

    #[test]
    fn test_unsat() {
        let mut s = CadicalSolver::default();
        s.add_clause(clause![-1, 2]);
        s.add_clause(clause![-1, -2]);
        s.add_clause(clause![1]);
        assert!(s.solve().unwrap_model().is_none());
    }

    #[test]
    fn test_incremental() {
        let mut s = CadicalSolver::default();
        s.add_clause(clause![-1, 2]);
        assert!(s.solve().is_satisfiable());
        s.add_clause(clause![1, 3]);
        s.add_clause(clause![-2, 3]);
        let assignment = s.solve().unwrap_model().unwrap();
        assert_eq!(Some(true), assignment.value_of(3usize));
        s.add_clause(clause![-3]);
        assert!(s.solve().unwrap_model().is_none());
    }

    #[test]
    fn test_solve_under_assumptions() {
        let mut s = CadicalSolver::default();
        s.add_clause(clause![1]);
        assert!(s
            .solve_under_assumptions(&[Literal::from(-1)])
            .unwrap_model()
            .is_none());
        // the formula itself stays satisfiable
        assert!(s.solve().is_satisfiable());
    }

    #[test]
    fn test_failed_assumptions() {
        let mut s = CadicalSolver::default();
        s.add_clause(clause![1, 2]);
        s.add_clause(clause![-3, -1]);
        s.add_clause(clause![-3, -2]);
        let result = s.solve_under_assumptions(&[Literal::from(3), Literal::from(4)]);
        assert_eq!(SolvingResult::Unsatisfiable, result);
        assert!(s.is_failed_assumption(Literal::from(3)));
        assert!(!s.is_failed_assumption(Literal::from(4)));
    }

    #[test]
    fn test_terminate_callback() {
        // a pigeonhole instance so the solver actually enters its search
        // loop, where the terminate callback is polled
        let mut s = CadicalSolver::default();
        let var = |pigeon: isize, hole: isize| pigeon * 4 + hole + 1;
        for p in 0..5 {
            s.add_clause((0..4).map(|h| Literal::from(var(p, h))).collect());
        }
        for h in 0..4 {
            for p1 in 0..5 {
                for p2 in p1 + 1..5 {
                    s.add_clause(clause![-var(p1, h), -var(p2, h)]);
                }
            }
        }
        s.set_terminate(Box::new(|| true));
        assert_eq!(SolvingResult::Unknown, s.solve());
    }
}
