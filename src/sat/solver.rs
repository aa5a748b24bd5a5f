use super::cadical::CadicalSolver;
use std::{
    fmt::Display,
    num::{NonZeroIsize, NonZeroUsize},
};

/// A SAT variable: a non-null positive integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Variable(NonZeroUsize);

impl From<usize> for Variable {
    fn from(v: usize) -> Self {
        Variable(NonZeroUsize::new(v).expect("cannot build a variable from zero"))
    }
}

impl From<Variable> for usize {
    fn from(v: Variable) -> Self {
        v.0.into()
    }
}

/// A SAT literal: a non-null integer whose sign is the polarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Literal(NonZeroIsize);

impl Literal {
    /// Builds the literal of a variable with the given polarity.
    pub fn of_var(var: usize, negated: bool) -> Self {
        let v = var as isize;
        Literal::from(if negated { -v } else { v })
    }

    /// The same literal with the polarity flipped.
    pub fn negate(self) -> Self {
        Literal::from(-self.0.get())
    }

    /// The literal's variable.
    pub fn var(&self) -> Variable {
        Variable(self.0.unsigned_abs())
    }

    /// `true` iff the literal is negative.
    pub fn is_negated(&self) -> bool {
        self.0.get() < 0
    }
}

impl From<isize> for Literal {
    fn from(l: isize) -> Self {
        Literal(NonZeroIsize::new(l).expect("cannot build a literal from zero"))
    }
}

impl From<Literal> for isize {
    fn from(l: Literal) -> Self {
        l.0.into()
    }
}

impl Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Builds a clause from a list of integer literals.
#[macro_export]
macro_rules! clause {
    () => (
        vec![] as Vec<$crate::Literal>
    );
    ($($x:expr),+ $(,)?) => (
        [$($x as isize),+].into_iter().map($crate::Literal::from).collect::<Vec<$crate::Literal>>()
    );
}

/// A (possibly partial) assignment of the solver's variables.
#[derive(Debug, PartialEq, Eq)]
pub struct Assignment(Vec<Option<bool>>);

impl Assignment {
    pub(crate) fn new(assignment: Vec<Option<bool>>) -> Self {
        Assignment(assignment)
    }

    /// The value assigned to a variable.
    ///
    /// Returns `None` for unassigned variables and for variables the solver
    /// never saw in a clause.
    pub fn value_of<T>(&self, v: T) -> Option<bool>
    where
        T: Into<Variable>,
    {
        self.0
            .get(usize::from(v.into()) - 1)
            .copied()
            .flatten()
    }

    /// The truth value of a literal under this assignment.
    pub fn lit_value(&self, l: Literal) -> Option<bool> {
        self.value_of(l.var())
            .map(|v| v ^ l.is_negated())
    }
}

/// The outcome of a solver call.
#[derive(Debug, PartialEq, Eq)]
pub enum SolvingResult {
    /// The formula is satisfiable; the model is attached.
    Satisfiable(Assignment),
    /// The formula is unsatisfiable under the given assumptions.
    Unsatisfiable,
    /// The solver gave up, typically because the terminate callback fired.
    Unknown,
}

impl SolvingResult {
    /// Returns the underlying model if one exists.
    ///
    /// # Panics
    ///
    /// Panics on [SolvingResult::Unknown].
    pub fn unwrap_model(self) -> Option<Assignment> {
        match self {
            SolvingResult::Satisfiable(assignment) => Some(assignment),
            SolvingResult::Unsatisfiable => None,
            SolvingResult::Unknown => {
                panic!(r#"cannot unwrap solving result when the solver returned "Unknown""#)
            }
        }
    }

    /// `true` iff the result is [SolvingResult::Satisfiable].
    pub fn is_satisfiable(&self) -> bool {
        matches!(self, SolvingResult::Satisfiable(_))
    }
}

/// An incremental SAT solver.
///
/// The interface mirrors IPASIR: clauses accumulate across solver calls,
/// assumptions hold for a single call, and after an unsatisfiable call the
/// assumptions responsible can be queried.
pub trait SatSolver {
    /// Adds a clause.
    fn add_clause(&mut self, cl: Vec<Literal>);

    /// Solves the accumulated formula.
    fn solve(&mut self) -> SolvingResult;

    /// Solves the accumulated formula under one-shot assumptions.
    fn solve_under_assumptions(&mut self, assumptions: &[Literal]) -> SolvingResult;

    /// The highest variable seen so far.
    fn n_vars(&self) -> usize;

    /// Pre-allocates solver-internal structures up to the given variable.
    fn reserve(&mut self, new_max_id: usize);

    /// After an unsatisfiable call, tests whether an assumption literal is
    /// part of the reason for unsatisfiability.
    fn is_failed_assumption(&mut self, l: Literal) -> bool;

    /// Installs a callback polled during solving; returning `true` aborts
    /// the call with [SolvingResult::Unknown].
    fn set_terminate(&mut self, callback: Box<dyn Fn() -> bool>);
}

/// The default SAT solver (CaDiCaL).
pub fn default_solver() -> Box<dyn SatSolver> {
    Box::new(CadicalSolver::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_var_roundtrip() {
        let v = Variable::from(3usize);
        assert_eq!(3, usize::from(v));
    }

    #[test]
    #[should_panic]
    fn test_var_from_zero() {
        let _ = Variable::from(0usize);
    }

    #[test]
    fn test_lit_of_var() {
        assert_eq!(Literal::from(4), Literal::of_var(4, false));
        assert_eq!(Literal::from(-4), Literal::of_var(4, true));
        assert!(Literal::of_var(4, true).is_negated());
        assert_eq!(Variable::from(4usize), Literal::of_var(4, true).var());
    }

    #[test]
    fn test_negate_lit() {
        assert_eq!(Literal::from(-1), Literal::from(1).negate());
        assert_eq!(Literal::from(1), Literal::from(-1).negate());
    }

    #[test]
    fn test_assignment_values() {
        let a = Assignment::new(vec![Some(true), None, Some(false)]);
        assert_eq!(Some(true), a.value_of(1usize));
        assert_eq!(None, a.value_of(2usize));
        assert_eq!(Some(false), a.value_of(3usize));
        // variables past the solver's range read as unassigned
        assert_eq!(None, a.value_of(17usize));
        assert_eq!(Some(false), a.lit_value(Literal::from(-1)));
        assert_eq!(Some(true), a.lit_value(Literal::from(-3)));
    }

    #[test]
    fn test_solving_result_unwrap_model() {
        assert!(SolvingResult::Satisfiable(Assignment::new(vec![]))
            .unwrap_model()
            .is_some());
        assert!(SolvingResult::Unsatisfiable.unwrap_model().is_none());
    }

    #[test]
    #[should_panic]
    fn test_solving_result_unwrap_model_unknown() {
        SolvingResult::Unknown.unwrap_model();
    }
}
