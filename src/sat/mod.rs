mod cadical;
pub use self::cadical::CadicalSolver;

mod cnf_writer;
pub use cnf_writer::CnfWriter;

mod solver;
pub use solver::default_solver;
pub use solver::Assignment;
pub use solver::Literal;
pub use solver::SatSolver;
pub use solver::SolvingResult;
pub use solver::Variable;
