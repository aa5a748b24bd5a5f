//! StrataSAT is a layered SAT encoding engine for hierarchical task
//! network planning.
//!
//! The planner's grounding and fact-analysis stages populate a grid of
//! [layers](Layer) of [positions](Position) with candidate operators,
//! facts and their supporting relationships; the [Encoding] walks each
//! position once and emits its CNF incrementally to an IPASIR-style SAT
//! backend. When solving under the primitiveness assumptions of the
//! deepest layer fails, the outer planner refines that layer and encoding
//! resumes; when it succeeds, the model decodes into a classical plan and
//! a decomposition tree.

#![warn(missing_docs)]

mod encoding;
pub use encoding::Encoding;
pub use encoding::EncodingOptions;
pub use encoding::SatDriver;
pub use encoding::VariableRegistry;

mod htn;
pub use htn::Action;
pub use htn::HtnInstance;
pub use htn::OccSig;
pub use htn::Reduction;
pub use htn::Sig;
pub use htn::Substitution;
pub use htn::TypeConstraint;
pub use htn::USig;
pub use htn::BLANK_NAME;
pub use htn::NONE_NAME;
pub use htn::NONE_NAME_ID;
pub use htn::PRIMITIVE_NAME;
pub use htn::ROOT_NAME;

mod layers;
pub use layers::Layer;
pub use layers::PathTree;
pub use layers::Position;
pub use layers::VarEntry;
pub use layers::VarKind;

mod plan;
pub use plan::Plan;
pub use plan::PlanItem;

mod sat;
pub use sat::default_solver;
pub use sat::Assignment;
pub use sat::CadicalSolver;
pub use sat::CnfWriter;
pub use sat::Literal;
pub use sat::SatSolver;
pub use sat::SolvingResult;
pub use sat::Variable;
