//! The static side of an HTN problem: signatures, substitutions, operator
//! definitions and the instance-wide name and q-constant tables.

mod signature;
pub use signature::OccSig;
pub use signature::Sig;
pub use signature::USig;
pub use signature::NONE_NAME_ID;

mod substitution;
pub use substitution::Substitution;

mod operator;
pub use operator::Action;
pub use operator::Reduction;
pub use operator::TypeConstraint;

mod instance;
pub use instance::HtnInstance;
pub use instance::BLANK_NAME;
pub use instance::NONE_NAME;
pub use instance::PRIMITIVE_NAME;
pub use instance::ROOT_NAME;
