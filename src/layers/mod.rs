//! The hierarchical grid of the encoding: layers of positions, each
//! position carrying its candidate operators, facts and supports.

mod layer;
pub use layer::Layer;

mod path_tree;
pub use path_tree::PathTree;

mod position;
pub use position::Position;
pub use position::VarEntry;
pub use position::VarKind;
