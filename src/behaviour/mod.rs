pub mod algorithm;
pub mod bounds;
pub mod code_block;
pub mod description;
pub mod display;
pub mod family;
pub mod hypothesis;
pub mod variable;

pub use algorithm::{
    AlgorithmDescriptor, AlgorithmKind, AlgorithmParameter, JacobianMode, RungeKuttaMethod,
};
pub use bounds::{BoundsCategory, BoundsDescription, BoundsKind};
pub use code_block::{CodeBlock, CodeBlockRole, FlowKind};
pub use description::{BehaviourDescription, MaterialLaw, SymmetryType};
pub use family::{DefaultVariable, FamilyProfile, FAMILIES};
pub use hypothesis::ModellingHypothesis;
pub use variable::{
    increment_type, is_supported_type, type_flag, TypeFlag, Variable, VariableCategory,
};
