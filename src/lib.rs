extern crate pest;
#[macro_use]
extern crate pest_derive;

pub mod behaviour;
pub mod codegen;
pub mod driver;
pub mod error;
pub mod integration;
pub mod loader;
pub mod logging;
pub mod options;
pub mod parser;
pub mod registry;

pub use behaviour::BehaviourDescription;
pub use codegen::{generate, SourceFile};
pub use driver::{CompilationReport, Driver};
pub use error::{CompileError, CompileErrors, ErrorKind};
pub use loader::{entry_point_symbol, BehaviourLibrary};
pub use options::CompilerOptions;
pub use parser::{parse_mfront_file, parse_mfront_string};
pub use registry::Registry;
