//! Intermediate representation shared by all generator passes.
//!
//! Pipeline:
//! 1. spec.rs: parse the document
//! 2. model.rs: classify component schemas into models
//! 3. extract.rs: walk paths into operations (naming resolved here)
//! 4. tree.rs: fold operations into the builder tree
//! 5. codegen: emit Rust source from the IR

pub mod api;
pub mod extract;
pub mod model;
pub mod tree;
pub mod types;
pub mod utils;

pub use api::{ApiIr, Exclusion, HttpMethod, Operation, PathParam, QueryParam, ResponseType};
pub use extract::OperationExtractor;
pub use model::{SchemaModeler, TypeError};
pub use tree::{Node, NodeId, PathTree, Segment};
pub use types::{EnumValues, Field, Model, ModelKind, Record, ScalarType, TypeRef};
