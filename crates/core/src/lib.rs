//! OpenAPI to Rust SDK generator.
//!
//! Three passes turn one OpenAPI document into a client SDK:
//! - models: one type per component schema
//! - services: one async function per operation, grouped by package
//! - builder: navigation structs mirroring the URL path segments
//!
//! The passes can run as separate invocations. They agree on operation names,
//! package ownership and type mapping because each one rebuilds the same IR
//! from the same spec and [`sdkgen_common::GeneratorConfig`].

pub mod codegen;
pub mod error;
pub mod format;
pub mod ir;
pub mod naming;
pub mod pipeline;
pub mod spec;

pub use error::{Error, FormatFailure, Result};
pub use format::{Artifact, Drift, Formatter, PrettyFormatter, Rendered, WriteSummary};
pub use naming::NamePolicy;
pub use pipeline::{Generator, Pass};
pub use spec::{OpenApiSpec, SpecFormat};
