//! One generation run: spec + config in, rendered artifacts out.
//!
//! Each pass recomputes the IR from the same inputs, so separately invoked
//! passes agree on every name without sharing state.

use std::fmt;
use std::path::{Path, PathBuf};

use sdkgen_common::GeneratorConfig;
use tracing::info;

use crate::codegen::{self, EmitOptions, Emit, SourceFile};
use crate::error::Result;
use crate::format::{self, Artifact, Formatter};
use crate::ir::{ApiIr, Model, OperationExtractor, PathTree, SchemaModeler};
use crate::naming::NamePolicy;
use crate::spec::OpenApiSpec;

/// A generator pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Pass {
    /// One type per component schema.
    Models,
    /// One async function per operation.
    Services,
    /// Navigation structs over the path tree.
    Builder,
}

impl Pass {
    /// Every pass, in the order `all` runs them.
    pub const ALL: [Pass; 3] = [Pass::Models, Pass::Services, Pass::Builder];

    /// Name used on the command line and in file headers.
    pub fn name(&self) -> &'static str {
        match self {
            Pass::Models => "models",
            Pass::Services => "services",
            Pass::Builder => "builder",
        }
    }

    /// Output location when none is given: a directory, or a file for the
    /// builder pass.
    pub fn default_output(&self) -> &'static str {
        match self {
            Pass::Models => "models",
            Pass::Services => "services",
            Pass::Builder => "builder.rs",
        }
    }

    /// Whether the output location names a single file.
    pub fn writes_single_file(&self) -> bool {
        matches!(self, Pass::Builder)
    }
}

impl fmt::Display for Pass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Spec, configuration and emit options for a run.
#[derive(Debug)]
pub struct Generator {
    spec: OpenApiSpec,
    config: GeneratorConfig,
    options: EmitOptions,
}

impl Generator {
    /// Generator over an already parsed document.
    pub fn new(spec: OpenApiSpec, config: GeneratorConfig) -> Self {
        Self {
            spec,
            config,
            options: EmitOptions::default(),
        }
    }

    /// Load the OpenAPI document from disk and the config from `config_path` or the
    /// embedded default.
    pub fn from_paths(spec_path: &Path, config_path: Option<&Path>) -> Result<Self> {
        let config = GeneratorConfig::load_or_embedded(config_path)?;
        let spec = OpenApiSpec::load(spec_path)?;
        Ok(Self::new(spec, config))
    }

    /// Replace the emit options.
    pub fn with_options(mut self, options: EmitOptions) -> Self {
        self.options = options;
        self
    }

    /// Configuration the run was built from.
    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Module paths used in emitted code.
    pub fn options(&self) -> &EmitOptions {
        &self.options
    }

    /// Classified component schemas, sorted by type name.
    pub fn models(&self) -> Vec<Model> {
        SchemaModeler::new(&self.config.types).model_all(&self.spec)
    }

    /// Extracted operations with names and owners resolved.
    pub fn api(&self) -> ApiIr {
        let policy = NamePolicy::new(&self.config);
        OperationExtractor::new(&self.spec, &policy, &self.config.types).extract()
    }

    /// Path tree over [`Generator::api`].
    pub fn path_tree(&self) -> PathTree {
        PathTree::build(&self.api().operations)
    }

    /// Unformatted source files of one pass, paths relative to its output.
    pub fn sources(&self, pass: Pass) -> Vec<SourceFile> {
        let models = self.models();
        match pass {
            Pass::Models => codegen::models::generate(&models),
            Pass::Services => codegen::services::generate(&self.api(), &models, &self.options),
            Pass::Builder => vec![SourceFile {
                path: PathBuf::from(pass.default_output()),
                module: codegen::builder::generate(
                    &self.api(),
                    &models,
                    &self.config.builder.root_segment,
                    &self.options,
                ),
            }],
        }
    }

    /// Emit and format every file of `pass` for the given output location.
    pub fn render(&self, pass: Pass, output: &Path, formatter: &dyn Formatter) -> Vec<Artifact> {
        let header = format::header(pass.name(), &self.config.fingerprint());
        let artifacts: Vec<Artifact> = self
            .sources(pass)
            .into_iter()
            .map(|file| {
                let path = if pass.writes_single_file() {
                    output.to_path_buf()
                } else {
                    output.join(&file.path)
                };
                Artifact::render(path, &header, &file.module.emit(), formatter)
            })
            .collect();
        info!(pass = %pass, files = artifacts.len(), output = %output.display(), "Rendered pass");
        artifacts
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::format::PrettyFormatter;

    const SPEC: &str = r##"
openapi: 3.0.0
paths:
  /v4/zones/{zoneId}:
    get:
      operationId: getZone
      tags: [zone]
      responses:
        "200":
          content:
            application/json:
              schema: { $ref: "#/components/schemas/Zone" }
components:
  schemas:
    Zone:
      type: object
      required: [id]
      properties:
        id: { type: string }
"##;

    fn generator() -> Generator {
        let spec = OpenApiSpec::parse(SPEC, None, "inline").unwrap();
        Generator::new(spec, GeneratorConfig::embedded().unwrap())
    }

    #[test]
    fn test_builder_pass_targets_output_file() {
        let artifacts = generator().render(Pass::Builder, Path::new("sdk/nav.rs"), &PrettyFormatter);
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].path, PathBuf::from("sdk/nav.rs"));
        let text = artifacts[0].contents().unwrap();
        assert!(text.starts_with("// Code generated by sdkgen builder. DO NOT EDIT.\n"));
        assert!(text.contains("pub struct ZonesZoneIdBuilder<'a>"));
    }

    #[test]
    fn test_directory_passes_join_relative_paths() {
        let artifacts = generator().render(Pass::Models, Path::new("out"), &PrettyFormatter);
        let paths: Vec<_> = artifacts.iter().map(|a| a.path.clone()).collect();
        assert_eq!(paths, vec![PathBuf::from("out/zone.rs"), PathBuf::from("out/mod.rs")]);
    }

    #[test]
    fn test_header_carries_config_fingerprint() {
        let g = generator();
        let artifacts = g.render(Pass::Services, Path::new("svc"), &PrettyFormatter);
        let fingerprint = g.config().fingerprint();
        assert!(!artifacts.is_empty());
        for artifact in &artifacts {
            let text = artifact.contents().unwrap();
            assert!(text.contains(&format!("// sdkgen config: {fingerprint}\n")));
        }
    }

    #[test]
    fn test_pass_names() {
        assert_eq!(Pass::ALL.map(|p| p.name()), ["models", "services", "builder"]);
        assert_eq!(Pass::Builder.default_output(), "builder.rs");
        assert_eq!(Pass::Models.to_string(), "models");
    }
}
