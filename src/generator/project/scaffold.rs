use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use askama::Template;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::info;

use crate::error::GlueError;
use crate::generator::templates::{
    operation_stubs, rust_ident, scheme_stubs, CargoTomlTemplateData, LibRsTemplateData,
    MainRsTemplateData, SecurityTemplateData, ServiceTemplateData, TestTemplateData,
};
use crate::spec::{self, BuildOptions, ParsedSpec, SpecSource};

pub const DEFAULT_PROJECT_NAME: &str = "generated-project";
pub const DEFAULT_BASE_DIR: &str = ".";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaffoldOptions {
    pub project_name: String,
    /// The project is written to `base_dir/project_name`
    pub base_dir: PathBuf,
    /// Depend on this checkout of the library by path
    pub local_plugin: bool,
}

impl Default for ScaffoldOptions {
    fn default() -> Self {
        Self {
            project_name: DEFAULT_PROJECT_NAME.to_string(),
            base_dir: PathBuf::from(DEFAULT_BASE_DIR),
            local_plugin: false,
        }
    }
}

/// A rendered file, path relative to the project directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub path: PathBuf,
    pub contents: String,
}

impl GeneratedFile {
    /// Hex SHA-256 of the contents.
    pub fn checksum(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.contents.as_bytes());
        hasher
            .finalize()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    }

    fn manifest_key(&self) -> String {
        self.path
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// What `-c` prints instead of writing files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecksumManifest {
    pub project_name: String,
    /// Relative path (`/`-separated) to hex SHA-256
    pub files: BTreeMap<String, String>,
}

/// Renders a service skeleton for a specification.
#[derive(Debug, Clone)]
pub struct ProjectScaffolder {
    parsed: ParsedSpec,
    options: ScaffoldOptions,
}

impl ProjectScaffolder {
    pub fn new(specification: impl Into<SpecSource>, options: ScaffoldOptions) -> Result<Self, GlueError> {
        let parsed = spec::parse(specification, &BuildOptions::default())?;
        Ok(Self::from_parsed(parsed, options))
    }

    pub fn from_parsed(parsed: ParsedSpec, options: ScaffoldOptions) -> Self {
        Self { parsed, options }
    }

    pub fn project_dir(&self) -> PathBuf {
        self.options.base_dir.join(&self.options.project_name)
    }

    fn crate_name(&self) -> String {
        rust_ident(&self.options.project_name, "service")
    }

    /// Render every project file in memory.
    pub fn render(&self) -> Result<Vec<GeneratedFile>, GlueError> {
        let crate_name = self.crate_name();
        let operations = operation_stubs(&self.parsed.routes);
        let schemes = scheme_stubs(&self.parsed.security_schemes);
        let has_security = !schemes.is_empty();

        let local_path = self
            .options
            .local_plugin
            .then(|| env!("CARGO_MANIFEST_DIR").replace('\\', "/"));
        let specification = serde_json::to_string_pretty(self.parsed.original.as_ref())
            .map_err(|e| GlueError::Render(e.to_string()))?;

        let mut files = vec![
            GeneratedFile {
                path: PathBuf::from("Cargo.toml"),
                contents: CargoTomlTemplateData {
                    name: self.options.project_name.clone(),
                    glue_version: env!("CARGO_PKG_VERSION").to_string(),
                    local_path,
                }
                .render()?,
            },
            GeneratedFile {
                path: PathBuf::from("openapi.json"),
                contents: format!("{specification}\n"),
            },
            GeneratedFile {
                path: Path::new("src").join("lib.rs"),
                contents: LibRsTemplateData {
                    name: self.options.project_name.clone(),
                    has_security,
                }
                .render()?,
            },
            GeneratedFile {
                path: Path::new("src").join("main.rs"),
                contents: MainRsTemplateData {
                    crate_name: crate_name.clone(),
                }
                .render()?,
            },
            GeneratedFile {
                path: Path::new("src").join("service.rs"),
                contents: ServiceTemplateData {
                    operations: operations.clone(),
                }
                .render()?,
            },
        ];
        if has_security {
            files.push(GeneratedFile {
                path: Path::new("src").join("security.rs"),
                contents: SecurityTemplateData { schemes }.render()?,
            });
        }
        files.push(GeneratedFile {
            path: Path::new("tests").join("service.rs"),
            contents: TestTemplateData {
                crate_name,
                route_count: self.parsed.routes.len(),
                operations,
            }
            .render()?,
        });
        Ok(files)
    }

    /// Checksums of the rendered files; nothing is written.
    pub fn checksums(&self) -> Result<ChecksumManifest, GlueError> {
        let files = self
            .render()?
            .iter()
            .map(|f| (f.manifest_key(), f.checksum()))
            .collect();
        Ok(ChecksumManifest {
            project_name: self.options.project_name.clone(),
            files,
        })
    }

    /// Write the project, returning its directory.
    pub fn write(&self) -> anyhow::Result<PathBuf> {
        let project_dir = self.project_dir();
        let files = self.render()?;
        for file in &files {
            let target = project_dir.join(&file.path);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory {:?}", parent))?;
            }
            fs::write(&target, &file.contents)
                .with_context(|| format!("Failed to write {:?}", target))?;
            println!("✅ Generated {}", target.display());
        }
        info!(
            project = %self.options.project_name,
            dir = %project_dir.display(),
            files = files.len(),
            routes = self.parsed.routes.len(),
            "Project generated"
        );
        Ok(project_dir)
    }
}
