mod scaffold;

pub use scaffold::{
    ChecksumManifest, GeneratedFile, ProjectScaffolder, ScaffoldOptions, DEFAULT_BASE_DIR,
    DEFAULT_PROJECT_NAME,
};
