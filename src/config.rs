//! Compiler-wide configuration, mirroring the teacher's `Config`/`RuntimeMetadata`.

/// Options governing instantiation and flattening that aren't expressible
/// as Modelica source itself.
#[derive(Debug, Clone)]
pub struct CompilerConfig {
    /// §9 open question: array-shape mismatches currently warn and proceed
    /// with best-effort element reuse. Setting this promotes that to a
    /// hard `ArraySplitMismatch` diagnostic at `Severity::Error` (still
    /// non-fatal — see DESIGN.md).
    pub strict_array_shapes: bool,

    /// Override the embedded annotation schema source (§4.7, §6). `None`
    /// uses `annotation::DEFAULT_SCHEMA_SOURCE`.
    pub annotation_schema_source: Option<String>,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        CompilerConfig {
            strict_array_shapes: false,
            annotation_schema_source: None,
        }
    }
}
