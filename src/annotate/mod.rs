pub mod background;
pub mod emitter;

pub use background::{resolve_shading, ShadingPlan};
pub use emitter::emit_annotations;

// Annotation keys understood by the renderer.
pub const KEY_CLADE_SIZE: &str = "clade_marker_size";
pub const KEY_CLADE_COLOR: &str = "clade_marker_color";
pub const KEY_BACKGROUND_COLOR: &str = "annotation_background_color";
pub const KEY_ANNOTATION: &str = "annotation";
pub const KEY_FONT_SIZE: &str = "annotation_font_size";

/// Label value meaning "draw the clade's own name".
pub const LABEL_CLADE_NAME: &str = "*";
