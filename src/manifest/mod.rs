//! Cognitive Manifest：结构定义、从模型文本中提取 JSON、校验与清洗

pub mod extract;
pub mod sanitize;
pub mod schema;

pub use extract::extract_json;
pub use sanitize::{sanitize_manifest, ManifestLimits, ManifestRejection};
pub use schema::{
    CognitiveManifest, DeltaAction, DeltaPrediction, Intent, NarrationDirective, NarrationStyle,
    ToolCall, DEFAULT_SENTENCES, DEFAULT_STYLE, DEFAULT_TONE,
};
