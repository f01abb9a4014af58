mod clean;
mod core;
mod feedback;
mod test;

pub use clean::clean;
pub use self::core::{BuildRunner, CMAKE, binary_path};
pub use feedback::{FeedbackAnalyzer, LineClassifier, RegexClassifier};
pub use self::test::{TestRunner, output_matches};

/// Compiler and generator lines that mean a failed build.
pub const DEFAULT_FAILURE_MARKER: &str = r"(?i)\b(error(\s|:|$)|failed:)";
