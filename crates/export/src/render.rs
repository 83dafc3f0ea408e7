//! Rendering of partial-export patterns against job data

/// Renders a configured pattern into the concrete string for one job
///
/// Implementations must be pure: the same pattern and data always render
/// to the same string.
pub trait PatternRenderer {
    /// Render `pattern` using the job's `data`
    fn render(&self, pattern: &str, data: &serde_json::Value) -> String;
}

/// Renderer that returns patterns unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct Verbatim;

impl PatternRenderer for Verbatim {
    fn render(&self, pattern: &str, _data: &serde_json::Value) -> String {
        pattern.to_string()
    }
}

impl<F> PatternRenderer for F
where
    F: Fn(&str, &serde_json::Value) -> String,
{
    fn render(&self, pattern: &str, data: &serde_json::Value) -> String {
        self(pattern, data)
    }
}
