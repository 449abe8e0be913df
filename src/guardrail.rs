//! Input and output content guardrails.
//!
//! - [`check_input`] admits a question when it mentions a math term or
//!   contains any decimal digit. The digit rule is intentionally broad so
//!   word problems without vocabulary hits still pass.
//! - [`check_output`] replaces the whole response with [`BLOCK_NOTICE`] when
//!   any denylisted term appears. There is no partial redaction.
//!
//! Both checks are case-insensitive substring matches over fixed lexicons.

/// Terms whose presence marks a question as math-related.
pub const MATH_KEYWORDS: &[&str] = &[
    "math",
    "number",
    "calculate",
    "solve",
    "compute",
    "find",
    "simplify",
    "add",
    "sum",
    "plus",
    "subtract",
    "minus",
    "difference",
    "multiply",
    "times",
    "product",
    "divide",
    "quotient",
    "modulo",
    "equation",
    "linear",
    "quadratic",
    "polynomial",
    "factor",
    "variable",
    "expression",
    "root",
    "square root",
    "cube root",
    "derivative",
    "differentiate",
    "integral",
    "limit",
    "function",
    "geometry",
    "triangle",
    "circle",
    "radius",
    "diameter",
    "area",
    "perimeter",
    "volume",
    "angle",
    "trigonometry",
    "sine",
    "cosine",
    "tan",
    "probability",
    "statistics",
    "mean",
    "median",
    "mode",
    "variance",
    "standard deviation",
    "distribution",
    "random",
    "combinatorics",
    "permutation",
    "combination",
    "binomial",
    "matrix",
    "vector",
    "determinant",
    "eigenvalue",
    "prime",
];

/// Terms that block an outgoing response.
pub const UNSAFE_TERMS: &[&str] = &["kill", "hack", "attack", "nsfw", "violence"];

/// Replacement text for a blocked response.
pub const BLOCK_NOTICE: &str = "❌ Output blocked: unsafe content detected.";

/// Message returned to callers whose question fails [`check_input`].
pub const REJECTION_MESSAGE: &str = "❌ Only math-related questions are allowed.";

/// Returns true iff the question looks math-related.
///
/// Any Unicode numeric character counts as a digit, so full-width and
/// non-Latin numerals admit a question just like ASCII ones.
pub fn check_input(question: &str) -> bool {
    if question.chars().any(char::is_numeric) {
        return true;
    }
    let lower = question.to_lowercase();
    MATH_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

/// Returns `text` unchanged, or [`BLOCK_NOTICE`] if it contains an unsafe term.
pub fn check_output(text: &str) -> String {
    let lower = text.to_lowercase();
    match UNSAFE_TERMS.iter().find(|term| lower.contains(*term)) {
        Some(term) => {
            tracing::warn!(term = %term, "output blocked by guardrail");
            BLOCK_NOTICE.to_string()
        }
        None => text.to_string(),
    }
}
