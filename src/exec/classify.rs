use crate::foundation::error::FailureKind;

const MALFORMED_GRAPH: &[&str] = &[
    "error initializing complex filters",
    "error parsing filterchain",
    "no such filter",
    "invalid stream specifier",
    "matches no streams",
    "output pad",
    "input pad",
    "filter not found",
    "unconnected output",
    "cannot find a matching stream",
];

const CORRUPT_ASSET: &[&str] = &[
    "invalid data found when processing input",
    "could not find codec parameters",
    "no such file or directory",
    "moov atom not found",
    "error while decoding",
    "decoding error",
    "unsupported codec",
    "impossible to open",
];

const RESOURCE_EXHAUSTED: &[&str] = &[
    "cannot allocate memory",
    "out of memory",
    "no space left on device",
    "too many open files",
    "resource temporarily unavailable",
];

/// Classify a failed invocation from its diagnostic output.
///
/// Resource exhaustion takes precedence, then graph errors, then asset errors.
pub fn classify_failure(diagnostics: &str) -> FailureKind {
    let text = diagnostics.to_ascii_lowercase();
    let hit = |patterns: &[&str]| patterns.iter().any(|p| text.contains(p));
    if hit(RESOURCE_EXHAUSTED) {
        FailureKind::ResourceExhausted
    } else if hit(MALFORMED_GRAPH) {
        FailureKind::MalformedGraph
    } else if hit(CORRUPT_ASSET) {
        FailureKind::CorruptAsset
    } else {
        FailureKind::Unknown
    }
}

#[cfg(test)]
#[path = "../../tests/unit/exec/classify.rs"]
mod tests;
