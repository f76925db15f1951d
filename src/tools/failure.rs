// Heuristic classification of command output as a real failure or noise
//
// Shell tools often exit 0 while printing warnings, or print the word
// "error" in contexts that are perfectly fine ("0 errors"). The classifier
// decides whether the loop should treat output as a failure worth
// reporting back to the model with error status.

/// Decides whether command output indicates a genuine failure.
///
/// Implementations must be cheap and infallible; they run on every
/// command result.
pub trait FailureClassifier: Send + Sync {
    fn is_real_failure(&self, output: &str, exit_code: Option<i32>) -> bool;
}

/// Phrase-list classifier.
///
/// A nonzero exit code is always a failure. For exit 0 (or unknown),
/// output is scanned for hard failure phrases, with a carve-out for the
/// benign installer message "requirement already satisfied".
#[derive(Debug, Default)]
pub struct PhraseListClassifier;

const HARD_FAILURE_PHRASES: &[&str] = &[
    "error:",
    "failed",
    "exception",
    "traceback",
    "could not",
    "cannot",
    "unable to",
    "permission denied",
    "access denied",
    "no such file",
    "not found",
    "invalid",
    "syntax error",
    "command not found",
    "no matching distribution found",
    "could not find a version",
    "not recognized",
];

impl FailureClassifier for PhraseListClassifier {
    fn is_real_failure(&self, output: &str, exit_code: Option<i32>) -> bool {
        if let Some(code) = exit_code {
            if code != 0 {
                return true;
            }
        }

        let lower = output.to_lowercase();

        // pip prints "requirement already satisfied" alongside upgrade
        // notices; neither is a failure. Scan only the remaining lines.
        let meaningful: String = lower
            .lines()
            .filter(|l| {
                !l.contains("requirement already satisfied") && !l.contains("[notice]")
            })
            .collect::<Vec<_>>()
            .join("\n");

        HARD_FAILURE_PHRASES.iter().any(|p| meaningful.contains(p))
    }
}
