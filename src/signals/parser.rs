//! Signal parsing from agent output.
//!
//! Each kind has its own pattern, built from its tag and arity:
//! - `###PRD_COMPLETE###` (no arguments)
//! - `###VERIFIED:rec-1###` (one argument)
//! - `###REJECTED:rec-1:reason###` (two arguments)
//!
//! Record ids never contain whitespace, `:` or `#`; free-text arguments never
//! contain `#`. Matches from all patterns are merged back into text order.
//! A match whose closing `###` is the opening of the next marker is an
//! unterminated marker and is dropped. Captured arguments are trimmed;
//! markers with the wrong arity or empty arguments are ignored.

use super::types::{Signal, SignalKind, SignalSet};
use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;

const RECORD_ARG: &str = r"\s*([^#:\s]+)\s*";
const TEXT_ARG: &str = "([^#]+)";

// One compiled pattern per kind, built once.
static SIGNAL_PATTERNS: LazyLock<Vec<(SignalKind, Regex)>> = LazyLock::new(|| {
    SignalKind::ALL
        .into_iter()
        .map(|kind| {
            let tag = kind.tag();
            let pattern = match kind.arity() {
                0 => format!("###{tag}###"),
                1 if kind.first_arg_is_record() => format!("###{tag}:{RECORD_ARG}###"),
                1 => format!("###{tag}:{TEXT_ARG}###"),
                _ => format!("###{tag}:{RECORD_ARG}:{TEXT_ARG}###"),
            };
            (kind, Regex::new(&pattern).unwrap())
        })
        .collect()
});

static WORKING_ON_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:\*\*)?WORKING ON:\s*([a-z0-9-]+)(?:\*\*)?").unwrap());

/// Parser for extracting control signals from agent output.
pub struct SignalParser {
    /// Whether to log each signal as it is found
    verbose: bool,
}

impl SignalParser {
    /// Create a new signal parser.
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Extract all signals from the given text, in the order they appear.
    pub fn parse(&self, text: &str) -> SignalSet {
        if !text.contains("###") {
            return SignalSet::new();
        }

        let mut found: Vec<(Range<usize>, Signal)> = Vec::new();
        for (kind, regex) in SIGNAL_PATTERNS.iter() {
            for cap in regex.captures_iter(text) {
                let Some(whole) = cap.get(0) else { continue };
                let args: Vec<&str> = cap
                    .iter()
                    .skip(1)
                    .flatten()
                    .map(|m| m.as_str().trim())
                    .collect();
                match Signal::from_args(*kind, &args) {
                    Some(signal) => found.push((whole.range(), signal)),
                    None => tracing::debug!(kind = %kind, "ignoring marker with empty argument"),
                }
            }
        }

        found.sort_by_key(|(span, _)| span.start);
        let starts: Vec<usize> = found.iter().map(|(span, _)| span.start).collect();

        found
            .into_iter()
            .enumerate()
            .filter(|(i, (span, signal))| {
                let closed = starts.get(i + 1).is_none_or(|next| span.end <= *next);
                if !closed {
                    tracing::debug!(kind = %signal.kind, "ignoring unterminated marker");
                }
                closed
            })
            .map(|(_, (_, signal))| {
                if self.verbose {
                    tracing::info!(signal = %signal, "signal detected");
                }
                signal
            })
            .collect()
    }
}

/// Convenience function to extract signals without creating a parser.
pub fn extract_signals(text: &str) -> SignalSet {
    SignalParser::new(false).parse(text)
}

/// Extract the record id from a `WORKING ON: <id>` display marker, if present.
///
/// This marker is for live display only and never produces a control signal.
pub fn extract_working_on(text: &str) -> Option<String> {
    WORKING_ON_REGEX
        .captures(text)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_repeated_verified_in_order() {
        let signals =
            extract_signals("Some prose ###VERIFIED:prd-12### more prose ###VERIFIED:prd-7###");
        let ids: Vec<_> = signals
            .of_kind(SignalKind::Verified)
            .map(|s| s.record_id.as_deref().unwrap())
            .collect();
        assert_eq!(signals.len(), 2);
        assert_eq!(ids, vec!["prd-12", "prd-7"]);
    }

    #[test]
    fn test_unterminated_marker_is_ignored() {
        assert!(extract_signals("###BAILOUT without closing").is_empty());
        assert!(extract_signals("###VERIFIED:rec-1").is_empty());
        assert!(extract_signals("##PRD_COMPLETE##").is_empty());
    }

    #[test]
    fn test_unterminated_marker_before_another_marker() {
        let signals = extract_signals("###VERIFIED:open is not ready yet ###BLOCKED:need key###");
        assert_eq!(signals.len(), 1);
        assert_eq!(
            signals.first(SignalKind::Blocked).unwrap().detail.as_deref(),
            Some("need key")
        );

        let signals = extract_signals("###BAILOUT:running low ###PRD_COMPLETE###");
        let kinds: Vec<_> = signals.iter().map(|s| s.kind).collect();
        assert_eq!(kinds, vec![SignalKind::PrdComplete]);
    }

    #[test]
    fn test_bare_markers() {
        let signals = extract_signals("All done.\n###PRD_COMPLETE###\n");
        assert_eq!(signals.len(), 1);
        assert!(signals.has(SignalKind::PrdComplete));

        let signals = extract_signals("###ANALYSIS_COMPLETE###");
        assert!(signals.has(SignalKind::AnalysisComplete));
    }

    #[test]
    fn test_wrong_arity_is_ignored() {
        assert!(extract_signals("###PRD_COMPLETE:rec-1###").is_empty());
        assert!(extract_signals("###ANALYSIS_COMPLETE:x###").is_empty());
        assert!(extract_signals("###REJECTED:rec-1###").is_empty());
        assert!(extract_signals("###VERIFIED###").is_empty());
        assert!(extract_signals("###VERIFIED:a:b###").is_empty());
        assert!(extract_signals("###REJECTED:a b:reason###").is_empty());
    }

    #[test]
    fn test_unknown_kind_is_ignored() {
        assert!(extract_signals("###FINISHED:rec-1### ###DONE###").is_empty());
    }

    #[test]
    fn test_rejected_splits_id_and_reason() {
        let signals = extract_signals("###REJECTED:rec-3:needs tests###");
        let s = signals.first(SignalKind::Rejected).unwrap();
        assert_eq!(s.record_id.as_deref(), Some("rec-3"));
        assert_eq!(s.detail.as_deref(), Some("needs tests"));
    }

    #[test]
    fn test_rejected_reason_may_contain_colons() {
        let signals = extract_signals("###REJECTED:rec-3:fails: cargo test###");
        let s = signals.first(SignalKind::Rejected).unwrap();
        assert_eq!(s.record_id.as_deref(), Some("rec-3"));
        assert_eq!(s.detail.as_deref(), Some("fails: cargo test"));
    }

    #[test]
    fn test_arguments_are_trimmed() {
        let signals = extract_signals("###BAILOUT:  context nearly full  ###");
        assert_eq!(
            signals.first(SignalKind::Bailout).unwrap().detail.as_deref(),
            Some("context nearly full")
        );
    }

    #[test]
    fn test_whitespace_only_argument_is_ignored() {
        assert!(extract_signals("###BLOCKED:   ###").is_empty());
    }

    #[test]
    fn test_mixed_kinds_keep_text_order() {
        let text = "###LOOP_RISK:rec-9### then ###REJECTED:rec-2:flaky### then \
                    ###VERIFIED:rec-1### and ###PLAN_UPDATED:rec-9### ###ANALYSIS_COMPLETE###";
        let kinds: Vec<_> = extract_signals(text).iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![
                SignalKind::LoopRisk,
                SignalKind::Rejected,
                SignalKind::Verified,
                SignalKind::PlanUpdated,
                SignalKind::AnalysisComplete,
            ]
        );
    }

    #[test]
    fn test_plan_signals() {
        let signals = extract_signals("###PLAN_COMPLETE:rec-1###");
        assert_eq!(
            signals.first(SignalKind::PlanComplete).unwrap().record_id.as_deref(),
            Some("rec-1")
        );

        let signals = extract_signals("###PLAN_SKIPPED:nothing open###");
        assert_eq!(
            signals.first(SignalKind::PlanSkipped).unwrap().detail.as_deref(),
            Some("nothing open")
        );
    }

    #[test]
    fn test_prompt_updated_carries_phase_name() {
        let signals = extract_signals("###PROMPT_UPDATED:builder###");
        let s = signals.first(SignalKind::PromptUpdated).unwrap();
        assert_eq!(s.detail.as_deref(), Some("builder"));
        assert!(s.record_id.is_none());
    }

    #[test]
    fn test_duplicates_are_preserved() {
        let signals = extract_signals("###VERIFIED:a### ###VERIFIED:a###");
        assert_eq!(signals.len(), 2);
    }

    #[test]
    fn test_no_signals_in_plain_text() {
        assert!(extract_signals("Just some regular output").is_empty());
        assert!(extract_signals("").is_empty());
    }

    #[test]
    fn test_working_on_is_not_a_signal() {
        let text = "**WORKING ON: rec-42**\nreading files";
        assert!(extract_signals(text).is_empty());
        assert_eq!(extract_working_on(text).as_deref(), Some("rec-42"));
    }

    #[test]
    fn test_working_on_absent() {
        assert!(extract_working_on("working on stuff").is_none());
    }
}
