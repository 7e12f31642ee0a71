// =============================================================================
// classifier.rs — THE BUREAU LETTER INTERROGATION CHAMBER
// =============================================================================
//
// This module is where we do the actual "what did the bureau decide?"
// determination. And we do it FAST. How fast? We use:
//
// 1. Aho-Corasick automatons — one per outcome category, matching ALL of
//    that category's keywords simultaneously in a single pass. O(n + m).
//    Built on a finite automaton. This is how antivirus scanners work.
//    We're using antivirus-grade technology to read form letters from
//    Equifax. Let that sink in.
//
// 2. memchr — SIMD-accelerated byte scanning for the preliminary "is
//    there even a signal here?" check, before firing up the automatons.
//
// 3. Rayon parallel iterators — when a consumer imports a stack of
//    response letters, every CPU core gets its share of bureaucratic
//    prose. Leaving cores idle while there are deadlines to enforce is
//    practically criminal negligence.
//
// The classification itself is deliberately dumb: count keyword hits per
// category, highest count wins, ties break in category declaration order
// (deleted > updated > verified > insufficient > partial). Bureau letters
// are form letters; dumb and deterministic beats clever and moody.
// =============================================================================

use aho_corasick::AhoCorasick;
use rayon::prelude::*;
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

use crate::models::{
    Bureau, DisputeStatus, OutcomeResult, ResponseAnalysis, ResponseIndex, ResponseItem,
    ResponseOutcome, ResponseSummary,
};

/// Keywords indicating the disputed item was deleted outright.
/// The words every consumer wants to read.
static DELETED_KEYWORDS: LazyLock<Vec<&str>> = LazyLock::new(|| {
    vec![
        "deleted",
        "deletion",
        "removed",
        "no longer appears",
    ]
});

/// Keywords indicating the item was corrected/updated in place.
static UPDATED_KEYWORDS: LazyLock<Vec<&str>> = LazyLock::new(|| {
    vec![
        "updated",
        "corrected",
        "revised",
        "modified",
    ]
});

/// Keywords indicating the bureau "verified" the item as accurate.
/// The scare quotes are doing heavy lifting: verification frequently
/// means a furnisher replied "yep" to an automated e-OSCAR ping.
static VERIFIED_KEYWORDS: LazyLock<Vec<&str>> = LazyLock::new(|| {
    vec![
        "verified",
        "confirmed",
        "accurate",
        "remains unchanged",
        "previously investigated",
    ]
});

/// Keywords indicating the bureau wants more paperwork before it will
/// lift a finger. Sometimes legitimate. Usually stalling.
static INSUFFICIENT_KEYWORDS: LazyLock<Vec<&str>> = LazyLock::new(|| {
    vec![
        "insufficient",
        "unable to locate",
        "cannot locate",
        "additional information",
        "frivolous",
        "incomplete",
    ]
});

/// Keywords indicating a mixed bag — some items fixed, some not.
static PARTIAL_KEYWORDS: LazyLock<Vec<&str>> = LazyLock::new(|| {
    vec![
        "partial",
        "in part",
        "some of the items",
    ]
});

static DELETED_AUTOMATON: LazyLock<AhoCorasick> = LazyLock::new(|| {
    AhoCorasick::builder()
        .ascii_case_insensitive(true)
        .build(&*DELETED_KEYWORDS)
        .expect("Failed to build deleted automaton")
});

static UPDATED_AUTOMATON: LazyLock<AhoCorasick> = LazyLock::new(|| {
    AhoCorasick::builder()
        .ascii_case_insensitive(true)
        .build(&*UPDATED_KEYWORDS)
        .expect("Failed to build updated automaton")
});

static VERIFIED_AUTOMATON: LazyLock<AhoCorasick> = LazyLock::new(|| {
    AhoCorasick::builder()
        .ascii_case_insensitive(true)
        .build(&*VERIFIED_KEYWORDS)
        .expect("Failed to build verified automaton")
});

static INSUFFICIENT_AUTOMATON: LazyLock<AhoCorasick> = LazyLock::new(|| {
    AhoCorasick::builder()
        .ascii_case_insensitive(true)
        .build(&*INSUFFICIENT_KEYWORDS)
        .expect("Failed to build insufficient automaton")
});

static PARTIAL_AUTOMATON: LazyLock<AhoCorasick> = LazyLock::new(|| {
    AhoCorasick::builder()
        .ascii_case_insensitive(true)
        .build(&*PARTIAL_KEYWORDS)
        .expect("Failed to build partial automaton")
});

/// The categories in tie-break order. When two categories score the same
/// hit count, the earlier one wins — a letter that says "deleted" once
/// and "updated" once is a deletion letter.
fn categories() -> [(ResponseOutcome, &'static AhoCorasick); 5] {
    [
        (ResponseOutcome::Deleted, &DELETED_AUTOMATON),
        (ResponseOutcome::Updated, &UPDATED_AUTOMATON),
        (ResponseOutcome::Verified, &VERIFIED_AUTOMATON),
        (ResponseOutcome::Insufficient, &INSUFFICIENT_AUTOMATON),
        (ResponseOutcome::Partial, &PARTIAL_AUTOMATON),
    ]
}

/// Word stems covering every classification keyword, for the SIMD
/// pre-check. If none of these bytes appear, no keyword can match and we
/// skip the automatons entirely. Every keyword above MUST be reachable
/// from at least one stem here, or the pre-check starts eating signal.
const PRECHECK_STEMS: &[&str] = &[
    "delet", "remov", "no longer", "updat", "correct", "revis", "modif", "verif", "confirm",
    "accur", "remain", "investigat", "insufficient", "unable", "cannot", "additional",
    "frivolous", "incomplet", "partial", "in part", "some of",
];

/// Matches an "account" label followed by a reference token: "Account
/// Number: 4512889011", "acct #XY-44812", "Account: ****1234". The token
/// must be at least 4 characters; a later digit check weeds out prose
/// like "account information".
static ACCOUNT_REF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bacc(?:oun)?t\.?\s*(?:number|no\.?|num)?\s*[:#]?\s*([A-Za-z0-9*][A-Za-z0-9*\-]{3,})")
        .expect("Failed to compile account reference regex")
});

/// Section vocabulary we index from response letters: the five outcome
/// categories plus the structural headings bureaus actually print.
const SECTION_MARKERS: &[&str] = &[
    "deleted",
    "updated",
    "verified",
    "insufficient",
    "partial",
    "reinvestigation",
    "dispute results",
    "personal information",
];

/// Quick check if a text contains ANY classifiable signal.
/// Uses memchr SIMD scanning for maximum speed.
/// Returns true if the text is worth a full automaton pass.
pub fn quick_signal_check(text: &str) -> bool {
    let bytes = text.as_bytes();
    PRECHECK_STEMS
        .iter()
        .any(|stem| memchr::memmem::find(bytes, stem.as_bytes()).is_some())
}

/// Count keyword hits per category over already-lowercased text.
/// Returns (winner, winner_hits, total_hits, unique matched keywords).
/// The iteration order of [`categories`] IS the tie-break.
fn classify_counts(lower: &str) -> (ResponseOutcome, usize, usize, Vec<String>) {
    let mut winner = ResponseOutcome::Unknown;
    let mut winner_hits = 0usize;
    let mut total_hits = 0usize;
    let mut signals: Vec<String> = Vec::new();

    for (outcome, automaton) in categories() {
        let matches: Vec<_> = automaton.find_iter(lower).collect();
        let hits = matches.len();
        total_hits += hits;

        for m in &matches {
            signals.push(lower[m.start()..m.end()].to_string());
        }

        if hits > winner_hits {
            winner_hits = hits;
            winner = outcome;
        }
    }

    signals.sort();
    signals.dedup();

    (winner, winner_hits, total_hits, signals)
}

/// The fixed outcome → recommended status table. Deletion resolves the
/// dispute; verification starts the escalation track; everything else
/// parks in response_received pending a human look.
fn recommended_status_for(outcome: ResponseOutcome) -> DisputeStatus {
    match outcome {
        ResponseOutcome::Deleted => DisputeStatus::ResolvedFavorable,
        ResponseOutcome::Verified => DisputeStatus::Escalated,
        ResponseOutcome::Updated
        | ResponseOutcome::Insufficient
        | ResponseOutcome::Partial
        | ResponseOutcome::Unknown => DisputeStatus::ResponseReceived,
    }
}

/// The fixed per-outcome checklist handed to the consumer.
fn next_steps_for(outcome: ResponseOutcome) -> Vec<String> {
    let steps: &[&str] = match outcome {
        ResponseOutcome::Deleted => &[
            "Request an updated copy of your credit report",
            "Confirm the deletion appears at all three bureaus",
            "File the response letter with the dispute record",
        ],
        ResponseOutcome::Updated => &[
            "Review the updated tradeline for remaining inaccuracies",
            "Re-dispute any details that are still wrong",
            "Request an updated copy of your credit report",
        ],
        ResponseOutcome::Verified => &[
            "Send a Method of Verification request",
            "Demand the documentation the bureau relied on",
            "Prepare a CFPB complaint if the MOV response is inadequate",
        ],
        ResponseOutcome::Insufficient => &[
            "Resend the dispute with additional identification",
            "Attach account statements or billing records",
            "Note that the statutory clock restarts on receipt",
        ],
        ResponseOutcome::Partial => &[
            "Separate the corrected items from the remaining ones",
            "Re-dispute each unresolved item individually",
            "Track each remaining item's deadline separately",
        ],
        ResponseOutcome::Unknown => &[
            "Review the response letter manually",
            "File the letter with the dispute record",
            "Request clarification from the sender if the letter is ambiguous",
        ],
    };
    steps.iter().map(|s| s.to_string()).collect()
}

/// Classify a bureau response letter.
///
/// This is the main entry point for response analysis. Text is normalized
/// to lowercase, each category's automaton counts its keyword hits, and
/// the highest count wins with declaration-order tie-breaking.
///
/// `confidence = round(winner_hits / total_hits × 100)`, capped at 95
/// because no keyword counter should ever claim certainty about a letter
/// written by a compliance department. Zero signal means `unknown` at
/// confidence 0 — a shrug, not an error.
pub fn analyze_bureau_response(text: &str) -> ResponseAnalysis {
    let lower = text.to_lowercase();

    let (outcome, winner_hits, total_hits, signals) = if quick_signal_check(&lower) {
        classify_counts(&lower)
    } else {
        // SIMD bouncer says nothing classifiable lives here. Skip the
        // automatons entirely.
        (ResponseOutcome::Unknown, 0, 0, vec![])
    };

    let outcome = if winner_hits == 0 {
        ResponseOutcome::Unknown
    } else {
        outcome
    };

    let confidence = if total_hits == 0 {
        0
    } else {
        let raw = ((winner_hits as f64 / total_hits as f64) * 100.0).round() as u8;
        raw.min(95)
    };

    debug!(
        outcome = %outcome,
        confidence = confidence,
        winner_hits = winner_hits,
        total_hits = total_hits,
        "Response letter classified"
    );

    ResponseAnalysis {
        outcome,
        confidence,
        signals,
        recommended_status: recommended_status_for(outcome),
        next_steps: next_steps_for(outcome),
        index: Some(extract_response_index(text)),
        items: extract_response_items(text),
    }
}

/// Batch-classify multiple response letters in parallel using Rayon.
///
/// When a consumer imports a year's worth of bureau correspondence, every
/// letter gets classified independently and the work-stealing scheduler
/// spreads them across cores. It's like a mailroom staffed entirely by
/// paralegals who read at memory bandwidth.
pub fn batch_analyze(texts: &[&str]) -> Vec<ResponseAnalysis> {
    texts.par_iter().map(|text| analyze_bureau_response(text)).collect()
}

/// Structural index of a response letter, extracted independently of the
/// outcome classification: which bureau sent it, which account references
/// it mentions, which section vocabulary it uses.
pub fn extract_response_index(text: &str) -> ResponseIndex {
    let lower = text.to_lowercase();

    // Bureau detection by substring census. Highest mention count wins;
    // a tie (including three-way silence) stays unresolved — guessing
    // the sender of a letter is how cross-bureau filing accidents happen.
    let counts = [
        (Bureau::Experian, count_occurrences(&lower, "experian")),
        (Bureau::Equifax, count_occurrences(&lower, "equifax")),
        (
            Bureau::Transunion,
            count_occurrences(&lower, "transunion") + count_occurrences(&lower, "trans union"),
        ),
    ];
    let max = counts.iter().map(|(_, c)| *c).max().unwrap_or(0);
    let bureau = if max == 0 || counts.iter().filter(|(_, c)| *c == max).count() > 1 {
        None
    } else {
        counts.iter().find(|(_, c)| *c == max).map(|(b, _)| *b)
    };

    // Account references, deduplicated preserving first-seen order.
    let mut account_refs: Vec<String> = Vec::new();
    for line in text.lines() {
        for reference in account_refs_in_line(line) {
            if !account_refs.contains(&reference) {
                account_refs.push(reference);
            }
        }
    }

    let sections = SECTION_MARKERS
        .iter()
        .filter(|marker| lower.contains(**marker))
        .map(|marker| marker.to_string())
        .collect();

    ResponseIndex {
        bureau,
        account_refs,
        sections,
    }
}

/// Per-account outcome extraction. Each line with an account reference
/// gets a ±2-line context window classified independently with the same
/// keyword-count method as the document-level classifier — NOT the
/// document-level aggregate, because "deleted" in the letterhead should
/// not color an item three paragraphs away.
pub fn extract_response_items(text: &str) -> Vec<ResponseItem> {
    let lines: Vec<&str> = text.lines().collect();
    let mut items: Vec<ResponseItem> = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        for account_ref in account_refs_in_line(line) {
            let start = i.saturating_sub(2);
            let end = (i + 2).min(lines.len().saturating_sub(1));
            let window = lines[start..=end].join(" ").to_lowercase();

            let (outcome, winner_hits, _, evidence) = classify_counts(&window);
            let outcome = if winner_hits == 0 {
                ResponseOutcome::Unknown
            } else {
                outcome
            };

            match items.iter_mut().find(|item| item.account_ref == account_ref) {
                Some(existing) => {
                    // A classified verdict beats an earlier shrug for the
                    // same account. Two classified verdicts: first wins.
                    if existing.outcome == ResponseOutcome::Unknown
                        && outcome != ResponseOutcome::Unknown
                    {
                        existing.outcome = outcome;
                        existing.evidence = evidence;
                    }
                }
                None => items.push(ResponseItem {
                    account_ref,
                    outcome,
                    evidence,
                }),
            }
        }
    }

    items
}

/// Roll per-account items up into a single dispute outcome. `None` when
/// there are no items to roll up.
///
/// Precedence, in order:
/// 1. favorable AND unfavorable signals both present → partial (mixed)
/// 2. any deleted → deleted (or corrected, if updates are also present)
/// 3. any updated → corrected
/// 4. any verified → verified
/// 5. any insufficient → no_response
/// 6. anything else → partial
pub fn summarize_response_items(items: &[ResponseItem]) -> Option<ResponseSummary> {
    if items.is_empty() {
        return None;
    }

    let has = |outcome: ResponseOutcome| items.iter().any(|item| item.outcome == outcome);

    let favorable = has(ResponseOutcome::Deleted) || has(ResponseOutcome::Updated);
    let unfavorable = has(ResponseOutcome::Verified) || has(ResponseOutcome::Partial);

    let summary = if favorable && unfavorable {
        ResponseSummary {
            result: OutcomeResult::Partial,
            details: "Mixed outcomes: some items were resolved while others were verified".into(),
        }
    } else if has(ResponseOutcome::Deleted) {
        if has(ResponseOutcome::Updated) {
            ResponseSummary {
                result: OutcomeResult::Corrected,
                details: "Items were deleted and others corrected".into(),
            }
        } else {
            ResponseSummary {
                result: OutcomeResult::Deleted,
                details: "Disputed items were deleted".into(),
            }
        }
    } else if has(ResponseOutcome::Updated) {
        ResponseSummary {
            result: OutcomeResult::Corrected,
            details: "Disputed items were corrected".into(),
        }
    } else if has(ResponseOutcome::Verified) {
        ResponseSummary {
            result: OutcomeResult::Verified,
            details: "Disputed items were verified as reported".into(),
        }
    } else if has(ResponseOutcome::Insufficient) {
        ResponseSummary {
            result: OutcomeResult::NoResponse,
            details: "The bureau declined to investigate pending more information".into(),
        }
    } else {
        ResponseSummary {
            result: OutcomeResult::Partial,
            details: "Outcomes could not be fully classified".into(),
        }
    };

    Some(summary)
}

/// Account references found in one line, uppercased for stable
/// deduplication. Tokens without a single digit are discarded — "account
/// information" is prose, not a reference.
fn account_refs_in_line(line: &str) -> Vec<String> {
    ACCOUNT_REF_RE
        .captures_iter(line)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_uppercase())
        .filter(|token| token.chars().any(|c| c.is_ascii_digit()))
        .collect()
}

/// Non-overlapping substring census via memchr's SIMD search.
fn count_occurrences(haystack: &str, needle: &str) -> usize {
    memchr::memmem::find_iter(haystack.as_bytes(), needle.as_bytes()).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deleted_letter_classifies_favorably() {
        let analysis = analyze_bureau_response("the account has been deleted from your file");
        assert_eq!(analysis.outcome, ResponseOutcome::Deleted);
        assert_eq!(analysis.recommended_status, DisputeStatus::ResolvedFavorable);
        assert!(analysis.confidence > 0);
    }

    #[test]
    fn test_empty_text_is_unknown_at_zero_confidence() {
        let analysis = analyze_bureau_response("");
        assert_eq!(analysis.outcome, ResponseOutcome::Unknown);
        assert_eq!(analysis.confidence, 0);
        assert_eq!(analysis.recommended_status, DisputeStatus::ResponseReceived);
    }

    #[test]
    fn test_irrelevant_text_is_unknown() {
        let analysis = analyze_bureau_response("The quick brown fox jumps over the lazy dog");
        assert_eq!(analysis.outcome, ResponseOutcome::Unknown);
        assert_eq!(analysis.confidence, 0);
    }

    #[test]
    fn test_tie_breaks_in_declaration_order() {
        // Exactly one deleted keyword and one updated keyword.
        let analysis = analyze_bureau_response("one item was deleted and one was revised");
        assert_eq!(analysis.outcome, ResponseOutcome::Deleted);
    }

    #[test]
    fn test_verified_recommends_escalation() {
        let analysis =
            analyze_bureau_response("the disputed information was verified as accurate and confirmed");
        assert_eq!(analysis.outcome, ResponseOutcome::Verified);
        assert_eq!(analysis.recommended_status, DisputeStatus::Escalated);
    }

    #[test]
    fn test_confidence_is_capped_at_95() {
        // Every hit lands in one category, so the raw ratio would be 100.
        let analysis = analyze_bureau_response("deleted deleted deleted removed");
        assert_eq!(analysis.confidence, 95);
    }

    #[test]
    fn test_confidence_reflects_signal_split() {
        // 2 verified hits vs 1 deleted hit: 2/3 ≈ 67.
        let analysis = analyze_bureau_response("verified and confirmed, though one entry was deleted");
        assert_eq!(analysis.outcome, ResponseOutcome::Verified);
        assert_eq!(analysis.confidence, 67);
    }

    #[test]
    fn test_index_detects_bureau_by_mention_count() {
        let index = extract_response_index(
            "TransUnion Consumer Solutions\nThis is TransUnion's response. Experian was notified.",
        );
        assert_eq!(index.bureau, Some(Bureau::Transunion));
    }

    #[test]
    fn test_index_bureau_tie_is_unresolved() {
        let index = extract_response_index("Experian and Equifax both reported this account 12345678.");
        assert_eq!(index.bureau, None);
    }

    #[test]
    fn test_index_extracts_account_refs_in_order() {
        let text = "Account Number: 4512-8890\nsome filler\nacct #XY44812\nAccount Number: 4512-8890";
        let index = extract_response_index(text);
        assert_eq!(index.account_refs, vec!["4512-8890", "XY44812"]);
    }

    #[test]
    fn test_account_prose_is_not_a_reference() {
        let index = extract_response_index("your account information was reviewed");
        assert!(index.account_refs.is_empty());
    }

    #[test]
    fn test_index_sections() {
        let index =
            extract_response_index("Results of our reinvestigation: item deleted, item verified");
        assert!(index.sections.contains(&"reinvestigation".to_string()));
        assert!(index.sections.contains(&"deleted".to_string()));
        assert!(index.sections.contains(&"verified".to_string()));
        assert!(!index.sections.contains(&"partial".to_string()));
    }

    #[test]
    fn test_items_classified_by_local_context() {
        let text = "Account Number: 11112222\n\
                    This item has been deleted from your credit file.\n\
                    \n\
                    \n\
                    \n\
                    Account Number: 33334444\n\
                    This item was verified as accurate.";
        let items = extract_response_items(text);
        assert_eq!(items.len(), 2);

        let first = items.iter().find(|i| i.account_ref == "11112222").unwrap();
        assert_eq!(first.outcome, ResponseOutcome::Deleted);

        let second = items.iter().find(|i| i.account_ref == "33334444").unwrap();
        assert_eq!(second.outcome, ResponseOutcome::Verified);
    }

    #[test]
    fn test_items_dedup_prefers_classified_over_unknown() {
        let text = "Account Number: 11112222 appears below\n\
                    \n\
                    \n\
                    \n\
                    Account Number: 11112222\n\
                    This item has been deleted.";
        let items = extract_response_items(text);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].outcome, ResponseOutcome::Deleted);
    }

    #[test]
    fn test_summary_mixed_signals_is_partial() {
        let items = vec![
            ResponseItem {
                account_ref: "A1111".into(),
                outcome: ResponseOutcome::Deleted,
                evidence: vec![],
            },
            ResponseItem {
                account_ref: "B2222".into(),
                outcome: ResponseOutcome::Verified,
                evidence: vec![],
            },
        ];
        assert_eq!(
            summarize_response_items(&items).unwrap().result,
            OutcomeResult::Partial
        );
    }

    #[test]
    fn test_summary_all_verified_is_verified() {
        let items = vec![
            ResponseItem {
                account_ref: "A1111".into(),
                outcome: ResponseOutcome::Verified,
                evidence: vec![],
            },
            ResponseItem {
                account_ref: "B2222".into(),
                outcome: ResponseOutcome::Verified,
                evidence: vec![],
            },
        ];
        assert_eq!(
            summarize_response_items(&items).unwrap().result,
            OutcomeResult::Verified
        );
    }

    #[test]
    fn test_summary_deleted_with_updates_is_corrected() {
        let items = vec![
            ResponseItem {
                account_ref: "A1111".into(),
                outcome: ResponseOutcome::Deleted,
                evidence: vec![],
            },
            ResponseItem {
                account_ref: "B2222".into(),
                outcome: ResponseOutcome::Updated,
                evidence: vec![],
            },
        ];
        assert_eq!(
            summarize_response_items(&items).unwrap().result,
            OutcomeResult::Corrected
        );
    }

    #[test]
    fn test_summary_insufficient_maps_to_no_response() {
        let items = vec![ResponseItem {
            account_ref: "A1111".into(),
            outcome: ResponseOutcome::Insufficient,
            evidence: vec![],
        }];
        assert_eq!(
            summarize_response_items(&items).unwrap().result,
            OutcomeResult::NoResponse
        );
    }

    #[test]
    fn test_summary_of_nothing_is_none() {
        assert!(summarize_response_items(&[]).is_none());
    }

    #[test]
    fn test_batch_analyze_parallel() {
        let texts = vec![
            "the item was deleted from your file",
            "completely unrelated text about gardening",
            "the account was verified as accurate",
        ];
        let results = batch_analyze(&texts);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].outcome, ResponseOutcome::Deleted);
        assert_eq!(results[1].outcome, ResponseOutcome::Unknown);
        assert_eq!(results[2].outcome, ResponseOutcome::Verified);
    }

    #[test]
    fn test_quick_signal_check() {
        assert!(quick_signal_check("this was deleted"));
        assert!(quick_signal_check("remains unchanged"));
        assert!(!quick_signal_check("the weather is nice today"));
    }
}
