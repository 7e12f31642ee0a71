// =============================================================================
// deadline.rs — THE STATUTORY COUNTDOWN CALCULATOR
// =============================================================================
//
// Pure date arithmetic against federal deadlines. No I/O, no repository,
// no side effects — fields go in, a DeadlineTracker comes out, and the
// only thing that can go wrong is the caller not having enough dates to
// anchor the math.
//
// The clocks we track:
//
// 1. FCRA §611 — a bureau gets 30 days to investigate a dispute,
//    45 if the consumer supplements mid-investigation. Day 31 with no
//    response is not a gray area. It's a violation with a docket number
//    waiting to happen.
//
// 2. FCRA §605 — most derogatory items fall off the report 7 years from
//    the Date of First Delinquency. Bureaus occasionally "forget" this.
//    We do not forget. We are physically incapable of forgetting.
//
// Bureau report dates arrive as free-text strings in whichever format the
// reporting pipeline hallucinated that day, so parsing is lenient and
// anything unparsable is EXCLUDED from the ledger rather than letting a
// NaN-shaped date sort itself into the timeline.
// =============================================================================

use chrono::{DateTime, Duration, NaiveDate, Utc};
use thiserror::Error;
use tracing::debug;

use crate::models::{
    Countdown, CountdownKind, CreditFields, DeadlineTracker, Milestone, NextAction, Urgency,
};

/// Seven years, in days. FCRA §605(a) speaks in years; chrono speaks in
/// days; 2555 is where they meet.
const SEVEN_YEAR_DAYS: i64 = 2555;

/// When no DOFD is reported, estimate it as charge-off minus 180 days —
/// the standard assumption, since an account charges off after roughly
/// six months of delinquency.
const CHARGE_OFF_DOFD_OFFSET_DAYS: i64 = 180;

/// FCRA §611 investigation windows, in days.
const INVESTIGATION_WINDOW_DAYS: i64 = 30;
const EXTENDED_INVESTIGATION_WINDOW_DAYS: i64 = 45;

/// The one error this module is allowed to produce. A tracker with no
/// DOFD and no charge-off date has nothing to anchor the 7-year math to,
/// and inventing an anchor would be worse than refusing. This is a
/// documented precondition, not a defect — callers catch it and render
/// an empty state asking for more fields.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeadlineError {
    #[error("cannot build deadline tracker: need a date of first delinquency or a charge-off date")]
    InsufficientDates,
}

/// Parse a bureau-reported date string, leniently. Bureaus and report
/// parsers disagree on date formats the way bureaus and consumers
/// disagree on everything else.
pub fn parse_report_date(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    const FORMATS: &[&str] = &[
        "%Y-%m-%d",
        "%m/%d/%Y",
        "%m-%d-%Y",
        "%m/%d/%y",
        "%B %d, %Y",
        "%b %d, %Y",
    ];

    for format in FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return date
                .and_hms_opt(0, 0, 0)
                .map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc));
        }
    }

    debug!(raw = trimmed, "Unparsable report date excluded from deadline math");
    None
}

/// The urgency tier for a countdown with this many days remaining.
/// Boundaries are exact: -1 is expired, 0 through 3 is critical, 4
/// through 7 is warning, 8 and beyond is normal. These tiers drive UI
/// color and scheduler posture downstream, so they don't drift.
pub fn urgency_for(days_remaining: i64) -> Urgency {
    if days_remaining < 0 {
        Urgency::Expired
    } else if days_remaining <= 3 {
        Urgency::Critical
    } else if days_remaining <= 7 {
        Urgency::Warning
    } else {
        Urgency::Normal
    }
}

/// Days until `target`, rounded up. A deadline 36 hours out is "2 days
/// remaining" — you get the whole final day, but not a minute more.
pub fn days_until(target: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let seconds = (target - now).num_seconds();
    (seconds as f64 / 86_400.0).ceil() as i64
}

/// Build the full deadline picture for one tradeline, evaluated at the
/// current moment. See [`build_deadline_tracker_at`] for the clock-free
/// version tests use.
pub fn build_deadline_tracker(
    fields: &CreditFields,
    dispute_filed_date: Option<DateTime<Utc>>,
) -> Result<DeadlineTracker, DeadlineError> {
    build_deadline_tracker_at(fields, dispute_filed_date, Utc::now())
}

/// Build the full deadline picture for one tradeline as of `now`.
///
/// Requires a DOFD anchor: the reported date of first delinquency, or —
/// failing that — an estimate of charge-off minus 180 days. With neither,
/// the 7-year math has no anchor and this returns
/// [`DeadlineError::InsufficientDates`].
pub fn build_deadline_tracker_at(
    fields: &CreditFields,
    dispute_filed_date: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<DeadlineTracker, DeadlineError> {
    let dofd = fields
        .date_of_first_delinquency
        .as_deref()
        .and_then(parse_report_date);
    let charge_off = fields.charge_off_date.as_deref().and_then(parse_report_date);

    // The anchor for obsolescence math: reported DOFD, or estimated from
    // the charge-off date. Neither present means the tracker cannot exist.
    let (anchor, anchor_estimated) = match (dofd, charge_off) {
        (Some(date), _) => (date, false),
        (None, Some(date)) => (date - Duration::days(CHARGE_OFF_DOFD_OFFSET_DAYS), true),
        (None, None) => return Err(DeadlineError::InsufficientDates),
    };

    let mut countdowns = Vec::new();

    if let Some(filed) = dispute_filed_date {
        let target = filed + Duration::days(INVESTIGATION_WINDOW_DAYS);
        let days_remaining = days_until(target, now);
        countdowns.push(Countdown {
            kind: CountdownKind::InvestigationWindow,
            label: "30-day investigation window".into(),
            target_date: target,
            days_remaining,
            urgency: urgency_for(days_remaining),
            explanation: "FCRA §611 requires the bureau to complete its investigation \
                          within 30 days of receiving the dispute"
                .into(),
            action: "Await investigation results; escalate if none arrive".into(),
        });

        let extended_target = filed + Duration::days(EXTENDED_INVESTIGATION_WINDOW_DAYS);
        let extended_remaining = days_until(extended_target, now);
        countdowns.push(Countdown {
            kind: CountdownKind::ExtendedInvestigationWindow,
            label: "45-day extended window".into(),
            target_date: extended_target,
            days_remaining: extended_remaining,
            urgency: urgency_for(extended_remaining),
            explanation: "The window stretches to 45 days when the consumer supplies \
                          additional information during the investigation"
                .into(),
            action: "Absolute final deadline — prepare escalation paperwork".into(),
        });
    }

    let removal_target = anchor + Duration::days(SEVEN_YEAR_DAYS);
    let removal_remaining = days_until(removal_target, now);
    countdowns.push(Countdown {
        kind: CountdownKind::ObsolescenceRemoval,
        label: "7-year obsolescence removal".into(),
        target_date: removal_target,
        days_remaining: removal_remaining,
        urgency: urgency_for(removal_remaining),
        explanation: if anchor_estimated {
            "FCRA §605 removal date, anchored to an estimated DOFD \
             (charge-off date minus 180 days)"
                .into()
        } else {
            "FCRA §605: the item must stop being reported 7 years from the \
             date of first delinquency"
                .into()
        },
        action: "Demand removal of the obsolete tradeline".into(),
    });

    let mut milestones = build_milestones(fields, dispute_filed_date, anchor, anchor_estimated, now);
    milestones.sort_by_key(|m| m.date);

    // The single soonest countdown that hasn't already lapsed. When every
    // clock has run out, there is no "next" — only escalation.
    let next_action = countdowns
        .iter()
        .filter(|c| c.days_remaining >= 0)
        .min_by_key(|c| c.target_date)
        .map(|c| NextAction {
            description: c.action.clone(),
            deadline: c.target_date,
        });

    Ok(DeadlineTracker {
        creditor_name: fields.creditor_name.clone(),
        countdowns,
        milestones,
        next_action,
    })
}

/// Every relevant, PARSEABLE date in the tradeline's life, marked passed
/// or pending. Unparsable dates simply don't appear — a milestone ledger
/// with garbage dates sorted into it helps nobody.
fn build_milestones(
    fields: &CreditFields,
    dispute_filed_date: Option<DateTime<Utc>>,
    anchor: DateTime<Utc>,
    anchor_estimated: bool,
    now: DateTime<Utc>,
) -> Vec<Milestone> {
    let mut milestones = Vec::new();

    let mut push = |event: &str, date: DateTime<Utc>, significance: &str| {
        milestones.push(Milestone {
            event: event.into(),
            date,
            passed: date < now,
            significance: significance.into(),
        });
    };

    if let Some(date) = fields.date_opened.as_deref().and_then(parse_report_date) {
        push("Account opened", date, "Start of the account's reported history");
    }

    push(
        if anchor_estimated {
            "First delinquency (estimated)"
        } else {
            "First delinquency"
        },
        anchor,
        "Anchor for the 7-year obsolescence clock",
    );

    if let Some(date) = fields.charge_off_date.as_deref().and_then(parse_report_date) {
        push("Charge-off", date, "Creditor wrote the balance off");
    }

    if let Some(filed) = dispute_filed_date {
        push("Dispute filed", filed, "The statutory response clock started");
        push(
            "Investigation response due",
            filed + Duration::days(INVESTIGATION_WINDOW_DAYS),
            "FCRA §611 30-day deadline",
        );
    }

    push(
        "7-year removal",
        anchor + Duration::days(SEVEN_YEAR_DAYS),
        "FCRA §605 obsolescence — the item must come off the report",
    );

    milestones
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fields_with_dofd() -> CreditFields {
        CreditFields {
            creditor_name: "Vandelay Financial".into(),
            account_type: Some("collection".into()),
            date_opened: Some("2019-06-01".into()),
            date_of_first_delinquency: Some("2020-01-15".into()),
            charge_off_date: Some("2020-07-15".into()),
            last_activity_date: None,
        }
    }

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_urgency_tier_boundaries() {
        assert_eq!(urgency_for(-1), Urgency::Expired);
        assert_eq!(urgency_for(0), Urgency::Critical);
        assert_eq!(urgency_for(3), Urgency::Critical);
        assert_eq!(urgency_for(4), Urgency::Warning);
        assert_eq!(urgency_for(7), Urgency::Warning);
        assert_eq!(urgency_for(8), Urgency::Normal);
    }

    #[test]
    fn test_no_anchor_dates_is_an_error() {
        let fields = CreditFields {
            creditor_name: "Mystery Creditor".into(),
            ..Default::default()
        };
        let result = build_deadline_tracker_at(&fields, None, at(2026, 1, 1));
        assert_eq!(result.unwrap_err(), DeadlineError::InsufficientDates);
    }

    #[test]
    fn test_charge_off_substitutes_for_missing_dofd() {
        let fields = CreditFields {
            creditor_name: "Vandelay Financial".into(),
            charge_off_date: Some("2020-07-15".into()),
            ..Default::default()
        };
        let tracker = build_deadline_tracker_at(&fields, None, at(2026, 1, 1)).unwrap();

        // Anchor = charge-off minus 180 days; removal = anchor + 2555 days.
        let expected_anchor = parse_report_date("2020-07-15").unwrap() - Duration::days(180);
        let removal = tracker
            .countdowns
            .iter()
            .find(|c| c.kind == CountdownKind::ObsolescenceRemoval)
            .unwrap();
        assert_eq!(removal.target_date, expected_anchor + Duration::days(2555));
        assert!(removal.explanation.contains("estimated"));
    }

    #[test]
    fn test_filed_date_adds_investigation_countdowns() {
        let filed = at(2026, 1, 1);
        let tracker =
            build_deadline_tracker_at(&fields_with_dofd(), Some(filed), at(2026, 1, 10)).unwrap();

        let investigation = tracker
            .countdowns
            .iter()
            .find(|c| c.kind == CountdownKind::InvestigationWindow)
            .unwrap();
        assert_eq!(investigation.target_date, filed + Duration::days(30));

        let extended = tracker
            .countdowns
            .iter()
            .find(|c| c.kind == CountdownKind::ExtendedInvestigationWindow)
            .unwrap();
        assert_eq!(extended.target_date, filed + Duration::days(45));
    }

    #[test]
    fn test_next_action_is_soonest_unlapsed_countdown() {
        let filed = at(2026, 1, 1);
        let now = at(2026, 1, 10);
        let tracker = build_deadline_tracker_at(&fields_with_dofd(), Some(filed), now).unwrap();

        // The 30-day window (Jan 31) is sooner than the 45-day window and
        // the 7-year removal, and hasn't lapsed yet.
        let next = tracker.next_action.unwrap();
        assert_eq!(next.deadline, filed + Duration::days(30));
    }

    #[test]
    fn test_next_action_skips_lapsed_windows() {
        let filed = at(2026, 1, 1);
        // Both investigation windows have lapsed; only the 7-year removal remains.
        let now = at(2026, 4, 1);
        let tracker = build_deadline_tracker_at(&fields_with_dofd(), Some(filed), now).unwrap();

        let next = tracker.next_action.unwrap();
        let removal = tracker
            .countdowns
            .iter()
            .find(|c| c.kind == CountdownKind::ObsolescenceRemoval)
            .unwrap();
        assert_eq!(next.deadline, removal.target_date);
    }

    #[test]
    fn test_malformed_dates_are_excluded_not_propagated() {
        let fields = CreditFields {
            creditor_name: "Vandelay Financial".into(),
            date_opened: Some("not a date".into()),
            date_of_first_delinquency: Some("2020-01-15".into()),
            charge_off_date: Some("13/45/2020".into()),
            ..Default::default()
        };
        let tracker = build_deadline_tracker_at(&fields, None, at(2026, 1, 1)).unwrap();

        assert!(!tracker.milestones.iter().any(|m| m.event == "Account opened"));
        assert!(!tracker.milestones.iter().any(|m| m.event == "Charge-off"));
        // The valid DOFD still anchors the ledger.
        assert!(tracker.milestones.iter().any(|m| m.event == "First delinquency"));
    }

    #[test]
    fn test_milestones_sorted_and_passed_flags() {
        let filed = at(2026, 1, 1);
        let now = at(2026, 1, 10);
        let tracker = build_deadline_tracker_at(&fields_with_dofd(), Some(filed), now).unwrap();

        let dates: Vec<_> = tracker.milestones.iter().map(|m| m.date).collect();
        let mut sorted = dates.clone();
        sorted.sort();
        assert_eq!(dates, sorted);

        for m in &tracker.milestones {
            assert_eq!(m.passed, m.date < now);
        }
    }

    #[test]
    fn test_lenient_date_parsing() {
        assert!(parse_report_date("2020-01-15").is_some());
        assert!(parse_report_date("01/15/2020").is_some());
        assert!(parse_report_date("01-15-2020").is_some());
        assert!(parse_report_date("January 15, 2020").is_some());
        assert!(parse_report_date("Jan 15, 2020").is_some());
        assert!(parse_report_date("").is_none());
        assert!(parse_report_date("the ides of march").is_none());
    }

    #[test]
    fn test_days_until_rounds_up() {
        let now = at(2026, 1, 1); // 12:00
        let target = Utc.with_ymd_and_hms(2026, 1, 3, 0, 0, 0).unwrap(); // 36h later
        assert_eq!(days_until(target, now), 2);
        assert_eq!(days_until(now, now), 0);
        assert_eq!(days_until(now - Duration::days(1), now), -1);
    }
}
