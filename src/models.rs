// =============================================================================
// models.rs — THE SACRED DATA STRUCTURES OF STATUTORY DOOM
// =============================================================================
//
// These structs represent the fundamental building blocks of our dispute
// compliance system. Each field has been carefully chosen to capture every
// conceivable piece of information about a credit bureau's descent into
// FCRA §611 noncompliance.
//
// Is it overkill to keep a full append-only status history on a consumer
// credit dispute? Yes. Do we care? Absolutely not.
// =============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// The kind of dispute being prosecuted. Each kind carries its own
/// statutory response window, its own escalation path, and its own
/// capacity for being ignored by the recipient.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DisputeType {
    /// A dispute filed directly with a credit bureau under FCRA §611.
    /// The bureau has 30 days to investigate. They will use all 30.
    Bureau,

    /// A dispute filed with the furnisher — the creditor or collector
    /// actually supplying the data. FCRA §623 territory.
    Furnisher,

    /// A debt validation demand under FDCPA §809. The collector must
    /// validate before continuing collection. Many simply... don't.
    Validation,

    /// A complaint filed with the Consumer Financial Protection Bureau.
    /// The federal regulator gives companies 60 days to respond, and
    /// unlike us, the CFPB has subpoena power.
    Cfpb,

    /// Litigation. The nuclear option. When the letters stop working,
    /// the summons starts talking.
    Legal,
}

impl fmt::Display for DisputeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisputeType::Bureau => write!(f, "bureau"),
            DisputeType::Furnisher => write!(f, "furnisher"),
            DisputeType::Validation => write!(f, "validation"),
            DisputeType::Cfpb => write!(f, "cfpb"),
            DisputeType::Legal => write!(f, "legal"),
        }
    }
}

/// The three credit bureaus. An oligopoly so stable it makes OPEC look
/// like a farmers market.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Bureau {
    Experian,
    Equifax,
    Transunion,
}

impl fmt::Display for Bureau {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bureau::Experian => write!(f, "Experian"),
            Bureau::Equifax => write!(f, "Equifax"),
            Bureau::Transunion => write!(f, "TransUnion"),
        }
    }
}

/// Where a dispute is in its lifecycle. There is deliberately no enforced
/// transition graph — any status may follow any other, the system trusts
/// the caller, and every transition is recorded in the status history.
/// (A stricter transition table is an open product question. We record;
/// we do not judge.)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DisputeStatus {
    /// Drafted but not yet sent. A dispute in Schrödinger's mailbox.
    Draft,
    /// Sent. The statutory clock is now running, whether the recipient
    /// likes it or not.
    Submitted,
    /// The recipient has acknowledged and is "investigating". The scare
    /// quotes are load-bearing.
    Investigating,
    /// A response letter arrived and has been (or is being) classified.
    ResponseReceived,
    /// The deadline lapsed or the response was inadequate, and the
    /// follow-up machinery has been engaged.
    Escalated,
    /// The item was deleted or corrected. Pop the champagne.
    ResolvedFavorable,
    /// The item was "verified as accurate". Sharpen the MOV request.
    ResolvedUnfavorable,
    /// Closed for any other reason. The paperwork rests.
    Closed,
}

impl DisputeStatus {
    /// Terminal statuses are exempt from escalation sweeps. Once a dispute
    /// is resolved or closed, no amount of lapsed deadline will reanimate it.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DisputeStatus::ResolvedFavorable
                | DisputeStatus::ResolvedUnfavorable
                | DisputeStatus::Closed
        )
    }
}

impl fmt::Display for DisputeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisputeStatus::Draft => write!(f, "draft"),
            DisputeStatus::Submitted => write!(f, "submitted"),
            DisputeStatus::Investigating => write!(f, "investigating"),
            DisputeStatus::ResponseReceived => write!(f, "response_received"),
            DisputeStatus::Escalated => write!(f, "escalated"),
            DisputeStatus::ResolvedFavorable => write!(f, "resolved_favorable"),
            DisputeStatus::ResolvedUnfavorable => write!(f, "resolved_unfavorable"),
            DisputeStatus::Closed => write!(f, "closed"),
        }
    }
}

/// The disputed tradeline. The creditor is who reported it; the collector
/// is who bought the debt for pennies and now sends letters in red ink.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Account {
    pub creditor: String,
    pub collector: Option<String>,
    /// Reported balance/value of the account, in dollars.
    pub value: f64,
    pub account_type: String,
}

/// Which way a communication traveled.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CommDirection {
    Sent,
    Received,
}

/// How a communication traveled. Certified mail is the gold standard —
/// nothing says "I am building a litigation record" like a green card.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CommMethod {
    Mail,
    Email,
    Phone,
    Online,
}

/// One entry in a dispute's communication log. Append-only, because
/// rewriting history is for credit bureaus, not for us.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Communication {
    pub date: DateTime<Utc>,
    pub direction: CommDirection,
    pub method: CommMethod,
    pub subject: String,
    pub summary: String,
}

/// Structured document tags. These used to be free-form strings in the
/// ancestral system, which meant idempotency decisions were string
/// comparisons and typos were control-flow bugs. Now the compiler checks
/// our routing logic, as God and Graydon intended.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DocumentTag {
    /// This document was generated by the escalation scheduler, not a human.
    AutoFollowup,
    /// This document exists because a response deadline lapsed.
    /// Together with `AutoFollowup`, this pair is the idempotency marker:
    /// at most one escalation pass may apply it per dispute.
    DeadlineExpired,
    /// The "you ignored my dispute and the law noticed" notice.
    NoResponseNotice,
    /// Method of Verification demand under FCRA §611(a)(7).
    MovRequest,
    /// A structured outline for a CFPB complaint.
    CfpbOutline,
    /// Consumer-supplied supporting evidence.
    Evidence,
    /// Downstream formatter has rendered this document to PDF.
    PdfReady,
    /// Imported from an external source (scan, upload, OCR pipeline).
    Imported,
}

impl fmt::Display for DocumentTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentTag::AutoFollowup => write!(f, "auto_followup"),
            DocumentTag::DeadlineExpired => write!(f, "deadline_expired"),
            DocumentTag::NoResponseNotice => write!(f, "no_response_notice"),
            DocumentTag::MovRequest => write!(f, "mov_request"),
            DocumentTag::CfpbOutline => write!(f, "cfpb_outline"),
            DocumentTag::Evidence => write!(f, "evidence"),
            DocumentTag::PdfReady => write!(f, "pdf_ready"),
            DocumentTag::Imported => write!(f, "imported"),
        }
    }
}

/// A document attached to a dispute. Content is optional because byte-level
/// rendering (PDF, ICS, ZIP) belongs to external formatters — this core
/// only carries the structured payload they consume.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: String,
    pub name: String,
    pub doc_type: String,
    pub content: Option<String>,
    pub tags: Vec<DocumentTag>,
    pub source: Option<String>,
    pub date_added: DateTime<Utc>,
}

impl DocumentRecord {
    /// True if this document carries the full escalation marker pair.
    pub fn is_escalation_marker(&self) -> bool {
        self.tags.contains(&DocumentTag::AutoFollowup)
            && self.tags.contains(&DocumentTag::DeadlineExpired)
    }
}

/// One entry in a dispute's status history. The history is monotonically
/// append-only and its final entry's `to_status` always equals the record's
/// current status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusChange {
    pub date: DateTime<Utc>,
    pub from_status: DisputeStatus,
    pub to_status: DisputeStatus,
    pub notes: Option<String>,
}

/// How a dispute ultimately shook out, in the vocabulary the analytics
/// and summary layers share.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeResult {
    /// The tradeline is gone. The best possible ending.
    Deleted,
    /// The tradeline was corrected/updated. A win with an asterisk.
    Corrected,
    /// "Verified as accurate." The opening bell for round two.
    Verified,
    /// They never answered. The statutory clock has opinions about this.
    NoResponse,
    /// Some items won, some lost, some were ignored entirely.
    Partial,
}

impl fmt::Display for OutcomeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeResult::Deleted => write!(f, "deleted"),
            OutcomeResult::Corrected => write!(f, "corrected"),
            OutcomeResult::Verified => write!(f, "verified"),
            OutcomeResult::NoResponse => write!(f, "no_response"),
            OutcomeResult::Partial => write!(f, "partial"),
        }
    }
}

/// The recorded outcome of a dispute. `recorded_at` is stamped when the
/// outcome is set so the analytics layer can compute resolution time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outcome {
    pub result: OutcomeResult,
    pub details: String,
    pub follow_up_required: bool,
    pub recorded_at: DateTime<Utc>,
}

/// The main record. This is what gets persisted to the repository,
/// escalated by the scheduler, and aggregated by analytics. Every field
/// here represents a piece of the paper trail in our quest to make a
/// credit bureau follow a 55-year-old federal statute.
///
/// Is having this many fields on a dispute record overkill?
/// The answer is no. Opposing counsel will ask about every one of them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dispute {
    /// A UUID v4 for this dispute. Because even in bureaucratic purgatory,
    /// every dispute deserves to feel unique and special.
    pub id: String,

    /// The disputed tradeline.
    pub account: Account,

    /// What kind of dispute this is (bureau, furnisher, validation, ...).
    pub dispute_type: DisputeType,

    /// Which bureau this targets, when known. Furnisher and validation
    /// disputes often have no bureau at all.
    pub bureau: Option<Bureau>,

    /// Current lifecycle status. Mirrors the last status_history entry.
    pub status: DisputeStatus,

    /// When the dispute was submitted. The statutory clock's starting gun.
    pub submission_date: DateTime<Utc>,

    /// `submission_date + statutory_window(dispute_type)`, fixed at
    /// creation and never silently recomputed. If the law changes,
    /// existing disputes keep the deadline they were born with.
    pub response_deadline: DateTime<Utc>,

    /// Why the dispute was filed, in the consumer's words.
    pub reason: String,

    /// Ids of the rule-engine violations that motivated this dispute.
    /// The violation list itself is produced (and owned) elsewhere;
    /// we only carry the references.
    #[serde(default)]
    pub violation_ids: Vec<String>,

    /// Append-only status transition log.
    pub status_history: Vec<StatusChange>,

    /// Append-only communication log.
    #[serde(default)]
    pub communications: Vec<Communication>,

    /// Attached documents — evidence, generated follow-ups, imports.
    #[serde(default)]
    pub documents: Vec<DocumentRecord>,

    /// The final outcome, once one is recorded.
    pub outcome: Option<Outcome>,

    /// Free-form working notes.
    pub notes: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Dispute {
    /// True if any attached document carries the escalation marker pair.
    /// This is THE idempotency check for the escalation scheduler: the
    /// persisted tags are the source of truth, not any in-process cache.
    pub fn has_escalation_marker(&self) -> bool {
        self.documents.iter().any(|d| d.is_escalation_marker())
    }

    /// Generate the guard key for this dispute's escalation pass.
    /// Dispute id + deadline date, so the in-process guard's memory of
    /// "already escalated" is scoped to this particular lapsed deadline.
    pub fn guard_key(&self) -> String {
        format!("{}:{}", self.id, self.response_deadline.date_naive())
    }
}

impl fmt::Display for Dispute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} ({}) — {} due {}",
            self.id,
            self.account.creditor,
            self.dispute_type,
            self.status,
            self.response_deadline.date_naive()
        )
    }
}

/// A fresh document id. Small helper so every creation site mints ids
/// the same way.
pub fn new_document_id() -> String {
    Uuid::new_v4().to_string()
}

/// What flows through the outbox when the scheduler escalates a dispute:
/// one event per generated follow-up document. The external formatter
/// subscribes on the other end and turns the structured payload into an
/// actual letter. We produce paperwork; we do not typeset it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationEvent {
    /// Event id, distinct from the dispute and document ids.
    pub id: String,
    pub dispute_id: String,
    pub creditor: String,
    pub dispute_type: DisputeType,
    pub bureau: Option<Bureau>,
    pub document: DocumentRecord,
    pub escalated_at: DateTime<Utc>,
}

impl EscalationEvent {
    pub fn new(dispute: &Dispute, document: DocumentRecord, escalated_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            dispute_id: dispute.id.clone(),
            creditor: dispute.account.creditor.clone(),
            dispute_type: dispute.dispute_type,
            bureau: dispute.bureau,
            document,
            escalated_at,
        }
    }
}

// =============================================================================
// Consumed collaborator types
// =============================================================================

/// Raw tradeline fields as delivered by the external report-parsing
/// subsystem. Dates arrive as free-text strings in whatever format the
/// bureau's PDF generator was feeling that day — the deadline calculator
/// parses them leniently and discards what it cannot parse.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreditFields {
    pub creditor_name: String,
    pub account_type: Option<String>,
    pub date_opened: Option<String>,
    pub date_of_first_delinquency: Option<String>,
    pub charge_off_date: Option<String>,
    pub last_activity_date: Option<String>,
}

/// Consumer identity, used only as document context by follow-up builders.
/// This core never renders it into prose — that's the letter service's job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerInfo {
    pub name: String,
    pub address: Option<String>,
    pub state: Option<String>,
}

// =============================================================================
// Derived (never persisted) types
// =============================================================================

/// Urgency tier for a countdown. Boundaries are exact and load-bearing:
/// `< 0` expired, `0..=3` critical, `4..=7` warning, `> 7` normal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Expired,
    Critical,
    Warning,
    Normal,
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Urgency::Expired => write!(f, "EXPIRED"),
            Urgency::Critical => write!(f, "CRITICAL"),
            Urgency::Warning => write!(f, "WARNING"),
            Urgency::Normal => write!(f, "normal"),
        }
    }
}

/// Which statutory clock a countdown tracks.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CountdownKind {
    /// FCRA §611 30-day investigation window from the dispute filing date.
    InvestigationWindow,
    /// The 45-day extended window (consumer supplied additional
    /// information during the investigation).
    ExtendedInvestigationWindow,
    /// FCRA §605 seven-year obsolescence window from the DOFD anchor.
    ObsolescenceRemoval,
}

/// One running statutory countdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Countdown {
    pub kind: CountdownKind,
    pub label: String,
    pub target_date: DateTime<Utc>,
    pub days_remaining: i64,
    pub urgency: Urgency,
    pub explanation: String,
    pub action: String,
}

/// One entry in the milestone ledger — every relevant date in the life
/// of the tradeline and the dispute, passed or pending.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Milestone {
    pub event: String,
    pub date: DateTime<Utc>,
    pub passed: bool,
    pub significance: String,
}

/// The single soonest thing the consumer should do next.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NextAction {
    pub description: String,
    pub deadline: DateTime<Utc>,
}

/// The full deadline picture for one tradeline. Derived, never persisted:
/// rebuilt on demand from `CreditFields` + an optional dispute filing date.
/// It has no identity and no lifecycle — it's a pure function's output
/// wearing a struct costume.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadlineTracker {
    pub creditor_name: String,
    pub countdowns: Vec<Countdown>,
    pub milestones: Vec<Milestone>,
    pub next_action: Option<NextAction>,
}

/// Outcome categories the response classifier can assign. Declaration
/// order is the tie-break order — when two categories score the same
/// keyword count, the one declared first wins.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ResponseOutcome {
    Deleted,
    Updated,
    Verified,
    Insufficient,
    Partial,
    /// No classifiable signal at all. Not an error — a shrug.
    Unknown,
}

impl fmt::Display for ResponseOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseOutcome::Deleted => write!(f, "deleted"),
            ResponseOutcome::Updated => write!(f, "updated"),
            ResponseOutcome::Verified => write!(f, "verified"),
            ResponseOutcome::Insufficient => write!(f, "insufficient"),
            ResponseOutcome::Partial => write!(f, "partial"),
            ResponseOutcome::Unknown => write!(f, "unknown"),
        }
    }
}

/// Structural index of a response letter: who sent it, which accounts it
/// mentions, which section vocabulary it uses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseIndex {
    pub bureau: Option<Bureau>,
    pub account_refs: Vec<String>,
    pub sections: Vec<String>,
}

/// Per-account classification extracted from a response letter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseItem {
    pub account_ref: String,
    pub outcome: ResponseOutcome,
    pub evidence: Vec<String>,
}

/// Roll-up of per-account items into a single dispute outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseSummary {
    pub result: OutcomeResult,
    pub details: String,
}

/// Everything the classifier concluded about one response letter.
/// Ephemeral — it touches a Dispute only through explicit state machine
/// calls, never by osmosis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseAnalysis {
    pub outcome: ResponseOutcome,
    /// 0–100. Capped at 95, because certainty about a bureau form letter
    /// is a character flaw.
    pub confidence: u8,
    /// The unique keywords that matched, for humans doing spot checks.
    pub signals: Vec<String>,
    pub recommended_status: DisputeStatus,
    pub next_steps: Vec<String>,
    pub index: Option<ResponseIndex>,
    pub items: Vec<ResponseItem>,
}
