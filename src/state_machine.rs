// =============================================================================
// state_machine.rs — THE LIFECYCLE ENFORCEMENT DIVISION
// =============================================================================
//
// Every mutation a dispute record can legally undergo happens here, and
// ONLY here. No component writes dispute fields directly; they ask the
// state machine, the state machine writes it down, and the status history
// remembers forever.
//
// There is deliberately no enforced transition graph. Any status may follow
// any other — the system trusts the caller and records the receipts. A
// stricter transition table keeps getting proposed and keeps not being
// confirmed by anyone who actually runs disputes, so: trust, but append.
//
// Failure semantics are boring on purpose: every operation on an unknown
// dispute id returns None and touches nothing. No panics, no exceptions,
// no drama. Callers check. That's the deal.
// =============================================================================

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::classifier::summarize_response_items;
use crate::config::Config;
use crate::models::{
    Account, Bureau, CommDirection, CommMethod, Communication, Dispute, DisputeStatus,
    DisputeType, DocumentRecord, DocumentTag, Outcome, OutcomeResult, ResponseAnalysis,
    StatusChange, new_document_id,
};
use crate::repository::DisputeRepository;

/// Input shape for attaching a document. Id and timestamp are optional —
/// the state machine mints them when absent, because callers forget and
/// the record must not.
#[derive(Debug, Clone)]
pub struct DocumentInput {
    pub id: Option<String>,
    pub name: String,
    pub doc_type: String,
    pub content: Option<String>,
    pub tags: Vec<DocumentTag>,
    pub source: Option<String>,
    pub date_added: Option<DateTime<Utc>>,
}

/// Input shape for recording an outcome. `recorded_at` is stamped by the
/// state machine, not supplied, so resolution-time analytics can trust it.
#[derive(Debug, Clone)]
pub struct OutcomeInput {
    pub result: OutcomeResult,
    pub details: String,
    pub follow_up_required: bool,
}

/// What happened when an escalation was recorded. `AlreadyMarked` is the
/// idempotency guard doing its job, not a failure.
#[derive(Debug)]
pub enum EscalationOutcome {
    /// Documents attached, communication logged, status now `escalated`.
    Applied {
        dispute: Dispute,
        documents: Vec<DocumentRecord>,
    },
    /// The persisted marker was already on the record. Nothing changed.
    AlreadyMarked,
    /// No dispute with that id. Nothing changed.
    UnknownDispute,
}

/// The state machine itself: a thin, opinionated layer over the repository.
/// Clone-cheap (everything inside is an Arc) so the scheduler and the
/// daemon shell can each hold one.
#[derive(Clone)]
pub struct DisputeEngine {
    repo: Arc<dyn DisputeRepository>,
    config: Arc<Config>,
}

impl DisputeEngine {
    pub fn new(repo: Arc<dyn DisputeRepository>, config: Arc<Config>) -> Self {
        Self { repo, config }
    }

    /// Create a dispute and persist it.
    ///
    /// The statutory clock starts NOW: `submission_date = now` and
    /// `response_deadline = now + window(dispute_type)`. The deadline is
    /// computed exactly once, here, and never silently recomputed — a
    /// dispute keeps the deadline it was born with even if the config
    /// changes underneath it.
    ///
    /// The status history is seeded with a single draft→submitted entry,
    /// because a dispute that was never draft still conceptually passed
    /// through the mailbox.
    pub fn create_dispute(
        &self,
        account: Account,
        dispute_type: DisputeType,
        reason: impl Into<String>,
        violation_ids: Vec<String>,
        bureau: Option<Bureau>,
    ) -> Dispute {
        let now = Utc::now();
        let window_days = self.config.response_window_days(dispute_type);
        let response_deadline = now + Duration::days(window_days);
        let reason = reason.into();

        let dispute = Dispute {
            id: Uuid::new_v4().to_string(),
            account,
            dispute_type,
            bureau,
            status: DisputeStatus::Submitted,
            submission_date: now,
            response_deadline,
            reason,
            violation_ids,
            status_history: vec![StatusChange {
                date: now,
                from_status: DisputeStatus::Draft,
                to_status: DisputeStatus::Submitted,
                notes: Some("Dispute submitted".into()),
            }],
            communications: vec![],
            documents: vec![],
            outcome: None,
            notes: None,
            created_at: now,
            updated_at: now,
        };

        info!(
            dispute_id = %dispute.id,
            creditor = %dispute.account.creditor,
            dispute_type = %dispute_type,
            window_days = window_days,
            deadline = %response_deadline.date_naive(),
            "Dispute created — the statutory clock is running"
        );

        self.repo.put(dispute.clone());
        dispute
    }

    /// Transition a dispute to a new status, appending the move to the
    /// status history. Returns the updated record, or `None` for an
    /// unknown id.
    pub fn update_dispute_status(
        &self,
        id: &str,
        new_status: DisputeStatus,
        notes: Option<String>,
    ) -> Option<Dispute> {
        let result = self.repo.modify(id, &mut |dispute| {
            let now = Utc::now();
            let old_status = dispute.status;
            dispute.status_history.push(StatusChange {
                date: now,
                from_status: old_status,
                to_status: new_status,
                notes: notes.clone(),
            });
            dispute.status = new_status;
            dispute.updated_at = now;

            info!(
                dispute_id = %dispute.id,
                from = %old_status,
                to = %new_status,
                "Dispute status transition recorded"
            );
        });

        if result.is_none() {
            warn!(dispute_id = id, "Status update requested for unknown dispute — no-op");
        }
        result
    }

    /// Append a communication entry. Returns `None` for an unknown id.
    pub fn add_communication(&self, id: &str, entry: Communication) -> Option<Dispute> {
        self.repo.modify(id, &mut |dispute| {
            debug!(
                dispute_id = %dispute.id,
                subject = %entry.subject,
                "Communication logged"
            );
            dispute.communications.push(entry.clone());
            dispute.updated_at = Utc::now();
        })
    }

    /// Attach a document, minting an id and timestamp when the caller
    /// didn't supply them. Returns `None` for an unknown id.
    pub fn add_document(&self, id: &str, input: DocumentInput) -> Option<Dispute> {
        let record = DocumentRecord {
            id: input.id.unwrap_or_else(new_document_id),
            name: input.name,
            doc_type: input.doc_type,
            content: input.content,
            tags: input.tags,
            source: input.source,
            date_added: input.date_added.unwrap_or_else(Utc::now),
        };

        self.repo.modify(id, &mut |dispute| {
            debug!(
                dispute_id = %dispute.id,
                document = %record.name,
                "Document attached"
            );
            dispute.documents.push(record.clone());
            dispute.updated_at = Utc::now();
        })
    }

    /// Record the dispute's outcome. Deliberately does NOT change status —
    /// outcome and status are correlated but separate decisions, and the
    /// caller makes the second one.
    pub fn set_dispute_outcome(&self, id: &str, input: OutcomeInput) -> Option<Dispute> {
        self.repo.modify(id, &mut |dispute| {
            info!(
                dispute_id = %dispute.id,
                result = %input.result,
                follow_up = input.follow_up_required,
                "Dispute outcome recorded"
            );
            dispute.outcome = Some(Outcome {
                result: input.result,
                details: input.details.clone(),
                follow_up_required: input.follow_up_required,
                recorded_at: Utc::now(),
            });
            dispute.updated_at = Utc::now();
        })
    }

    /// Replace the dispute's working notes. Idempotent field replacement.
    pub fn update_dispute_notes(&self, id: &str, text: impl Into<String>) -> Option<Dispute> {
        let text = text.into();
        self.repo.modify(id, &mut |dispute| {
            dispute.notes = Some(text.clone());
            dispute.updated_at = Utc::now();
        })
    }

    /// Replace a document's tag set. Idempotent; `None` if either the
    /// dispute or the document is unknown.
    pub fn update_document_tags(
        &self,
        id: &str,
        doc_id: &str,
        tags: Vec<DocumentTag>,
    ) -> Option<Dispute> {
        let mut found = false;
        let result = self.repo.modify(id, &mut |dispute| {
            if let Some(doc) = dispute.documents.iter_mut().find(|d| d.id == doc_id) {
                doc.tags = tags.clone();
                dispute.updated_at = Utc::now();
                found = true;
            }
        });

        match result {
            Some(d) if found => Some(d),
            Some(_) => {
                warn!(dispute_id = id, doc_id = doc_id, "Tag update for unknown document — no-op");
                None
            }
            None => None,
        }
    }

    /// Record an escalation: attach the follow-up documents, log one
    /// communication describing the batch, and transition to `escalated`,
    /// all under a single repository lock acquisition.
    ///
    /// The persisted marker is re-checked inside the critical section —
    /// that re-check, not any in-process cache, is what makes concurrent
    /// scheduler ticks safe. If another tick already planted the marker,
    /// this returns [`EscalationOutcome::AlreadyMarked`] and the record
    /// is untouched.
    pub fn record_escalation(
        &self,
        id: &str,
        inputs: Vec<DocumentInput>,
        note: &str,
    ) -> EscalationOutcome {
        let now = Utc::now();
        let records: Vec<DocumentRecord> = inputs
            .into_iter()
            .map(|input| DocumentRecord {
                id: input.id.unwrap_or_else(new_document_id),
                name: input.name,
                doc_type: input.doc_type,
                content: input.content,
                tags: input.tags,
                source: input.source,
                date_added: input.date_added.unwrap_or(now),
            })
            .collect();
        let doc_names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
        let summary = format!("Generated follow-up documents: {}", doc_names.join("; "));

        let mut already_marked = false;
        let result = self.repo.modify(id, &mut |dispute| {
            if dispute.has_escalation_marker() {
                already_marked = true;
                return;
            }

            dispute.documents.extend(records.iter().cloned());
            dispute.communications.push(Communication {
                date: now,
                direction: CommDirection::Sent,
                method: CommMethod::Mail,
                subject: "Deadline expired — follow-up package generated".into(),
                summary: summary.clone(),
            });

            let old_status = dispute.status;
            dispute.status_history.push(StatusChange {
                date: now,
                from_status: old_status,
                to_status: DisputeStatus::Escalated,
                notes: Some(note.to_string()),
            });
            dispute.status = DisputeStatus::Escalated;
            dispute.updated_at = now;
        });

        match result {
            None => {
                warn!(dispute_id = id, "Escalation requested for unknown dispute — no-op");
                EscalationOutcome::UnknownDispute
            }
            Some(_) if already_marked => {
                debug!(dispute_id = id, "Escalation marker already present — no-op");
                EscalationOutcome::AlreadyMarked
            }
            Some(dispute) => {
                info!(
                    dispute_id = id,
                    creditor = %dispute.account.creditor,
                    documents = records.len(),
                    "Dispute escalated — follow-up package attached"
                );
                EscalationOutcome::Applied {
                    dispute,
                    documents: records,
                }
            }
        }
    }

    /// Apply a classifier verdict to a dispute in one motion: log the
    /// received letter, move to the recommended status, and — when the
    /// per-account items roll up to a summary — record the outcome.
    /// Built entirely from the primitive operations above; exists because
    /// every caller was writing exactly this sequence by hand.
    pub fn apply_response_analysis(
        &self,
        id: &str,
        analysis: &ResponseAnalysis,
    ) -> Option<Dispute> {
        self.add_communication(
            id,
            Communication {
                date: Utc::now(),
                direction: CommDirection::Received,
                method: CommMethod::Mail,
                subject: "Bureau response received".into(),
                summary: format!(
                    "Classified as '{}' with {}% confidence",
                    analysis.outcome, analysis.confidence
                ),
            },
        )?;

        if let Some(summary) = summarize_response_items(&analysis.items) {
            let follow_up_required = matches!(
                summary.result,
                OutcomeResult::Verified | OutcomeResult::NoResponse | OutcomeResult::Partial
            );
            self.set_dispute_outcome(
                id,
                OutcomeInput {
                    result: summary.result,
                    details: summary.details,
                    follow_up_required,
                },
            )?;
        }

        self.update_dispute_status(
            id,
            analysis.recommended_status,
            Some(format!("Response classified as '{}'", analysis.outcome)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryRepository;

    fn engine() -> (DisputeEngine, Arc<MemoryRepository>) {
        let repo = Arc::new(MemoryRepository::new());
        let config = Arc::new(Config::default());
        (
            DisputeEngine::new(repo.clone() as Arc<dyn DisputeRepository>, config),
            repo,
        )
    }

    fn account() -> Account {
        Account {
            creditor: "Vandelay Financial".into(),
            collector: Some("Apex Recovery".into()),
            value: 4821.50,
            account_type: "collection".into(),
        }
    }

    #[test]
    fn test_deadline_equals_submission_plus_window() {
        let (engine, _) = engine();
        let d = engine.create_dispute(account(), DisputeType::Bureau, "not mine", vec![], None);
        assert_eq!(d.response_deadline, d.submission_date + Duration::days(30));

        let d = engine.create_dispute(account(), DisputeType::Cfpb, "ignored", vec![], None);
        assert_eq!(d.response_deadline, d.submission_date + Duration::days(60));
    }

    #[test]
    fn test_deadline_survives_status_updates() {
        let (engine, _) = engine();
        let d = engine.create_dispute(account(), DisputeType::Bureau, "not mine", vec![], None);
        let original_deadline = d.response_deadline;

        let d = engine
            .update_dispute_status(&d.id, DisputeStatus::Investigating, None)
            .unwrap();
        let d = engine
            .update_dispute_status(&d.id, DisputeStatus::Escalated, Some("no response".into()))
            .unwrap();

        assert_eq!(d.response_deadline, original_deadline);
    }

    #[test]
    fn test_create_seeds_status_history() {
        let (engine, _) = engine();
        let d = engine.create_dispute(account(), DisputeType::Furnisher, "wrong balance", vec![], None);
        assert_eq!(d.status, DisputeStatus::Submitted);
        assert_eq!(d.status_history.len(), 1);
        assert_eq!(d.status_history[0].from_status, DisputeStatus::Draft);
        assert_eq!(d.status_history[0].to_status, DisputeStatus::Submitted);
    }

    #[test]
    fn test_history_tail_matches_current_status() {
        let (engine, _) = engine();
        let d = engine.create_dispute(account(), DisputeType::Bureau, "not mine", vec![], None);
        engine.update_dispute_status(&d.id, DisputeStatus::Investigating, None);
        let d = engine
            .update_dispute_status(&d.id, DisputeStatus::ResponseReceived, None)
            .unwrap();

        assert_eq!(d.status_history.last().unwrap().to_status, d.status);
        assert_eq!(d.status_history.len(), 3);
    }

    #[test]
    fn test_unknown_id_returns_none_and_leaves_repo_untouched() {
        let (engine, repo) = engine();
        let d = engine.create_dispute(account(), DisputeType::Bureau, "not mine", vec![], None);
        let before = repo.get(&d.id).unwrap();

        assert!(engine
            .update_dispute_status("ghost", DisputeStatus::Closed, None)
            .is_none());
        assert!(engine.update_dispute_notes("ghost", "hello").is_none());
        assert!(engine
            .set_dispute_outcome(
                "ghost",
                OutcomeInput {
                    result: OutcomeResult::Deleted,
                    details: "gone".into(),
                    follow_up_required: false,
                },
            )
            .is_none());

        let after = repo.get(&d.id).unwrap();
        assert_eq!(before.status, after.status);
        assert_eq!(before.status_history.len(), after.status_history.len());
        assert_eq!(repo.len(), 1);
    }

    #[test]
    fn test_add_document_mints_id_when_absent() {
        let (engine, _) = engine();
        let d = engine.create_dispute(account(), DisputeType::Bureau, "not mine", vec![], None);
        let d = engine
            .add_document(
                &d.id,
                DocumentInput {
                    id: None,
                    name: "statement.pdf".into(),
                    doc_type: "evidence".into(),
                    content: None,
                    tags: vec![DocumentTag::Evidence],
                    source: Some("upload".into()),
                    date_added: None,
                },
            )
            .unwrap();

        assert_eq!(d.documents.len(), 1);
        assert!(!d.documents[0].id.is_empty());
    }

    #[test]
    fn test_outcome_does_not_change_status() {
        let (engine, _) = engine();
        let d = engine.create_dispute(account(), DisputeType::Bureau, "not mine", vec![], None);
        let d = engine
            .set_dispute_outcome(
                &d.id,
                OutcomeInput {
                    result: OutcomeResult::Deleted,
                    details: "tradeline removed".into(),
                    follow_up_required: false,
                },
            )
            .unwrap();

        assert_eq!(d.status, DisputeStatus::Submitted);
        assert_eq!(d.outcome.as_ref().unwrap().result, OutcomeResult::Deleted);
    }

    fn followup_inputs() -> Vec<DocumentInput> {
        vec![
            DocumentInput {
                id: None,
                name: "No-response notice".into(),
                doc_type: "no_response_notice".into(),
                content: None,
                tags: vec![
                    DocumentTag::AutoFollowup,
                    DocumentTag::DeadlineExpired,
                    DocumentTag::NoResponseNotice,
                ],
                source: None,
                date_added: None,
            },
            DocumentInput {
                id: None,
                name: "MOV request".into(),
                doc_type: "mov_request".into(),
                content: None,
                tags: vec![
                    DocumentTag::AutoFollowup,
                    DocumentTag::DeadlineExpired,
                    DocumentTag::MovRequest,
                ],
                source: None,
                date_added: None,
            },
        ]
    }

    #[test]
    fn test_add_communication_appends_in_order() {
        let (engine, _) = engine();
        let d = engine.create_dispute(account(), DisputeType::Bureau, "not mine", vec![], None);

        for subject in ["first letter", "second letter"] {
            engine.add_communication(
                &d.id,
                Communication {
                    date: Utc::now(),
                    direction: CommDirection::Sent,
                    method: CommMethod::Mail,
                    subject: subject.into(),
                    summary: "".into(),
                },
            );
        }

        let d = engine.add_communication(
            &d.id,
            Communication {
                date: Utc::now(),
                direction: CommDirection::Received,
                method: CommMethod::Mail,
                subject: "their answer".into(),
                summary: "".into(),
            },
        )
        .unwrap();

        let subjects: Vec<&str> = d.communications.iter().map(|c| c.subject.as_str()).collect();
        assert_eq!(subjects, vec!["first letter", "second letter", "their answer"]);
    }

    #[test]
    fn test_apply_response_analysis_in_one_motion() {
        use crate::models::{ResponseItem, ResponseOutcome};

        let (engine, _) = engine();
        let d = engine.create_dispute(account(), DisputeType::Bureau, "not mine", vec![], None);

        let analysis = ResponseAnalysis {
            outcome: ResponseOutcome::Deleted,
            confidence: 90,
            signals: vec!["deleted".into()],
            recommended_status: DisputeStatus::ResolvedFavorable,
            next_steps: vec![],
            index: None,
            items: vec![ResponseItem {
                account_ref: "4512889011".into(),
                outcome: ResponseOutcome::Deleted,
                evidence: vec![],
            }],
        };

        let d = engine.apply_response_analysis(&d.id, &analysis).unwrap();
        assert_eq!(d.status, DisputeStatus::ResolvedFavorable);
        assert_eq!(d.communications.len(), 1);
        assert_eq!(d.outcome.as_ref().unwrap().result, OutcomeResult::Deleted);
        assert!(!d.outcome.as_ref().unwrap().follow_up_required);
    }

    #[test]
    fn test_record_escalation_attaches_and_transitions() {
        let (engine, _) = engine();
        let d = engine.create_dispute(account(), DisputeType::Bureau, "not mine", vec![], None);

        let outcome = engine.record_escalation(&d.id, followup_inputs(), "deadline lapsed");
        let dispute = match outcome {
            EscalationOutcome::Applied { dispute, documents } => {
                assert_eq!(documents.len(), 2);
                dispute
            }
            other => panic!("expected Applied, got {:?}", other),
        };

        assert_eq!(dispute.status, DisputeStatus::Escalated);
        assert_eq!(dispute.documents.len(), 2);
        assert_eq!(dispute.communications.len(), 1);
        assert!(dispute.has_escalation_marker());
        assert_eq!(dispute.status_history.last().unwrap().to_status, DisputeStatus::Escalated);
    }

    #[test]
    fn test_record_escalation_respects_existing_marker() {
        let (engine, repo) = engine();
        let d = engine.create_dispute(account(), DisputeType::Bureau, "not mine", vec![], None);

        assert!(matches!(
            engine.record_escalation(&d.id, followup_inputs(), "deadline lapsed"),
            EscalationOutcome::Applied { .. }
        ));
        let before = repo.get(&d.id).unwrap();

        assert!(matches!(
            engine.record_escalation(&d.id, followup_inputs(), "deadline lapsed"),
            EscalationOutcome::AlreadyMarked
        ));
        let after = repo.get(&d.id).unwrap();
        assert_eq!(before.documents.len(), after.documents.len());
        assert_eq!(before.communications.len(), after.communications.len());
        assert_eq!(before.status_history.len(), after.status_history.len());
    }

    #[test]
    fn test_record_escalation_unknown_dispute() {
        let (engine, _) = engine();
        assert!(matches!(
            engine.record_escalation("ghost", followup_inputs(), "deadline lapsed"),
            EscalationOutcome::UnknownDispute
        ));
    }

    #[test]
    fn test_update_document_tags_replaces_wholesale() {
        let (engine, _) = engine();
        let d = engine.create_dispute(account(), DisputeType::Bureau, "not mine", vec![], None);
        let d = engine
            .add_document(
                &d.id,
                DocumentInput {
                    id: Some("doc-1".into()),
                    name: "letter.pdf".into(),
                    doc_type: "response".into(),
                    content: None,
                    tags: vec![DocumentTag::Imported],
                    source: None,
                    date_added: None,
                },
            )
            .unwrap();

        let d = engine
            .update_document_tags(&d.id, "doc-1", vec![DocumentTag::Imported, DocumentTag::PdfReady])
            .unwrap();
        assert_eq!(
            d.documents[0].tags,
            vec![DocumentTag::Imported, DocumentTag::PdfReady]
        );

        assert!(engine
            .update_document_tags(&d.id, "no-such-doc", vec![])
            .is_none());
    }
}
