// =============================================================================
// followup.rs — THE PAPERWORK ARTILLERY BATTERY
// =============================================================================
//
// When a response deadline lapses, the scheduler fires three rounds:
//
// 1. A no-response notice — "you had 30 days, the 30 days are gone, and
//    both of us know what FCRA §611 says about that."
// 2. A Method of Verification request — the §611(a)(7) demand for the
//    paperwork behind the non-answer they didn't send.
// 3. A CFPB complaint outline — the structured skeleton of the complaint
//    that gets filed if the first two rounds land in a shredder.
//
// This module decides WHICH documents exist and how they are tagged. It
// deliberately does not write the prose: letter wording, PDF bytes, and
// letterhead aesthetics belong to the external formatter on the far side
// of the outbox. The trait is the seam — the daemon plugs in the standard
// builder, tests plug in whatever they need to observe.
// =============================================================================

use crate::models::{ConsumerInfo, Dispute, DocumentTag};
use crate::state_machine::DocumentInput;

/// The document-builder collaborator. Given a dispute whose deadline has
/// lapsed, produce the follow-up documents the escalation should attach.
pub trait FollowUpBuilder: Send + Sync {
    fn build_followups(
        &self,
        dispute: &Dispute,
        consumer: Option<&ConsumerInfo>,
    ) -> Vec<DocumentInput>;
}

/// The standard three-document battery. Every document carries the
/// escalation marker pair (`AutoFollowup` + `DeadlineExpired`) plus its
/// own kind tag, so the idempotency guard and downstream routing both
/// work off the same structured tags.
pub struct StandardFollowUpBuilder;

impl StandardFollowUpBuilder {
    fn doc(
        name: String,
        doc_type: &str,
        kind: DocumentTag,
        source: String,
    ) -> DocumentInput {
        DocumentInput {
            id: None,
            name,
            doc_type: doc_type.into(),
            // Prose is the formatter's job. We ship the skeleton.
            content: None,
            tags: vec![DocumentTag::AutoFollowup, DocumentTag::DeadlineExpired, kind],
            source: Some(source),
            date_added: None,
        }
    }
}

impl FollowUpBuilder for StandardFollowUpBuilder {
    fn build_followups(
        &self,
        dispute: &Dispute,
        consumer: Option<&ConsumerInfo>,
    ) -> Vec<DocumentInput> {
        let creditor = &dispute.account.creditor;
        let target = dispute
            .bureau
            .map(|b| b.to_string())
            .unwrap_or_else(|| creditor.clone());

        // The consumer's name rides along as document source context so
        // the formatter can address the letter. Absent a configured
        // consumer, the scheduler itself is the source of record.
        let source = consumer
            .map(|c| format!("escalation_scheduler:{}", c.name))
            .unwrap_or_else(|| "escalation_scheduler".to_string());

        vec![
            Self::doc(
                format!("No-response notice — {}", target),
                "no_response_notice",
                DocumentTag::NoResponseNotice,
                source.clone(),
            ),
            Self::doc(
                format!("Method of Verification request — {}", target),
                "mov_request",
                DocumentTag::MovRequest,
                source.clone(),
            ),
            Self::doc(
                format!("CFPB complaint outline — {}", target),
                "cfpb_outline",
                DocumentTag::CfpbOutline,
                source,
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Account, Bureau, DisputeStatus, DisputeType};
    use chrono::Utc;

    fn dispute(bureau: Option<Bureau>) -> Dispute {
        Dispute {
            id: "d1".into(),
            account: Account {
                creditor: "Vandelay Financial".into(),
                collector: None,
                value: 900.0,
                account_type: "collection".into(),
            },
            dispute_type: DisputeType::Bureau,
            bureau,
            status: DisputeStatus::Submitted,
            submission_date: Utc::now(),
            response_deadline: Utc::now(),
            reason: "not mine".into(),
            violation_ids: vec![],
            status_history: vec![],
            communications: vec![],
            documents: vec![],
            outcome: None,
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_builds_the_three_document_battery() {
        let docs = StandardFollowUpBuilder.build_followups(&dispute(Some(Bureau::Equifax)), None);
        assert_eq!(docs.len(), 3);

        let kinds: Vec<_> = docs.iter().map(|d| d.doc_type.as_str()).collect();
        assert_eq!(kinds, vec!["no_response_notice", "mov_request", "cfpb_outline"]);
    }

    #[test]
    fn test_every_document_carries_the_marker_pair() {
        let docs = StandardFollowUpBuilder.build_followups(&dispute(None), None);
        for doc in &docs {
            assert!(doc.tags.contains(&DocumentTag::AutoFollowup));
            assert!(doc.tags.contains(&DocumentTag::DeadlineExpired));
            assert_eq!(doc.tags.len(), 3);
        }
    }

    #[test]
    fn test_names_target_the_bureau_when_known() {
        let docs = StandardFollowUpBuilder.build_followups(&dispute(Some(Bureau::Equifax)), None);
        assert!(docs[0].name.contains("Equifax"));

        let docs = StandardFollowUpBuilder.build_followups(&dispute(None), None);
        assert!(docs[0].name.contains("Vandelay Financial"));
    }

    #[test]
    fn test_consumer_context_rides_in_source() {
        let consumer = ConsumerInfo {
            name: "Pat Doe".into(),
            address: None,
            state: Some("TX".into()),
        };
        let docs =
            StandardFollowUpBuilder.build_followups(&dispute(None), Some(&consumer));
        assert_eq!(docs[0].source.as_deref(), Some("escalation_scheduler:Pat Doe"));
    }
}
