// =============================================================================
// scheduler.rs — THE DEADLINE ENFORCEMENT SWEEP
// =============================================================================
//
// The statutory premise is simple: a bureau that receives a dispute has a
// response window, and when that window closes without a response, the
// consumer's posture changes from "waiting politely" to "documenting a
// violation". This module is the part of the engine that notices.
//
// Each tick sweeps the repository for disputes that are (a) not in a
// terminal status, (b) past their response deadline by date — midnight is
// midnight, we don't argue about hours — and (c) not yet carrying the
// escalation marker pair. Qualifying disputes get the three-document
// follow-up battery, one communication entry, and a transition to
// `escalated`.
//
// Idempotency is the entire game here. The tick runs on a timer, runs
// after mutations, and must be safe to run from two triggers at once.
// The persisted marker pair on the documents is the one and only
// correctness guarantee: it is checked during the sweep and re-checked
// inside the state machine's critical section before anything is
// appended. The in-process guard in front of it merely saves repeat
// work between ticks — it can skip nothing on its own authority.
// =============================================================================

use std::sync::Arc;

use chrono::{DateTime, Utc};
use crossbeam_channel::Sender;
use tracing::{debug, info, warn};

use crate::followup::FollowUpBuilder;
use crate::guard::EscalationGuard;
use crate::models::{ConsumerInfo, EscalationEvent};
use crate::repository::DisputeRepository;
use crate::state_machine::{DisputeEngine, EscalationOutcome};

/// The note attached to every auto-escalation's status transition.
const ESCALATION_NOTE: &str =
    "Auto-escalated: response deadline expired with no response on file";

/// The sweep orchestrator. Holds the repository for scanning, the state
/// machine for mutating, the guard for remembering, the builder for
/// paperwork, and — when the daemon is running — the outbox for telling
/// the outside world.
pub struct EscalationScheduler {
    repo: Arc<dyn DisputeRepository>,
    engine: DisputeEngine,
    guard: Arc<EscalationGuard>,
    builder: Arc<dyn FollowUpBuilder>,
    consumer: Option<ConsumerInfo>,
    outbox: Option<Sender<EscalationEvent>>,
}

impl EscalationScheduler {
    pub fn new(
        repo: Arc<dyn DisputeRepository>,
        engine: DisputeEngine,
        guard: Arc<EscalationGuard>,
        builder: Arc<dyn FollowUpBuilder>,
        consumer: Option<ConsumerInfo>,
        outbox: Option<Sender<EscalationEvent>>,
    ) -> Self {
        Self {
            repo,
            engine,
            guard,
            builder,
            consumer,
            outbox,
        }
    }

    /// Run one escalation sweep as of `now`. Returns the ids of disputes
    /// escalated by THIS tick — a repeat tick over an unchanged
    /// repository returns an empty list.
    ///
    /// A deadline has lapsed when its calendar date is strictly before
    /// today's. A deadline of today has not lapsed; the bureau gets its
    /// whole final day, and not one day more.
    pub fn tick(&self, now: DateTime<Utc>) -> Vec<String> {
        let today = now.date_naive();
        let mut escalated = Vec::new();
        let mut swept = 0usize;

        for dispute in self.repo.list() {
            swept += 1;

            if dispute.status.is_terminal() {
                continue;
            }
            if dispute.response_deadline.date_naive() >= today {
                continue;
            }

            let key = dispute.guard_key();
            if !self.guard.check_and_insert(&key) {
                // The guard remembers this lapse. Only the persisted
                // marker may authorize the skip, so confirm it.
                if dispute.has_escalation_marker() {
                    continue;
                }
                debug!(
                    dispute_id = %dispute.id,
                    "Guard remembered a key the repository doesn't — proceeding to the marker re-check"
                );
            } else if dispute.has_escalation_marker() {
                // Cold guard, warm repository: a previous process already
                // escalated this. The guard just learned the key; the
                // next tick takes the fast path.
                continue;
            }

            let inputs = self.builder.build_followups(&dispute, self.consumer.as_ref());
            match self.engine.record_escalation(&dispute.id, inputs, ESCALATION_NOTE) {
                EscalationOutcome::Applied { dispute, documents } => {
                    if let Some(tx) = &self.outbox {
                        for document in documents {
                            let event = EscalationEvent::new(&dispute, document, now);
                            if let Err(e) = tx.try_send(event) {
                                warn!(
                                    dispute_id = %dispute.id,
                                    error = %e,
                                    "Outbox full or gone — document event dropped (record is persisted)"
                                );
                            }
                        }
                    }
                    escalated.push(dispute.id);
                }
                EscalationOutcome::AlreadyMarked => {
                    // A concurrent tick won the race inside the critical
                    // section. Exactly what the re-check is for.
                    debug!(dispute_id = %dispute.id, "Lost the escalation race — marker already planted");
                }
                EscalationOutcome::UnknownDispute => {
                    // Listed a moment ago, gone now. Nothing to do.
                }
            }
        }

        if escalated.is_empty() {
            debug!(swept = swept, "Escalation sweep complete — nothing lapsed");
        } else {
            info!(
                swept = swept,
                escalated = escalated.len(),
                "Escalation sweep complete — follow-up packages generated"
            );
        }

        escalated
    }
}
