// =============================================================================
// DISPUTE DOOM ENGINE — library root
// =============================================================================
//
// The compliance core, embeddable anywhere a consumer's dispute corpus
// needs watching:
//
//   models        — the dispute record and everything hanging off it
//   config        — statutory windows and every other knob
//   repository    — the dispute vault (trait + in-memory/JSON-snapshot impl)
//   state_machine — the only code allowed to mutate a dispute
//   deadline      — pure statutory countdown math (FCRA §611 / §605)
//   classifier    — bureau response letters → structured outcomes
//   followup      — the three-document escalation battery
//   guard         — bloom + LRU memory of already-handled lapses
//   scheduler     — the deadline enforcement sweep
//   analytics     — read-only corpus statistics + status endpoint
//   publisher     — outbox → Redis delivery
//
// The binary in main.rs wires these into a daemon; everything here also
// works perfectly well without it.
// =============================================================================

pub mod analytics;
pub mod classifier;
pub mod config;
pub mod deadline;
pub mod followup;
pub mod guard;
pub mod models;
pub mod publisher;
pub mod repository;
pub mod scheduler;
pub mod state_machine;
