//! **duetrack-schedule** — pure reminder-cadence computation.
//!
//! # Modules
//!
//! | Module | Purpose |
//! |---|---|
//! | [`types`] | Cadence, calendar and policy configuration, evaluation results |
//! | [`next_send`] | Timezone-aware next-send instant computation |
//!
//! Everything here is a pure function of an explicit `now`; the crate
//! performs no I/O and never reads the clock.

pub mod types;
pub mod next_send;
