// src/pipeline/mod.rs

//! Pipeline entry points for harvester operations.
//!
//! - `Harvester`: the polling loop over configured feeds
//! - `reresolve`: re-run field inference over stored records
//! - `recent`: list recently published records

pub mod diff;
pub mod harvest;
pub mod recent;
pub mod reresolve;

pub use diff::{DiffCalculator, DiffResult, DiscoveredItem};
pub use harvest::{Clock, CycleReport, CycleStage, Harvester, SystemClock};
pub use recent::{recent, since_days};
pub use reresolve::{ReresolveReport, reresolve};
