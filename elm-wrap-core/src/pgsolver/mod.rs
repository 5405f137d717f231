// SPDX-License-Identifier: MPL-2.0

//! The PubGrub-style conflict-driven dependency solver (spec.md §4.1/§4.2).
//!
//! The teacher crate delegates this whole algorithm to an external
//! `pubgrub` dependency; this module owns it directly so the
//! derivation-graph and incompatibility machinery the rest of this crate
//! depends on (registry-backed provider, error reporting) is inspectable
//! and testable in-tree.

pub mod incompatibility;
pub mod partial_solution;
pub mod provider;
pub mod ranges;
pub mod report;
pub mod solve;
pub mod types;

pub use incompatibility::Store;
pub use partial_solution::PartialSolution;
pub use provider::{Dependencies, DependencyProvider, OfflineProvider};
pub use ranges::Ranges;
pub use report::{report, Report};
pub use solve::{resolve, SolveError, SolveStats};
pub use types::{Assignment, DecisionLevel, Incompatibility, IncompatibilityId, Reason, Relation, Term};
