//! Identity-continuity checking.
//!
//! An id moves through UNSEEN, ACTIVE (measured or predicted) and a cool-down
//! after DELETED before it may be reassigned. [`IdentityContinuityChecker`]
//! folds the ordered frames through a [`ContinuityState`] and reports every
//! breached rule as a [`Violation`].

mod checker;
mod state;
mod violation;

pub use checker::{Ambiguity, CycleInput, IdentityContinuityChecker, StepOutcome};
pub use state::{ContinuityEntry, ContinuityState};
pub use violation::{RuleName, Violation};
