//! Agent memory: access tracking, importance decay, salience ranking,
//! working-memory sessions, and token-budgeted context assembly.

pub mod access_tracker;
pub mod context;
pub mod decay;
pub mod salience;
pub mod working;

pub use access_tracker::{AccessPattern, AccessSummary, AccessTracker};
pub use context::{BudgetAllocation, ContextBreakdown, ContextOptions, ContextResult, ExcludedEntity, ExclusionReason};
pub use decay::{DecayConfig, DecayReport, DecayScheduler, ForgetWeakMemoriesOptions, ForgetWeakMemoriesReport};
pub use salience::{RankedEntity, SalienceContext, SalienceWeights};
pub use working::{PromotionCandidate, SessionIndex};
