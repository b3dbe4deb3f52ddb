//! The four core subsystems plus Creation (§4).
//!
//! - [`aggregator`]: owns the exchange feeds, diffs the required symbol set
//!   against the Trigger Index, and fans decoded ticks out over a broadcast
//!   channel (§4.2).
//! - [`index`]: the in-memory Trigger Index rebuilt from the Store (§4.3).
//! - [`evaluator`]: the hot-path tick consumer - debounce, tie-break, dispatch
//!   (§4.4).
//! - [`lifecycle`]: the only place a Recommendation or UserTrade transitions
//!   after creation (§4.5).
//! - [`creation`]: validates and persists new Recommendations/UserTrades,
//!   shadow-then-publish (§4.7).

pub mod aggregator;
pub mod creation;
pub mod evaluator;
pub mod index;
pub mod lifecycle;

pub use aggregator::PriceAggregator;
pub use creation::{CreationService, SourceChannel};
pub use evaluator::AlertEvaluator;
pub use index::TriggerIndex;
pub use lifecycle::LifecycleService;
