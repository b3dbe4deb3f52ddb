//! Domain validation errors for entity constructors and lifecycle transitions.

use rust_decimal::Decimal;
use thiserror::Error;

/// Semantic validation errors raised by the Creation and Lifecycle services.
///
/// These never cause a state change; the caller receives the error unchanged.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("price must be a finite positive decimal, got {0}")]
    InvalidPrice(Decimal),

    #[error("stop-loss {stop_loss} must be below entry {entry} for LONG")]
    LongStopAboveEntry { entry: Decimal, stop_loss: Decimal },

    #[error("stop-loss {stop_loss} must be above entry {entry} for SHORT")]
    ShortStopBelowEntry { entry: Decimal, stop_loss: Decimal },

    #[error("target {price} must be above entry {entry} for LONG")]
    LongTargetBelowEntry { entry: Decimal, price: Decimal },

    #[error("target {price} must be below entry {entry} for SHORT")]
    ShortTargetAboveEntry { entry: Decimal, price: Decimal },

    #[error("targets list must be non-empty")]
    EmptyTargets,

    #[error("sum of target close percentages {sum} exceeds 100")]
    TargetsExceed100 { sum: Decimal },

    #[error("open size percent {0} out of range [0, 100]")]
    InvalidOpenSizePercent(Decimal),

    #[error("entry can only be edited while status is PENDING")]
    EntryEditNotAllowed,

    #[error("operation requires the entity to be ACTIVE")]
    NotActive,

    #[error("entity is already closed")]
    AlreadyClosed,

    #[error("user is already tracking this recommendation")]
    AlreadyTracking,

    #[error("cannot track a closed recommendation")]
    SourceAlreadyClosed,

    #[error("unknown {kind} with id {id}")]
    UnknownEntity { kind: &'static str, id: i64 },

    #[error("only analysts may create recommendations")]
    Unauthorized,

    #[error("asset symbol must not be empty")]
    EmptyAsset,
}
