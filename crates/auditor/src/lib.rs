//! Static consistency auditor for handler authorization.
//!
//! Classifies each protected-operation unit by the enforcement idiom it uses
//! and flags units that bypass the policy evaluator.

#![forbid(unsafe_code)]

mod analysis;
mod config;
mod report;
mod scan;
mod source;

pub use analysis::{
    CallKind, ComparisonOperator, EnforcementCall, HTTP_METHODS, HandlerRecord, IssueTag,
    LegacyCheck,
};
pub use config::AuditConfig;
pub use report::{AuditReport, AuditSummary, REMEDIATIONS, SkippedUnit};
pub use scan::{AuditError, ConsistencyAuditor};
