use std::fmt::{Display, Formatter};
use std::time::Duration;

use rolegate_core::{ActorId, AppError, AppResult, UserIdentity};
use rolegate_domain::PermissionKey;

use crate::{PermissionDecisions, PolicyEvaluator};

/// How the checks of a requirement combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckMode {
    /// Every check must pass.
    All,
    /// At least one check must pass.
    Any,
    /// Exactly one check, which must pass.
    Single,
}

/// Permission predicate guarding a protected operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionRequirement {
    mode: CheckMode,
    checks: Vec<PermissionKey>,
}

impl PermissionRequirement {
    /// Requires one `(resource, action)` pair.
    pub fn single(resource: &str, action: &str) -> AppResult<Self> {
        Ok(Self {
            mode: CheckMode::Single,
            checks: vec![PermissionKey::new(resource, action)?],
        })
    }

    /// Requires every listed pair.
    pub fn all(checks: Vec<PermissionKey>) -> AppResult<Self> {
        Self::combined(CheckMode::All, checks)
    }

    /// Requires at least one listed pair.
    pub fn any(checks: Vec<PermissionKey>) -> AppResult<Self> {
        Self::combined(CheckMode::Any, checks)
    }

    fn combined(mode: CheckMode, mut checks: Vec<PermissionKey>) -> AppResult<Self> {
        checks.sort();
        checks.dedup();
        if checks.is_empty() {
            return Err(AppError::Validation(
                "permission requirement must name at least one check".to_owned(),
            ));
        }

        Ok(Self { mode, checks })
    }

    /// Returns the composition mode.
    #[must_use]
    pub fn mode(&self) -> CheckMode {
        self.mode
    }

    /// Returns the checked pairs.
    #[must_use]
    pub fn checks(&self) -> &[PermissionKey] {
        self.checks.as_slice()
    }

    /// Applies the predicate to evaluated decisions.
    pub fn evaluate(&self, decisions: &PermissionDecisions) -> Result<(), DenyReason> {
        match self.mode {
            CheckMode::Single => match self.checks.first() {
                Some(key) if decisions.is_granted(key) => Ok(()),
                Some(key) => Err(DenyReason::MissingPermission {
                    required: key.clone(),
                }),
                None => Err(DenyReason::MissingPermissions {
                    missing: Vec::new(),
                }),
            },
            CheckMode::Any => {
                if self.checks.iter().any(|key| decisions.is_granted(key)) {
                    Ok(())
                } else {
                    Err(DenyReason::MissingAnyPermission {
                        any_of: self.checks.clone(),
                    })
                }
            }
            CheckMode::All => {
                let missing = self
                    .checks
                    .iter()
                    .filter(|key| !decisions.is_granted(key))
                    .cloned()
                    .collect::<Vec<_>>();
                if missing.is_empty() {
                    Ok(())
                } else {
                    Err(DenyReason::MissingPermissions { missing })
                }
            }
        }
    }
}

/// Why the gateway refused to run a protected operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    /// No identity could be resolved for the caller.
    AuthenticationRequired,
    /// The single required pair is not granted.
    MissingPermission {
        /// Required pair.
        required: PermissionKey,
    },
    /// None of the alternatives of an ANY requirement is granted.
    ///
    /// The first alternative, in key order, is reported as the required pair.
    MissingAnyPermission {
        /// Every acceptable pair, ordered.
        any_of: Vec<PermissionKey>,
    },
    /// Pairs of an ALL requirement that are not granted.
    MissingPermissions {
        /// Pairs that were not granted.
        missing: Vec<PermissionKey>,
    },
    /// Evaluation failed or timed out; the request is refused.
    EvaluationFailed(String),
}

impl Display for DenyReason {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AuthenticationRequired => formatter.write_str("authentication required"),
            Self::MissingPermission { required } => {
                write!(formatter, "missing permission '{required}'")
            }
            Self::MissingAnyPermission { any_of } => {
                let listed = any_of
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("', '");
                write!(formatter, "missing one of permissions '{listed}'")
            }
            Self::MissingPermissions { missing } => {
                let listed = missing
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("', '");
                write!(formatter, "missing permissions '{listed}'")
            }
            Self::EvaluationFailed(detail) => {
                write!(formatter, "permission evaluation failed: {detail}")
            }
        }
    }
}

impl From<DenyReason> for AppError {
    fn from(value: DenyReason) -> Self {
        match value {
            DenyReason::AuthenticationRequired => Self::Unauthorized(value.to_string()),
            DenyReason::MissingPermission { .. }
            | DenyReason::MissingAnyPermission { .. }
            | DenyReason::MissingPermissions { .. } => {
                Self::Forbidden(value.to_string())
            }
            DenyReason::EvaluationFailed(detail) => Self::Internal(detail),
        }
    }
}

/// Identity and precomputed decisions handed to a protected operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessContext {
    identity: UserIdentity,
    decisions: PermissionDecisions,
}

impl AccessContext {
    /// Returns the resolved caller identity.
    #[must_use]
    pub fn identity(&self) -> &UserIdentity {
        &self.identity
    }

    /// Returns the caller's actor id.
    #[must_use]
    pub fn actor_id(&self) -> ActorId {
        self.identity.actor_id()
    }

    /// Returns the decisions computed at the boundary.
    #[must_use]
    pub fn decisions(&self) -> &PermissionDecisions {
        &self.decisions
    }
}

/// Boundary that evaluates a requirement before a protected operation runs.
#[derive(Clone)]
pub struct EnforcementGateway {
    evaluator: PolicyEvaluator,
    evaluation_timeout: Duration,
}

impl EnforcementGateway {
    /// Creates a gateway with a bound on how long one evaluation may take.
    #[must_use]
    pub fn new(evaluator: PolicyEvaluator, evaluation_timeout: Duration) -> Self {
        Self {
            evaluator,
            evaluation_timeout,
        }
    }

    /// Returns the evaluator behind the gateway.
    #[must_use]
    pub fn evaluator(&self) -> &PolicyEvaluator {
        &self.evaluator
    }

    /// Resolves identity only, for operations open to any signed-in actor.
    pub fn authenticate(&self, identity: Option<UserIdentity>) -> Result<AccessContext, DenyReason> {
        let identity = identity.ok_or(DenyReason::AuthenticationRequired)?;

        Ok(AccessContext {
            identity,
            decisions: PermissionDecisions::default(),
        })
    }

    /// Evaluates the requirement for the caller.
    ///
    /// The returned context carries every decision made, so nested checks can
    /// reuse them through [`EnforcementGateway::require`].
    pub async fn authorize(
        &self,
        identity: Option<UserIdentity>,
        requirement: &PermissionRequirement,
    ) -> Result<AccessContext, DenyReason> {
        let identity = identity.ok_or(DenyReason::AuthenticationRequired)?;
        let decisions = self
            .evaluate(identity.actor_id(), requirement.checks())
            .await?;

        requirement.evaluate(&decisions)?;

        Ok(AccessContext {
            identity,
            decisions,
        })
    }

    /// Checks a nested requirement inside an already authorized operation.
    ///
    /// Decisions already present in the context are reused; only unseen pairs
    /// are evaluated, in one bulk read.
    pub async fn require(
        &self,
        context: &AccessContext,
        requirement: &PermissionRequirement,
    ) -> AppResult<()> {
        let unseen = requirement
            .checks()
            .iter()
            .filter(|key| context.decisions.decision(key).is_none())
            .cloned()
            .collect::<Vec<_>>();

        if unseen.is_empty() {
            return requirement.evaluate(&context.decisions).map_err(Into::into);
        }

        let mut decisions = context.decisions.clone();
        decisions.extend(self.evaluate(context.actor_id(), unseen.as_slice()).await?);

        requirement.evaluate(&decisions).map_err(Into::into)
    }

    async fn evaluate(
        &self,
        actor_id: ActorId,
        checks: &[PermissionKey],
    ) -> Result<PermissionDecisions, DenyReason> {
        match tokio::time::timeout(
            self.evaluation_timeout,
            self.evaluator.has_permissions(actor_id, checks),
        )
        .await
        {
            Ok(Ok(decisions)) => Ok(decisions),
            Ok(Err(error)) => Err(DenyReason::EvaluationFailed(error.to_string())),
            Err(_) => Err(DenyReason::EvaluationFailed(format!(
                "evaluation exceeded {} ms",
                self.evaluation_timeout.as_millis()
            ))),
        }
    }
}
