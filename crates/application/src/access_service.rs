//! Route and affordance gating against the current session.

use std::collections::BTreeSet;
use std::sync::Arc;

use staffhq_domain::{Capability, Role};

use crate::session_service::{SessionPhase, SessionService, SessionSnapshot};

/// Destination the caller must navigate to when access is not allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectTarget {
    /// Login entry point: the session is not authenticated.
    Login,
    /// Administrative landing page.
    AdminLanding,
    /// Staff landing page.
    StaffLanding,
    /// Explicit unauthorized page; the fallback of last resort.
    Unauthorized,
}

/// Outcome of a guard evaluation.
///
/// Denial always names a destination: the user is never left without a next
/// action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    /// Hydration has not finished; defer navigation, neither allow nor deny.
    Pending,
    /// Every present constraint passed.
    Allow,
    /// Access denied or unauthenticated; navigate to the target.
    Redirect(RedirectTarget),
}

/// Constraints a route or affordance places on the session.
///
/// Both constraints are ANDed when present; absence of both means
/// "authenticated is sufficient".
#[derive(Debug, Clone, Default)]
pub struct AccessRequirement {
    /// Roles allowed through, if the route is role-gated.
    pub roles: Option<BTreeSet<Role>>,
    /// Capability that must be granted, if the route is permission-gated.
    pub permission: Option<Capability>,
}

impl AccessRequirement {
    /// Requirement satisfied by any authenticated session.
    #[must_use]
    pub fn authenticated() -> Self {
        Self::default()
    }

    /// Restricts the requirement to the given roles.
    #[must_use]
    pub fn with_roles(mut self, roles: impl IntoIterator<Item = Role>) -> Self {
        self.roles = Some(roles.into_iter().collect());
        self
    }

    /// Restricts the requirement to holders of the given capability.
    #[must_use]
    pub fn with_permission(mut self, permission: Capability) -> Self {
        self.permission = Some(permission);
        self
    }
}

/// Application service evaluating access against the live session.
#[derive(Clone)]
pub struct AccessService {
    session: Arc<SessionService>,
}

impl AccessService {
    /// Creates an access service reading from the given session.
    #[must_use]
    pub fn new(session: Arc<SessionService>) -> Self {
        Self { session }
    }

    /// Returns whether the current session satisfies the requirement.
    #[must_use]
    pub fn can_access(&self, requirement: &AccessRequirement) -> bool {
        matches!(
            self.require_authenticated(requirement),
            AccessDecision::Allow
        )
    }

    /// Evaluates the requirement and names the redirect on denial.
    #[must_use]
    pub fn require_authenticated(&self, requirement: &AccessRequirement) -> AccessDecision {
        Self::evaluate(&self.session.snapshot(), requirement)
    }

    /// Pure evaluation of a requirement against one session snapshot.
    #[must_use]
    pub fn evaluate(snapshot: &SessionSnapshot, requirement: &AccessRequirement) -> AccessDecision {
        match snapshot.phase {
            SessionPhase::Uninitialized | SessionPhase::Hydrating => return AccessDecision::Pending,
            SessionPhase::Unauthenticated => {
                return AccessDecision::Redirect(RedirectTarget::Login);
            }
            SessionPhase::Authenticated => {}
        }

        let Some(identity) = &snapshot.identity else {
            return AccessDecision::Redirect(RedirectTarget::Unauthorized);
        };

        let roles_satisfied = requirement
            .roles
            .as_ref()
            .is_none_or(|roles| identity.matches_role(roles));
        let permission_satisfied = requirement
            .permission
            .as_ref()
            .is_none_or(|permission| snapshot.permissions.contains(permission));

        if roles_satisfied && permission_satisfied {
            return AccessDecision::Allow;
        }

        let landing = match identity.role {
            Role::Admin => RedirectTarget::AdminLanding,
            Role::Staff => RedirectTarget::StaffLanding,
        };
        AccessDecision::Redirect(landing)
    }
}
