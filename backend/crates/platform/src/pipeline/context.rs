//! Per-request security context

/// Authenticated caller, taken from a verified access token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// Token subject (user id)
    pub subject: String,
    pub role: String,
    pub token_id: String,
}

/// Security context threaded through the pipeline and into handlers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    principal: Option<Principal>,
}

impl RequestContext {
    pub fn anonymous() -> Self {
        Self { principal: None }
    }

    pub fn authenticated(principal: Principal) -> Self {
        Self {
            principal: Some(principal),
        }
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.principal.is_some()
    }

    /// Current-user accessor: id of the authenticated caller
    pub fn current_user_id(&self) -> Option<&str> {
        self.principal.as_ref().map(|p| p.subject.as_str())
    }

    pub fn role(&self) -> Option<&str> {
        self.principal.as_ref().map(|p| p.role.as_str())
    }
}
