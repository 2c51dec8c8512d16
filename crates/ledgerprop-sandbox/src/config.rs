/// Which of the historically-seen allocation response shapes to emit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AllocationShape {
    /// `{"party": ..}`
    #[default]
    Direct,
    /// `{"partyDetails": {"party": ..}}`
    Nested,
    /// `{"identifier": ..}`
    Identifier,
    /// None of the above; clients must fail loudly.
    Unrecognized,
}

/// Deliberate misbehavior for exercising client error handling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Fault {
    #[default]
    None,
    /// Every route answers 502 with a plain-text body.
    Opaque,
    /// Every route answers 200 without a `result` member.
    MissingResult,
    /// Allocation hands back the first party it ever issued.
    RepeatParty,
    /// Contracts travel in their smallest documented form: `create` answers
    /// `{contractId}` and reads answer `{contractId, payload}`.
    MinimalContracts,
}

#[derive(Clone)]
pub struct SandboxConfig {
    /// Tokens naming any other ledger are refused.
    pub ledger_id: String,
    /// Suffix of allocated party identifiers.
    pub participant: String,
    /// When set, only HS256 tokens signed with this secret are accepted.
    pub hmac_secret: Option<Vec<u8>>,
    pub allocation_shape: AllocationShape,
}

impl std::fmt::Debug for SandboxConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SandboxConfig")
            .field("ledger_id", &self.ledger_id)
            .field("participant", &self.participant)
            .field("hmac_secret", &self.hmac_secret.as_ref().map(|_| "<redacted>"))
            .field("allocation_shape", &self.allocation_shape)
            .finish()
    }
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            ledger_id: "sandbox".to_string(),
            participant: "sandbox-participant".to_string(),
            hmac_secret: None,
            allocation_shape: AllocationShape::Direct,
        }
    }
}

impl SandboxConfig {
    pub fn with_hmac_secret(mut self, secret: impl Into<Vec<u8>>) -> Self {
        self.hmac_secret = Some(secret.into());
        self
    }

    pub fn with_allocation_shape(mut self, shape: AllocationShape) -> Self {
        self.allocation_shape = shape;
        self
    }
}
