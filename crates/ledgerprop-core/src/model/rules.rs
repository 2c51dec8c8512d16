use serde_json::Value;

use super::FieldKind;
use crate::ids::TemplateId;

/// Where a value comes from when a rule or condition is evaluated.
///
/// `Field` reads the payload as it stands after earlier rules of the same
/// transition have been applied.
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    Arg(String),
    Field(String),
    Actor,
    Literal(Value),
}

impl Source {
    pub fn arg(name: &str) -> Self {
        Self::Arg(name.to_string())
    }

    pub fn field(name: &str) -> Self {
        Self::Field(name.to_string())
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        Self::Literal(value.into())
    }
}

/// Who may exercise a choice.
#[derive(Debug, Clone, PartialEq)]
pub enum Authorizer {
    /// The party (or optional party) stored in a payload field.
    Field(String),
    /// Any party in a payload list field.
    MemberOf(String),
    /// The party passed in a choice argument.
    Argument(String),
    AnyOf(Vec<Authorizer>),
}

impl Authorizer {
    pub fn field(name: &str) -> Self {
        Self::Field(name.to_string())
    }

    pub fn member_of(name: &str) -> Self {
        Self::MemberOf(name.to_string())
    }

    pub fn argument(name: &str) -> Self {
        Self::Argument(name.to_string())
    }

    pub(crate) fn is_empty(&self) -> bool {
        match self {
            Self::AnyOf(options) => options.iter().all(Authorizer::is_empty),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl CmpOp {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Eq => "==",
            Self::Ne => "!=",
        }
    }
}

/// A server-side check the ledger enforces before accepting a choice.
///
/// Numeric comparisons are exact (fixed-scale decimals or integers).
/// Whether a withdrawal of zero is legal differs between templates, so it
/// is always spelled out per template with [`Precondition::positive`] or
/// [`Precondition::non_negative`].
#[derive(Debug, Clone, PartialEq)]
pub enum Precondition {
    Compare {
        left: Source,
        op: CmpOp,
        right: Source,
    },
    MemberOf {
        value: Source,
        field: String,
    },
    NotMemberOf {
        value: Source,
        field: String,
    },
}

impl Precondition {
    pub fn compare(left: Source, op: CmpOp, right: Source) -> Self {
        Self::Compare { left, op, right }
    }

    pub fn positive(arg: &str) -> Self {
        Self::compare(Source::arg(arg), CmpOp::Gt, Source::literal("0"))
    }

    pub fn non_negative(arg: &str) -> Self {
        Self::compare(Source::arg(arg), CmpOp::Ge, Source::literal("0"))
    }

    pub fn below(arg: &str, limit: &str) -> Self {
        Self::compare(Source::arg(arg), CmpOp::Lt, Source::literal(limit))
    }

    pub fn at_most(arg: &str, limit: &str) -> Self {
        Self::compare(Source::arg(arg), CmpOp::Le, Source::literal(limit))
    }

    /// `arg <= field`, e.g. a withdrawal bounded by the balance.
    pub fn covered_by(arg: &str, field: &str) -> Self {
        Self::compare(Source::arg(arg), CmpOp::Le, Source::field(field))
    }

    pub fn member(arg: &str, field: &str) -> Self {
        Self::MemberOf {
            value: Source::arg(arg),
            field: field.to_string(),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Compare { left, op, right } => {
                format!("{} {} {}", describe_source(left), op.symbol(), describe_source(right))
            }
            Self::MemberOf { value, field } => {
                format!("{} in {field}", describe_source(value))
            }
            Self::NotMemberOf { value, field } => {
                format!("{} not in {field}", describe_source(value))
            }
        }
    }
}

fn describe_source(source: &Source) -> String {
    match source {
        Source::Arg(name) => format!("arg.{name}"),
        Source::Field(name) => name.clone(),
        Source::Actor => "actor".to_string(),
        Source::Literal(value) => value.to_string(),
    }
}

/// How one payload field changes when a consuming choice succeeds.
/// Fields without a rule keep their prior value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldRule {
    Assign { field: String, source: Source },
    /// Set to the absent sentinel (`null`).
    Clear { field: String },
    Increase { field: String, by: Source },
    Decrease { field: String, by: Source },
    /// Push a scalar or extend with a list.
    Append { field: String, source: Source },
    /// Insert `member` when `present` is true, remove it otherwise.
    SetMembership {
        field: String,
        member: Source,
        present: Source,
    },
    Recompute { field: String, derivation: Derivation },
}

impl FieldRule {
    pub fn assign(field: &str, source: Source) -> Self {
        Self::Assign {
            field: field.to_string(),
            source,
        }
    }

    pub fn set_from_arg(field: &str, arg: &str) -> Self {
        Self::assign(field, Source::arg(arg))
    }

    pub fn clear(field: &str) -> Self {
        Self::Clear {
            field: field.to_string(),
        }
    }

    pub fn increase(field: &str, by: Source) -> Self {
        Self::Increase {
            field: field.to_string(),
            by,
        }
    }

    pub fn decrease(field: &str, by: Source) -> Self {
        Self::Decrease {
            field: field.to_string(),
            by,
        }
    }

    pub fn append(field: &str, source: Source) -> Self {
        Self::Append {
            field: field.to_string(),
            source,
        }
    }

    pub fn set_membership(field: &str, member: Source, present: Source) -> Self {
        Self::SetMembership {
            field: field.to_string(),
            member,
            present,
        }
    }

    pub fn recompute(field: &str, derivation: Derivation) -> Self {
        Self::Recompute {
            field: field.to_string(),
            derivation,
        }
    }

    pub fn target(&self) -> &str {
        match self {
            Self::Assign { field, .. }
            | Self::Clear { field }
            | Self::Increase { field, .. }
            | Self::Decrease { field, .. }
            | Self::Append { field, .. }
            | Self::SetMembership { field, .. }
            | Self::Recompute { field, .. } => field,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Derivation {
    Sum { list: String },
    /// `sum(list) * multiplier`, the running-total law.
    SumTimes { list: String, multiplier: Source },
}

/// Another contract created by a nonconsuming choice.
#[derive(Debug, Clone, PartialEq)]
pub struct Spawn {
    pub template_id: TemplateId,
    pub fields: Vec<(String, FieldKind, Source)>,
}

/// What a nonconsuming choice hands back. Consuming choices always return
/// the successor's contract id.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultRule {
    Unit,
    Field(String),
    Contains { field: String, member: Source },
    Spawn(Spawn),
}

#[derive(Debug, Clone, PartialEq)]
pub enum StateGuard {
    Any,
    OneOf(Vec<String>),
}

/// One declared choice: legal sources, target, authorizer, and effects.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub(crate) choice: String,
    pub(crate) from: StateGuard,
    pub(crate) to: Option<String>,
    pub(crate) authorizer: Authorizer,
    pub(crate) params: Vec<(String, FieldKind)>,
    pub(crate) preconditions: Vec<Precondition>,
    pub(crate) rules: Vec<FieldRule>,
    pub(crate) consuming: bool,
    pub(crate) result: ResultRule,
}

impl Transition {
    pub fn consuming(choice: &str) -> Self {
        Self::blank(choice, true)
    }

    pub fn nonconsuming(choice: &str) -> Self {
        Self::blank(choice, false)
    }

    fn blank(choice: &str, consuming: bool) -> Self {
        Self {
            choice: choice.to_string(),
            from: StateGuard::Any,
            to: None,
            authorizer: Authorizer::AnyOf(Vec::new()),
            params: Vec::new(),
            preconditions: Vec::new(),
            rules: Vec::new(),
            consuming,
            result: ResultRule::Unit,
        }
    }

    pub fn from<'a>(mut self, states: impl IntoIterator<Item = &'a str>) -> Self {
        self.from = StateGuard::OneOf(states.into_iter().map(str::to_string).collect());
        self
    }

    pub fn to(mut self, state: &str) -> Self {
        self.to = Some(state.to_string());
        self
    }

    pub fn by(mut self, authorizer: Authorizer) -> Self {
        self.authorizer = authorizer;
        self
    }

    pub fn param(mut self, name: &str, kind: FieldKind) -> Self {
        self.params.push((name.to_string(), kind));
        self
    }

    pub fn requires(mut self, precondition: Precondition) -> Self {
        self.preconditions.push(precondition);
        self
    }

    pub fn update(mut self, rule: FieldRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn returns(mut self, result: ResultRule) -> Self {
        self.result = result;
        self
    }

    pub fn choice(&self) -> &str {
        &self.choice
    }

    pub fn source_states(&self) -> &StateGuard {
        &self.from
    }

    pub fn target_state(&self) -> Option<&str> {
        self.to.as_deref()
    }

    pub fn authorizer(&self) -> &Authorizer {
        &self.authorizer
    }

    pub fn params(&self) -> &[(String, FieldKind)] {
        &self.params
    }

    pub fn preconditions(&self) -> &[Precondition] {
        &self.preconditions
    }

    pub fn rules(&self) -> &[FieldRule] {
        &self.rules
    }

    pub fn is_consuming(&self) -> bool {
        self.consuming
    }

    pub fn result(&self) -> &ResultRule {
        &self.result
    }
}
