//! An owner-maintained set of whitelisted parties.

use ledgerprop_core::{
    Authorizer, FieldKind, FieldRule, ModelError, Party, Payload, ResultRule, Source, TemplateId,
    TemplateModel, Transition,
};
use serde_json::{json, Value};

pub const PACKAGE: &str = "cd2c479891484bf1eeef1c0e4bab05511d84ee0853c116817ecf18cbf0f0ade2";

pub fn template_id() -> TemplateId {
    TemplateId::new(Some(PACKAGE), "WhitelistedRegistry", "WhitelistedRegistry")
}

pub fn model() -> Result<TemplateModel, ModelError> {
    TemplateModel::builder(template_id())
        .field("owner", FieldKind::Party)
        .field("whitelisted", FieldKind::list(FieldKind::Party))
        .signatory("owner")
        .transition(
            Transition::consuming("ChangeOwner")
                .by(Authorizer::field("owner"))
                .param("newOwner", FieldKind::Party)
                .update(FieldRule::set_from_arg("owner", "newOwner")),
        )
        .transition(
            Transition::consuming("SetWhitelisted")
                .by(Authorizer::field("owner"))
                .param("addr", FieldKind::Party)
                .param("isWhitelisted", FieldKind::Bool)
                .update(FieldRule::set_membership(
                    "whitelisted",
                    Source::arg("addr"),
                    Source::arg("isWhitelisted"),
                )),
        )
        .transition(
            Transition::nonconsuming("IsWhitelisted")
                .by(Authorizer::field("owner"))
                .param("addr", FieldKind::Party)
                .param("caller", FieldKind::Party)
                .returns(ResultRule::Contains {
                    field: "whitelisted".to_string(),
                    member: Source::arg("addr"),
                }),
        )
        .build()
}

pub fn payload(owner: &Party, whitelisted: &[Party]) -> Payload {
    let mut payload = Payload::new();
    payload.insert("owner".into(), owner.into());
    payload.insert(
        "whitelisted".into(),
        Value::Array(whitelisted.iter().map(Value::from).collect()),
    );
    payload
}

pub fn set_whitelisted(addr: &Party, present: bool) -> Payload {
    let mut args = Payload::new();
    args.insert("addr".into(), addr.into());
    args.insert("isWhitelisted".into(), json!(present));
    args
}
