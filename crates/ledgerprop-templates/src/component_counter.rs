//! A manufacturer's count of defective components, finalized once.
//!
//! `ComputeTotal` only moves the state tag; the count itself must survive
//! unchanged.

use ledgerprop_core::{
    Authorizer, FieldKind, ModelError, Party, Payload, TemplateId, TemplateModel, Transition,
};
use serde_json::json;

pub const PACKAGE: &str = "b46b4ba42416f39c25b6fe0f41c14f0110d33505d925136bbbb8e9a15b860d59";

pub const CREATE: &str = "Create";
pub const COMPUTE_TOTAL: &str = "ComputeTotal";

pub fn template_id() -> TemplateId {
    TemplateId::new(Some(PACKAGE), "DefectiveComponentCounter", "DefectiveCounter")
}

pub fn model() -> Result<TemplateModel, ModelError> {
    TemplateModel::builder(template_id())
        .field("manufacturer", FieldKind::Party)
        .field("defectiveComponents", FieldKind::Int)
        .field("state", FieldKind::Text)
        .signatory("manufacturer")
        .state_field("state")
        .transition(
            Transition::consuming("ComputeTotal")
                .from([CREATE])
                .to(COMPUTE_TOTAL)
                .by(Authorizer::field("manufacturer")),
        )
        .build()
}

pub fn payload(manufacturer: &Party, defective: i64) -> Payload {
    let mut payload = Payload::new();
    payload.insert("manufacturer".into(), manufacturer.into());
    payload.insert("defectiveComponents".into(), json!(defective));
    payload.insert("state".into(), json!(CREATE));
    payload
}
