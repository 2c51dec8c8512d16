//! A document locker reviewed by a bank and shared with third parties.

use ledgerprop_core::{
    Authorizer, FieldKind, FieldRule, ModelError, Party, Payload, Precondition, Source,
    TemplateId, TemplateModel, Transition,
};
use serde_json::{json, Value};

pub const PACKAGE: &str = "bcd0cd07503d4ecb4340f7ad3cb9e8045ad8fe1ed1703672a0c35bd5c7c897d0";

pub const REQUESTED: &str = "Requested";
pub const UNDER_REVIEW: &str = "UnderReview";
pub const REJECTED: &str = "Rejected";
pub const AVAILABLE_TO_SHARE: &str = "AvailableToShare";
pub const SHARING_REQUEST_PENDING: &str = "SharingRequestPending";
pub const SHARING_WITH_THIRD_PARTY: &str = "SharingWithThirdParty";
pub const TERMINATED: &str = "Terminated";

pub const APPROVED: &str = "Approved";

const SHARING_FIELDS: [&str; 4] = [
    "currentAuthorizedUser",
    "thirdPartyRequestor",
    "intendedPurpose",
    "expirationDate",
];

pub fn template_id() -> TemplateId {
    TemplateId::new(Some(PACKAGE), "DigitalLocker", "DigitalLocker")
}

fn end_sharing(mut transition: Transition) -> Transition {
    for field in SHARING_FIELDS {
        transition = transition.update(FieldRule::clear(field));
    }
    transition
}

pub fn model() -> Result<TemplateModel, ModelError> {
    let text = || FieldKind::optional(FieldKind::Text);
    TemplateModel::builder(template_id())
        .field("owner", FieldKind::Party)
        .field("state", FieldKind::Text)
        .field("bankAgent", FieldKind::Party)
        .field("thirdParties", FieldKind::list(FieldKind::Party))
        .field("currentAuthorizedUser", FieldKind::optional(FieldKind::Party))
        .field("lockerStatus", FieldKind::Text)
        .field("image", text())
        .field("lockerFriendlyName", FieldKind::Text)
        .field("expirationDate", text())
        .field("lockerIdentifier", text())
        .field("intendedPurpose", text())
        .field("rejectionReason", text())
        .field("thirdPartyRequestor", FieldKind::optional(FieldKind::Party))
        .signatory("owner")
        .state_field("state")
        .transition(
            Transition::consuming("BeginReviewProcess")
                .from([REQUESTED])
                .to(UNDER_REVIEW)
                .by(Authorizer::field("bankAgent")),
        )
        .transition(
            Transition::consuming("UploadDocuments")
                .from([UNDER_REVIEW])
                .to(AVAILABLE_TO_SHARE)
                .by(Authorizer::field("bankAgent"))
                .param("identifier", FieldKind::Text)
                .param("img", FieldKind::Text)
                .update(FieldRule::assign("lockerStatus", Source::literal(APPROVED)))
                .update(FieldRule::set_from_arg("lockerIdentifier", "identifier"))
                .update(FieldRule::set_from_arg("image", "img")),
        )
        .transition(
            Transition::consuming("RejectRequest")
                .from([UNDER_REVIEW])
                .to(REJECTED)
                .by(Authorizer::field("bankAgent"))
                .param("reason", FieldKind::Text)
                .update(FieldRule::assign("lockerStatus", Source::literal("Rejected")))
                .update(FieldRule::set_from_arg("rejectionReason", "reason")),
        )
        .transition(
            Transition::consuming("RequestLockerAccess")
                .from([AVAILABLE_TO_SHARE])
                .to(SHARING_REQUEST_PENDING)
                .by(Authorizer::argument("requestor"))
                .param("requestor", FieldKind::Party)
                .param("purpose", FieldKind::Text)
                .requires(Precondition::member("requestor", "thirdParties"))
                .update(FieldRule::set_from_arg("thirdPartyRequestor", "requestor"))
                .update(FieldRule::set_from_arg("intendedPurpose", "purpose")),
        )
        .transition(
            Transition::consuming("AcceptSharingRequest")
                .from([SHARING_REQUEST_PENDING])
                .to(SHARING_WITH_THIRD_PARTY)
                .by(Authorizer::field("owner"))
                .update(FieldRule::assign(
                    "currentAuthorizedUser",
                    Source::field("thirdPartyRequestor"),
                )),
        )
        .transition(end_sharing(
            Transition::consuming("RejectSharingRequest")
                .from([SHARING_REQUEST_PENDING])
                .to(AVAILABLE_TO_SHARE)
                .by(Authorizer::field("owner")),
        ))
        .transition(end_sharing(
            Transition::consuming("ReleaseLockerAccess")
                .from([SHARING_WITH_THIRD_PARTY])
                .to(AVAILABLE_TO_SHARE)
                .by(Authorizer::field("currentAuthorizedUser")),
        ))
        .transition(
            Transition::consuming("ShareWithThirdParty")
                .from([AVAILABLE_TO_SHARE])
                .to(SHARING_WITH_THIRD_PARTY)
                .by(Authorizer::field("owner"))
                .param("recipient", FieldKind::Party)
                .param("expDate", FieldKind::Text)
                .param("purpose", FieldKind::Text)
                .requires(Precondition::member("recipient", "thirdParties"))
                .update(FieldRule::set_from_arg("currentAuthorizedUser", "recipient"))
                .update(FieldRule::set_from_arg("expirationDate", "expDate"))
                .update(FieldRule::set_from_arg("intendedPurpose", "purpose")),
        )
        .transition(end_sharing(
            Transition::consuming("RevokeAccessFromThirdParty")
                .from([SHARING_WITH_THIRD_PARTY])
                .to(AVAILABLE_TO_SHARE)
                .by(Authorizer::field("owner")),
        ))
        .transition(
            Transition::consuming("Terminate")
                .from([
                    REQUESTED,
                    UNDER_REVIEW,
                    REJECTED,
                    AVAILABLE_TO_SHARE,
                    SHARING_REQUEST_PENDING,
                    SHARING_WITH_THIRD_PARTY,
                ])
                .to(TERMINATED)
                .by(Authorizer::field("owner")),
        )
        .build()
}

/// A freshly requested locker with no document and no sharing.
pub fn payload(owner: &Party, bank: &Party, third_parties: &[Party], name: &str) -> Payload {
    let mut payload = Payload::new();
    payload.insert("owner".into(), owner.into());
    payload.insert("state".into(), json!(REQUESTED));
    payload.insert("bankAgent".into(), bank.into());
    payload.insert(
        "thirdParties".into(),
        Value::Array(third_parties.iter().map(Value::from).collect()),
    );
    payload.insert("lockerStatus".into(), json!("Created"));
    payload.insert("lockerFriendlyName".into(), json!(name));
    for field in ["image", "lockerIdentifier", "rejectionReason"]
        .into_iter()
        .chain(SHARING_FIELDS)
    {
        payload.insert(field.into(), Value::Null);
    }
    payload
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgerprop_core::{argument, Prediction, Refusal};

    fn advance(
        model: &TemplateModel,
        prior: &Payload,
        choice: &str,
        actor: &str,
        args: &Payload,
    ) -> Payload {
        match model.apply(prior, choice, actor, args) {
            Ok(Prediction::Successor(next)) => next,
            other => unreachable!("{choice}: {other:?}"),
        }
    }

    fn available(model: &TemplateModel) -> Payload {
        let start = payload(
            &Party::new("owner"),
            &Party::new("bank"),
            &[Party::new("tp1"), Party::new("tp2")],
            "passport",
        );
        let reviewing = advance(model, &start, "BeginReviewProcess", "bank", &Payload::new());
        let args = argument([("identifier", json!("L-1")), ("img", json!("img"))]);
        advance(model, &reviewing, "UploadDocuments", "bank", &args)
    }

    #[test]
    fn review_approves_and_records_document() {
        let model = model().unwrap();
        let ready = available(&model);
        assert_eq!(ready["state"], AVAILABLE_TO_SHARE);
        assert_eq!(ready["lockerStatus"], APPROVED);
        assert_eq!(ready["lockerIdentifier"], "L-1");
    }

    #[test]
    fn request_accept_release_cycle_returns_to_available() {
        let model = model().unwrap();
        let ready = available(&model);
        let args = argument([("requestor", json!("tp1")), ("purpose", json!("kyc"))]);
        let pending = advance(&model, &ready, "RequestLockerAccess", "tp1", &args);
        let sharing = advance(&model, &pending, "AcceptSharingRequest", "owner", &Payload::new());
        assert_eq!(sharing["currentAuthorizedUser"], "tp1");

        assert!(matches!(
            model.apply(&sharing, "ReleaseLockerAccess", "tp2", &Payload::new()),
            Err(Refusal::Unauthorized { .. })
        ));
        let released = advance(&model, &sharing, "ReleaseLockerAccess", "tp1", &Payload::new());
        assert_eq!(released["state"], AVAILABLE_TO_SHARE);
        for field in SHARING_FIELDS {
            assert_eq!(released[field], Value::Null, "{field}");
        }
    }

    #[test]
    fn outsiders_cannot_request_access() {
        let model = model().unwrap();
        let ready = available(&model);
        let args = argument([("requestor", json!("stranger")), ("purpose", json!("x"))]);
        assert!(matches!(
            model.apply(&ready, "RequestLockerAccess", "stranger", &args),
            Err(Refusal::PreconditionFailed { .. })
        ));
    }

    #[test]
    fn terminated_locker_accepts_nothing() {
        let model = model().unwrap();
        let ready = available(&model);
        let gone = advance(&model, &ready, "Terminate", "owner", &Payload::new());
        for choice in ["Terminate", "BeginReviewProcess", "RevokeAccessFromThirdParty"] {
            assert!(matches!(
                model.apply(&gone, choice, "owner", &Payload::new()),
                Err(Refusal::GuardMismatch { .. })
            ));
        }
    }
}
