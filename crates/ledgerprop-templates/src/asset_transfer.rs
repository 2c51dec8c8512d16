//! Sale of an asset with inspection and appraisal before mutual acceptance.
//!
//! Inspection and appraisal may happen in either order; both lead to
//! `NotionalAcceptance`. Buyer and seller acceptance may also happen in
//! either order and meet in `Accepted`.

use ledgerprop_core::{
    Amount, Authorizer, FieldKind, FieldRule, ModelError, Party, Payload, Precondition, Source,
    TemplateId, TemplateModel, Transition,
};
use serde_json::{json, Value};

pub const PACKAGE: &str = "14914ff053f75db12473ef2a2fb4ed792aa577554493e67307126dfe1905af2b";

pub const ACTIVE: &str = "Active";
pub const OFFER_PLACED: &str = "OfferPlaced";
pub const PENDING_INSPECTION: &str = "PendingInspection";
pub const INSPECTED: &str = "Inspected";
pub const APPRAISED: &str = "Appraised";
pub const NOTIONAL_ACCEPTANCE: &str = "NotionalAcceptance";
pub const BUYER_ACCEPTED: &str = "BuyerAccepted";
pub const SELLER_ACCEPTED: &str = "SellerAccepted";
pub const ACCEPTED: &str = "Accepted";
pub const TERMINATED: &str = "Terminated";

const OPEN_OFFER: [&str; 7] = [
    OFFER_PLACED,
    PENDING_INSPECTION,
    INSPECTED,
    APPRAISED,
    NOTIONAL_ACCEPTANCE,
    BUYER_ACCEPTED,
    SELLER_ACCEPTED,
];

pub fn template_id() -> TemplateId {
    TemplateId::new(Some(PACKAGE), "AssetTransfer", "AssetTransfer")
}

fn clear_offer(transition: Transition) -> Transition {
    transition
        .update(FieldRule::clear("buyer"))
        .update(FieldRule::clear("inspector"))
        .update(FieldRule::clear("appraiser"))
        .update(FieldRule::clear("offerPrice"))
}

pub fn model() -> Result<TemplateModel, ModelError> {
    let party = || FieldKind::optional(FieldKind::Party);
    let mut builder = TemplateModel::builder(template_id())
        .field("owner", FieldKind::Party)
        .field("potentialBuyers", FieldKind::list(FieldKind::Party))
        .field("buyer", party())
        .field("inspector", party())
        .field("appraiser", party())
        .field("description", FieldKind::Text)
        .field("askingPrice", FieldKind::Amount)
        .field("offerPrice", FieldKind::optional(FieldKind::Amount))
        .field("state", FieldKind::Text)
        .signatory("owner")
        .state_field("state")
        .transition(
            Transition::consuming("MakeOffer")
                .from([ACTIVE])
                .to(OFFER_PLACED)
                .by(Authorizer::argument("buyerParty"))
                .param("buyerParty", FieldKind::Party)
                .param("newInspector", FieldKind::Party)
                .param("newAppraiser", FieldKind::Party)
                .param("newOfferPrice", FieldKind::Amount)
                .requires(Precondition::member("buyerParty", "potentialBuyers"))
                .requires(Precondition::positive("newOfferPrice"))
                .update(FieldRule::set_from_arg("buyer", "buyerParty"))
                .update(FieldRule::set_from_arg("inspector", "newInspector"))
                .update(FieldRule::set_from_arg("appraiser", "newAppraiser"))
                .update(FieldRule::set_from_arg("offerPrice", "newOfferPrice"))
                .update(FieldRule::append("potentialBuyers", Source::arg("newAppraiser")))
                .update(FieldRule::append("potentialBuyers", Source::arg("newInspector"))),
        )
        .transition(
            Transition::consuming("ModifyOffer")
                .from([OFFER_PLACED])
                .to(OFFER_PLACED)
                .by(Authorizer::field("buyer"))
                .param("newOfferPrice", FieldKind::Amount)
                .requires(Precondition::positive("newOfferPrice"))
                .update(FieldRule::set_from_arg("offerPrice", "newOfferPrice")),
        )
        .transition(
            Transition::consuming("AcceptOffer")
                .from([OFFER_PLACED])
                .to(PENDING_INSPECTION)
                .by(Authorizer::field("owner")),
        )
        .transition(clear_offer(
            Transition::consuming("Reject")
                .from([OFFER_PLACED])
                .to(ACTIVE)
                .by(Authorizer::field("owner")),
        ))
        .transition(clear_offer(
            Transition::consuming("RescindOffer")
                .from(OPEN_OFFER)
                .to(ACTIVE)
                .by(Authorizer::field("buyer")),
        ));

    for (from, to) in [(PENDING_INSPECTION, INSPECTED), (APPRAISED, NOTIONAL_ACCEPTANCE)] {
        builder = builder.transition(
            Transition::consuming("MarkInspected")
                .from([from])
                .to(to)
                .by(Authorizer::field("inspector")),
        );
    }
    for (from, to) in [(PENDING_INSPECTION, APPRAISED), (INSPECTED, NOTIONAL_ACCEPTANCE)] {
        builder = builder.transition(
            Transition::consuming("MarkAppraised")
                .from([from])
                .to(to)
                .by(Authorizer::field("appraiser")),
        );
    }
    for (from, to) in [(NOTIONAL_ACCEPTANCE, BUYER_ACCEPTED), (SELLER_ACCEPTED, ACCEPTED)] {
        builder = builder.transition(
            Transition::consuming("AcceptByBuyer")
                .from([from])
                .to(to)
                .by(Authorizer::field("buyer")),
        );
    }
    for (from, to) in [(NOTIONAL_ACCEPTANCE, SELLER_ACCEPTED), (BUYER_ACCEPTED, ACCEPTED)] {
        builder = builder.transition(
            Transition::consuming("Accept")
                .from([from])
                .to(to)
                .by(Authorizer::field("owner")),
        );
    }

    builder
        .transition(
            Transition::consuming("Terminate")
                .from([ACTIVE].into_iter().chain(OPEN_OFFER))
                .to(TERMINATED)
                .by(Authorizer::field("owner")),
        )
        .build()
}

pub fn payload(owner: &Party, buyers: &[Party], description: &str, asking: Amount) -> Payload {
    let mut payload = Payload::new();
    payload.insert("owner".into(), owner.into());
    payload.insert(
        "potentialBuyers".into(),
        Value::Array(buyers.iter().map(Value::from).collect()),
    );
    payload.insert("buyer".into(), Value::Null);
    payload.insert("inspector".into(), Value::Null);
    payload.insert("appraiser".into(), Value::Null);
    payload.insert("description".into(), json!(description));
    payload.insert("askingPrice".into(), asking.to_json());
    payload.insert("offerPrice".into(), Value::Null);
    payload.insert("state".into(), json!(ACTIVE));
    payload
}

/// Arguments for `MakeOffer`.
pub fn offer(buyer: &Party, inspector: &Party, appraiser: &Party, price: Amount) -> Payload {
    let mut args = Payload::new();
    args.insert("buyerParty".into(), buyer.into());
    args.insert("newInspector".into(), inspector.into());
    args.insert("newAppraiser".into(), appraiser.into());
    args.insert("newOfferPrice".into(), price.to_json());
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgerprop_core::{Prediction, Refusal};
    use serde_json::Map;

    struct Roles {
        owner: Party,
        b1: Party,
        b2: Party,
        inspector: Party,
        appraiser: Party,
    }

    fn roles() -> Roles {
        Roles {
            owner: Party::new("seller"),
            b1: Party::new("b1"),
            b2: Party::new("b2"),
            inspector: Party::new("insp"),
            appraiser: Party::new("appr"),
        }
    }

    fn step(model: &TemplateModel, prior: &Payload, choice: &str, actor: &Party) -> Payload {
        step_with(model, prior, choice, actor, &Map::new())
    }

    fn step_with(
        model: &TemplateModel,
        prior: &Payload,
        choice: &str,
        actor: &Party,
        args: &Payload,
    ) -> Payload {
        match model.apply(prior, choice, actor.as_str(), args) {
            Ok(Prediction::Successor(next)) => next,
            other => unreachable!("{choice} by {actor}: {other:?}"),
        }
    }

    #[test]
    fn make_offer_sets_fields_and_extends_buyers() {
        let model = model().unwrap();
        let r = roles();
        let start = payload(&r.owner, &[r.b1.clone(), r.b2.clone()], "house", Amount::from_units(100));
        let args = offer(&r.b1, &r.inspector, &r.appraiser, Amount::from_minor(9_999));
        let next = step_with(&model, &start, "MakeOffer", &r.b1, &args);
        assert_eq!(next["state"], OFFER_PLACED);
        assert_eq!(next["buyer"], json!("b1"));
        assert_eq!(next["offerPrice"], json!("99.99"));
        assert_eq!(next["potentialBuyers"], json!(["b1", "b2", "appr", "insp"]));
    }

    #[test]
    fn make_offer_requires_actor_to_be_a_listed_buyer() {
        let model = model().unwrap();
        let r = roles();
        let start = payload(&r.owner, &[r.b1.clone()], "house", Amount::from_units(100));
        let args = offer(&r.b1, &r.inspector, &r.appraiser, Amount::from_units(1));
        assert!(matches!(
            model.apply(&start, "MakeOffer", "b2", &args),
            Err(Refusal::Unauthorized { .. })
        ));
        let args = offer(&r.b2, &r.inspector, &r.appraiser, Amount::from_units(1));
        assert!(matches!(
            model.apply(&start, "MakeOffer", "b2", &args),
            Err(Refusal::PreconditionFailed { .. })
        ));
    }

    #[test]
    fn both_review_orders_and_both_acceptance_orders_converge() {
        let model = model().unwrap();
        let r = roles();
        let start = payload(&r.owner, &[r.b1.clone()], "house", Amount::from_units(100));
        let args = offer(&r.b1, &r.inspector, &r.appraiser, Amount::from_units(90));
        let offered = step_with(&model, &start, "MakeOffer", &r.b1, &args);
        let pending = step(&model, &offered, "AcceptOffer", &r.owner);
        assert_eq!(pending["state"], PENDING_INSPECTION);

        let a = step(&model, &step(&model, &pending, "MarkInspected", &r.inspector), "MarkAppraised", &r.appraiser);
        let b = step(&model, &step(&model, &pending, "MarkAppraised", &r.appraiser), "MarkInspected", &r.inspector);
        assert_eq!(a, b);
        assert_eq!(a["state"], NOTIONAL_ACCEPTANCE);

        let buyer_first = step(&model, &step(&model, &a, "AcceptByBuyer", &r.b1), "Accept", &r.owner);
        let seller_first = step(&model, &step(&model, &a, "Accept", &r.owner), "AcceptByBuyer", &r.b1);
        assert_eq!(buyer_first["state"], ACCEPTED);
        assert_eq!(buyer_first, seller_first);

        for choice in ["Terminate", "RescindOffer"] {
            let actor = if choice == "Terminate" { &r.owner } else { &r.b1 };
            assert!(matches!(
                model.apply(&buyer_first, choice, actor.as_str(), &Map::new()),
                Err(Refusal::GuardMismatch { .. })
            ));
        }
    }

    #[test]
    fn reject_clears_offer() {
        let model = model().unwrap();
        let r = roles();
        let start = payload(&r.owner, &[r.b1.clone()], "house", Amount::from_units(100));
        let args = offer(&r.b1, &r.inspector, &r.appraiser, Amount::from_units(90));
        let offered = step_with(&model, &start, "MakeOffer", &r.b1, &args);
        let back = step(&model, &offered, "Reject", &r.owner);
        assert_eq!(back["state"], ACTIVE);
        for field in ["buyer", "inspector", "appraiser", "offerPrice"] {
            assert_eq!(back[field], Value::Null, "{field}");
        }
    }
}
