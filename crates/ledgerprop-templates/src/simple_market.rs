//! A single-item market: the buyer offers, the owner accepts or rejects.

use ledgerprop_core::{
    Amount, Authorizer, FieldKind, FieldRule, ModelError, Party, Payload, Precondition, Source,
    TemplateId, TemplateModel, Transition,
};
use serde_json::json;

pub const PACKAGE: &str = "c988d208293f53653ca3aa965a21f15fa5bb318df0b41e87722b1d4d9cbf4249";

pub const ITEM_AVAILABLE: &str = "ItemAvailable";
pub const OFFER_PLACED: &str = "OfferPlaced";
pub const ACCEPT: &str = "Accept";
pub const STATES: [&str; 3] = [ITEM_AVAILABLE, OFFER_PLACED, ACCEPT];

pub fn template_id() -> TemplateId {
    TemplateId::new(Some(PACKAGE), "SimpleMarket", "Market")
}

pub fn model() -> Result<TemplateModel, ModelError> {
    TemplateModel::builder(template_id())
        .field("owner", FieldKind::Party)
        .field("buyer", FieldKind::Party)
        .field("item", FieldKind::Text)
        .field("state", FieldKind::Text)
        .field("offerPrice", FieldKind::Amount)
        .signatory("owner")
        .state_field("state")
        .transition(
            // A zero offer is tolerated here.
            Transition::consuming("MakeOffer")
                .from([ITEM_AVAILABLE])
                .to(OFFER_PLACED)
                .by(Authorizer::field("buyer"))
                .param("offerPrice", FieldKind::Amount)
                .requires(Precondition::non_negative("offerPrice"))
                .update(FieldRule::set_from_arg("offerPrice", "offerPrice")),
        )
        .transition(
            Transition::consuming("AcceptOffer")
                .from([OFFER_PLACED])
                .to(ACCEPT)
                .by(Authorizer::field("owner")),
        )
        .transition(
            Transition::consuming("RejectOffer")
                .from([OFFER_PLACED])
                .to(ITEM_AVAILABLE)
                .by(Authorizer::field("owner"))
                .update(FieldRule::assign(
                    "offerPrice",
                    Source::literal(Amount::ZERO.to_json()),
                )),
        )
        .build()
}

pub fn payload(owner: &Party, buyer: &Party, item: &str, state: &str, offer: Amount) -> Payload {
    let mut payload = Payload::new();
    payload.insert("owner".into(), owner.into());
    payload.insert("buyer".into(), buyer.into());
    payload.insert("item".into(), json!(item));
    payload.insert("state".into(), json!(state));
    payload.insert("offerPrice".into(), offer.to_json());
    payload
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgerprop_core::{Prediction, Refusal};
    use serde_json::Map;

    fn offer(price: &str) -> Map<String, serde_json::Value> {
        let mut args = Map::new();
        args.insert("offerPrice".into(), json!(price));
        args
    }

    #[test]
    fn make_offer_only_from_item_available() {
        let model = model().unwrap();
        let (owner, buyer) = (Party::new("o"), Party::new("b"));
        for state in STATES {
            let prior = payload(&owner, &buyer, "Book", state, Amount::ZERO);
            let outcome = model.apply(&prior, "MakeOffer", "b", &offer("12.50"));
            if state == ITEM_AVAILABLE {
                match outcome.unwrap() {
                    Prediction::Successor(next) => {
                        assert_eq!(next["state"], OFFER_PLACED);
                        assert_eq!(next["offerPrice"], "12.50");
                    }
                    other => unreachable!("{other:?}"),
                }
            } else {
                assert!(matches!(outcome, Err(Refusal::GuardMismatch { .. })));
            }
        }
    }

    #[test]
    fn reject_resets_offer_price() {
        let model = model().unwrap();
        let (owner, buyer) = (Party::new("o"), Party::new("b"));
        let prior = payload(&owner, &buyer, "Bike", OFFER_PLACED, Amount::from_units(15));
        match model.apply(&prior, "RejectOffer", "o", &Map::new()).unwrap() {
            Prediction::Successor(next) => {
                assert_eq!(next["state"], ITEM_AVAILABLE);
                assert_eq!(Amount::from_json(&next["offerPrice"]).unwrap(), Amount::ZERO);
            }
            other => unreachable!("{other:?}"),
        }
        assert!(matches!(
            model.apply(&prior, "AcceptOffer", "b", &Map::new()),
            Err(Refusal::Unauthorized { .. })
        ));
    }
}
