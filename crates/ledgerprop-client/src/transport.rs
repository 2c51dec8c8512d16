//! Blocking round trips against the ledger JSON API.
//!
//! Every response is normalized into one of: the `result` member (success),
//! a [`Rejection`] (non-2xx with an `errors` envelope), a transport error
//! (connection failure or non-2xx without an envelope), or a shape error
//! (2xx whose body is not the expected envelope).

use ledgerprop_auth::{Credential, Profile, TokenBuilder};
use ledgerprop_core::{
    Contract, ContractId, ExerciseOutcome, LedgerError, LedgerResult, Payload, Rejection,
    TemplateId,
};
use reqwest::blocking::Client;
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::allocator::PartyAllocator;
use crate::config::{ConfigError, HarnessConfig};

const MAX_DETAIL_CHARS: usize = 512;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateRequest<'a> {
    template_id: &'a TemplateId,
    payload: &'a Payload,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExerciseRequest<'a> {
    template_id: &'a TemplateId,
    contract_id: &'a ContractId,
    choice: &'a str,
    argument: &'a Value,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FetchRequest<'a> {
    template_id: &'a TemplateId,
    contract_id: &'a ContractId,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    template_ids: &'a [TemplateId],
    query: &'a Payload,
}

/// What a ledger returns for a contract. Only `contractId` is guaranteed
/// by `create`; reads carry the payload but may omit the template.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContractWire {
    contract_id: ContractId,
    #[serde(default)]
    template_id: Option<TemplateId>,
    #[serde(default)]
    payload: Option<Payload>,
}

impl ContractWire {
    fn decode(operation: &str, value: Value) -> LedgerResult<Self> {
        serde_json::from_value(value).map_err(|err| LedgerError::shape(operation, err))
    }

    /// Missing members are taken from the request that produced the response.
    fn into_contract(
        self,
        operation: &str,
        template_id: &TemplateId,
        submitted: Option<&Payload>,
    ) -> LedgerResult<Contract> {
        let payload = match (self.payload, submitted) {
            (Some(payload), _) => payload,
            (None, Some(submitted)) => submitted.clone(),
            (None, None) => {
                return Err(LedgerError::shape(
                    operation,
                    format!("contract {} has no payload", self.contract_id),
                ))
            }
        };
        Ok(Contract {
            contract_id: self.contract_id,
            template_id: self.template_id.unwrap_or_else(|| template_id.clone()),
            payload,
        })
    }
}

/// Sequential client for one ledger. Not shared between scenarios that
/// need isolation; parties provide that.
pub struct LedgerClient {
    config: HarnessConfig,
    tokens: TokenBuilder,
    http: Client,
    pub(crate) parties: PartyAllocator,
}

impl LedgerClient {
    pub fn new(config: HarnessConfig) -> Result<Self, ConfigError> {
        let tokens = config.token_builder()?;
        let http = Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.timeout())
            .build()
            .map_err(|err| ConfigError::Http(err.to_string()))?;
        Ok(Self {
            config,
            tokens,
            http,
            parties: PartyAllocator::default(),
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::new(HarnessConfig::from_env()?)
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn credential(&self, profile: Profile) -> LedgerResult<Credential> {
        self.tokens
            .credential(profile)
            .map_err(|err| LedgerError::InvalidArgument(err.to_string()))
    }

    pub fn create(
        &self,
        template_id: &TemplateId,
        payload: &Payload,
        credential: &Credential,
    ) -> LedgerResult<Contract> {
        let body = CreateRequest {
            template_id,
            payload,
        };
        let result = self.post("create", "create", &body, credential)?;
        ContractWire::decode("create", result)?.into_contract("create", template_id, Some(payload))
    }

    pub fn exercise(
        &self,
        template_id: &TemplateId,
        contract_id: &ContractId,
        choice: &str,
        argument: &Value,
        credential: &Credential,
    ) -> LedgerResult<ExerciseOutcome> {
        let body = ExerciseRequest {
            template_id,
            contract_id,
            choice,
            argument,
        };
        let operation = format!("exercise {choice}");
        let mut result = self.post(&operation, "exercise", &body, credential)?;
        let exercise_result = result
            .as_object_mut()
            .and_then(|object| object.remove("exerciseResult"))
            .ok_or_else(|| LedgerError::shape(&operation, "missing exerciseResult"))?;
        Ok(ExerciseOutcome { exercise_result })
    }

    pub fn fetch(
        &self,
        template_id: &TemplateId,
        contract_id: &ContractId,
        credential: &Credential,
    ) -> LedgerResult<Option<Contract>> {
        let body = FetchRequest {
            template_id,
            contract_id,
        };
        match self.post("fetch", "fetch", &body, credential)? {
            Value::Null => Ok(None),
            result => ContractWire::decode("fetch", result)?
                .into_contract("fetch", template_id, None)
                .map(Some),
        }
    }

    pub fn query(
        &self,
        template_ids: &[TemplateId],
        filter: &Payload,
        credential: &Credential,
    ) -> LedgerResult<Vec<Contract>> {
        let body = QueryRequest {
            template_ids,
            query: filter,
        };
        let result = self.post("query", "query", &body, credential)?;
        let items: Vec<ContractWire> =
            serde_json::from_value(result).map_err(|err| LedgerError::shape("query", err))?;
        // A single requested template is unambiguous; otherwise the ledger
        // must name it.
        let fallback = match template_ids {
            [only] => Some(only),
            _ => None,
        };
        items
            .into_iter()
            .map(|item| {
                let Some(template_id) = item.template_id.clone().or_else(|| fallback.cloned())
                else {
                    return Err(LedgerError::shape(
                        "query",
                        format!("contract {} has no templateId", item.contract_id),
                    ));
                };
                item.into_contract("query", &template_id, None)
            })
            .collect()
    }

    /// One round trip; returns the envelope's `result` member.
    pub(crate) fn post<B: Serialize>(
        &self,
        operation: &str,
        path: &str,
        body: &B,
        credential: &Credential,
    ) -> LedgerResult<Value> {
        let url = self.config.endpoint(path);
        let response = self
            .http
            .post(&url)
            .header(AUTHORIZATION, credential.header_value())
            .json(body)
            .send()
            .map_err(|err| {
                warn!(operation, url = %url, error = %err, "ledger unreachable");
                LedgerError::transport(operation, err)
            })?;
        let status = response.status().as_u16();
        let text = response.text().map_err(|err| {
            warn!(operation, status, error = %err, "response body unreadable");
            LedgerError::transport(operation, err)
        })?;
        debug!(operation, status, "ledger round trip");
        let outcome = normalize(operation, status, &text);
        match &outcome {
            Err(LedgerError::Rejected(rejection)) => {
                debug!(operation, status, message = %rejection.message(), "rejected");
            }
            Err(LedgerError::Transport { detail, .. }) => {
                warn!(operation, status, detail = %detail, "transport failure");
            }
            _ => {}
        }
        outcome
    }
}

/// Maps an HTTP status and body onto the error taxonomy.
pub fn normalize(operation: &str, status: u16, body: &str) -> LedgerResult<Value> {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    if (200..300).contains(&status) {
        let Some(Value::Object(mut envelope)) = parsed else {
            return Err(LedgerError::shape(
                operation,
                format!("HTTP {status} body is not a JSON object: {}", clip(body)),
            ));
        };
        if status != 200 {
            return Err(LedgerError::shape(
                operation,
                format!("unexpected success status {status}"),
            ));
        }
        return envelope.remove("result").ok_or_else(|| {
            LedgerError::shape(operation, format!("missing result: {}", clip(body)))
        });
    }

    let errors = parsed
        .as_ref()
        .and_then(|value| value.get("errors"))
        .and_then(Value::as_array);
    match errors {
        Some(errors) => {
            let reported = parsed
                .as_ref()
                .and_then(|value| value.get("status"))
                .and_then(Value::as_u64)
                .and_then(|status| u16::try_from(status).ok())
                .unwrap_or(status);
            let messages = errors
                .iter()
                .map(|error| match error {
                    Value::String(message) => message.clone(),
                    other => other.to_string(),
                })
                .collect();
            Err(LedgerError::Rejected(Rejection::new(
                operation, reported, messages,
            )))
        }
        None => Err(LedgerError::transport(
            operation,
            format!("HTTP {status}: {}", clip(body)),
        )),
    }
}

fn clip(body: &str) -> String {
    if body.chars().count() <= MAX_DETAIL_CHARS {
        return body.to_string();
    }
    let mut clipped: String = body.chars().take(MAX_DETAIL_CHARS).collect();
    clipped.push_str("...");
    clipped
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn market() -> TemplateId {
        "pkg:Market:Market".parse().unwrap()
    }

    #[test]
    fn bare_create_result_is_completed_from_the_request() {
        let submitted: Payload = serde_json::from_value(json!({"owner": "a"})).unwrap();
        let wire = ContractWire::decode("create", json!({"contractId": "#2:0"})).unwrap();
        let contract = wire.into_contract("create", &market(), Some(&submitted)).unwrap();
        assert_eq!(contract.contract_id.as_str(), "#2:0");
        assert_eq!(contract.template_id, market());
        assert_eq!(contract.payload, submitted);
    }

    #[test]
    fn read_without_payload_is_a_shape_error() {
        let wire = ContractWire::decode("fetch", json!({"contractId": "#3:0"})).unwrap();
        let err = wire.into_contract("fetch", &market(), None).unwrap_err();
        assert!(matches!(err, LedgerError::Shape { .. }), "{err}");
        let err = ContractWire::decode("fetch", json!({"payload": {}})).unwrap_err();
        assert!(err.to_string().contains("contractId"), "{err}");
    }

    #[test]
    fn success_unwraps_result() {
        let body = json!({"status": 200, "result": {"contractId": "#1:0"}}).to_string();
        assert_eq!(
            normalize("create", 200, &body).unwrap(),
            json!({"contractId": "#1:0"})
        );
    }

    #[test]
    fn null_result_is_still_success() {
        let body = json!({"status": 200, "result": null}).to_string();
        assert_eq!(normalize("fetch", 200, &body).unwrap(), Value::Null);
    }

    #[test]
    fn success_without_result_is_a_shape_error() {
        let body = json!({"status": 200}).to_string();
        let err = normalize("create", 200, &body).unwrap_err();
        assert!(matches!(err, LedgerError::Shape { .. }), "{err}");
        let err = normalize("create", 200, "<html>").unwrap_err();
        assert!(matches!(err, LedgerError::Shape { .. }), "{err}");
    }

    #[test]
    fn error_envelope_is_a_rejection_with_server_status() {
        let body = json!({"status": 409, "errors": ["Assertion failed", {"code": 7}]}).to_string();
        let err = normalize("exercise Withdraw", 400, &body).unwrap_err();
        let rejection = err.rejection().unwrap();
        assert_eq!(rejection.status, 409);
        assert_eq!(rejection.operation, "exercise Withdraw");
        assert_eq!(rejection.messages[0], "Assertion failed");
        assert!(err.to_string().contains("status 409"));
        assert!(err.to_string().contains("Assertion failed"));
    }

    #[test]
    fn opaque_failure_is_transport() {
        let err = normalize("query", 502, "Bad Gateway").unwrap_err();
        assert!(matches!(err, LedgerError::Transport { .. }));
        assert!(err.to_string().contains("HTTP 502: Bad Gateway"));
    }

    #[test]
    fn long_bodies_are_clipped() {
        let body = "x".repeat(MAX_DETAIL_CHARS * 2);
        let err = normalize("query", 500, &body).unwrap_err();
        assert!(err.to_string().len() < MAX_DETAIL_CHARS + 64);
    }
}
