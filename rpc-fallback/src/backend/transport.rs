//! Wire transports: JSON-RPC 2.0 over POST and the explorer `module=proxy` API.

use reqwest::{RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::{BackendInstance, Transport};
use crate::error::Error;

/// One read request: a JSON-RPC method and its positional params.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RpcCall {
    /// Method name, e.g. `eth_blockNumber`.
    pub method: String,
    /// Positional params. `null` is sent as an empty array.
    pub params: Value,
}

impl RpcCall {
    /// Creates a call.
    #[must_use]
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }

    fn params_array(&self) -> Value {
        match &self.params {
            Value::Null => Value::Array(Vec::new()),
            other => other.clone(),
        }
    }

    fn envelope(&self, id: u64) -> Value {
        json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": self.method,
            "params": self.params_array(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    id: Value,
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

impl RpcResponse {
    fn into_result(self, label: &str) -> Result<Value, Error> {
        match self.error {
            Some(error) => Err(Error::request(
                label,
                format!("rpc error {}: {}", error.code, error.message),
            )),
            None => Ok(self.result),
        }
    }
}

/// Sends one call over the instance's transport.
pub(super) async fn send(instance: &BackendInstance, call: &RpcCall) -> Result<Value, Error> {
    match instance.transport() {
        Transport::JsonRpc => {
            let body = read_json(instance, post(instance, &call.envelope(1)).send().await).await?;
            decode_response(instance, body)?.into_result(&instance.label())
        }
        Transport::ExplorerProxy => send_explorer(instance, call).await,
    }
}

/// Sends every call in one JSON-RPC batch. Explorer backends have no batch
/// endpoint and answer call by call, stopping at the first failure.
pub(super) async fn send_batch(
    instance: &BackendInstance,
    calls: &[RpcCall],
) -> Result<Vec<Value>, Error> {
    if calls.is_empty() {
        return Ok(Vec::new());
    }
    match instance.transport() {
        Transport::JsonRpc => send_json_batch(instance, calls).await,
        Transport::ExplorerProxy => {
            let mut results = Vec::with_capacity(calls.len());
            for call in calls {
                results.push(send_explorer(instance, call).await?);
            }
            Ok(results)
        }
    }
}

/// Readiness probe.
///
/// JSON-RPC backends must report the expected chain id (any id is accepted for
/// the unspecified network). Explorer backends must return a block number.
pub(super) async fn probe(instance: &BackendInstance) -> Result<(), Error> {
    let label = instance.label();
    match instance.transport() {
        Transport::JsonRpc => {
            let result = send(instance, &RpcCall::new("eth_chainId", Value::Null)).await?;
            let reported = parse_quantity(&result).ok_or_else(|| {
                Error::request(&label, format!("malformed eth_chainId result {result}"))
            })?;
            let expected = instance.network().chain_id;
            if expected != 0 && reported != expected {
                return Err(Error::unreachable(
                    label,
                    format!("chain id mismatch: expected {expected}, got {reported}"),
                ));
            }
        }
        Transport::ExplorerProxy => {
            let result = send(instance, &RpcCall::new("eth_blockNumber", Value::Null)).await?;
            if parse_quantity(&result).is_none() {
                return Err(Error::request(
                    label,
                    format!("malformed eth_blockNumber result {result}"),
                ));
            }
        }
    }
    Ok(())
}

async fn send_json_batch(
    instance: &BackendInstance,
    calls: &[RpcCall],
) -> Result<Vec<Value>, Error> {
    let label = instance.label();
    let body: Vec<Value> = (0u64..).zip(calls).map(|(id, call)| call.envelope(id)).collect();
    let response = read_json(instance, post(instance, &Value::Array(body)).send().await).await?;

    let Value::Array(items) = response else {
        return Err(Error::request(label, "batch response is not an array"));
    };
    let mut slots: Vec<Option<Value>> = vec![None; calls.len()];
    for item in items {
        let response = decode_response(instance, item)?;
        let slot = response
            .id
            .as_u64()
            .and_then(|id| usize::try_from(id).ok())
            .filter(|&index| index < slots.len())
            .ok_or_else(|| Error::request(&label, format!("unexpected batch id {}", response.id)))?;
        slots[slot] = Some(response.into_result(&label)?);
    }
    slots
        .into_iter()
        .zip(calls)
        .map(|(slot, call)| {
            slot.ok_or_else(|| {
                Error::request(&label, format!("batch response missing {}", call.method))
            })
        })
        .collect()
}

async fn send_explorer(instance: &BackendInstance, call: &RpcCall) -> Result<Value, Error> {
    let label = instance.label();
    // An explorer serves exactly one chain, so identity reads need no round trip.
    let chain_id = instance.network().chain_id;
    match call.method.as_str() {
        "eth_chainId" => return Ok(Value::String(format!("{chain_id:#x}"))),
        "net_version" => return Ok(Value::String(chain_id.to_string())),
        _ => {}
    }

    let (module, action) = explorer_action(&call.method);
    let mut query = vec![("module", module.to_owned()), ("action", action.to_owned())];
    query.extend(explorer_params(call).map_err(|reason| Error::request(&label, reason))?);

    let url = &instance.connection().url;
    let request = authorize(instance, instance.client().get(url)).query(&query);
    let body = read_json(instance, request.send().await).await?;

    // Rejections outside the proxy envelope: {"status":"0","message":"NOTOK","result":"..."}
    if body.get("status").and_then(Value::as_str) == Some("0") {
        let message = body.get("message").and_then(Value::as_str).unwrap_or("NOTOK");
        if module == "logs" && message == "No records found" {
            return Ok(Value::Array(Vec::new()));
        }
        let detail = body.get("result").map(Value::to_string).unwrap_or_default();
        return Err(Error::request(
            label,
            format!("explorer rejected request: {message} {detail}"),
        ));
    }

    match module {
        // Decimal wei.
        "account" => body
            .get("result")
            .and_then(Value::as_str)
            .and_then(|wei| wei.parse::<u128>().ok())
            .map(|wei| Value::String(format!("{wei:#x}")))
            .ok_or_else(|| Error::request(label, format!("malformed balance response {body}"))),
        "logs" => match body.get("result") {
            Some(Value::Array(logs)) => Ok(Value::Array(logs.iter().map(normalize_log).collect())),
            _ => Err(Error::request(label, format!("malformed logs response {body}"))),
        },
        _ => {
            let result = decode_response(instance, body)?.into_result(&label)?;
            // Every mapped proxy method answers with hex data, an object, or null. Any
            // other string is a message such as a rate-limit notice.
            if let Value::String(text) = &result
                && !is_hex_data(text)
            {
                return Err(Error::request(
                    label,
                    format!("explorer returned a non-hex result: {text}"),
                ));
            }
            Ok(result)
        }
    }
}

fn explorer_action(method: &str) -> (&'static str, &str) {
    match method {
        "eth_getBalance" => ("account", "balance"),
        "eth_getLogs" => ("logs", "getLogs"),
        other => ("proxy", other),
    }
}

/// Maps positional JSON-RPC params onto the explorer's named query parameters.
fn explorer_params(call: &RpcCall) -> Result<Vec<(&'static str, String)>, String> {
    let params: &[Value] = match &call.params {
        Value::Null => &[],
        Value::Array(items) => items.as_slice(),
        other => return Err(format!("params must be an array, got {other}")),
    };
    let at = |index: usize, name: &str| -> Result<String, String> {
        params
            .get(index)
            .and_then(query_value)
            .ok_or_else(|| format!("{} requires param '{name}'", call.method))
    };
    let tag = |index: usize| {
        params
            .get(index)
            .and_then(query_value)
            .unwrap_or_else(|| "latest".to_owned())
    };

    let pairs = match call.method.as_str() {
        "eth_blockNumber" | "eth_gasPrice" => Vec::new(),
        "eth_getBlockByNumber" => vec![
            ("tag", at(0, "tag")?),
            (
                "boolean",
                params.get(1).and_then(query_value).unwrap_or_else(|| "false".to_owned()),
            ),
        ],
        "eth_getTransactionByHash" | "eth_getTransactionReceipt" => {
            vec![("txhash", at(0, "txhash")?)]
        }
        "eth_getBalance" | "eth_getTransactionCount" | "eth_getCode" => {
            vec![("address", at(0, "address")?), ("tag", tag(1))]
        }
        "eth_getStorageAt" => vec![
            ("address", at(0, "address")?),
            ("position", at(1, "position")?),
            ("tag", tag(2)),
        ],
        "eth_call" => {
            let tx = transaction_object(call, params)?;
            let mut pairs = transaction_fields(tx, &["to", "data"]);
            pairs.push(("tag", tag(1)));
            pairs
        }
        "eth_estimateGas" => {
            let tx = transaction_object(call, params)?;
            transaction_fields(tx, &["to", "data", "value", "gas", "gasPrice"])
        }
        "eth_getLogs" => log_filter(params)?,
        other => return Err(format!("{other} is not available through the explorer proxy")),
    };
    Ok(pairs)
}

const TOPIC_KEYS: [&str; 4] = ["topic0", "topic1", "topic2", "topic3"];
const TOPIC_OPERATORS: [((usize, usize), &str); 6] = [
    ((0, 1), "topic0_1_opr"),
    ((0, 2), "topic0_2_opr"),
    ((0, 3), "topic0_3_opr"),
    ((1, 2), "topic1_2_opr"),
    ((1, 3), "topic1_3_opr"),
    ((2, 3), "topic2_3_opr"),
];

/// Flattens an `eth_getLogs` filter into the logs module's query parameters.
///
/// Topic positions are joined with `and`, matching JSON-RPC filter semantics. Block
/// hashes, address lists and per-position topic alternatives have no explorer form.
fn log_filter(params: &[Value]) -> Result<Vec<(&'static str, String)>, String> {
    let filter = params
        .first()
        .and_then(Value::as_object)
        .ok_or_else(|| "eth_getLogs requires a filter object".to_owned())?;
    if filter.contains_key("blockHash") {
        return Err("eth_getLogs by blockHash is not available through the explorer".to_owned());
    }

    let mut pairs = vec![
        ("fromBlock", log_block(filter.get("fromBlock"))?),
        ("toBlock", log_block(filter.get("toBlock"))?),
    ];
    match filter.get("address") {
        None | Some(Value::Null) => {}
        Some(Value::String(address)) => pairs.push(("address", address.clone())),
        Some(other) => return Err(format!("eth_getLogs address must be a string, got {other}")),
    }

    let topics: &[Value] = match filter.get("topics") {
        None | Some(Value::Null) => &[],
        Some(Value::Array(topics)) if topics.len() <= TOPIC_KEYS.len() => topics.as_slice(),
        Some(other) => return Err(format!("eth_getLogs topics not supported: {other}")),
    };
    let mut present = Vec::new();
    for (index, topic) in topics.iter().enumerate() {
        match topic {
            Value::Null => {}
            Value::String(topic) => {
                pairs.push((TOPIC_KEYS[index], topic.clone()));
                present.push(index);
            }
            other => return Err(format!("eth_getLogs topic {index} not supported: {other}")),
        }
    }
    for ((first, second), key) in TOPIC_OPERATORS {
        if present.contains(&first) && present.contains(&second) {
            pairs.push((key, "and".to_owned()));
        }
    }
    Ok(pairs)
}

/// Explorer block bounds are decimal numbers or `latest`.
fn log_block(value: Option<&Value>) -> Result<String, String> {
    let tag = match value {
        None | Some(Value::Null) => return Ok("latest".to_owned()),
        Some(Value::String(tag)) => tag.as_str(),
        Some(other) => return Err(format!("eth_getLogs block {other} is not a quantity")),
    };
    match tag {
        "latest" | "pending" | "safe" | "finalized" => Ok("latest".to_owned()),
        "earliest" => Ok("0".to_owned()),
        _ => parse_hex(tag)
            .map(|number| number.to_string())
            .ok_or_else(|| format!("eth_getLogs block '{tag}' is not a quantity")),
    }
}

/// Reshapes an explorer log entry into a JSON-RPC log object.
///
/// Explorer-only fields (`timeStamp`, `gasPrice`, `gasUsed`) are dropped and
/// quantities are re-encoded without padding, so entries compare equal to node
/// answers under quorum.
fn normalize_log(entry: &Value) -> Value {
    let Some(fields) = entry.as_object() else {
        return entry.clone();
    };
    let mut log = serde_json::Map::new();
    for key in ["address", "topics", "data", "blockHash", "transactionHash"] {
        if let Some(value) = fields.get(key) {
            log.insert(key.to_owned(), value.clone());
        }
    }
    for key in ["blockNumber", "transactionIndex", "logIndex"] {
        if let Some(value) = fields.get(key) {
            log.insert(key.to_owned(), canonical_quantity(value));
        }
    }
    log.insert("removed".to_owned(), Value::Bool(false));
    Value::Object(log)
}

/// `0x` and zero-padded quantities become their minimal form; anything else is kept.
fn canonical_quantity(value: &Value) -> Value {
    let parsed = value.as_str().and_then(|text| text.strip_prefix("0x")).and_then(|digits| {
        if digits.is_empty() {
            Some(0)
        } else {
            u64::from_str_radix(digits, 16).ok()
        }
    });
    parsed.map_or_else(|| value.clone(), |number| Value::String(format!("{number:#x}")))
}

/// `0x` followed by hex digits; `0x` alone is empty data.
fn is_hex_data(text: &str) -> bool {
    text.strip_prefix("0x")
        .is_some_and(|digits| digits.bytes().all(|b| b.is_ascii_hexdigit()))
}

fn transaction_object<'a>(
    call: &RpcCall,
    params: &'a [Value],
) -> Result<&'a serde_json::Map<String, Value>, String> {
    params
        .first()
        .and_then(Value::as_object)
        .ok_or_else(|| format!("{} requires a transaction object", call.method))
}

fn transaction_fields(
    tx: &serde_json::Map<String, Value>,
    fields: &[&'static str],
) -> Vec<(&'static str, String)> {
    fields
        .iter()
        .filter_map(|&field| tx.get(field).and_then(query_value).map(|value| (field, value)))
        .collect()
}

fn query_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn post(instance: &BackendInstance, body: &Value) -> RequestBuilder {
    authorize(instance, instance.client().post(&instance.connection().url)).json(body)
}

fn authorize(instance: &BackendInstance, mut request: RequestBuilder) -> RequestBuilder {
    let connection = instance.connection();
    for (name, value) in &connection.headers {
        request = request.header(name, value);
    }
    if let Some(credentials) = &connection.credentials {
        let (user, password) = credentials.split_once(':').unwrap_or((credentials.as_str(), ""));
        request = request.basic_auth(user, Some(password));
    }
    request
}

async fn read_json(
    instance: &BackendInstance,
    response: Result<Response, reqwest::Error>,
) -> Result<Value, Error> {
    let label = instance.label();
    let response = response.map_err(|e| Error::request(&label, sanitize_network_error(&e)))?;
    let status = response.status();
    if !status.is_success() {
        return Err(Error::request(label, format!("http status {}", status.as_u16())));
    }
    response
        .json::<Value>()
        .await
        .map_err(|e| Error::request(label, sanitize_network_error(&e)))
}

fn decode_response(instance: &BackendInstance, body: Value) -> Result<RpcResponse, Error> {
    serde_json::from_value(body)
        .map_err(|e| Error::request(instance.label(), format!("malformed rpc response: {e}")))
}

/// Strips URLs (and the keys embedded in them) from reqwest errors.
fn sanitize_network_error(error: &reqwest::Error) -> String {
    if error.is_connect() {
        "connection refused or unreachable".to_owned()
    } else if error.is_timeout() {
        "connection timed out".to_owned()
    } else if error.is_decode() {
        "response decode error".to_owned()
    } else if error.is_body() {
        "response body error".to_owned()
    } else if error.is_redirect() {
        "too many redirects".to_owned()
    } else if error.is_request() {
        "request failed".to_owned()
    } else {
        "network error".to_owned()
    }
}

/// Parses a `0x`-prefixed hex quantity.
fn parse_quantity(value: &Value) -> Option<u64> {
    value.as_str().and_then(parse_hex)
}

fn parse_hex(text: &str) -> Option<u64> {
    u64::from_str_radix(text.strip_prefix("0x")?, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(method: &str, params: Value) -> Vec<(&'static str, String)> {
        explorer_params(&RpcCall::new(method, params)).unwrap()
    }

    #[test]
    fn envelope_defaults_params_to_empty_array() {
        let call = RpcCall::new("eth_chainId", Value::Null);
        assert_eq!(
            call.envelope(7),
            json!({"jsonrpc": "2.0", "id": 7, "method": "eth_chainId", "params": []})
        );
    }

    #[test]
    fn explorer_maps_block_and_balance_style_params() {
        assert!(pairs("eth_blockNumber", Value::Null).is_empty());
        assert_eq!(
            pairs("eth_getBlockByNumber", json!(["0x10", true])),
            vec![("tag", "0x10".to_owned()), ("boolean", "true".to_owned())]
        );
        assert_eq!(
            pairs("eth_getBalance", json!(["0xabc", "0x10"])),
            vec![("address", "0xabc".to_owned()), ("tag", "0x10".to_owned())]
        );
        assert_eq!(
            pairs("eth_getCode", json!(["0xabc"])),
            vec![("address", "0xabc".to_owned()), ("tag", "latest".to_owned())]
        );
        assert_eq!(
            pairs("eth_getStorageAt", json!(["0xabc", "0x0", "0x5"])),
            vec![
                ("address", "0xabc".to_owned()),
                ("position", "0x0".to_owned()),
                ("tag", "0x5".to_owned()),
            ]
        );
    }

    #[test]
    fn explorer_flattens_transaction_objects() {
        assert_eq!(
            pairs("eth_call", json!([{"to": "0xdead", "data": "0x70a08231"}, "latest"])),
            vec![
                ("to", "0xdead".to_owned()),
                ("data", "0x70a08231".to_owned()),
                ("tag", "latest".to_owned()),
            ]
        );
        assert_eq!(
            pairs("eth_estimateGas", json!([{"to": "0xdead", "value": "0x1"}])),
            vec![("to", "0xdead".to_owned()), ("value", "0x1".to_owned())]
        );
    }

    #[test]
    fn log_filters_become_logs_module_params() {
        let topic = "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef";
        let holder = "0x000000000000000000000000000000000000000000000000000000000000dead";
        assert_eq!(
            pairs(
                "eth_getLogs",
                json!([{
                    "fromBlock": "0x10",
                    "address": "0xabc",
                    "topics": [topic, null, holder],
                }])
            ),
            vec![
                ("fromBlock", "16".to_owned()),
                ("toBlock", "latest".to_owned()),
                ("address", "0xabc".to_owned()),
                ("topic0", topic.to_owned()),
                ("topic2", holder.to_owned()),
                ("topic0_2_opr", "and".to_owned()),
            ]
        );
        assert_eq!(
            pairs("eth_getLogs", json!([{"fromBlock": "earliest", "toBlock": "0x20"}])),
            vec![("fromBlock", "0".to_owned()), ("toBlock", "32".to_owned())]
        );
    }

    #[test]
    fn log_filters_without_explorer_form_are_rejected() {
        for filter in [
            json!({"blockHash": "0x01"}),
            json!({"address": ["0xa", "0xb"]}),
            json!({"topics": [["0x01", "0x02"]]}),
            json!({"fromBlock": "block ten"}),
        ] {
            assert!(explorer_params(&RpcCall::new("eth_getLogs", json!([filter]))).is_err());
        }
    }

    #[test]
    fn explorer_logs_are_reshaped_like_node_logs() {
        let entry = json!({
            "address": "0xabc",
            "topics": ["0x01"],
            "data": "0x",
            "blockNumber": "0x0010",
            "timeStamp": "0x6123",
            "gasPrice": "0x3b9aca00",
            "logIndex": "0x",
            "transactionHash": "0xfeed",
            "transactionIndex": "0x1",
        });
        assert_eq!(
            normalize_log(&entry),
            json!({
                "address": "0xabc",
                "topics": ["0x01"],
                "data": "0x",
                "blockNumber": "0x10",
                "logIndex": "0x0",
                "transactionHash": "0xfeed",
                "transactionIndex": "0x1",
                "removed": false,
            })
        );
    }

    #[test]
    fn hex_data_check() {
        assert!(is_hex_data("0x"));
        assert!(is_hex_data("0x6080604052"));
        assert!(!is_hex_data("Max rate limit reached"));
        assert!(!is_hex_data("0xnope"));
    }

    #[test]
    fn explorer_rejects_unmapped_methods_and_missing_params() {
        assert!(explorer_params(&RpcCall::new("eth_getProof", json!(["0x1", []]))).is_err());
        assert!(explorer_params(&RpcCall::new("eth_getTransactionReceipt", json!([]))).is_err());
        assert!(explorer_params(&RpcCall::new("eth_call", json!(["0x1"]))).is_err());
    }

    #[test]
    fn quantities_require_hex_prefix() {
        assert_eq!(parse_quantity(&json!("0x61")), Some(97));
        assert_eq!(parse_quantity(&json!("61")), None);
        assert_eq!(parse_quantity(&json!("0x")), None);
        assert_eq!(parse_quantity(&json!(97)), None);
    }
}
