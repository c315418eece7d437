use super::{QuoteDecoder, RawQuote};
use crate::error::ParseError;
use serde::Deserialize;
use serde_json::Value;

/// Decoder for `format=json` responses:
/// `{"query":{"results":{"rate":[{"id":"USDCAD","Rate":"1.2283"}]}}}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDecoder;

#[derive(Deserialize, Debug)]
struct QuoteResponse {
    query: QuoteQuery,
}

#[derive(Deserialize, Debug)]
struct QuoteQuery {
    #[serde(default)]
    results: Option<QuoteResults>,
}

#[derive(Deserialize, Debug)]
struct QuoteResults {
    #[serde(default)]
    rate: Option<OneOrMany>,
}

// A single matching record comes back as a bare object, not a list.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum OneOrMany {
    Many(Vec<Value>),
    One(Value),
}

fn field_text(record: &Value, name: &str) -> String {
    match record.get(name) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

impl QuoteDecoder for JsonDecoder {
    fn decode(&self, body: &[u8]) -> Result<Vec<RawQuote>, ParseError> {
        let response: QuoteResponse = serde_json::from_slice(body)?;

        let records = match response.query.results.and_then(|r| r.rate) {
            Some(OneOrMany::Many(records)) => records,
            Some(OneOrMany::One(record)) => vec![record],
            None => return Ok(Vec::new()),
        };

        Ok(records
            .iter()
            .map(|record| RawQuote::new(field_text(record, "id"), field_text(record, "Rate")))
            .collect())
    }
}
