//! The initialization parameter channel.
//!
//! The orchestrator hands each process one parameter blob. On the wire this
//! is text: whitespace-separated `key:value` pairs, where each value is read
//! as an integer, a float or a string, whichever parses first. A producer
//! that needs a richer structure armors it with [`codec::encode`] and sends
//! it as the single pair `<armored>:` (base64 never contains `:` or
//! whitespace).
//!
//! [`InitParams`] makes that choice explicit. [`InitParams::from_mapping`]
//! still recognizes the old untagged shape, a one-entry mapping with an
//! empty value, so streams from older producers keep working.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Number, Value};

use crate::codec;
use crate::error::Error;

/// Plain parameters: name to int, float or string.
pub type ParamMap = serde_json::Map<String, Value>;

/// Parameters as sent by the producer.
#[derive(Clone, Debug, PartialEq)]
pub enum InitParams {
    /// A direct mapping of parameters.
    Plain(ParamMap),
    /// An armored, fully encoded parameter structure.
    Encoded(String),
}

impl InitParams {
    /// Armors `value` into the encoded form.
    pub fn encoded<T: Serialize + ?Sized>(value: &T) -> Result<Self, Error> {
        let armored = codec::encode(value)?;
        // base64 output is ASCII
        Ok(Self::Encoded(String::from_utf8_lossy(&armored).into_owned()))
    }

    /// Parses the text channel form.
    pub fn from_text(text: &str) -> Self {
        Self::from_mapping(parse_param_text(text))
    }

    /// Classifies an untagged mapping. Exactly one entry with an empty
    /// string value means the key is an encoded structure.
    pub fn from_mapping(map: ParamMap) -> Self {
        if map.len() == 1 {
            if let Some((key, Value::String(v))) = map.iter().next() {
                if v.is_empty() {
                    return Self::Encoded(key.clone());
                }
            }
        }
        Self::Plain(map)
    }

    /// Renders the text channel form understood by [`from_text`](Self::from_text).
    pub fn to_text(&self) -> String {
        match self {
            Self::Encoded(blob) => format!("{blob}:"),
            Self::Plain(map) => map
                .iter()
                .map(|(k, v)| match v {
                    Value::String(s) => format!("{k}:{s}"),
                    other => format!("{k}:{other}"),
                })
                .collect::<Vec<_>>()
                .join(" "),
        }
    }

    /// Decodes into the structure the job works with.
    pub fn resolve<P: DeserializeOwned>(self) -> Result<P, Error> {
        match self {
            Self::Plain(map) => serde_json::from_value(Value::Object(map)).map_err(Error::Payload),
            Self::Encoded(blob) => codec::decode(blob.as_bytes()),
        }
    }
}

/// Splits `text` on whitespace into `key:value` pairs. The first colon
/// separates key from value, later duplicates win, and a missing colon
/// gives an empty value.
pub fn parse_param_text(text: &str) -> ParamMap {
    let mut map = ParamMap::new();
    for pair in text.split_whitespace() {
        let (k, v) = pair.split_once(':').unwrap_or((pair, ""));
        map.insert(k.to_string(), int_float_pass(v));
    }
    map
}

/// Reads `v` as an integer, else a finite float, else leaves it a string.
pub fn int_float_pass(v: &str) -> Value {
    if let Ok(i) = v.parse::<i64>() {
        return Value::Number(i.into());
    }
    if let Some(n) = v.parse::<f64>().ok().and_then(Number::from_f64) {
        return Value::Number(n);
    }
    Value::String(v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[test]
    fn text_form_parses_types() {
        let map = parse_param_text("a:b c:1 d:1.0");
        assert_eq!(Value::Object(map), json!({"a": "b", "c": 1, "d": 1.0}));
    }

    #[test]
    fn text_form_edge_cases() {
        assert_eq!(Value::Object(parse_param_text("a:1 a:2")), json!({"a": 2}));
        assert!(parse_param_text("").is_empty());
        assert!(parse_param_text(" ").is_empty());
        assert_eq!(Value::Object(parse_param_text("a::b:c")), json!({"a": ":b:c"}));
        assert_eq!(
            Value::Object(parse_param_text("a:1\t\x0bb:1")),
            json!({"a": 1, "b": 1})
        );
        assert_eq!(Value::Object(parse_param_text("x:inf")), json!({"x": "inf"}));
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Settings {
        term: String,
        limits: Vec<u32>,
    }

    #[test]
    fn encoded_structure_survives_the_text_channel() {
        let settings = Settings {
            term: "needle haystack".into(),
            limits: vec![3, 9],
        };
        let params = InitParams::encoded(&settings).unwrap();
        let text = params.to_text();
        assert!(text.ends_with(':'));

        let received = InitParams::from_text(&text);
        assert_eq!(received, params);
        assert_eq!(received.resolve::<Settings>().unwrap(), settings);
    }

    #[test]
    fn plain_mapping_is_not_mistaken_for_encoded() {
        let two = InitParams::from_text("a: b:");
        assert!(matches!(two, InitParams::Plain(ref m) if m.len() == 2));

        let one = InitParams::from_text("k:3");
        assert!(matches!(one, InitParams::Plain(_)));
        assert_eq!(one.to_text(), "k:3");
    }

    #[derive(Debug, Deserialize)]
    struct Limit {
        k: usize,
        label: Option<String>,
    }

    #[test]
    fn plain_mapping_resolves_into_user_type() {
        let limit: Limit = InitParams::from_text("k:5").resolve().unwrap();
        assert_eq!(limit.k, 5);
        assert_eq!(limit.label, None);

        let err = InitParams::from_text("k:many").resolve::<Limit>().unwrap_err();
        assert!(matches!(err, Error::Payload(_)));
    }

    #[test]
    fn malformed_encoded_blob_is_fatal() {
        let err = InitParams::Encoded("%%%".into()).resolve::<ParamMap>().unwrap_err();
        assert!(err.is_wire_format());
    }
}
