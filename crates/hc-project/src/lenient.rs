//! Numeric-string coercion for hand-edited and template-rendered JSON.
//!
//! Optimizer templates substitute parameter values as text, so documents
//! arrive with `"0.35"` where a number is meant. [`coerce_numeric_strings`]
//! turns such strings back into numbers; the deserializers below let
//! string-typed fields accept whatever the coercion produced.

use std::collections::BTreeMap;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::{Number, Value};

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn strip_sign(s: &str) -> &str {
    s.strip_prefix(['+', '-']).unwrap_or(s)
}

/// Optional sign followed by digits only.
fn looks_like_int(s: &str) -> bool {
    is_digits(strip_sign(s))
}

/// Optional sign, then either a mantissa with a decimal point and an
/// optional exponent, or an integer with a mandatory exponent.
fn looks_like_float(s: &str) -> bool {
    let body = strip_sign(s);
    let (mantissa, exponent) = match body.find(['e', 'E']) {
        Some(i) => (&body[..i], Some(&body[i + 1..])),
        None => (body, None),
    };
    if let Some(exp) = exponent
        && !is_digits(strip_sign(exp))
    {
        return false;
    }
    match mantissa.split_once('.') {
        Some((int, frac)) => {
            (int.is_empty() || is_digits(int))
                && (frac.is_empty() || is_digits(frac))
                && !(int.is_empty() && frac.is_empty())
        }
        None => exponent.is_some() && is_digits(mantissa),
    }
}

/// Interpret a numeric-looking string as a number; anything else is kept
/// as a string. Surrounding whitespace is ignored.
pub fn parse_numeric_string(raw: &str) -> Value {
    let s = raw.trim();
    if looks_like_int(s)
        && let Ok(i) = s.parse::<i64>()
    {
        return Value::Number(i.into());
    }
    if (looks_like_int(s) || looks_like_float(s))
        && let Ok(f) = s.parse::<f64>()
        && let Some(n) = Number::from_f64(f)
    {
        return Value::Number(n);
    }
    Value::String(raw.to_string())
}

/// Apply [`parse_numeric_string`] to every string in a document.
pub fn coerce_numeric_strings(value: Value) -> Value {
    match value {
        Value::String(s) => parse_numeric_string(&s),
        Value::Array(items) => Value::Array(items.into_iter().map(coerce_numeric_strings).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, coerce_numeric_strings(v)))
                .collect(),
        ),
        other => other,
    }
}

/// [`coerce_numeric_strings`] on every top-level entry except those named
/// in `verbatim`, which keep their string values.
pub fn coerce_numeric_strings_except(value: Value, verbatim: &[&str]) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| {
                    if verbatim.contains(&k.as_str()) {
                        (k, v)
                    } else {
                        (k, coerce_numeric_strings(v))
                    }
                })
                .collect(),
        ),
        other => coerce_numeric_strings(other),
    }
}

fn scalar_to_string<E: serde::de::Error>(v: Value) -> Result<String, E> {
    match v {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(E::custom(format!("expected a string, found {other}"))),
    }
}

pub fn string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    scalar_to_string(Value::deserialize(d)?)
}

pub fn opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    match Value::deserialize(d)? {
        Value::Null => Ok(None),
        v => scalar_to_string(v).map(Some),
    }
}

pub fn string_vec<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    match Value::deserialize(d)? {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => flatten_strings(items),
        v => Ok(vec![scalar_to_string::<D::Error>(v)?]),
    }
}

/// Nested lists are flattened, so `[["a.json"]]` reads as `["a.json"]`.
fn flatten_strings<E: serde::de::Error>(items: Vec<Value>) -> Result<Vec<String>, E> {
    let mut out = Vec::new();
    for item in items {
        match item {
            Value::Array(inner) => out.extend(flatten_strings::<E>(inner)?),
            v => out.push(scalar_to_string::<E>(v)?),
        }
    }
    Ok(out)
}

pub fn string_map<'de, D: Deserializer<'de>>(d: D) -> Result<BTreeMap<String, String>, D::Error> {
    match Value::deserialize(d)? {
        Value::Null => Ok(BTreeMap::new()),
        Value::Object(map) => map
            .into_iter()
            .map(|(k, v)| Ok((k, scalar_to_string::<D::Error>(v)?)))
            .collect(),
        other => Err(D::Error::custom(format!("expected a mapping, found {other}"))),
    }
}

pub fn objectives<'de, D: Deserializer<'de>>(
    d: D,
) -> Result<BTreeMap<String, BTreeMap<String, Vec<String>>>, D::Error> {
    let Value::Object(fluxes) = Value::deserialize(d)? else {
        return Err(D::Error::custom("objective functions must be a mapping"));
    };
    let mut out = BTreeMap::new();
    for (flux, metrics) in fluxes {
        let Value::Object(metrics) = metrics else {
            return Err(D::Error::custom(format!("metrics of `{flux}` must be a mapping")));
        };
        let mut per_flux = BTreeMap::new();
        for (metric, exprs) in metrics {
            let exprs = match exprs {
                Value::Array(items) => flatten_strings::<D::Error>(items)?,
                v => vec![scalar_to_string::<D::Error>(v)?],
            };
            per_flux.insert(metric, exprs);
        }
        out.insert(flux, per_flux);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_strings() {
        assert_eq!(parse_numeric_string("42"), json!(42));
        assert_eq!(parse_numeric_string(" -7 "), json!(-7));
        assert_eq!(parse_numeric_string("3.14"), json!(3.14));
        assert_eq!(parse_numeric_string(".5"), json!(0.5));
        assert_eq!(parse_numeric_string("5."), json!(5.0));
        assert_eq!(parse_numeric_string("1e3"), json!(1000.0));
        assert_eq!(parse_numeric_string("+2.5E-1"), json!(0.25));
    }

    #[test]
    fn non_numeric_strings_survive() {
        for s in ["abc", "1D", "1e", ".", "-", "2020-01-01", "1.2.3", "inf", "nan", ""] {
            assert_eq!(parse_numeric_string(s), json!(s), "{s}");
        }
    }

    #[test]
    fn coerces_nested_documents() {
        let doc = json!({"a": ["1", {"b": "2.5", "c": "x"}], "d": true});
        assert_eq!(
            coerce_numeric_strings(doc),
            json!({"a": [1, {"b": 2.5, "c": "x"}], "d": true})
        );
    }

    #[test]
    fn verbatim_keys_keep_compact_dates() {
        let doc = json!({
            "dates": [{"start": "20210601", "end": "20210609"}],
            "penalty": "1e10"
        });
        assert_eq!(
            coerce_numeric_strings_except(doc, &["dates"]),
            json!({
                "dates": [{"start": "20210601", "end": "20210609"}],
                "penalty": 1e10
            })
        );
    }

    #[derive(Deserialize)]
    struct LenientFields {
        #[serde(deserialize_with = "string")]
        s: String,
        #[serde(default, deserialize_with = "string_vec")]
        v: Vec<String>,
        #[serde(default, deserialize_with = "objectives")]
        o: BTreeMap<String, BTreeMap<String, Vec<String>>>,
    }

    #[test]
    fn lenient_fields_accept_numbers() {
        let p: LenientFields = serde_json::from_value(json!({
            "s": 12,
            "v": [["a.json", 3]],
            "o": {"QO": {"kge_2012": [1, "-1 * x"]}}
        }))
        .unwrap();
        assert_eq!(p.s, "12");
        assert_eq!(p.v, vec!["a.json", "3"]);
        assert_eq!(p.o["QO"]["kge_2012"], vec!["1", "-1 * x"]);
    }
}
