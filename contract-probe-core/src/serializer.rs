//! Lossless transport encoding for values crossing the worker boundary
//!
//! Plain JSON covers null, booleans, integers, finite floats, strings, lists
//! and string-keyed maps. Everything else travels as a tagged object
//! `{"__type__": <tag>, "value": ...}`. Map keys are always emitted sorted,
//! so one logical value has exactly one byte encoding.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Number, Value as Json};

use crate::error::{ProbeError, Result};

pub const TYPE_KEY: &str = "__type__";
const VALUE_KEY: &str = "value";
const CLASS_KEY: &str = "class";

const NAIVE_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";
const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S%.f";

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Exact decimal kept as its literal text
    Decimal(String),
    DateTime(DateTime<FixedOffset>),
    NaiveDateTime(NaiveDateTime),
    Date(NaiveDate),
    Time(NaiveTime),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Tuple(Vec<Value>),
    /// Elements sorted by canonical encoding, without duplicates
    Set(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Object { type_name: String, fields: BTreeMap<String, Value> },
}

impl Value {
    /// Validated exact decimal
    pub fn decimal(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        let trimmed = text.trim();
        if regex_utils::code::is_decimal_literal(trimmed)
            || matches!(trimmed, "NaN" | "Infinity" | "-Infinity")
        {
            Ok(Value::Decimal(trimmed.to_string()))
        } else {
            Err(ProbeError::Serialization(format!("Invalid decimal literal: {:?}", text)))
        }
    }

    /// Build a set, normalising element order and dropping duplicates
    pub fn set(items: impl IntoIterator<Item = Value>) -> Self {
        let mut keyed: Vec<(Vec<u8>, Value)> =
            items.into_iter().map(|v| (v.to_canonical_bytes(), v)).collect();
        keyed.sort_by(|a, b| a.0.cmp(&b.0));
        keyed.dedup_by(|a, b| a.0 == b.0);
        Value::Set(keyed.into_iter().map(|(_, v)| v).collect())
    }

    /// Encode into the JSON-compatible wire tree
    pub fn to_wire(&self) -> Json {
        match self {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Int(i) => Json::Number((*i).into()),
            Value::Float(f) => match Number::from_f64(*f) {
                Some(n) => Json::Number(n),
                None => {
                    let text = if f.is_nan() {
                        "nan"
                    } else if f.is_sign_positive() {
                        "inf"
                    } else {
                        "-inf"
                    };
                    tagged("float", Json::String(text.to_string()))
                }
            },
            Value::Str(s) => Json::String(s.clone()),
            Value::Decimal(d) => tagged("decimal", Json::String(d.clone())),
            Value::DateTime(dt) => {
                tagged("datetime", Json::String(dt.to_rfc3339_opts(SecondsFormat::AutoSi, false)))
            }
            Value::NaiveDateTime(dt) => {
                tagged("naive_datetime", Json::String(dt.format(NAIVE_DATETIME_FORMAT).to_string()))
            }
            Value::Date(d) => tagged("date", Json::String(d.format(DATE_FORMAT).to_string())),
            Value::Time(t) => tagged("time", Json::String(t.format(TIME_FORMAT).to_string())),
            Value::Bytes(b) => tagged("bytes", Json::String(hex::encode(b))),
            Value::List(items) => Json::Array(items.iter().map(Value::to_wire).collect()),
            Value::Tuple(items) => {
                tagged("tuple", Json::Array(items.iter().map(Value::to_wire).collect()))
            }
            Value::Set(items) => tagged("set", Json::Array(items.iter().map(Value::to_wire).collect())),
            Value::Map(map) => {
                let encoded = encode_map(map);
                if map.contains_key(TYPE_KEY) {
                    tagged("map", encoded)
                } else {
                    encoded
                }
            }
            Value::Object { type_name, fields } => {
                let mut obj = Map::new();
                obj.insert(TYPE_KEY.to_string(), Json::String("object".to_string()));
                obj.insert(CLASS_KEY.to_string(), Json::String(type_name.clone()));
                obj.insert(VALUE_KEY.to_string(), encode_map(fields));
                Json::Object(obj)
            }
        }
    }

    /// Decode a wire tree, interpreting type tags
    pub fn from_wire(json: &Json) -> Result<Self> {
        match json {
            Json::Null => Ok(Value::Null),
            Json::Bool(b) => Ok(Value::Bool(*b)),
            Json::Number(n) => Ok(number(n)),
            Json::String(s) => Ok(Value::Str(s.clone())),
            Json::Array(items) => Ok(Value::List(decode_items(items)?)),
            Json::Object(obj) => match obj.get(TYPE_KEY) {
                None => Ok(Value::Map(decode_map(obj)?)),
                Some(Json::String(tag)) => decode_tagged(tag, obj),
                Some(other) => Err(ProbeError::Serialization(format!(
                    "Type tag must be a string, got {}",
                    other
                ))),
            },
        }
    }

    /// Convert plain JSON without interpreting tags
    pub fn from_plain_json(json: &Json) -> Self {
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(*b),
            Json::Number(n) => number(n),
            Json::String(s) => Value::Str(s.clone()),
            Json::Array(items) => Value::List(items.iter().map(Value::from_plain_json).collect()),
            Json::Object(obj) => Value::Map(
                obj.iter().map(|(k, v)| (k.clone(), Value::from_plain_json(v))).collect(),
            ),
        }
    }

    /// Convert any serde-serialisable value. Maps must have string keys.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        let json = serde_json::to_value(value)
            .map_err(|e| ProbeError::Serialization(format!("Unsupported value: {}", e)))?;
        Ok(Value::from_plain_json(&json))
    }

    /// Deterministic byte encoding of the wire form
    pub fn to_canonical_bytes(&self) -> Vec<u8> {
        // serde_json's default map is ordered, so key order is fixed
        serde_json::to_vec(&self.to_wire()).unwrap_or_default()
    }

    pub fn to_canonical_string(&self) -> String {
        String::from_utf8_lossy(&self.to_canonical_bytes()).into_owned()
    }
}

fn tagged(tag: &str, value: Json) -> Json {
    let mut obj = Map::new();
    obj.insert(TYPE_KEY.to_string(), Json::String(tag.to_string()));
    obj.insert(VALUE_KEY.to_string(), value);
    Json::Object(obj)
}

fn encode_map(map: &BTreeMap<String, Value>) -> Json {
    Json::Object(map.iter().map(|(k, v)| (k.clone(), v.to_wire())).collect())
}

fn number(n: &Number) -> Value {
    match n.as_i64() {
        Some(i) => Value::Int(i),
        None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
    }
}

fn decode_items(items: &[Json]) -> Result<Vec<Value>> {
    items.iter().map(Value::from_wire).collect()
}

fn decode_map(obj: &Map<String, Json>) -> Result<BTreeMap<String, Value>> {
    obj.iter().map(|(k, v)| Ok((k.clone(), Value::from_wire(v)?))).collect()
}

fn payload<'a>(tag: &str, obj: &'a Map<String, Json>) -> Result<&'a Json> {
    obj.get(VALUE_KEY)
        .ok_or_else(|| ProbeError::Serialization(format!("Tagged '{}' value has no payload", tag)))
}

fn payload_str<'a>(tag: &str, obj: &'a Map<String, Json>) -> Result<&'a str> {
    payload(tag, obj)?
        .as_str()
        .ok_or_else(|| ProbeError::Serialization(format!("Tagged '{}' payload must be a string", tag)))
}

fn payload_array<'a>(tag: &str, obj: &'a Map<String, Json>) -> Result<&'a [Json]> {
    payload(tag, obj)?
        .as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| ProbeError::Serialization(format!("Tagged '{}' payload must be a list", tag)))
}

fn payload_object<'a>(tag: &str, obj: &'a Map<String, Json>) -> Result<&'a Map<String, Json>> {
    payload(tag, obj)?
        .as_object()
        .ok_or_else(|| ProbeError::Serialization(format!("Tagged '{}' payload must be a map", tag)))
}

fn bad_payload(tag: &str, err: impl std::fmt::Display) -> ProbeError {
    ProbeError::Serialization(format!("Malformed '{}' payload: {}", tag, err))
}

fn decode_tagged(tag: &str, obj: &Map<String, Json>) -> Result<Value> {
    match tag {
        "decimal" => Value::decimal(payload_str(tag, obj)?),
        "float" => match payload_str(tag, obj)? {
            "nan" => Ok(Value::Float(f64::NAN)),
            "inf" => Ok(Value::Float(f64::INFINITY)),
            "-inf" => Ok(Value::Float(f64::NEG_INFINITY)),
            other => Err(bad_payload(tag, other)),
        },
        "datetime" => DateTime::parse_from_rfc3339(payload_str(tag, obj)?)
            .map(Value::DateTime)
            .map_err(|e| bad_payload(tag, e)),
        "naive_datetime" => {
            NaiveDateTime::parse_from_str(payload_str(tag, obj)?, NAIVE_DATETIME_FORMAT)
                .map(Value::NaiveDateTime)
                .map_err(|e| bad_payload(tag, e))
        }
        "date" => NaiveDate::parse_from_str(payload_str(tag, obj)?, DATE_FORMAT)
            .map(Value::Date)
            .map_err(|e| bad_payload(tag, e)),
        "time" => NaiveTime::parse_from_str(payload_str(tag, obj)?, TIME_FORMAT)
            .map(Value::Time)
            .map_err(|e| bad_payload(tag, e)),
        "bytes" => hex::decode(payload_str(tag, obj)?)
            .map(Value::Bytes)
            .map_err(|e| bad_payload(tag, e)),
        "tuple" => Ok(Value::Tuple(decode_items(payload_array(tag, obj)?)?)),
        "set" => Ok(Value::set(decode_items(payload_array(tag, obj)?)?)),
        "map" => Ok(Value::Map(decode_map(payload_object(tag, obj)?)?)),
        "object" => {
            let type_name = obj
                .get(CLASS_KEY)
                .and_then(Json::as_str)
                .ok_or_else(|| bad_payload(tag, "missing class name"))?
                .to_string();
            let fields = decode_map(payload_object(tag, obj)?)?;
            Ok(Value::Object { type_name, fields })
        }
        other => Err(ProbeError::Serialization(format!("Unknown type tag '{}'", other))),
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_wire().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let json = Json::deserialize(deserializer)?;
        Value::from_wire(&json).map_err(serde::de::Error::custom)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}

/// Keyword arguments for a call into the worker
pub type Arguments = BTreeMap<String, Value>;

/// Decode a JSON object of keyword arguments, interpreting type tags
pub fn arguments_from_wire(json: &Json) -> Result<Arguments> {
    match json {
        Json::Object(obj) => decode_map(obj),
        other => Err(ProbeError::Serialization(format!(
            "Arguments must be an object, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests;
