//! State schema and reducers
//!
//! Thread state is persisted as a JSON object, but every graph declares its
//! shape up front with a [`StateSchema`]: one [`FieldSpec`] per field giving a
//! semantic [`FieldKind`], a [`MergePolicy`], a human label and an optional default.
//! The schema is built once, at graph-definition time, and is the single merge
//! policy table used for step outputs, caller input and manual edits alike.
//!
//! | Policy | Behavior | Typical fields |
//! |--------|----------|----------------|
//! | [`MergePolicy::Replace`] | new value overwrites | `plan`, `draft`, `revision_number` |
//! | [`MergePolicy::Accumulate`] | lists concatenate, numbers add | `messages`, `count` |
//!
//! Keys that the schema does not declare are merged with `Replace`.
//!
//! ```rust
//! use serde_json::json;
//! use waypoint_core::state::{FieldKind, FieldSpec, StateSchema, StateUpdate};
//!
//! let schema = StateSchema::new()
//!     .field(FieldSpec::new("messages", FieldKind::Messages).accumulate())
//!     .field(FieldSpec::new("count", FieldKind::Integer).accumulate().default_value(json!(0)));
//!
//! let current = schema.defaults();
//! let update = StateUpdate::new().set("count", 1).set("messages", json!(["hi"]));
//! let merged = schema.merge(&current, update.as_map()).unwrap();
//!
//! assert_eq!(merged["count"], json!(1));
//! assert_eq!(merged["messages"], json!(["hi"]));
//! ```

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use thiserror::Error;

/// Thread state: field name to JSON value.
pub type StateMap = waypoint_checkpoint::StateValues;

/// Errors raised while merging or decoding state
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StateError {
    /// An `Accumulate` field received a value it cannot be combined with
    #[error("Cannot merge field '{field}': {reason}")]
    Merge { field: String, reason: String },

    /// State could not be decoded into a typed state record
    #[error("State does not match {type_name}: {reason}")]
    Decode {
        type_name: &'static str,
        reason: String,
    },
}

/// Combines the current value of a field with an incoming update.
///
/// Reducers must be pure: value-equal inputs give value-equal outputs.
pub trait Reducer: Send + Sync {
    /// `current` is `Value::Null` when the field is not yet present.
    fn reduce(&self, current: &Value, update: &Value) -> std::result::Result<Value, String>;

    fn name(&self) -> &str;
}

/// Last write wins
#[derive(Debug, Clone, Copy)]
pub struct ReplaceReducer;

impl Reducer for ReplaceReducer {
    fn reduce(&self, _current: &Value, update: &Value) -> std::result::Result<Value, String> {
        Ok(update.clone())
    }

    fn name(&self) -> &str {
        "replace"
    }
}

/// Sequence concatenation for lists, addition for numbers.
///
/// - **Array + Array**: concatenation
/// - **Array + scalar**: scalar appended
/// - **Number + Number**: sum (integer when both are integers)
/// - **Null + x**: `x` for arrays and numbers, `[x]` otherwise
/// - **x + Null**: unchanged
#[derive(Debug, Clone, Copy)]
pub struct AccumulateReducer;

impl AccumulateReducer {
    fn add_numbers(a: &Number, b: &Number) -> std::result::Result<Value, String> {
        if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
            return x
                .checked_add(y)
                .map(Value::from)
                .ok_or_else(|| "integer overflow".to_string());
        }
        let sum = a.as_f64().unwrap_or(0.0) + b.as_f64().unwrap_or(0.0);
        Number::from_f64(sum)
            .map(Value::Number)
            .ok_or_else(|| "sum is not a finite number".to_string())
    }
}

impl Reducer for AccumulateReducer {
    fn reduce(&self, current: &Value, update: &Value) -> std::result::Result<Value, String> {
        match (current, update) {
            (_, Value::Null) => Ok(current.clone()),
            (Value::Array(curr), Value::Array(upd)) => {
                let mut result = curr.clone();
                result.extend_from_slice(upd);
                Ok(Value::Array(result))
            }
            (Value::Array(curr), single) => {
                let mut result = curr.clone();
                result.push(single.clone());
                Ok(Value::Array(result))
            }
            (Value::Number(a), Value::Number(b)) => Self::add_numbers(a, b),
            (Value::Null, Value::Array(_)) | (Value::Null, Value::Number(_)) => Ok(update.clone()),
            (Value::Null, single) => Ok(Value::Array(vec![single.clone()])),
            (Value::Number(_), other) => Err(format!("cannot add {} to a number", kind_of(other))),
            (other, _) => Err(format!("cannot accumulate into {}", kind_of(other))),
        }
    }

    fn name(&self) -> &str {
        "accumulate"
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

/// How updates to a field are merged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MergePolicy {
    #[default]
    Replace,
    Accumulate,
}

impl MergePolicy {
    /// Reducer implementing this policy
    pub fn reducer(&self) -> &'static dyn Reducer {
        match self {
            MergePolicy::Replace => &ReplaceReducer,
            MergePolicy::Accumulate => &AccumulateReducer,
        }
    }
}

/// Semantic type of a state field, used for display and editing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Integer,
    Number,
    Boolean,
    TextList,
    Messages,
    Json,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Integer => "integer",
            FieldKind::Number => "number",
            FieldKind::Boolean => "boolean",
            FieldKind::TextList => "text_list",
            FieldKind::Messages => "messages",
            FieldKind::Json => "json",
        }
    }
}

/// Declaration of one state field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    pub policy: MergePolicy,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    pub editable: bool,
}

impl FieldSpec {
    /// A replace-policy, editable field labelled with its own name
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        let name = name.into();
        Self {
            label: name.clone(),
            name,
            kind,
            policy: MergePolicy::Replace,
            default: None,
            editable: true,
        }
    }

    pub fn accumulate(mut self) -> Self {
        self.policy = MergePolicy::Accumulate;
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn read_only(mut self) -> Self {
        self.editable = false;
        self
    }
}

/// Ordered set of field declarations for one graph
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateSchema {
    fields: Vec<FieldSpec>,
}

impl StateSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`StateSchema::add_field`]
    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.add_field(spec);
        self
    }

    /// Declare a field, replacing an earlier declaration of the same name
    pub fn add_field(&mut self, spec: FieldSpec) {
        match self.fields.iter_mut().find(|f| f.name == spec.name) {
            Some(existing) => *existing = spec,
            None => self.fields.push(spec),
        }
    }

    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter()
    }

    /// Merge policy for a key; undeclared keys replace.
    pub fn policy(&self, name: &str) -> MergePolicy {
        self.get(name).map(|f| f.policy).unwrap_or_default()
    }

    /// Initial state made of every declared default
    pub fn defaults(&self) -> StateMap {
        self.fields
            .iter()
            .filter_map(|f| f.default.clone().map(|v| (f.name.clone(), v)))
            .collect()
    }

    /// Merge a partial update into `current`, field by field.
    ///
    /// Keys absent from `update` are left untouched.
    pub fn merge(&self, current: &StateMap, update: &StateMap) -> Result<StateMap, StateError> {
        let mut merged = current.clone();
        for (key, value) in update {
            let existing = merged.get(key).unwrap_or(&Value::Null);
            let combined = self
                .policy(key)
                .reducer()
                .reduce(existing, value)
                .map_err(|reason| StateError::Merge {
                    field: key.clone(),
                    reason,
                })?;
            merged.insert(key.clone(), combined);
        }
        Ok(merged)
    }
}

/// A partial state update: the fields a step (or a caller) wants to change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateUpdate(StateMap);

impl StateUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field from anything convertible into a JSON value
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Set a field from any serializable value
    pub fn try_set<T: Serialize + ?Sized>(
        mut self,
        key: impl Into<String>,
        value: &T,
    ) -> serde_json::Result<Self> {
        self.0.insert(key.into(), serde_json::to_value(value)?);
        Ok(self)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &StateMap {
        &self.0
    }

    pub fn into_map(self) -> StateMap {
        self.0
    }
}

impl From<StateMap> for StateUpdate {
    fn from(map: StateMap) -> Self {
        Self(map)
    }
}

impl From<StateUpdate> for StateMap {
    fn from(update: StateUpdate) -> Self {
        update.0
    }
}

/// A strongly-typed state record with a declared schema.
///
/// Typed states are what step functions and routers see; the executor itself
/// stores and merges the JSON form. Fields should carry `#[serde(default)]`
/// so partially populated states decode.
pub trait GraphState: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Field declarations for this state
    fn schema() -> StateSchema;

    /// Decode from the persisted JSON form
    fn from_values(values: &StateMap) -> Result<Self, StateError> {
        serde_json::from_value(Value::Object(values.clone())).map_err(|e| StateError::Decode {
            type_name: std::any::type_name::<Self>(),
            reason: e.to_string(),
        })
    }

    /// Encode into the persisted JSON form
    fn to_values(&self) -> Result<StateMap, StateError> {
        let decode_err = |reason: String| StateError::Decode {
            type_name: std::any::type_name::<Self>(),
            reason,
        };
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(decode_err(format!("expected an object, got {}", kind_of(&other)))),
            Err(e) => Err(decode_err(e.to_string())),
        }
    }
}

/// Untyped state: no declared fields, every key replaces.
impl GraphState for StateMap {
    fn schema() -> StateSchema {
        StateSchema::new()
    }

    fn from_values(values: &StateMap) -> Result<Self, StateError> {
        Ok(values.clone())
    }

    fn to_values(&self) -> Result<StateMap, StateError> {
        Ok(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn schema() -> StateSchema {
        StateSchema::new()
            .field(FieldSpec::new("messages", FieldKind::Messages).accumulate())
            .field(
                FieldSpec::new("count", FieldKind::Integer)
                    .accumulate()
                    .default_value(json!(0)),
            )
            .field(FieldSpec::new("plan", FieldKind::Text).label("Plan"))
    }

    fn map(value: Value) -> StateMap {
        match value {
            Value::Object(m) => m,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_replace_and_accumulate() {
        let schema = schema();
        let current = map(json!({"messages": ["a"], "count": 2, "plan": "old"}));
        let update = map(json!({"messages": ["b", "c"], "count": 3, "plan": "new"}));

        let merged = schema.merge(&current, &update).unwrap();
        assert_eq!(merged["messages"], json!(["a", "b", "c"]));
        assert_eq!(merged["count"], json!(5));
        assert_eq!(merged["plan"], json!("new"));
    }

    #[test]
    fn test_untouched_and_undeclared_keys() {
        let schema = schema();
        let current = map(json!({"plan": "keep", "extra": 1}));
        let update = map(json!({"extra": 2}));

        let merged = schema.merge(&current, &update).unwrap();
        assert_eq!(merged["plan"], json!("keep"));
        assert_eq!(merged["extra"], json!(2));
        assert_eq!(schema.policy("extra"), MergePolicy::Replace);
    }

    #[test]
    fn test_accumulate_from_missing() {
        let schema = schema();
        let merged = schema
            .merge(&StateMap::new(), &map(json!({"messages": ["x"], "count": 1})))
            .unwrap();
        assert_eq!(merged["messages"], json!(["x"]));
        assert_eq!(merged["count"], json!(1));
    }

    #[test]
    fn test_accumulate_float_sum() {
        let reducer = AccumulateReducer;
        assert_eq!(reducer.reduce(&json!(1), &json!(0.5)).unwrap(), json!(1.5));
    }

    #[test]
    fn test_accumulate_type_mismatch() {
        let schema = schema();
        let err = schema
            .merge(&map(json!({"count": 1})), &map(json!({"count": "two"})))
            .unwrap_err();
        assert!(matches!(err, StateError::Merge { ref field, .. } if field == "count"));
    }

    #[test]
    fn test_defaults_and_redeclare() {
        let mut schema = schema();
        assert_eq!(schema.defaults(), map(json!({"count": 0})));

        schema.add_field(FieldSpec::new("count", FieldKind::Integer));
        assert_eq!(schema.policy("count"), MergePolicy::Replace);
        assert_eq!(schema.fields().count(), 3);
    }

    #[test]
    fn test_state_update_builder() {
        let update = StateUpdate::new()
            .set("plan", "outline")
            .try_set("queries", &vec!["a", "b"])
            .unwrap();
        assert_eq!(update.get("queries"), Some(&json!(["a", "b"])));
        assert_eq!(update.into_map().len(), 2);
    }

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Counter {
        #[serde(default)]
        count: i64,
    }

    impl GraphState for Counter {
        fn schema() -> StateSchema {
            StateSchema::new().field(FieldSpec::new("count", FieldKind::Integer).accumulate())
        }
    }

    #[test]
    fn test_typed_state_roundtrip() {
        let decoded = Counter::from_values(&StateMap::new()).unwrap();
        assert_eq!(decoded, Counter { count: 0 });
        assert_eq!(Counter { count: 4 }.to_values().unwrap()["count"], json!(4));

        let err = Counter::from_values(&map(json!({"count": "x"}))).unwrap_err();
        assert!(matches!(err, StateError::Decode { .. }));
    }

    proptest! {
        #[test]
        fn prop_merge_is_deterministic(a in proptest::collection::vec(0i64..100, 0..8),
                                       b in proptest::collection::vec(0i64..100, 0..8),
                                       n in 0i64..1000, m in 0i64..1000) {
            let schema = schema();
            let current = map(json!({"messages": a, "count": n}));
            let update = map(json!({"messages": b, "count": m}));

            let first = schema.merge(&current, &update).unwrap();
            let second = schema.merge(&current.clone(), &update.clone()).unwrap();
            prop_assert_eq!(&first, &second);
            prop_assert_eq!(first["count"].as_i64(), Some(n + m));
            prop_assert_eq!(
                first["messages"].as_array().map(|v| v.len()),
                Some(a.len() + b.len())
            );
        }
    }
}
