//! Component configuration
//!
//! Every component carries four JSON sections: `options`, `i18n`, `classes`
//! and `regex`. Sections are deep merged from several sources; typed views
//! are read with serde field by field, so a malformed value only costs its
//! own field.

use foobar_dom::DOMStringMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

const SECTIONS: [&str; 4] = ["options", "i18n", "classes", "regex"];

/// Deep merge `source` into `target`. Objects merge key by key, anything
/// else in `source` replaces the target value.
pub fn merge(target: &mut Value, source: &Value) {
    match (target, source) {
        (Value::Object(target), Value::Object(source)) => {
            for (key, value) in source {
                match target.get_mut(key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        target.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (target, source) => *target = source.clone(),
    }
}

/// Configuration carried by `data-*` attributes. Values are parsed as JSON
/// when possible and kept as strings otherwise. `data-options`, `data-i18n`,
/// `data-classes` and `data-regex` fill their sections, any other key is an
/// option.
pub fn data_config(dataset: &DOMStringMap) -> Value {
    let mut config = ComponentConfig::default();
    for (key, raw) in dataset.iter() {
        let value = serde_json::from_str::<Value>(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        if SECTIONS.contains(&key) {
            if value.is_object() {
                merge(config.section_mut(key), &value);
            } else {
                tracing::warn!("ignoring non-object data-{key} attribute");
            }
        } else {
            config.set_option(key, value);
        }
    }
    config.into_value()
}

/// Loose reading of attribute values: `"1"`/`"0"`/`"true"` and numbers for
/// booleans, numeric strings for numbers.
fn coerce(raw: &Value) -> Vec<Value> {
    match raw {
        Value::String(s) => {
            let s = s.trim();
            let mut out = Vec::new();
            match s {
                "true" | "1" | "yes" | "on" => out.push(Value::Bool(true)),
                "false" | "0" | "no" | "off" | "" => out.push(Value::Bool(false)),
                _ => {}
            }
            if let Ok(n) = s.parse::<u64>() {
                out.push(Value::from(n));
            } else if let Some(n) = s.parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
                out.push(Value::Number(n));
            }
            out
        }
        Value::Number(n) => vec![Value::Bool(n.as_f64().is_some_and(|n| n != 0.0))],
        Value::Bool(b) => vec![Value::from(u64::from(*b))],
        _ => Vec::new(),
    }
}

/// Merged configuration of one component
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentConfig {
    value: Value,
}

impl Default for ComponentConfig {
    fn default() -> Self {
        let sections = SECTIONS.iter().map(|s| (s.to_string(), Value::Object(Map::new())));
        Self { value: Value::Object(sections.collect()) }
    }
}

impl From<Value> for ComponentConfig {
    fn from(value: Value) -> Self {
        let mut config = Self::default();
        config.merge(&value);
        config
    }
}

impl ComponentConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Config with only an options section
    pub fn with_options(options: Value) -> Self {
        let mut config = Self::default();
        merge(config.section_mut("options"), &options);
        config
    }

    /// Deep merge another raw config; non-object input is ignored
    pub fn merge(&mut self, source: &Value) {
        if source.is_object() {
            merge(&mut self.value, source);
        }
    }

    pub fn merge_config(&mut self, other: &ComponentConfig) {
        merge(&mut self.value, &other.value);
    }

    pub fn options(&self) -> &Value {
        self.section("options")
    }

    pub fn i18n(&self) -> &Value {
        self.section("i18n")
    }

    pub fn classes(&self) -> &Value {
        self.section("classes")
    }

    pub fn regex(&self) -> &Value {
        self.section("regex")
    }

    pub fn option(&self, key: &str) -> Option<&Value> {
        self.options().get(key)
    }

    pub fn set_option(&mut self, key: &str, value: Value) {
        if let Value::Object(options) = self.section_mut("options") {
            options.insert(key.to_string(), value);
        }
    }

    /// Class name from the `classes` section
    pub fn class(&self, key: &str) -> Option<&str> {
        self.classes().get(key).and_then(Value::as_str)
    }

    /// Typed view of the options section
    pub fn options_as<T: DeserializeOwned + Serialize + Default>(&self) -> T {
        Self::section_as(self.options(), "options")
    }

    /// Typed view of the classes section
    pub fn classes_as<T: DeserializeOwned + Serialize + Default>(&self) -> T {
        Self::section_as(self.classes(), "classes")
    }

    pub fn as_value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    /// Deserialize `value`. When that fails, start from `T::default()` and
    /// take the fields one at a time: a value that does not fit is retried
    /// in its loosely coerced form, then dropped.
    fn section_as<T: DeserializeOwned + Serialize + Default>(value: &Value, name: &str) -> T {
        let err = match serde_json::from_value(value.clone()) {
            Ok(typed) => return typed,
            Err(e) => e,
        };
        tracing::warn!("malformed {name} config, reading it field by field: {err}");
        let (Value::Object(fields), Ok(mut accepted)) = (value, serde_json::to_value(T::default())) else {
            return T::default();
        };
        for (key, raw) in fields {
            let candidates = std::iter::once(raw.clone()).chain(coerce(raw));
            let fitting = candidates.into_iter().find_map(|candidate| {
                let mut trial = accepted.clone();
                trial[key.as_str()] = candidate;
                serde_json::from_value::<T>(trial.clone()).is_ok().then_some(trial)
            });
            match fitting {
                Some(trial) => accepted = trial,
                None => tracing::warn!("ignoring malformed {name}.{key}: {raw}"),
            }
        }
        serde_json::from_value(accepted).unwrap_or_default()
    }

    fn section(&self, name: &str) -> &Value {
        static EMPTY: Value = Value::Null;
        self.value.get(name).unwrap_or(&EMPTY)
    }

    fn section_mut(&mut self, name: &str) -> &mut Value {
        if !self.value.is_object() {
            self.value = Value::Object(Map::new());
        }
        let section = &mut self.value[name];
        if !section.is_object() {
            *section = Value::Object(Map::new());
        }
        section
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[test]
    fn test_deep_merge() {
        let mut target = json!({"options": {"layout": "top", "open": {"name": "immediate"}}});
        merge(&mut target, &json!({"options": {"open": {"value": 5}, "push": true}}));
        assert_eq!(
            target,
            json!({"options": {"layout": "top", "open": {"name": "immediate", "value": 5}, "push": true}})
        );
    }

    #[test]
    fn test_arrays_replace() {
        let mut target = json!({"open": [{"name": "delay"}, {"name": "scroll-top"}]});
        merge(&mut target, &json!({"open": [{"name": "immediate"}]}));
        assert_eq!(target, json!({"open": [{"name": "immediate"}]}));
    }

    #[test]
    fn test_data_config() {
        let dataset = DOMStringMap::from_attributes([
            ("data-layout", "bottom"),
            ("data-push", "true"),
            ("data-options", r#"{"remember": false}"#),
            ("data-i18n", r#"{"close": "Close"}"#),
        ]);
        let config = ComponentConfig::from(data_config(&dataset));
        assert_eq!(config.option("layout"), Some(&json!("bottom")));
        assert_eq!(config.option("push"), Some(&json!(true)));
        assert_eq!(config.option("remember"), Some(&json!(false)));
        assert_eq!(config.i18n()["close"], json!("Close"));
    }

    #[derive(Debug, Default, Deserialize, Serialize, PartialEq)]
    #[serde(default)]
    struct Opts {
        timeout: u64,
        layout: String,
        push: bool,
    }

    #[test]
    fn test_options_as_drops_only_bad_fields() {
        let good = ComponentConfig::with_options(json!({"timeout": 500}));
        assert_eq!(good.options_as::<Opts>().timeout, 500);
        let bad = ComponentConfig::with_options(json!({"timeout": "soon", "layout": "bottom", "push": true}));
        assert_eq!(bad.options_as::<Opts>(), Opts { timeout: 0, layout: "bottom".into(), push: true });
    }

    #[test]
    fn test_options_as_coerces_attribute_values() {
        let dataset = DOMStringMap::from_attributes([
            ("data-push", "1"),
            ("data-timeout", r#""250""#),
            ("data-options", r#"{"layout": "left"}"#),
        ]);
        let config = ComponentConfig::from(data_config(&dataset));
        assert_eq!(config.option("push"), Some(&json!(1)));
        assert_eq!(config.options_as::<Opts>(), Opts { timeout: 250, layout: "left".into(), push: true });
    }
}
