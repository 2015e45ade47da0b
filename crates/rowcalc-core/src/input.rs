//! Input descriptors
//!
//! An input descriptor turns a cell into an externally driven value
//! source, such as a numeric stepper or a choice selector.

use crate::{Error, Result, Value};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Control kind for numeric inputs
pub const NUMBER_INPUT: &str = "number";
/// Control kind for choice inputs
pub const SELECT_INPUT: &str = "select";

const DEFAULT_VALUE_PROP: &str = "defaultValue";

/// Describes the control that drives an input cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputDescriptor {
    /// Control kind, e.g. `"number"` or `"select"`
    #[serde(rename = "type")]
    pub kind: String,
    /// Control configuration, including `defaultValue`
    #[serde(default)]
    pub props: IndexMap<String, Value>,
}

impl InputDescriptor {
    /// Create a descriptor of an arbitrary kind with no props
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            props: IndexMap::new(),
        }
    }

    /// Numeric stepper bounded by `[min, max]`
    pub fn number(min: f64, max: f64, step: f64, default: f64) -> Self {
        Self::new(NUMBER_INPUT)
            .with_prop("min", min)
            .with_prop("max", max)
            .with_prop("step", step)
            .with_prop(DEFAULT_VALUE_PROP, default)
    }

    /// Choice selector over a fixed list of options
    pub fn select<I, S>(options: I, default: Option<&str>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let options: Vec<Value> = options.into_iter().map(|s| Value::Text(s.into())).collect();
        let input = Self::new(SELECT_INPUT)
            .with_prop("options", Value::Array(options))
            .with_prop("placeholder", "Select an option");
        match default {
            Some(default) => input.with_prop(DEFAULT_VALUE_PROP, default),
            None => input,
        }
    }

    /// Set a configuration property
    pub fn with_prop(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.props.insert(key.into(), value.into());
        self
    }

    /// Attach a display label
    pub fn with_label(self, label: impl Into<String>) -> Self {
        self.with_prop("label", Value::Text(label.into()))
    }

    /// The value a freshly configured cell starts at
    pub fn default_value(&self) -> Value {
        self.props
            .get(DEFAULT_VALUE_PROP)
            .cloned()
            .unwrap_or_default()
    }

    /// Replace the default value, e.g. with the cell's current value.
    ///
    /// An absent value removes the prop.
    pub fn set_default_value(&mut self, value: Value) {
        if value.is_absent() {
            self.props.shift_remove(DEFAULT_VALUE_PROP);
        } else {
            self.props.insert(DEFAULT_VALUE_PROP.to_string(), value);
        }
    }

    /// Check that `value` is acceptable for this control
    pub fn validate(&self, value: &Value) -> Result<()> {
        match self.kind.as_str() {
            NUMBER_INPUT => {
                let n = value.as_number().ok_or_else(|| {
                    Error::InvalidInputValue(format!("expected a number, got {}", value.kind()))
                })?;
                if let Some(min) = self.props.get("min").and_then(Value::as_number) {
                    if n < min {
                        return Err(Error::InvalidInputValue(format!(
                            "{} is below the minimum {}",
                            value, min
                        )));
                    }
                }
                if let Some(max) = self.props.get("max").and_then(Value::as_number) {
                    if n > max {
                        return Err(Error::InvalidInputValue(format!(
                            "{} is above the maximum {}",
                            value, max
                        )));
                    }
                }
                Ok(())
            }
            SELECT_INPUT => {
                let text = value.as_text().ok_or_else(|| {
                    Error::InvalidInputValue(format!("expected text, got {}", value.kind()))
                })?;
                match self.props.get("options") {
                    Some(Value::Array(options))
                        if !options.iter().any(|o| o.as_text() == Some(text)) =>
                    {
                        Err(Error::InvalidInputValue(format!(
                            "'{}' is not one of the options",
                            text
                        )))
                    }
                    _ => Ok(()),
                }
            }
            _ => Ok(()),
        }
    }
}
