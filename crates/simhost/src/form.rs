//! Input forms generated from settings values.
//!
//! A [`Form`] describes widgets, not how to draw them. Front-ends walk the
//! fields, render each [`Widget`] in their toolkit, write edits back into
//! the widget values and call [`Form::values`] to get the settings object
//! again.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use simhost_rpc::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Form {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub fields: Vec<FormField>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormField {
    /// Key in the settings object.
    pub id: String,
    pub label: String,
    pub widget: Widget,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum Widget {
    Checkbox { value: bool },
    IntSpin { value: i64 },
    FloatSpin { value: f64 },
    Text { value: String },
    /// One widget per list element, laid out side by side.
    Row { items: Vec<Widget> },
    Dropdown { index: usize, options: Vec<String> },
    SubForm { form: Form },
}

impl Form {
    /// Build a form for a settings object. Keys starting with `_` are
    /// private and get no widget.
    ///
    /// # Errors
    ///
    /// Returns `Error::Input` if `value` is not an object or holds something
    /// no widget can edit (null, nested lists).
    pub fn from_value(value: &Value) -> Result<Self> {
        let Value::Object(map) = value else {
            return Err(Error::input("settings must be an object"));
        };
        let fields = map
            .iter()
            .filter(|(key, _)| !key.starts_with('_'))
            .map(|(key, v)| {
                Ok(FormField {
                    id: key.clone(),
                    label: label_for(key),
                    widget: widget_for(key, v)?,
                })
            })
            .collect::<Result<_>>()?;
        Ok(Self {
            title: None,
            fields,
        })
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn field(&self, id: &str) -> Option<&FormField> {
        self.fields.iter().find(|f| f.id == id)
    }

    pub fn field_mut(&mut self, id: &str) -> Option<&mut FormField> {
        self.fields.iter_mut().find(|f| f.id == id)
    }

    /// The settings object the widgets currently describe.
    #[must_use]
    pub fn values(&self) -> Value {
        let map: Map<String, Value> = self
            .fields
            .iter()
            .map(|f| (f.id.clone(), f.widget.value()))
            .collect();
        Value::Object(map)
    }
}

impl Widget {
    #[must_use]
    pub fn value(&self) -> Value {
        match self {
            Self::Checkbox { value } => Value::Bool(*value),
            Self::IntSpin { value } => Value::from(*value),
            Self::FloatSpin { value } => Number::from_f64(*value).map_or(Value::Null, Value::Number),
            Self::Text { value } => Value::String(value.clone()),
            Self::Row { items } => Value::Array(items.iter().map(Self::value).collect()),
            Self::Dropdown { index, options } => Value::Array(vec![
                Value::from(*index),
                Value::Array(options.iter().cloned().map(Value::String).collect()),
            ]),
            Self::SubForm { form } => form.values(),
        }
    }
}

/// `snake_case` and `SCREAMING_CASE` keys become words.
fn label_for(key: &str) -> String {
    let words = key.replace('_', " ");
    let mut chars = words.trim().chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => key.to_string(),
    }
}

fn primitive_widget(value: &Value) -> Option<Widget> {
    match value {
        Value::Bool(b) => Some(Widget::Checkbox { value: *b }),
        Value::Number(n) => Some(match n.as_i64() {
            Some(i) => Widget::IntSpin { value: i },
            None => Widget::FloatSpin {
                value: n.as_f64().unwrap_or(0.0),
            },
        }),
        Value::String(s) => Some(Widget::Text { value: s.clone() }),
        _ => None,
    }
}

/// `[index, [option, ...]]` with string options.
fn as_dropdown(items: &[Value]) -> Option<Widget> {
    let [Value::Number(index), Value::Array(options)] = items else {
        return None;
    };
    let index = usize::try_from(index.as_u64()?).ok()?;
    let options = options
        .iter()
        .map(|o| o.as_str().map(str::to_string))
        .collect::<Option<Vec<_>>>()?;
    Some(Widget::Dropdown { index, options })
}

fn widget_for(key: &str, value: &Value) -> Result<Widget> {
    if let Some(widget) = primitive_widget(value) {
        return Ok(widget);
    }
    match value {
        Value::Array(items) => {
            if let Some(dropdown) = as_dropdown(items) {
                return Ok(dropdown);
            }
            items
                .iter()
                .map(|item| {
                    primitive_widget(item)
                        .ok_or_else(|| Error::input(format!("{key}: lists may only hold primitives")))
                })
                .collect::<Result<_>>()
                .map(|items| Widget::Row { items })
        }
        Value::Object(_) => Ok(Widget::SubForm {
            form: Form::from_value(value)?.with_title(label_for(key)),
        }),
        _ => Err(Error::input(format!("{key}: no widget for {value}"))),
    }
}
