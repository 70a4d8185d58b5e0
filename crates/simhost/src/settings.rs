//! Typed application settings stored as a host parameter.
//!
//! The settings struct is serialized to a JSON object and stored as bytes
//! under the chosen parameter name. Saving writes a `<name>-Backup` copy
//! first and clears it once the main value is in place, so an interrupted
//! save leaves one readable copy behind. Loading starts from
//! `T::default()` and takes over every stored key the struct still has;
//! keys it no longer has are logged and dropped.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use simhost_rpc::{Error, Result};
use tracing::{debug, warn};

use crate::client::Client;
use crate::form::Form;
use crate::param::ParamValue;

const BACKUP_SUFFIX: &str = "-Backup";

/// A choice among `options`, stored as `[index, [options...]]`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "(usize, Vec<String>)", into = "(usize, Vec<String>)")]
pub struct Dropdown {
    pub index: usize,
    pub options: Vec<String>,
}

impl Dropdown {
    #[must_use]
    pub fn new(index: usize, options: &[&str]) -> Self {
        Self {
            index,
            options: options.iter().map(ToString::to_string).collect(),
        }
    }

    #[must_use]
    pub fn selected(&self) -> Option<&str> {
        self.options.get(self.index).map(String::as_str)
    }
}

impl From<(usize, Vec<String>)> for Dropdown {
    fn from((index, options): (usize, Vec<String>)) -> Self {
        Self { index, options }
    }
}

impl From<Dropdown> for (usize, Vec<String>) {
    fn from(d: Dropdown) -> Self {
        (d.index, d.options)
    }
}

/// Settings of type `T` bound to a parameter name.
#[derive(Debug, Clone, PartialEq)]
pub struct AppSettings<T> {
    name: String,
    values: T,
}

impl<T> AppSettings<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    /// Defaults, not yet loaded.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: T::default(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn backup_name(&self) -> String {
        format!("{}{BACKUP_SUFFIX}", self.name)
    }

    #[must_use]
    pub fn get(&self) -> &T {
        &self.values
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.values
    }

    #[must_use]
    pub fn into_inner(self) -> T {
        self.values
    }

    /// Load `name` from the host. Falls back to the backup copy when the
    /// main value is missing or unreadable, and to defaults when neither
    /// exists.
    ///
    /// # Errors
    ///
    /// Transport errors only; bad stored data is logged.
    pub async fn load(client: &Client, name: impl Into<String>) -> Result<Self> {
        let mut settings = Self::new(name);
        let main = client.param_bytes(&settings.name).await?;
        let stored = match main.as_deref().map(parse_object) {
            Some(Ok(map)) => Some(map),
            found => {
                if let Some(Err(e)) = found {
                    warn!("Settings {} are unreadable: {e}", settings.name);
                }
                let backup = client.param_bytes(&settings.backup_name()).await?;
                match backup.as_deref().map(parse_object) {
                    Some(Ok(map)) => {
                        warn!("Restoring settings {} from backup", settings.name);
                        Some(map)
                    }
                    Some(Err(e)) => {
                        warn!("Backup of settings {} is unreadable: {e}", settings.name);
                        None
                    }
                    None => None,
                }
            }
        };

        if let Some(stored) = stored {
            settings.values = merge_stored(&settings.name, stored)?;
        } else {
            debug!("No stored settings {}; using defaults", settings.name);
        }
        Ok(settings)
    }

    /// Store the current values. The backup parameter is empty afterwards.
    ///
    /// # Errors
    ///
    /// Returns `Error::Input` if `T` does not serialize to an object, or
    /// any RPC error.
    pub async fn save(&self, client: &Client) -> Result<()> {
        let bytes = serde_json::to_vec(&Value::Object(self.to_map()?))?;
        let backup = self.backup_name();
        client.set_param(&backup, ParamValue::Bytes(bytes.clone())).await?;
        client.set_param(&self.name, ParamValue::Bytes(bytes)).await?;
        client.set_param(&backup, ParamValue::None).await?;
        debug!("Saved settings {}", self.name);
        Ok(())
    }

    /// Form with one widget per public field.
    ///
    /// # Errors
    ///
    /// Returns `Error::Input` for values no widget can edit.
    pub fn form(&self) -> Result<Form> {
        Ok(Form::from_value(&Value::Object(self.to_map()?))?.with_title(self.name.clone()))
    }

    /// Take over the values of an edited form.
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` if an edited value no longer fits its field.
    pub fn apply_form(&mut self, form: &Form) -> Result<()> {
        let mut current = self.to_map()?;
        if let Value::Object(edited) = form.values() {
            current.extend(edited);
        }
        self.values = serde_json::from_value(Value::Object(current))?;
        Ok(())
    }

    /// Serialized fields without the private `_` ones.
    fn to_map(&self) -> Result<Map<String, Value>> {
        match serde_json::to_value(&self.values)? {
            Value::Object(mut map) => {
                map.retain(|key, _| !key.starts_with('_'));
                Ok(map)
            }
            other => Err(Error::input(format!(
                "settings must serialize to an object, not {other}"
            ))),
        }
    }
}

fn parse_object(bytes: &[u8]) -> Result<Map<String, Value>> {
    match serde_json::from_slice(bytes)? {
        Value::Object(map) => Ok(map),
        other => Err(Error::input(format!("stored settings are not an object: {other}"))),
    }
}

/// Overlay stored keys on `T::default()`. A stored value that does not fit
/// its field keeps the default.
fn merge_stored<T>(name: &str, stored: Map<String, Value>) -> Result<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    let Value::Object(mut merged) = serde_json::to_value(T::default())? else {
        return Err(Error::input("settings must serialize to an object"));
    };

    for (key, value) in stored {
        if key.starts_with('_') {
            continue;
        }
        let Some(slot) = merged.get_mut(&key) else {
            warn!("Dropping unknown setting {name}.{key}");
            continue;
        };
        let previous = std::mem::replace(slot, value);
        if serde_json::from_value::<T>(Value::Object(merged.clone())).is_err() {
            warn!("Stored setting {name}.{key} does not fit; keeping default");
            merged.insert(key, previous);
        }
    }
    Ok(serde_json::from_value(Value::Object(merged))?)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    struct Cell {
        speed: f64,
        passes: i32,
        label: String,
        mode: Dropdown,
        #[serde(rename = "_scratch")]
        scratch: i32,
    }

    impl Default for Cell {
        fn default() -> Self {
            Self {
                speed: 100.0,
                passes: 1,
                label: "cell".into(),
                mode: Dropdown::new(0, &["fast", "fine"]),
                scratch: 0,
            }
        }
    }

    fn stored(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_dropdown_wire_shape() {
        let d = Dropdown::new(1, &["a", "b", "c"]);
        assert_eq!(serde_json::to_value(&d).unwrap(), json!([1, ["a", "b", "c"]]));
        assert_eq!(d.selected(), Some("b"));
        let back: Dropdown = serde_json::from_value(json!([2, ["x", "y", "z"]])).unwrap();
        assert_eq!(back.selected(), Some("z"));
    }

    #[test]
    fn test_merge_drops_unknown_and_private_keys() {
        let cell: Cell = merge_stored(
            "T",
            stored(json!({"passes": 3, "retired": true, "_scratch": 9})),
        )
        .unwrap();
        assert_eq!(cell.passes, 3);
        assert_eq!(cell.scratch, 0);
        assert_eq!(cell.label, "cell");
    }

    #[test]
    fn test_merge_keeps_default_for_mistyped_value() {
        let cell: Cell = merge_stored("T", stored(json!({"passes": "many", "speed": 5.0}))).unwrap();
        assert_eq!(cell.passes, 1);
        assert!((cell.speed - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_private_fields_are_not_persisted() {
        let mut settings = AppSettings::<Cell>::new("T");
        settings.get_mut().scratch = 4;
        let map = settings.to_map().unwrap();
        assert!(!map.contains_key("_scratch"));
        assert_eq!(settings.backup_name(), "T-Backup");
    }

    #[test]
    fn test_form_round_trip_through_edit() {
        let mut settings = AppSettings::<Cell>::new("T");
        let mut form = settings.form().unwrap();
        assert_eq!(form.title.as_deref(), Some("T"));
        assert!(form.field("_scratch").is_none());
        form.field_mut("passes").unwrap().widget = crate::form::Widget::IntSpin { value: 7 };
        settings.apply_form(&form).unwrap();
        assert_eq!(settings.get().passes, 7);
        assert_eq!(settings.get().mode, Dropdown::new(0, &["fast", "fine"]));
    }

    #[test]
    fn test_non_object_data_rejected() {
        assert!(parse_object(b"[1,2]").is_err());
        assert!(parse_object(b"not json").is_err());
        assert!(parse_object(br#"{"a": 1}"#).is_ok());
    }
}
