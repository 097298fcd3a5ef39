use std::fmt;

use serde::de::{Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Field-keyed validation messages, kept in the order the checks ran.
#[derive(Debug, Clone, Default, PartialEq, Eq, Error)]
#[error("{}", self.message())]
pub struct ValidationErrors {
    fields: Vec<(String, Vec<String>)>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for a single failing field.
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        let message = message.into();
        match self.fields.iter_mut().find(|(name, _)| name == field) {
            Some((_, messages)) => messages.push(message),
            None => self.fields.push((field.to_string(), vec![message])),
        }
    }

    pub fn extend(&mut self, other: ValidationErrors) {
        for (field, messages) in other.fields {
            for message in messages {
                self.add(&field, message);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, messages)| messages.as_slice())
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    /// `Ok(value)` when nothing was recorded, otherwise `Err(self)`.
    pub fn into_result<T>(self, value: T) -> Result<T, ValidationErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }

    /// Merge with `overrides`, whose messages replace this set's for any field
    /// they mention. Fields listed in `order` come first.
    pub fn overlaid(self, overrides: ValidationErrors, order: &[&str]) -> ValidationErrors {
        let names: Vec<String> = order
            .iter()
            .copied()
            .chain(overrides.fields())
            .chain(self.fields())
            .map(String::from)
            .collect();
        let mut merged = ValidationErrors::new();
        for name in names {
            if merged.get(&name).is_some() {
                continue;
            }
            let messages = overrides.get(&name).or_else(|| self.get(&name));
            for message in messages.into_iter().flatten() {
                merged.add(&name, message.clone());
            }
        }
        merged
    }

    /// Summary line: the first message, plus a count of the rest.
    pub fn message(&self) -> String {
        let mut all = self.fields.iter().flat_map(|(_, messages)| messages.iter());
        let Some(first) = all.next() else {
            return "The given data was invalid.".to_string();
        };
        match all.count() {
            0 => first.clone(),
            1 => format!("{first} (and 1 more error)"),
            n => format!("{first} (and {n} more errors)"),
        }
    }
}

impl Serialize for ValidationErrors {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (field, messages) in &self.fields {
            map.serialize_entry(field, messages)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ValidationErrors {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FieldsVisitor;

        impl<'de> Visitor<'de> for FieldsVisitor {
            type Value = ValidationErrors;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of field names to message lists")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut fields = Vec::new();
                while let Some(entry) = map.next_entry::<String, Vec<String>>()? {
                    fields.push(entry);
                }
                Ok(ValidationErrors { fields })
            }
        }

        deserializer.deserialize_map(FieldsVisitor)
    }
}

/// Human form of a field name as used in messages (`attachment_url` → `attachment url`).
pub fn field_label(field: &str) -> String {
    field.replace('_', " ")
}

pub fn required(field: &str) -> String {
    format!("The {} field is required.", field_label(field))
}

pub fn too_long(field: &str, max: usize) -> String {
    format!(
        "The {} field must not be greater than {max} characters.",
        field_label(field)
    )
}

pub fn must_be_string(field: &str) -> String {
    format!("The {} field must be a string.", field_label(field))
}

/// Reads text fields out of a JSON object body.
///
/// A present value that is neither a string nor `null` is recorded against its
/// field instead of rejecting the whole body; `null` reads as absent.
pub struct JsonText<'a> {
    body: &'a Map<String, Value>,
    mistyped: ValidationErrors,
}

impl<'a> JsonText<'a> {
    pub fn new(body: &'a Map<String, Value>) -> Self {
        Self {
            body,
            mistyped: ValidationErrors::new(),
        }
    }

    pub fn field(&mut self, field: &str) -> Option<String> {
        self.field_or(field, must_be_string(field))
    }

    /// Like [`field`](Self::field), with a custom message for a non-string value.
    pub fn field_or(&mut self, field: &str, message: impl Into<String>) -> Option<String> {
        match self.body.get(field) {
            None | Some(Value::Null) => None,
            Some(Value::String(text)) => Some(text.clone()),
            Some(_) => {
                self.mistyped.add(field, message);
                None
            }
        }
    }

    /// `Ok(value)` when every field read as text. Otherwise the type errors,
    /// together with what `check` reports for the remaining fields.
    pub fn finish<T, U>(
        self,
        value: T,
        order: &[&str],
        check: impl FnOnce(&T) -> Result<U, ValidationErrors>,
    ) -> Result<T, ValidationErrors> {
        if self.mistyped.is_empty() {
            return Ok(value);
        }
        let checked = check(&value).err().unwrap_or_default();
        Err(checked.overlaid(self.mistyped, order))
    }
}

/// Normalise an optional text input: trims, and treats blank as absent.
pub fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
