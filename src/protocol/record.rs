//! Flat field record shared by every payload format.
//!
//! A record is an ordered list of `key -> value` pairs with no nesting beyond
//! a list of strings. Insertion order is kept so encoders write `type` first.

use std::collections::BTreeMap;

use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Field {
    Int(i64),
    /// Only JSON produces these, for numbers that are not integers.
    Float(f64),
    Text(String),
    List(Vec<String>),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, Field)>,
}

impl Record {
    /// Sets `key`, replacing any previous value in place.
    pub fn insert(&mut self, key: impl Into<String>, field: Field) {
        let key = key.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = field,
            None => self.fields.push((key, field)),
        }
    }

    /// Appends `item` to the list stored under `key`, creating the list if needed.
    pub fn push_item(&mut self, key: &str, item: String) {
        match self.fields.iter_mut().find(|(k, _)| k == key) {
            Some((_, Field::List(items))) => items.push(item),
            Some(slot) => slot.1 = Field::List(vec![item]),
            None => self.fields.push((key.to_string(), Field::List(vec![item]))),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Field> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, f)| f)
    }

    pub fn take(&mut self, key: &str) -> Option<Field> {
        let idx = self.fields.iter().position(|(k, _)| k == key)?;
        Some(self.fields.remove(idx).1)
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = (&str, &Field)> {
        self.fields.iter().map(|(k, f)| (k.as_str(), f))
    }
}

impl FromIterator<(String, Field)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Field)>>(iter: I) -> Self {
        let mut record = Record::default();
        for (key, field) in iter {
            record.insert(key, field);
        }
        record
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (key, field) in &self.fields {
            map.serialize_entry(key, field)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = BTreeMap::<String, Field>::deserialize(deserializer)?;
        Ok(map.into_iter().collect())
    }
}
