//! A single capability structure: a media-type name plus named fields.

use super::value::CapsValue;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct Structure {
    pub name: String,
    fields: BTreeMap<String, CapsValue>,
}

impl Structure {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<CapsValue>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn set_value(&mut self, field: impl Into<String>, value: CapsValue) {
        self.fields.insert(field.into(), value);
    }

    pub fn get(&self, field: &str) -> Option<&CapsValue> {
        self.fields.get(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &CapsValue)> {
        self.fields.iter()
    }

    pub fn is_fixed(&self) -> bool {
        self.fields.values().all(CapsValue::is_fixed)
    }

    pub fn fixate(&self) -> Structure {
        let mut out = Structure::new(self.name.clone());
        for (k, v) in &self.fields {
            out.fields.insert(k.clone(), v.fixate());
        }
        out
    }

    /// Structure-wise intersection (spec §4.1): names must match, and
    /// every field present in either structure must intersect (a field
    /// absent from one side is treated as "unconstrained", i.e. passes
    /// through from the side that has it).
    pub fn intersect(&self, other: &Structure) -> Option<Structure> {
        if self.name != other.name {
            return None;
        }
        let mut out = Structure::new(self.name.clone());
        let mut keys: Vec<&String> = self.fields.keys().chain(other.fields.keys()).collect();
        keys.sort();
        keys.dedup();
        for key in keys {
            match (self.fields.get(key), other.fields.get(key)) {
                (Some(a), Some(b)) => {
                    let v = a.intersect(b)?;
                    out.fields.insert(key.clone(), v);
                }
                (Some(a), None) => {
                    out.fields.insert(key.clone(), a.clone());
                }
                (None, Some(b)) => {
                    out.fields.insert(key.clone(), b.clone());
                }
                (None, None) => unreachable!(),
            }
        }
        Some(out)
    }

    /// `self` is a subset of `other`: same name, and every field `other`
    /// constrains is honored by `self` (fields `self` doesn't have are
    /// treated as unconstrained and thus not necessarily a subset unless
    /// `other` also leaves them unconstrained).
    pub fn is_subset_of(&self, other: &Structure) -> bool {
        if self.name != other.name {
            return false;
        }
        other.fields.iter().all(|(k, ov)| match self.fields.get(k) {
            Some(sv) => sv.is_subset_of(ov),
            None => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intersect_requires_matching_name() {
        let a = Structure::new("audio/x-raw-int");
        let b = Structure::new("video/x-raw");
        assert_eq!(a.intersect(&b), None);
    }

    #[test]
    fn intersect_merges_unconstrained_fields() {
        let a = Structure::new("audio/x-raw-int").set("channels", 2i64);
        let b = Structure::new("audio/x-raw-int").set("rate", 44100i64);
        let merged = a.intersect(&b).unwrap();
        assert_eq!(merged.get("channels"), Some(&CapsValue::Int(2)));
        assert_eq!(merged.get("rate"), Some(&CapsValue::Int(44100)));
    }
}
