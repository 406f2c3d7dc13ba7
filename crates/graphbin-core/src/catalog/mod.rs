//! Catalog - the label, property-name and property-value dictionaries
//!
//! Labels and property names keep their original case; property values are
//! case-folded with [`fold_value`] before they reach the value dictionary
//! and before they are looked up.

pub mod dictionary;

pub use dictionary::{Dictionary, write_dictionary};

use crate::Result;
use crate::storage::{DictionaryKind, StoreLayout};

/// Case folding applied to every property value
pub fn fold_value(value: &str) -> String {
    value.to_lowercase()
}

/// The three dictionaries of a finished store
pub struct Catalog {
    labels: Dictionary,
    property_names: Dictionary,
    property_values: Dictionary,
}

impl Catalog {
    /// Map every dictionary under `layout`
    pub fn open(layout: &StoreLayout) -> Result<Self> {
        let open = |kind| Dictionary::open(kind, &layout.dictionary(kind));
        Ok(Self {
            labels: open(DictionaryKind::Labels)?,
            property_names: open(DictionaryKind::PropertyNames)?,
            property_values: open(DictionaryKind::PropertyValues)?,
        })
    }

    /// Node and edge labels
    pub fn labels(&self) -> &Dictionary {
        &self.labels
    }

    /// Property names
    pub fn property_names(&self) -> &Dictionary {
        &self.property_names
    }

    /// Case-folded property values
    pub fn property_values(&self) -> &Dictionary {
        &self.property_values
    }

    /// Dictionary by kind
    pub fn dictionary(&self, kind: DictionaryKind) -> &Dictionary {
        match kind {
            DictionaryKind::Labels => &self.labels,
            DictionaryKind::PropertyNames => &self.property_names,
            DictionaryKind::PropertyValues => &self.property_values,
        }
    }
}
