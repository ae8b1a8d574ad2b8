use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::domain::Location;

/// One selectable entry of a reference list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceOption {
    pub value: String,
    pub label: String,
}

impl ReferenceOption {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

/// Static geographic lists keyed by the parent selection. The empty key lists countries;
/// a country code lists its regions; a region code lists its cities.
pub trait ReferenceData: Send + Sync {
    fn lookup(&self, parent: &str) -> Vec<ReferenceOption>;

    fn contains(&self, parent: &str, value: &str) -> bool {
        self.lookup(parent).iter().any(|option| option.value == value)
    }
}

/// Hash-map backed reference data, used by the API binary and by tests.
#[derive(Debug, Clone, Default)]
pub struct MapReferenceData {
    entries: HashMap<String, Vec<ReferenceOption>>,
}

impl MapReferenceData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_children(
        mut self,
        parent: impl Into<String>,
        children: impl IntoIterator<Item = ReferenceOption>,
    ) -> Self {
        self.entries
            .entry(parent.into())
            .or_default()
            .extend(children);
        self
    }
}

impl ReferenceData for MapReferenceData {
    fn lookup(&self, parent: &str) -> Vec<ReferenceOption> {
        self.entries.get(parent).cloned().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationLevel {
    Country,
    Region,
    City,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LocationError {
    #[error("'{value}' is not a valid {level:?} option")]
    UnknownOption { level: LocationLevel, value: String },
    #[error("select a {0:?} before choosing its children")]
    MissingParent(LocationLevel),
}

/// Apply one level of a cascading location selection. Changing a parent clears any
/// child that no longer belongs to it.
pub fn set_location_level(
    reference: &dyn ReferenceData,
    location: &mut Location,
    level: LocationLevel,
    value: Option<String>,
) -> Result<(), LocationError> {
    let parent = match level {
        LocationLevel::Country => Some(String::new()),
        LocationLevel::Region => location.country.clone(),
        LocationLevel::City => location.region.clone(),
    };

    if let Some(value) = value.as_deref() {
        let parent = parent.ok_or(match level {
            LocationLevel::Region => LocationError::MissingParent(LocationLevel::Country),
            _ => LocationError::MissingParent(LocationLevel::Region),
        })?;
        if !reference.contains(&parent, value) {
            return Err(LocationError::UnknownOption {
                level,
                value: value.to_string(),
            });
        }
    }

    match level {
        LocationLevel::Country => location.country = value,
        LocationLevel::Region => location.region = value,
        LocationLevel::City => location.city = value,
    }
    prune_location(reference, location);
    Ok(())
}

/// Drop region/city selections that are not children of their current parent.
pub fn prune_location(reference: &dyn ReferenceData, location: &mut Location) {
    let region_valid = match (&location.country, &location.region) {
        (Some(country), Some(region)) => reference.contains(country, region),
        (_, None) => true,
        (None, Some(_)) => false,
    };
    if !region_valid {
        location.region = None;
    }

    let city_valid = match (&location.region, &location.city) {
        (Some(region), Some(city)) => reference.contains(region, city),
        (_, None) => true,
        (None, Some(_)) => false,
    };
    if !city_valid {
        location.city = None;
    }
}

/// First level of the location that does not match the reference data, if any.
pub fn location_mismatch(reference: &dyn ReferenceData, location: &Location) -> Option<LocationLevel> {
    if let Some(country) = &location.country {
        if !reference.contains("", country) {
            return Some(LocationLevel::Country);
        }
    }
    if let Some(region) = &location.region {
        match &location.country {
            Some(country) if reference.contains(country, region) => {}
            _ => return Some(LocationLevel::Region),
        }
    }
    if let Some(city) = &location.city {
        match &location.region {
            Some(region) if reference.contains(region, city) => {}
            _ => return Some(LocationLevel::City),
        }
    }
    None
}
