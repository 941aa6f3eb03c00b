//! Parameter catalog: every known parameter, keyed by id and by name.
//!
//! Loaded once with [`ParameterCatalog::load`] and read-only afterwards. Share
//! it behind an `Arc` rather than reloading per component.

use std::collections::HashMap;

use crate::backend::Backend;
use crate::backend::models::{ParameterMask, ParameterResponse};
use crate::error::{AppError, AppResult};
use crate::series::models::{ParameterDescriptor, ParameterId, ParameterKind};

#[derive(Debug, Clone, Default)]
pub struct ParameterCatalog {
    descriptors: Vec<ParameterDescriptor>,
    by_id: HashMap<ParameterId, usize>,
    by_name: HashMap<String, usize>,
}

impl ParameterCatalog {
    /// Fetch the catalog for `mask` from the backend.
    ///
    /// # Errors
    ///
    /// Propagates transport errors and returns `AppError::MalformedResponse`
    /// for groups with an unknown mask.
    pub async fn load(backend: &dyn Backend, mask: ParameterMask) -> AppResult<Self> {
        let response = backend.get_parameters(mask).await?;
        let catalog = Self::from_response(response)?;
        tracing::info!(
            parameters = catalog.len(),
            mask = mask.0,
            "Parameter catalog loaded"
        );
        Ok(catalog)
    }

    /// Build the catalog from a decoded `getParameters` response.
    ///
    /// # Errors
    ///
    /// Returns `AppError::MalformedResponse` if a group's mask is not 1 or 2.
    pub fn from_response(response: ParameterResponse) -> AppResult<Self> {
        let mut catalog = Self::default();
        for group in response.data {
            let kind = ParameterKind::from_mask_bit(group.mask).ok_or_else(|| {
                AppError::MalformedResponse(format!(
                    "getParameters: unknown parameter mask {}",
                    group.mask
                ))
            })?;
            for d in group.descriptors {
                catalog.insert(ParameterDescriptor {
                    id: d.id,
                    name: d.name,
                    unit: d.unit,
                    description: d.description,
                    kind: Some(kind),
                });
            }
        }
        Ok(catalog)
    }

    /// Build a catalog from descriptors already in hand.
    #[must_use]
    pub fn from_descriptors(descriptors: impl IntoIterator<Item = ParameterDescriptor>) -> Self {
        let mut catalog = Self::default();
        for d in descriptors {
            catalog.insert(d);
        }
        catalog
    }

    fn insert(&mut self, descriptor: ParameterDescriptor) {
        if self.by_id.contains_key(&descriptor.id) {
            tracing::warn!(parameter = %descriptor.id, name = %descriptor.name, "Duplicate parameter id in catalog");
            return;
        }
        let idx = self.descriptors.len();
        self.by_id.insert(descriptor.id, idx);
        self.by_name.entry(descriptor.name.clone()).or_insert(idx);
        self.descriptors.push(descriptor);
    }

    #[must_use]
    pub fn get(&self, id: ParameterId) -> Option<&ParameterDescriptor> {
        self.by_id.get(&id).map(|&i| &self.descriptors[i])
    }

    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<&ParameterDescriptor> {
        self.by_name.get(name).map(|&i| &self.descriptors[i])
    }

    /// Resolve a name to its descriptor or fail with `BadRequest`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for an unknown name.
    pub fn require_name(&self, name: &str) -> AppResult<&ParameterDescriptor> {
        self.by_name(name)
            .ok_or_else(|| AppError::BadRequest(format!("Unknown parameter '{name}'")))
    }

    pub fn of_kind(&self, kind: ParameterKind) -> impl Iterator<Item = &ParameterDescriptor> {
        self.descriptors
            .iter()
            .filter(move |d| d.kind == Some(kind))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response() -> ParameterResponse {
        serde_json::from_value(json!({
            "data": [
                {"mask": 1, "descriptors": [
                    {"id": 1, "name": "Temperature", "description": "Water temp", "unit": "C"},
                    {"id": 2, "name": "pH", "description": null, "unit": null}
                ]},
                {"mask": 2, "descriptors": [
                    {"id": 10, "name": "Nitrate", "description": "Lab sample", "unit": "mg/L"}
                ]}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn indexes_by_id_name_and_kind() {
        let catalog = ParameterCatalog::from_response(response()).unwrap();
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.get(ParameterId(10)).unwrap().name, "Nitrate");
        assert_eq!(catalog.by_name("pH").unwrap().id, ParameterId(2));
        assert_eq!(catalog.of_kind(ParameterKind::Sensor).count(), 2);
        assert_eq!(
            catalog.get(ParameterId(10)).unwrap().kind,
            Some(ParameterKind::Manual)
        );
        assert!(catalog.require_name("Salinity").is_err());
    }

    #[test]
    fn unknown_mask_is_malformed() {
        let resp: ParameterResponse =
            serde_json::from_value(json!({"data": [{"mask": 4, "descriptors": []}]})).unwrap();
        assert!(matches!(
            ParameterCatalog::from_response(resp),
            Err(AppError::MalformedResponse(_))
        ));
    }
}
