use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::GatewaySnapshot;

/// `created` stamped on every catalog entry; a fixed value keeps listings diffable.
pub const CATALOG_CREATED: u64 = 1720524448858;
pub const GATEWAY_OWNER: &str = "uni-api";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub id: String,
    pub object: String,
    pub created: u64,
    pub owned_by: String,
}

impl ModelDescriptor {
    pub fn new(id: impl Into<String>, owned_by: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            object: "model".to_string(),
            created: CATALOG_CREATED,
            owned_by: owned_by.into(),
        }
    }
}

/// OpenAI `GET /v1/models` envelope.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelList {
    pub object: String,
    pub data: Vec<ModelDescriptor>,
}

impl ModelList {
    pub fn new(data: Vec<ModelDescriptor>) -> Self {
        Self {
            object: "list".to_string(),
            data,
        }
    }
}

/// Ordered descriptor list with first-id-wins deduplication.
#[derive(Debug, Default)]
pub(crate) struct CatalogBuilder {
    seen: HashSet<String>,
    models: Vec<ModelDescriptor>,
}

impl CatalogBuilder {
    pub(crate) fn push(&mut self, id: &str, owned_by: &str) {
        if self.seen.insert(id.to_string()) {
            self.models.push(ModelDescriptor::new(id, owned_by));
        }
    }

    pub(crate) fn finish(self) -> Vec<ModelDescriptor> {
        self.models
    }
}

/// Global discovery view: every public model of every provider, no credential filter.
pub fn list_all_models(snapshot: &GatewaySnapshot) -> Vec<ModelDescriptor> {
    let mut catalog = CatalogBuilder::default();
    for provider in snapshot.providers() {
        for model in provider.public_models() {
            catalog.push(model, GATEWAY_OWNER);
        }
    }
    catalog.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(models: &[ModelDescriptor]) -> Vec<&str> {
        models.iter().map(|model| model.id.as_str()).collect()
    }

    #[test]
    fn lists_models_in_provider_then_declaration_order_without_duplicates() {
        let snapshot = GatewaySnapshot::from_yaml_str(
            r#"
providers:
  - provider: a
    model:
      - m1
      - m2: alias
  - provider: b
    model: [m1, m3]
api_keys: []
"#,
        )
        .expect("config");

        let models = list_all_models(&snapshot);
        assert_eq!(ids(&models), vec!["m1", "alias", "m2", "m3"]);
        assert!(models.iter().all(|model| model.owned_by == GATEWAY_OWNER));
        assert!(models.iter().all(|model| model.created == CATALOG_CREATED));
    }

    #[test]
    fn empty_snapshot_lists_nothing() {
        assert!(list_all_models(&GatewaySnapshot::empty()).is_empty());
    }

    #[test]
    fn descriptor_wire_shape() {
        let value = serde_json::to_value(ModelList::new(vec![ModelDescriptor::new(
            "gpt-4o", "uni-api",
        )]))
        .expect("json");
        assert_eq!(
            value,
            serde_json::json!({
                "object": "list",
                "data": [{
                    "id": "gpt-4o",
                    "object": "model",
                    "created": 1720524448858u64,
                    "owned_by": "uni-api",
                }],
            })
        );
    }
}
