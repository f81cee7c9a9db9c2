use super::catalog::{CatalogBuilder, GATEWAY_OWNER, ModelDescriptor};
use super::{GatewayError, GatewaySnapshot, ModelPattern};

/// Models the credential may call, in pattern order, then provider order, then
/// declaration order. Unknown credentials fail before any pattern is looked at.
pub fn resolve_models(
    credential: &str,
    snapshot: &GatewaySnapshot,
) -> Result<Vec<ModelDescriptor>, GatewayError> {
    let key = snapshot
        .api_key(credential)
        .ok_or(GatewayError::Unauthorized)?;

    let mut catalog = CatalogBuilder::default();
    for pattern in &key.patterns {
        match pattern {
            ModelPattern::ProviderWildcard { provider } => {
                for item in snapshot.providers_named(provider) {
                    for model in item.public_models() {
                        catalog.push(model, GATEWAY_OWNER);
                    }
                }
            }
            ModelPattern::ProviderModel { provider, model } => {
                for item in snapshot.providers_named(provider) {
                    if item.exposes(model) {
                        catalog.push(model, GATEWAY_OWNER);
                    }
                }
            }
            // Bare names echo themselves as owner; clients match on it.
            ModelPattern::Model(model) => {
                catalog.push(model, model);
            }
        }
    }
    Ok(catalog.finish())
}

/// Whether `credential` may call `model` under the same rules as [`resolve_models`].
pub fn is_model_allowed(
    credential: &str,
    model: &str,
    snapshot: &GatewaySnapshot,
) -> Result<bool, GatewayError> {
    Ok(resolve_models(credential, snapshot)?
        .iter()
        .any(|descriptor| descriptor.id == model))
}
