//! Role router: resolves planner/executor/critic roles to backends from a
//! YAML routing document.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use serde_yaml::Value;
use thiserror::Error;

use crate::backend::{Backend, BackendKind};
use crate::profiles::{ModelSpec, RoutingSpec};

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("failed to read router config {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("invalid router config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("no model routed for role: {role}")]
    NoRoute { role: String },
    #[error("routed model not defined: role={role} model={model}")]
    UndefinedModel { role: String, model: String },
    #[error("model kind not implemented: {kind}")]
    KindNotImplemented { kind: String },
}

/// Routing tables loaded from a `router.yaml` document.
#[derive(Debug, Clone)]
pub struct ModelRouter {
    models: BTreeMap<String, ModelSpec>,
    routing: RoutingSpec,
}

impl ModelRouter {
    /// Load and normalize the routing document.
    pub fn load(path: &Path) -> Result<Self, RouterError> {
        let text = std::fs::read_to_string(path).map_err(|source| RouterError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let doc: Value = serde_yaml::from_str(&text)?;

        let mut models = BTreeMap::new();
        if let Some(Value::Mapping(entries)) = doc.get("models") {
            for (name, cfg) in entries {
                let Value::Mapping(cfg) = cfg else { continue };
                let name = norm_scalar(name);
                let kind = cfg
                    .get("kind")
                    .map(norm_scalar)
                    .unwrap_or_default()
                    .trim()
                    .to_string();
                let capabilities = match cfg.get("capabilities") {
                    Some(Value::Sequence(caps)) => caps.iter().map(norm_scalar).collect(),
                    _ => Vec::new(),
                };
                let params = match cfg.get("params") {
                    Some(Value::Mapping(params)) => params
                        .iter()
                        .map(|(k, v)| (norm_scalar(k), v.clone()))
                        .collect(),
                    _ => BTreeMap::new(),
                };
                models.insert(
                    name.clone(),
                    ModelSpec {
                        name,
                        kind,
                        capabilities,
                        params,
                    },
                );
            }
        }

        let mut mapping = BTreeMap::new();
        if let Some(Value::Mapping(entries)) = doc.get("routing") {
            for (role, model) in entries {
                mapping.insert(norm_scalar(role), norm_scalar(model));
            }
        }

        tracing::debug!(models = models.len(), routes = mapping.len(), "router config loaded");
        Ok(Self {
            models,
            routing: RoutingSpec { mapping },
        })
    }

    #[must_use]
    pub fn model(&self, name: &str) -> Option<&ModelSpec> {
        self.models.get(name)
    }

    /// Resolve a role (e.g. `planner`) into a backend instance.
    pub fn backend_for_role(&self, role: &str) -> Result<Box<dyn Backend>, RouterError> {
        let model_name = self
            .routing
            .mapping
            .get(role)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| RouterError::NoRoute {
                role: role.to_string(),
            })?;

        let spec = self
            .models
            .get(model_name)
            .ok_or_else(|| RouterError::UndefinedModel {
                role: role.to_string(),
                model: model_name.clone(),
            })?;

        let kind =
            BackendKind::from_kind_str(&spec.kind).ok_or_else(|| RouterError::KindNotImplemented {
                kind: spec.kind.clone(),
            })?;
        Ok(kind.instantiate())
    }
}

/// The YAML null literal normalizes to the canonical string `"null"` at
/// every model-name and kind position.
fn norm_scalar(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}
