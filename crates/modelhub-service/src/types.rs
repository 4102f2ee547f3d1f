//! The model metadata data model.
//!
//! These are pure structural types: deserialization does no coercion beyond
//! what serde provides, and absent optional fields stay `None` rather than
//! being defaulted to sentinels.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// The version constraint meaning "the latest available version".
pub const LATEST_VERSION: &str = "*";

/// An immutable `(model id, version)` pair.
///
/// The version is either a concrete version, or [`LATEST_VERSION`] when used
/// as a constraint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionedModelId {
    model_id: String,
    version: String,
}

impl VersionedModelId {
    /// Creates a new [`VersionedModelId`].
    pub fn new(model_id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            version: version.into(),
        }
    }

    /// The model id.
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// The version, or [`LATEST_VERSION`].
    pub fn version(&self) -> &str {
        &self.version
    }
}

impl fmt::Display for VersionedModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.model_id, self.version)
    }
}

/// One row of the remote manifest: a concrete model version and the pointer
/// to its full spec document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelHeader {
    /// The model id.
    pub model_id: String,
    /// The concrete version of this entry.
    pub version: String,
    /// The minimum library version able to use this entry.
    pub min_version: String,
    /// Storage key of the full spec document.
    pub spec_key: String,
}

impl ModelHeader {
    /// The `(model id, concrete version)` pair identifying this entry.
    pub fn versioned_id(&self) -> VersionedModelId {
        VersionedModelId::new(&self.model_id, &self.version)
    }
}

/// The parsed manifest, indexed for O(1) lookup by id and concrete version.
pub type ManifestIndex = HashMap<VersionedModelId, ModelHeader>;

/// The kind of document stored under a [`ContentKey`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    /// The model manifest.
    Manifest,
    /// A full model spec document.
    Specs,
}

/// Key into the raw-content cache: a document kind plus its storage key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentKey {
    /// What kind of document the key points at.
    pub file_type: FileType,
    /// The storage key of the document.
    pub key: String,
}

impl ContentKey {
    /// A key for the manifest document.
    pub fn manifest(key: impl Into<String>) -> Self {
        Self {
            file_type: FileType::Manifest,
            key: key.into(),
        }
    }

    /// A key for a spec document.
    pub fn specs(key: impl Into<String>) -> Self {
        Self {
            file_type: FileType::Specs,
            key: key.into(),
        }
    }
}

/// A parsed document held by the raw-content cache.
#[derive(Debug, Clone)]
pub enum ContentPayload {
    /// The parsed and indexed manifest.
    Manifest(Arc<ManifestIndex>),
    /// A parsed spec document.
    Specs(Arc<ModelSpecs>),
}

/// A raw-content cache value: the parsed payload plus the content hash it
/// was downloaded under.
///
/// The hash is only tracked for the manifest, where it drives conditional
/// re-fetching. Spec documents are addressed by keys that are already unique
/// per manifest entry and carry no hash.
#[derive(Debug, Clone)]
pub struct ContentValue {
    /// The parsed document.
    pub payload: ContentPayload,
    /// The content hash reported by the storage backend at download time.
    pub hash: Option<String>,
}

/// The type of a hyperparameter or environment variable value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableType {
    /// Free-form text.
    Text,
    /// An integer.
    Int,
    /// A floating point number.
    Float,
    /// A boolean.
    Bool,
}

/// Container image coordinates for hosting or training a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EcrSpecs {
    /// The framework the container is built for.
    pub framework: String,
    /// The framework version.
    pub framework_version: String,
    /// The python version inside the container, if pinned.
    pub py_version: Option<String>,
    /// The transformers version, for huggingface containers.
    pub huggingface_transformers_version: Option<String>,
}

/// Definition of one tunable hyperparameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HyperparameterSpec {
    /// The hyperparameter name.
    pub name: String,
    /// The value type.
    #[serde(rename = "type")]
    pub variable_type: VariableType,
    /// The default value.
    pub default: serde_json::Value,
    /// The allowed values, for enumerated hyperparameters.
    pub options: Option<Vec<serde_json::Value>>,
    /// The inclusive lower bound, for numeric hyperparameters.
    pub min: Option<serde_json::Value>,
    /// The inclusive upper bound, for numeric hyperparameters.
    pub max: Option<serde_json::Value>,
    /// Whether the value is consumed by the algorithm or the container.
    pub scope: Option<String>,
}

/// Definition of one environment variable of the inference container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentVariableSpec {
    /// The variable name.
    pub name: String,
    /// The value type.
    #[serde(rename = "type")]
    pub variable_type: VariableType,
    /// The default value.
    pub default: serde_json::Value,
    /// Whether the value is consumed by the algorithm or the container.
    pub scope: Option<String>,
}

/// The full metadata document for one concrete model version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpecs {
    /// The model id.
    pub model_id: String,
    /// The concrete version this document describes.
    pub version: String,
    /// The minimum library version able to use this model.
    pub min_sdk_version: String,
    /// Whether the model supports training.
    pub training_supported: bool,
    /// Whether a previously trained artifact can be trained further.
    pub incremental_training_supported: Option<bool>,
    /// Container coordinates for hosting.
    pub hosting_ecr_specs: Option<EcrSpecs>,
    /// Storage key of the hosting model artifact.
    pub hosting_artifact_key: Option<String>,
    /// Storage key of the hosting inference script.
    pub hosting_script_key: Option<String>,
    /// Container coordinates for training.
    pub training_ecr_specs: Option<EcrSpecs>,
    /// Storage key of the training artifact.
    pub training_artifact_key: Option<String>,
    /// Storage key of the training script.
    pub training_script_key: Option<String>,
    /// Tunable hyperparameter definitions.
    pub hyperparameters: Option<Vec<HyperparameterSpec>>,
    /// Environment variables of the inference container.
    pub inference_environment_variables: Option<Vec<EnvironmentVariableSpec>>,
    /// Whether the inference container has known vulnerabilities.
    pub inference_vulnerable: Option<bool>,
    /// The known inference vulnerabilities.
    pub inference_vulnerabilities: Option<Vec<String>>,
    /// Whether the training container has known vulnerabilities.
    pub training_vulnerable: Option<bool>,
    /// The known training vulnerabilities.
    pub training_vulnerabilities: Option<Vec<String>>,
    /// Whether this model version has been deprecated.
    pub deprecated: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_full_spec_document() {
        let raw = serde_json::json!({
            "model_id": "pytorch-ic-mobilenet-v2",
            "version": "1.0.0",
            "min_sdk_version": "2.49.0",
            "training_supported": true,
            "incremental_training_supported": true,
            "hosting_ecr_specs": {
                "framework": "pytorch",
                "framework_version": "1.5.0",
                "py_version": "py3"
            },
            "hosting_artifact_key": "pytorch-infer/infer-pytorch-ic-mobilenet-v2.tar.gz",
            "hosting_script_key": "source-directory-tarballs/pytorch/inference/ic/v1.0.0/sourcedir.tar.gz",
            "training_ecr_specs": {
                "framework": "pytorch",
                "framework_version": "1.5.0",
                "py_version": "py3"
            },
            "training_artifact_key": "pytorch-training/train-pytorch-ic-mobilenet-v2.tar.gz",
            "training_script_key": "source-directory-tarballs/pytorch/transfer_learning/ic/v1.0.0/sourcedir.tar.gz",
            "hyperparameters": [
                {
                    "name": "epochs",
                    "type": "int",
                    "default": 3,
                    "min": 1,
                    "max": 1000,
                    "scope": "algorithm"
                },
                {
                    "name": "adam-learning-rate",
                    "type": "float",
                    "default": 0.05,
                    "min": 1e-08,
                    "max": 1.0,
                    "scope": "algorithm"
                }
            ],
            "inference_environment_variables": [
                {
                    "name": "SAGEMAKER_PROGRAM",
                    "type": "text",
                    "default": "inference.py",
                    "scope": "container"
                }
            ],
            "inference_vulnerable": false,
            "inference_vulnerabilities": [],
            "training_vulnerable": false,
            "training_vulnerabilities": [],
            "deprecated": false
        });

        let specs: ModelSpecs = serde_json::from_value(raw).unwrap();
        assert_eq!(specs.model_id, "pytorch-ic-mobilenet-v2");
        assert_eq!(specs.min_sdk_version, "2.49.0");
        assert!(specs.training_supported);
        assert_eq!(specs.incremental_training_supported, Some(true));
        assert_eq!(specs.deprecated, Some(false));

        let hosting = specs.hosting_ecr_specs.unwrap();
        assert_eq!(hosting.framework, "pytorch");
        assert_eq!(hosting.py_version.as_deref(), Some("py3"));
        assert_eq!(hosting.huggingface_transformers_version, None);

        let hyperparameters = specs.hyperparameters.unwrap();
        assert_eq!(hyperparameters.len(), 2);
        assert_eq!(hyperparameters[0].variable_type, VariableType::Int);
        assert_eq!(hyperparameters[1].variable_type, VariableType::Float);
        assert_eq!(hyperparameters[1].min, Some(serde_json::json!(1e-08)));

        let env = specs.inference_environment_variables.unwrap();
        assert_eq!(env[0].variable_type, VariableType::Text);
        assert_eq!(env[0].scope.as_deref(), Some("container"));
    }

    #[test]
    fn absent_optional_fields_stay_unset() {
        let raw = serde_json::json!({
            "model_id": "minimal-model",
            "version": "1.0.0",
            "min_sdk_version": "1.0.0",
            "training_supported": false
        });

        let specs: ModelSpecs = serde_json::from_value(raw).unwrap();
        assert_eq!(specs.incremental_training_supported, None);
        assert_eq!(specs.hosting_ecr_specs, None);
        assert_eq!(specs.hyperparameters, None);
        assert_eq!(specs.inference_vulnerable, None);
        assert_eq!(specs.deprecated, None);
    }

    #[test]
    fn parses_manifest_headers() {
        let raw = serde_json::json!([
            {
                "model_id": "tensorflow-ic-imagenet-v2",
                "version": "1.0.0",
                "min_version": "2.49.0",
                "spec_key": "community_models_specs/tensorflow-ic-imagenet-v2/specs_v1.0.0.json"
            }
        ]);

        let headers: Vec<ModelHeader> = serde_json::from_value(raw).unwrap();
        assert_eq!(headers.len(), 1);
        assert_eq!(
            headers[0].versioned_id(),
            VersionedModelId::new("tensorflow-ic-imagenet-v2", "1.0.0")
        );
    }

    #[test]
    fn rejects_unknown_variable_types() {
        let raw = serde_json::json!({
            "name": "epochs",
            "type": "tuple",
            "default": 3
        });
        assert!(serde_json::from_value::<HyperparameterSpec>(raw).is_err());
    }
}
