use serde::Deserialize;
use serde::Serialize;

use super::ObjectMeta;
use super::Resource;

/// `apps/v1` Deployment, reduced to what the notifications need.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    #[serde(default)]
    pub metadata: ObjectMeta,

    #[serde(default)]
    pub spec: DeploymentSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
}

impl Resource for Deployment {
    const KIND: &'static str = "Deployment";

    fn api_path(namespace: Option<&str>) -> String {
        match namespace {
            Some(ns) => format!("/apis/apps/v1/namespaces/{ns}/deployments"),
            None => "/apis/apps/v1/deployments".to_string(),
        }
    }

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }
}

/// `v1` Pod, reduced to its containers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pod {
    #[serde(default)]
    pub metadata: ObjectMeta,

    #[serde(default)]
    pub spec: PodSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PodSpec {
    #[serde(default)]
    pub containers: Vec<Container>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Container {
    pub name: String,

    #[serde(default)]
    pub image: Option<String>,
}

impl Resource for Pod {
    const KIND: &'static str = "Pod";

    fn api_path(namespace: Option<&str>) -> String {
        match namespace {
            Some(ns) => format!("/api/v1/namespaces/{ns}/pods"),
            None => "/api/v1/pods".to_string(),
        }
    }

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn summary(&self) -> String {
        match self.spec.containers.first() {
            Some(c) => format!(
                "{} (container: {}, image: {})",
                self.metadata.name,
                c.name,
                c.image.as_deref().unwrap_or("<none>")
            ),
            None => self.metadata.name.clone(),
        }
    }
}
