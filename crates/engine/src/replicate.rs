//! Cloning an existing universe with selective overrides.
//!
//! The workflow runs four stages, each failing on its own terms:
//!
//! 1. resolve the source universe by name,
//! 2. transform a full copy of its live configuration,
//! 3. validate the copy against the synchronous dry-run endpoint,
//! 4. submit it and wait for the creation task, unless this is a what-if run.
//!
//! The transform only touches the name, node sizing, volume size and database
//! passwords. Node count, regions and zone placement come from the source.

use serde_json::{Map, Value};
use tracing::{info, warn};
use yba_api::{ApiError, ApiRequest, InvokeOutcome, Transport};
use yba_types::Task;

use crate::control_plane::{ControlPlane, ResolvePolicy};
use crate::credentials::DatabaseCredentials;
use crate::error::EngineError;

/// CPU and memory for one Kubernetes pod type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeResources {
    pub cpu_core_count: f64,
    pub memory_gib: f64,
}

impl NodeResources {
    pub fn new(cpu_core_count: f64, memory_gib: f64) -> Self {
        Self { cpu_core_count, memory_gib }
    }
}

/// Sparse changes applied over the source configuration.
///
/// Besides these fields, [`transform_universe`] always removes the source's
/// top-level `universeUUID`; the control plane assigns the copy a new one.
/// Node count, regions and zone placement are never changed.
#[derive(Debug, Clone, PartialEq)]
pub struct UniverseOverrides {
    pub name: String,
    pub tserver: Option<NodeResources>,
    pub master: Option<NodeResources>,
    pub volume_size_gb: Option<u64>,
    /// Always applied; defaults to the shared placeholder password.
    pub credentials: DatabaseCredentials,
}

impl UniverseOverrides {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tserver: None,
            master: None,
            volume_size_gb: None,
            credentials: DatabaseCredentials::default(),
        }
    }

    pub fn with_tserver(mut self, resources: NodeResources) -> Self {
        self.tserver = Some(resources);
        self
    }

    pub fn with_master(mut self, resources: NodeResources) -> Self {
        self.master = Some(resources);
        self
    }

    pub fn with_volume_size(mut self, volume_size_gb: u64) -> Self {
        self.volume_size_gb = Some(volume_size_gb);
        self
    }

    pub fn with_credentials(mut self, credentials: DatabaseCredentials) -> Self {
        self.credentials = credentials;
        self
    }
}

/// A transformed configuration accepted by the dry-run endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedConfig {
    pub source_uuid: String,
    /// The document that is (or would be) submitted.
    pub configuration: Value,
    /// The dry-run endpoint's response.
    pub validation: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReplicationOutcome {
    /// What-if run: validated, nothing submitted.
    Validated(ValidatedConfig),
    /// Submitted and the creation task succeeded.
    Submitted { task: Box<Task>, configuration: Value },
}

impl<T: Transport> ControlPlane<'_, T> {
    /// Clone the universe named `source_name` under `overrides`.
    pub async fn replicate_universe(
        &self,
        source_name: &str,
        overrides: &UniverseOverrides,
        what_if: bool,
    ) -> Result<ReplicationOutcome, EngineError> {
        let source = self.find_universe(source_name).await?;
        let source_uuid = source.get("universeUUID").and_then(Value::as_str).unwrap_or_default().to_string();
        let details = source
            .get("universeDetails")
            .ok_or_else(|| EngineError::unexpected(self.session.customer_path("universes"), format!("universe '{source_name}' has no universeDetails")))?;

        let configuration = transform_universe(details, overrides);
        info!(source = source_name, target = %overrides.name, "universe configuration transformed");

        let validation = self.validate_universe(&configuration).await?;
        info!(target = %overrides.name, what_if, "universe configuration validated");

        if what_if {
            return Ok(ReplicationOutcome::Validated(ValidatedConfig {
                source_uuid,
                configuration,
                validation,
            }));
        }

        let endpoint = self.session.customer_path("universes/clusters");
        match self.call(ApiRequest::post(&endpoint, configuration.clone()).wait(self.wait)).await? {
            InvokeOutcome::TaskCompleted(task) => {
                info!(target = %overrides.name, task_id = %task.id, "universe created");
                Ok(ReplicationOutcome::Submitted {
                    task: Box::new(task),
                    configuration,
                })
            }
            other => Err(EngineError::unexpected(
                endpoint,
                format!("expected a creation task, got {}", other.into_value()),
            )),
        }
    }

    /// Look up a universe by name under the configured [`ResolvePolicy`].
    pub async fn find_universe(&self, name: &str) -> Result<Value, EngineError> {
        let endpoint = self.session.customer_path("universes");
        let universes = self.fetch(ApiRequest::get(&endpoint)).await?;
        let universes = universes
            .as_array()
            .ok_or_else(|| EngineError::unexpected(&endpoint, "universe list is not an array"))?;

        let matches = universes
            .iter()
            .filter(|universe| universe.get("name").and_then(Value::as_str) == Some(name))
            .collect::<Vec<_>>();

        match (matches.as_slice(), self.resolve_policy) {
            ([], _) => Err(EngineError::not_found("universe", name)),
            ([only], _) => Ok((*only).clone()),
            ([first, ..], ResolvePolicy::FirstMatch) => {
                warn!(name, count = matches.len(), "several universes share the name; using the first");
                Ok((*first).clone())
            }
            (_, ResolvePolicy::Unique) => Err(EngineError::AmbiguousName {
                kind: "universe".to_string(),
                name: name.to_string(),
                count: matches.len(),
                uuids: matches
                    .iter()
                    .filter_map(|universe| universe.get("universeUUID").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect(),
            }),
        }
    }

    /// Dry-run `configuration`. A rejection becomes
    /// [`EngineError::ValidationFailed`] carrying the remote diagnostic.
    pub async fn validate_universe(&self, configuration: &Value) -> Result<Value, EngineError> {
        let endpoint = self.session.customer_path("universe_configure");
        match self.fetch(ApiRequest::post(endpoint, configuration.clone())).await {
            Ok(validation) => Ok(validation),
            Err(EngineError::Api(ApiError::RequestFailed {
                status: Some(_),
                message,
                body,
                ..
            })) => Err(EngineError::ValidationFailed {
                message,
                diagnostic: body.unwrap_or(Value::Null),
            }),
            Err(other) => Err(other),
        }
    }
}

/// Apply `overrides` to a copy of a universe's `universeDetails`.
///
/// Every cluster gets the new name and passwords. Sizing applies to the
/// primary cluster only. The source's `universeUUID` is dropped so the
/// control plane assigns a fresh identity; all other fields are copied as-is.
pub fn transform_universe(source_details: &Value, overrides: &UniverseOverrides) -> Value {
    let mut configuration = source_details.clone();
    let Some(root) = configuration.as_object_mut() else {
        return configuration;
    };
    root.remove("universeUUID");

    let Some(clusters) = root.get_mut("clusters").and_then(Value::as_array_mut) else {
        return configuration;
    };
    let primary = clusters
        .iter()
        .position(|cluster| cluster.get("clusterType").and_then(Value::as_str) == Some("PRIMARY"))
        .unwrap_or(0);

    for (index, cluster) in clusters.iter_mut().enumerate() {
        let Some(intent) = user_intent(cluster) else {
            continue;
        };
        intent.insert("universeName".to_string(), Value::from(overrides.name.as_str()));
        intent.insert("ysqlPassword".to_string(), Value::from(overrides.credentials.ysql_password.as_str()));
        intent.insert("ycqlPassword".to_string(), Value::from(overrides.credentials.ycql_password.as_str()));

        if index != primary {
            continue;
        }
        if let Some(tserver) = overrides.tserver {
            set_resources(intent, "tserverK8SNodeResourceSpec", tserver);
        }
        if let Some(master) = overrides.master {
            set_resources(intent, "masterK8SNodeResourceSpec", master);
        }
        if let Some(volume_size) = overrides.volume_size_gb {
            set_fields(intent, "deviceInfo", [("volumeSize", Value::from(volume_size))]);
        }
    }
    configuration
}

fn user_intent(cluster: &mut Value) -> Option<&mut Map<String, Value>> {
    cluster.get_mut("userIntent").and_then(Value::as_object_mut)
}

fn set_resources(intent: &mut Map<String, Value>, key: &str, resources: NodeResources) {
    set_fields(
        intent,
        key,
        [
            ("cpuCoreCount", Value::from(resources.cpu_core_count)),
            ("memoryGib", Value::from(resources.memory_gib)),
        ],
    );
}

/// Write `fields` into the object under `key`, creating it (or replacing a
/// non-object value) as needed. Sibling fields are left alone.
fn set_fields<const N: usize>(parent: &mut Map<String, Value>, key: &str, fields: [(&str, Value); N]) {
    let slot = parent.entry(key.to_string()).or_insert_with(|| Value::Object(Map::new()));
    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }
    if let Some(object) = slot.as_object_mut() {
        for (field, value) in fields {
            object.insert(field.to_string(), value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Method;
    use serde_json::json;
    use yba_api::RequestInvoker;
    use yba_api::testing::ScriptedTransport;
    use yba_types::SessionContext;

    const UNIVERSES: &str = "/api/v1/customers/c-1/universes";
    const CONFIGURE: &str = "/api/v1/customers/c-1/universe_configure";

    fn details() -> Value {
        json!({
            "universeUUID": "u-1",
            "nodePrefix": "yb-admin-source",
            "clusters": [
                {
                    "clusterType": "PRIMARY",
                    "userIntent": {
                        "universeName": "source",
                        "numNodes": 3,
                        "tserverK8SNodeResourceSpec": { "cpuCoreCount": 2.0, "memoryGib": 4.0 },
                        "masterK8SNodeResourceSpec": { "cpuCoreCount": 2.0, "memoryGib": 4.0 },
                        "deviceInfo": { "volumeSize": 50, "numVolumes": 1, "storageClass": "standard" },
                        "ysqlPassword": "old",
                        "specificGFlags": { "perProcessFlags": { "value": { "TSERVER": { "ysql_max_connections": "400" } } } }
                    },
                    "placementInfo": { "cloudList": [{ "code": "kubernetes" }] }
                },
                {
                    "clusterType": "ASYNC",
                    "userIntent": {
                        "universeName": "source",
                        "numNodes": 1,
                        "tserverK8SNodeResourceSpec": { "cpuCoreCount": 1.0, "memoryGib": 2.0 }
                    }
                }
            ]
        })
    }

    #[test]
    fn transform_overrides_only_targeted_fields() {
        let source = details();
        let overrides = UniverseOverrides::new("copy")
            .with_tserver(NodeResources::new(1.5, 3.0))
            .with_volume_size(100)
            .with_credentials(DatabaseCredentials::shared("New#Pass1"));

        let transformed = transform_universe(&source, &overrides);

        let primary = &transformed["clusters"][0]["userIntent"];
        assert_eq!(primary["universeName"], json!("copy"));
        assert_eq!(primary["tserverK8SNodeResourceSpec"], json!({ "cpuCoreCount": 1.5, "memoryGib": 3.0 }));
        assert_eq!(primary["masterK8SNodeResourceSpec"], source["clusters"][0]["userIntent"]["masterK8SNodeResourceSpec"]);
        assert_eq!(primary["deviceInfo"], json!({ "volumeSize": 100, "numVolumes": 1, "storageClass": "standard" }));
        assert_eq!(primary["ycqlPassword"], json!("New#Pass1"));
        assert_eq!(primary["numNodes"], json!(3));
        assert_eq!(primary["specificGFlags"], source["clusters"][0]["userIntent"]["specificGFlags"]);
        assert_eq!(transformed["clusters"][0]["placementInfo"], source["clusters"][0]["placementInfo"]);
        assert_eq!(transformed["nodePrefix"], json!("yb-admin-source"));
        assert!(transformed.get("universeUUID").is_none());

        let read_replica = &transformed["clusters"][1]["userIntent"];
        assert_eq!(read_replica["universeName"], json!("copy"));
        assert_eq!(read_replica["tserverK8SNodeResourceSpec"], json!({ "cpuCoreCount": 1.0, "memoryGib": 2.0 }));
        assert_eq!(read_replica["numNodes"], json!(1));
    }

    #[test]
    fn transform_without_sizing_keeps_source_sizing_and_sets_default_passwords() {
        let source = details();
        let transformed = transform_universe(&source, &UniverseOverrides::new("copy"));

        let primary = &transformed["clusters"][0]["userIntent"];
        assert_eq!(primary["tserverK8SNodeResourceSpec"], source["clusters"][0]["userIntent"]["tserverK8SNodeResourceSpec"]);
        assert_eq!(primary["ysqlPassword"], json!(crate::credentials::DEFAULT_DATABASE_PASSWORD));
    }

    fn universe(uuid: &str, name: &str) -> Value {
        json!({ "universeUUID": uuid, "name": name, "universeDetails": details() })
    }

    #[tokio::test]
    async fn duplicate_names_follow_the_resolve_policy() {
        let transport = ScriptedTransport::new();
        transport.on(Method::GET, UNIVERSES, 200, json!([universe("u-1", "dup"), universe("u-2", "dup"), universe("u-3", "other")]));
        let invoker = RequestInvoker::new(transport);
        let session = SessionContext::new("https://yba.test", "tok", "c-1");

        let error = ControlPlane::new(&invoker, &session).find_universe("dup").await.expect_err("ambiguous");
        match error {
            EngineError::AmbiguousName { count, uuids, .. } => {
                assert_eq!(count, 2);
                assert_eq!(uuids, vec!["u-1", "u-2"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let first = ControlPlane::new(&invoker, &session)
            .with_resolve_policy(ResolvePolicy::FirstMatch)
            .find_universe("dup")
            .await
            .expect("first match");
        assert_eq!(first["universeUUID"], json!("u-1"));

        let missing = ControlPlane::new(&invoker, &session).find_universe("absent").await.expect_err("missing");
        assert!(matches!(missing, EngineError::NotFound { .. }));
    }

    #[tokio::test]
    async fn validation_rejection_stops_before_submission() {
        let transport = ScriptedTransport::new();
        transport.on(Method::GET, UNIVERSES, 200, json!([universe("u-1", "source")]));
        transport.on(
            Method::POST,
            CONFIGURE,
            400,
            json!({ "success": false, "error": { "tserverK8SNodeResourceSpec": ["cpuCoreCount must be at least 0.5"] } }),
        );
        let invoker = RequestInvoker::new(transport);
        let session = SessionContext::new("https://yba.test", "tok", "c-1");
        let overrides = UniverseOverrides::new("copy").with_tserver(NodeResources::new(0.1, 1.0));

        let error = ControlPlane::new(&invoker, &session)
            .replicate_universe("source", &overrides, false)
            .await
            .expect_err("rejected");

        let EngineError::ValidationFailed { diagnostic, .. } = &error else {
            panic!("unexpected error: {error:?}");
        };
        assert_eq!(diagnostic["success"], json!(false));
        assert_eq!(invoker.transport().count(Method::POST, "/api/v1/customers/c-1/universes/clusters"), 0);
    }

    #[tokio::test]
    async fn transport_failure_during_validation_is_not_a_validation_failure() {
        let transport = ScriptedTransport::new();
        transport.on(Method::GET, UNIVERSES, 200, json!([universe("u-1", "source")]));
        transport.on_error(Method::POST, CONFIGURE, "connection reset");
        let invoker = RequestInvoker::new(transport);
        let session = SessionContext::new("https://yba.test", "tok", "c-1");

        let error = ControlPlane::new(&invoker, &session)
            .replicate_universe("source", &UniverseOverrides::new("copy"), true)
            .await
            .expect_err("transport failure");

        assert!(matches!(error, EngineError::Api(ApiError::RequestFailed { status: None, .. })), "{error:?}");
    }
}
