//! Registering database releases from package URLs.
//!
//! The control plane extracts metadata from a package asynchronously but
//! outside its task framework: the extraction request returns a resource id
//! whose document carries a `status` that leaves `running` once the metadata
//! is available. That resource is polled here on its own short budget.

use std::time::Duration;

use serde_json::{Value, json};
use tokio::time::{Instant, sleep};
use tracing::{debug, info};
use yba_api::{ApiRequest, Transport, WaitPolicy};
use yba_types::{ParamValue, ParameterSet};
use yba_util::encode_path_segment;

use crate::control_plane::ControlPlane;
use crate::error::EngineError;
use crate::families::{TemplateFamily, TemplateSource, render_family};

/// Budget and cadence for package metadata extraction.
pub const METADATA_WAIT: WaitPolicy = WaitPolicy {
    timeout: Duration::from_secs(30),
    poll_interval: Duration::from_secs(1),
};

const METADATA_KEYS: [&str; 6] = ["version", "yb_type", "platform", "architecture", "release_type", "release_date_msecs"];

/// What `create_release` did.
#[derive(Debug, Clone, PartialEq)]
pub enum ReleaseOutcome {
    /// No release had this version; a new one was created.
    Created(Value),
    /// The release already had an artifact for this architecture.
    AlreadyPresent(Value),
    /// The package was added to the existing release for its version.
    ArtifactAdded(Value),
}

impl ReleaseOutcome {
    pub fn into_value(self) -> Value {
        match self {
            Self::Created(value) | Self::AlreadyPresent(value) | Self::ArtifactAdded(value) => value,
        }
    }
}

impl<T: Transport> ControlPlane<'_, T> {
    /// Make the package at `package_url` (a tarball or Helm chart) available
    /// for universe creation.
    pub async fn create_release(&self, package_url: &str) -> Result<ReleaseOutcome, EngineError> {
        let metadata = self.extract_package_metadata(package_url).await?;
        let version = metadata
            .get("version")
            .and_then(Value::as_str)
            .ok_or_else(|| EngineError::ReleaseMetadataUnavailable {
                package_url: package_url.to_string(),
                last: metadata.clone(),
            })?;

        let releases_endpoint = self.session.customer_path("ybdb_release");
        let releases = self.fetch(ApiRequest::get(&releases_endpoint)).await?;
        let releases = releases
            .as_array()
            .ok_or_else(|| EngineError::unexpected(&releases_endpoint, "release list is not an array"))?;

        let Some(existing) = releases.iter().find(|release| release.get("version").and_then(Value::as_str) == Some(version)) else {
            info!(version, "creating release");
            let payload = render_family(TemplateFamily::Release, &TemplateSource::Builtin, &release_parameters(&metadata, package_url))?;
            let created = self.fetch(ApiRequest::post(&releases_endpoint, payload)).await?;
            return Ok(ReleaseOutcome::Created(created));
        };

        let architecture = metadata.get("architecture").cloned().unwrap_or(Value::Null);
        let artifacts = existing.get("artifacts").and_then(Value::as_array).cloned().unwrap_or_default();
        if artifacts.iter().any(|artifact| artifact.get("architecture").unwrap_or(&Value::Null) == &architecture) {
            info!(version, %architecture, "release already has this package");
            return Ok(ReleaseOutcome::AlreadyPresent(existing.clone()));
        }

        let release_uuid = existing
            .get("release_uuid")
            .and_then(Value::as_str)
            .ok_or_else(|| EngineError::unexpected(&releases_endpoint, format!("release {version} has no release_uuid")))?;
        let mut updated = existing.clone();
        let mut artifacts = artifacts;
        artifacts.push(json!({
            "package_url": package_url,
            "platform": metadata.get("platform").cloned().unwrap_or(Value::Null),
            "architecture": architecture,
        }));
        if let Some(object) = updated.as_object_mut() {
            object.insert("artifacts".to_string(), Value::Array(artifacts));
        }

        info!(version, release_uuid, "adding package to existing release");
        let response = self
            .fetch(ApiRequest::put(self.session.customer_path(&format!("ybdb_release/{}", encode_path_segment(release_uuid))), updated))
            .await?;
        Ok(ReleaseOutcome::ArtifactAdded(response))
    }

    /// Start metadata extraction for a package and poll until it finishes or
    /// [`METADATA_WAIT`] runs out. Returns the last document observed.
    pub async fn extract_package_metadata(&self, package_url: &str) -> Result<Value, EngineError> {
        let endpoint = self.session.customer_path("ybdb_release/extract_metadata");
        let mut metadata = self.fetch(ApiRequest::post(&endpoint, json!({ "url": package_url }))).await?;
        let resource_uuid = metadata
            .get("resourceUUID")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| EngineError::ReleaseMetadataUnavailable {
                package_url: package_url.to_string(),
                last: metadata.clone(),
            })?;

        let resource_endpoint = format!("{endpoint}/{}", encode_path_segment(&resource_uuid));
        let started = Instant::now();
        while extraction_pending(&metadata) && started.elapsed() < METADATA_WAIT.timeout {
            metadata = self.fetch(ApiRequest::get(&resource_endpoint)).await?;
            debug!(resource_uuid = %resource_uuid, status = ?metadata.get("status"), "package metadata polled");
            if !extraction_pending(&metadata) {
                break;
            }
            sleep(METADATA_WAIT.poll_interval).await;
        }
        Ok(metadata)
    }
}

fn extraction_pending(metadata: &Value) -> bool {
    match metadata.get("status") {
        None => true,
        Some(status) => status.as_str() == Some("running"),
    }
}

fn release_parameters(metadata: &Value, package_url: &str) -> ParameterSet {
    let mut parameters = ParameterSet::new().with("package_url", package_url);
    for key in METADATA_KEYS {
        if let Some(value) = metadata.get(key) {
            parameters.insert(key, ParamValue::from_json(value));
        }
    }
    parameters
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Method;
    use yba_api::RequestInvoker;
    use yba_api::testing::ScriptedTransport;
    use yba_types::SessionContext;

    const EXTRACT: &str = "/api/v1/customers/c-1/ybdb_release/extract_metadata";
    const EXTRACT_RESOURCE: &str = "/api/v1/customers/c-1/ybdb_release/extract_metadata/m-1";
    const RELEASES: &str = "/api/v1/customers/c-1/ybdb_release";
    const PACKAGE: &str = "https://downloads.example.com/yugabyte-2024.2.0.0-b145-linux-aarch64.tar.gz";

    fn metadata(architecture: &str) -> Value {
        json!({
            "status": "success",
            "version": "2024.2.0.0-b145",
            "yb_type": "YBDB",
            "platform": "LINUX",
            "architecture": architecture,
            "release_type": "STS",
            "release_date_msecs": 1_733_000_000_000i64
        })
    }

    fn scripted(architecture: &str) -> ScriptedTransport {
        let transport = ScriptedTransport::new();
        transport.on(Method::POST, EXTRACT, 200, json!({ "resourceUUID": "m-1" }));
        transport.on(Method::GET, EXTRACT_RESOURCE, 200, json!({ "status": "running" }));
        transport.on(Method::GET, EXTRACT_RESOURCE, 200, metadata(architecture));
        transport
    }

    fn session() -> SessionContext {
        SessionContext::new("https://yba.test", "tok", "c-1")
    }

    #[tokio::test(start_paused = true)]
    async fn new_versions_are_created_from_the_template() {
        let transport = scripted("aarch64");
        transport.on(Method::GET, RELEASES, 200, json!([]));
        transport.on(Method::POST, RELEASES, 200, json!({ "resourceUUID": "rel-1" }));
        let invoker = RequestInvoker::new(transport);
        let session = session();

        let outcome = ControlPlane::new(&invoker, &session).create_release(PACKAGE).await.expect("release created");

        assert_eq!(outcome, ReleaseOutcome::Created(json!({ "resourceUUID": "rel-1" })));
        assert_eq!(invoker.transport().count(Method::GET, EXTRACT_RESOURCE), 2);
        let body = invoker.transport().requests_to(Method::POST, RELEASES)[0].body.clone().expect("payload");
        assert_eq!(body["release_date_msecs"], json!(1_733_000_000_000i64));
        assert_eq!(body["artifacts"][0]["architecture"], json!("aarch64"));
        assert_eq!(body["artifacts"][0]["package_url"], json!(PACKAGE));
    }

    #[tokio::test(start_paused = true)]
    async fn existing_architecture_returns_the_release_untouched() {
        let transport = scripted("x86_64");
        let release = json!({
            "release_uuid": "rel-1",
            "version": "2024.2.0.0-b145",
            "artifacts": [{ "architecture": "x86_64", "platform": "LINUX", "package_url": "https://a" }]
        });
        transport.on(Method::GET, RELEASES, 200, json!([release.clone()]));
        let invoker = RequestInvoker::new(transport);
        let session = session();

        let outcome = ControlPlane::new(&invoker, &session).create_release(PACKAGE).await.expect("release found");

        assert_eq!(outcome, ReleaseOutcome::AlreadyPresent(release));
        assert_eq!(invoker.transport().count(Method::PUT, "/api/v1/customers/c-1/ybdb_release/rel-1"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn new_architecture_is_appended_to_the_existing_release() {
        let transport = scripted("aarch64");
        transport.on(
            Method::GET,
            RELEASES,
            200,
            json!([{
                "release_uuid": "rel-1",
                "version": "2024.2.0.0-b145",
                "artifacts": [{ "architecture": "x86_64", "platform": "LINUX", "package_url": "https://a" }]
            }]),
        );
        transport.on(Method::PUT, "/api/v1/customers/c-1/ybdb_release/rel-1", 200, json!({ "success": true }));
        let invoker = RequestInvoker::new(transport);
        let session = session();

        let outcome = ControlPlane::new(&invoker, &session).create_release(PACKAGE).await.expect("artifact added");

        assert!(matches!(outcome, ReleaseOutcome::ArtifactAdded(_)));
        let body = invoker.transport().requests_to(Method::PUT, "/api/v1/customers/c-1/ybdb_release/rel-1")[0]
            .body
            .clone()
            .expect("payload");
        let artifacts = body["artifacts"].as_array().expect("artifacts");
        assert_eq!(artifacts.len(), 2);
        assert_eq!(artifacts[1]["architecture"], json!("aarch64"));
    }

    #[tokio::test(start_paused = true)]
    async fn extraction_that_never_finishes_is_reported() {
        let transport = ScriptedTransport::new();
        transport.on(Method::POST, EXTRACT, 200, json!({ "resourceUUID": "m-1" }));
        transport.on(Method::GET, EXTRACT_RESOURCE, 200, json!({ "status": "running" }));
        let invoker = RequestInvoker::new(transport);
        let session = session();
        let started = Instant::now();

        let error = ControlPlane::new(&invoker, &session).create_release(PACKAGE).await.expect_err("no metadata");

        assert!(matches!(error, EngineError::ReleaseMetadataUnavailable { .. }), "{error:?}");
        assert!(started.elapsed() >= METADATA_WAIT.timeout);
        assert_eq!(invoker.transport().count(Method::GET, RELEASES), 0);
    }
}
