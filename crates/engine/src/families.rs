//! Built-in template families.
//!
//! Each family pairs an embedded default template with the keys it needs and
//! the defaults it can fill in. Callers may point a family at an on-disk
//! template instead; the same key checks apply, and a custom template that
//! uses further placeholders is still caught at render time.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde_json::Value;
use tracing::debug;
use yba_types::ParameterSet;

use crate::credentials::DEFAULT_DATABASE_PASSWORD;
use crate::error::EngineError;
use crate::templates::Template;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateFamily {
    ProviderKubernetes,
    ProviderAws,
    BackupStorageAwsKey,
    BackupStorageAwsIam,
    BackupStorageGcpKey,
    BackupStorageGcpIam,
    Release,
    UniverseKubernetes,
}

impl TemplateFamily {
    pub const ALL: [Self; 8] = [
        Self::ProviderKubernetes,
        Self::ProviderAws,
        Self::BackupStorageAwsKey,
        Self::BackupStorageAwsIam,
        Self::BackupStorageGcpKey,
        Self::BackupStorageGcpIam,
        Self::Release,
        Self::UniverseKubernetes,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::ProviderKubernetes => "provider_k8s",
            Self::ProviderAws => "provider_aws",
            Self::BackupStorageAwsKey => "backup_storage_aws_key",
            Self::BackupStorageAwsIam => "backup_storage_aws_iam",
            Self::BackupStorageGcpKey => "backup_storage_gcp_key",
            Self::BackupStorageGcpIam => "backup_storage_gcp_iam",
            Self::Release => "release",
            Self::UniverseKubernetes => "universe_k8s",
        }
    }

    /// Keys the caller must supply; defaults never cover them.
    pub fn required_keys(self) -> &'static [&'static str] {
        match self {
            Self::ProviderKubernetes => &[
                "name",
                "image_registry",
                "cloud_provider",
                "pull_secret",
                "pull_secret_name",
                "region_code",
                "region_name",
                "zone_code",
                "zone_name",
            ],
            Self::ProviderAws => &["name", "region_code", "zone_code", "vpc_id", "subnet_id", "security_group_id"],
            Self::BackupStorageAwsKey => &["configuration_name", "bucket_name", "access_key_id", "access_key_secret"],
            Self::BackupStorageAwsIam | Self::BackupStorageGcpIam => &["configuration_name", "bucket_name"],
            Self::BackupStorageGcpKey => &["configuration_name", "bucket_name", "access_key_secret_json"],
            Self::Release => &[
                "version",
                "yb_type",
                "release_type",
                "release_date_msecs",
                "platform",
                "architecture",
                "package_url",
            ],
            Self::UniverseKubernetes => &["universe_name", "provider_uuid", "region_list", "yb_version"],
        }
    }

    /// Values used for keys the caller leaves out.
    pub fn defaults(self) -> ParameterSet {
        match self {
            Self::ProviderKubernetes => ParameterSet::new().with("code", "kubernetes"),
            Self::ProviderAws => ParameterSet::new().with("arch", "x86_64").with("ssh_port", 22i64),
            Self::UniverseKubernetes => ParameterSet::new()
                .with("num_nodes", 3i64)
                .with("replication_factor", 3i64)
                .with("volume_size", 50i64)
                .with("num_volumes", 1i64)
                .with("storage_class", "standard")
                .with("master_cpus", 2i64)
                .with("master_memory", 4i64)
                .with("tserver_cpus", 2i64)
                .with("tserver_memory", 4i64)
                .with("ysql_password", DEFAULT_DATABASE_PASSWORD)
                .with("ycql_password", DEFAULT_DATABASE_PASSWORD)
                .with("arch", "x86_64"),
            _ => ParameterSet::new(),
        }
    }

    /// Every key the family understands, required first.
    pub fn known_keys(self) -> Vec<String> {
        let mut keys: Vec<String> = self.required_keys().iter().map(|key| key.to_string()).collect();
        keys.extend(self.defaults().keys().map(str::to_string));
        keys
    }

    pub fn builtin_source(self) -> &'static str {
        match self {
            Self::ProviderKubernetes => include_str!("../templates/provider_k8s.json"),
            Self::ProviderAws => include_str!("../templates/provider_aws.json"),
            Self::BackupStorageAwsKey => include_str!("../templates/backup_storage_aws_key.json"),
            Self::BackupStorageAwsIam => include_str!("../templates/backup_storage_aws_iam.json"),
            Self::BackupStorageGcpKey => include_str!("../templates/backup_storage_gcp_key.json"),
            Self::BackupStorageGcpIam => include_str!("../templates/backup_storage_gcp_iam.json"),
            Self::Release => include_str!("../templates/release.json"),
            Self::UniverseKubernetes => include_str!("../templates/universe_k8s.json"),
        }
    }

    /// Merge `parameters` over the family defaults and check required keys.
    pub fn prepare(self, parameters: &ParameterSet) -> Result<ParameterSet, EngineError> {
        let mut merged = self.defaults();
        merged.merge(parameters.clone());

        let missing = self
            .required_keys()
            .iter()
            .filter(|key| !merged.contains_key(key))
            .map(|key| key.to_string())
            .collect::<Vec<_>>();
        if !missing.is_empty() {
            return Err(EngineError::MissingParameters {
                family: self.name().to_string(),
                names: missing,
            });
        }
        Ok(merged)
    }
}

impl fmt::Display for TemplateFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TemplateFamily {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|family| family.name() == value).ok_or_else(|| {
            let names = Self::ALL.iter().map(|family| family.name()).collect::<Vec<_>>();
            format!("unknown template family '{value}' (expected one of: {})", names.join(", "))
        })
    }
}

/// Where a family's template text comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TemplateSource {
    #[default]
    Builtin,
    File(PathBuf),
}

impl TemplateSource {
    pub fn from_path(path: Option<PathBuf>) -> Self {
        path.map(Self::File).unwrap_or_default()
    }

    /// Load the template; files are read fresh on every call.
    pub fn load(&self, family: TemplateFamily) -> Result<Template, EngineError> {
        let template = match self {
            Self::Builtin => Template::parse(family.name(), family.builtin_source())?,
            Self::File(path) => Template::load(path)?,
        };
        Ok(template)
    }
}

/// Render a family's template with defaults filled in.
pub fn render_family(family: TemplateFamily, source: &TemplateSource, parameters: &ParameterSet) -> Result<Value, EngineError> {
    let prepared = family.prepare(parameters)?;
    let template = source.load(family)?;
    debug!(family = family.name(), template = template.name(), parameters = prepared.len(), "rendering template");
    Ok(template.render(&prepared)?)
}
