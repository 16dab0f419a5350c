//! # YBA Engine
//!
//! Workflows built on top of the request invoker: rendering request payloads
//! from templates, provisioning providers, backup storage, releases and
//! universes, and cloning an existing universe with selective overrides.
//!
//! ## Key Features
//!
//! - **Template Substitution**: `$name` placeholders rendered from a typed
//!   [`ParameterSet`](yba_types::ParameterSet), with numbers and booleans
//!   written unquoted and raw fragments injected verbatim
//! - **Template Families**: built-in payload templates with required keys and
//!   defaults, overridable by on-disk templates
//! - **Provisioning**: providers, backup storage, releases and universes
//! - **Replication**: resolve, transform, validate, then submit or stop short
//!
//! ## Usage
//!
//! ```rust
//! use yba_engine::Template;
//! use yba_types::ParameterSet;
//!
//! let template = Template::parse("storage", r#"{ "volumeSize": "$volume_size", "class": "$storage_class" }"#)?;
//! let payload = template.render(&ParameterSet::new().with("volume_size", 5i64).with("storage_class", "standard"))?;
//! assert_eq!(payload["volumeSize"], 5);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! - **`templates`**: scanner and renderer for `$`-placeholder templates
//! - **`families`**: built-in templates and their parameter schemas
//! - **`control_plane`**: the borrowed invoker/session handle workflows run on
//! - **`provisioning`**, **`release`**: templated creation paths
//! - **`replicate`**: the read-modify-validate-submit universe clone

pub mod control_plane;
pub mod credentials;
pub mod error;
pub mod families;
pub mod provisioning;
pub mod release;
pub mod replicate;
pub mod templates;

pub use control_plane::{ControlPlane, ResolvePolicy};
pub use credentials::{DEFAULT_DATABASE_PASSWORD, DatabaseCredentials};
pub use error::EngineError;
pub use families::{TemplateFamily, TemplateSource, render_family};
pub use provisioning::AwsAccessKey;
pub use release::{METADATA_WAIT, ReleaseOutcome};
pub use replicate::{NodeResources, ReplicationOutcome, UniverseOverrides, ValidatedConfig, transform_universe};
pub use templates::{RenderStage, SlotPosition, Template, TemplateError};
