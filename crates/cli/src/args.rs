use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use yba_api::WaitPolicy;
use yba_engine::TemplateFamily;

use crate::params::parse_assignment;

#[derive(Parser, Debug)]
#[command(name = "yba", version)]
#[command(about = "YugabyteDB Anywhere control-plane client", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// Base URL of the control plane, e.g. https://yba.example.com
    #[arg(long, env = "YBA_URL", global = true)]
    pub url: Option<String>,

    /// API token (X-AUTH-YW-API-TOKEN)
    #[arg(long, env = "YBA_API_TOKEN", global = true, hide_env_values = true)]
    pub api_token: Option<String>,

    /// Customer (tenant) UUID
    #[arg(long, env = "YBA_CUSTOMER_ID", global = true)]
    pub customer_id: Option<String>,

    /// Skip TLS certificate verification
    #[arg(long, env = "YBA_INSECURE", global = true, default_value_t = false)]
    pub insecure: bool,

    /// Timeout for each HTTP request, in seconds
    #[arg(long, global = true, default_value_t = 30)]
    pub request_timeout_secs: u64,
}

#[derive(Args, Debug, Clone)]
pub struct WaitArgs {
    /// Give up waiting for the task after this many seconds
    #[arg(long, default_value_t = 600)]
    pub timeout_secs: u64,

    /// Seconds between task status polls
    #[arg(long, default_value_t = 2)]
    pub poll_interval_secs: u64,
}

impl WaitArgs {
    pub fn policy(&self) -> WaitPolicy {
        WaitPolicy::new(Duration::from_secs(self.timeout_secs), Duration::from_secs(self.poll_interval_secs.max(1)))
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct ParamArgs {
    /// Template parameter; numbers and booleans are typed automatically
    #[arg(long = "param", value_name = "KEY=VALUE", value_parser = parse_assignment)]
    pub params: Vec<(String, String)>,

    /// Template parameter written verbatim, e.g. a list: '"uuid-1","uuid-2"'
    #[arg(long = "raw", value_name = "KEY=JSON", value_parser = parse_assignment)]
    pub raw: Vec<(String, String)>,

    /// JSON object of parameters; --param and --raw take precedence
    #[arg(long)]
    pub params_file: Option<PathBuf>,

    /// Use this template file instead of the built-in one
    #[arg(long)]
    pub template: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Log in and print the API token and customer UUID
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "YBA_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Register the first administrator of a new instance
    Register {
        /// Instance purpose, e.g. dev or prod
        #[arg(long, default_value = "dev")]
        code: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "YBA_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Send an authenticated request
    Request {
        /// HTTP method
        #[arg(long, short = 'X', default_value = "GET")]
        method: String,
        /// Endpoint path, e.g. /api/v1/customers/<uuid>/universes
        endpoint: String,
        /// JSON request body
        #[arg(long, conflicts_with = "body_file")]
        body: Option<String>,
        /// File holding the JSON request body
        #[arg(long)]
        body_file: Option<PathBuf>,
        /// Wait for a task started by the request
        #[arg(long, default_value_t = false)]
        wait: bool,
        /// Print the request instead of sending it
        #[arg(long, default_value_t = false)]
        dry_run: bool,
        #[command(flatten)]
        wait_args: WaitArgs,
    },

    /// Inspect tasks
    Task {
        #[command(subcommand)]
        command: TaskCommand,
    },

    /// Render a built-in or custom template without calling the control plane
    Template {
        #[command(subcommand)]
        command: TemplateCommand,
    },

    /// Create cloud providers
    Provider {
        #[command(subcommand)]
        command: ProviderCommand,
    },

    /// Create backup storage configurations
    BackupStorage {
        #[command(subcommand)]
        command: BackupStorageCommand,
    },

    /// Register database releases
    Release {
        #[command(subcommand)]
        command: ReleaseCommand,
    },

    /// Create and replicate universes
    Universe {
        #[command(subcommand)]
        command: UniverseCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum TaskCommand {
    /// Print the current state of a task
    Show { task_id: String },
    /// Wait for a task to finish
    Wait {
        task_id: String,
        #[command(flatten)]
        wait_args: WaitArgs,
    },
}

#[derive(Subcommand, Debug)]
pub enum TemplateCommand {
    /// Print a family's required and default parameters
    Describe { family: TemplateFamily },
    /// Render a family's template to stdout
    Render {
        family: TemplateFamily,
        #[command(flatten)]
        params: ParamArgs,
    },
}

#[derive(Subcommand, Debug)]
pub enum ProviderCommand {
    /// Create a provider from a template family
    Create {
        #[arg(long, default_value = "provider_aws")]
        family: TemplateFamily,
        #[command(flatten)]
        params: ParamArgs,
        #[command(flatten)]
        wait_args: WaitArgs,
    },
    /// Create a provider for the Kubernetes cluster hosting the control plane
    CreateK8s {
        /// Do not fill settings from the control plane's own cluster
        #[arg(long, default_value_t = false)]
        no_suggested: bool,
        #[command(flatten)]
        params: ParamArgs,
        #[command(flatten)]
        wait_args: WaitArgs,
    },
}

#[derive(Subcommand, Debug)]
pub enum BackupStorageCommand {
    /// S3 bucket; uses the instance IAM role unless an access key is given
    Aws {
        #[arg(long)]
        configuration_name: String,
        #[arg(long)]
        bucket_name: String,
        #[arg(long, env = "AWS_ACCESS_KEY_ID", requires = "access_key_secret")]
        access_key_id: Option<String>,
        #[arg(long, env = "AWS_SECRET_ACCESS_KEY", hide_env_values = true, requires = "access_key_id")]
        access_key_secret: Option<String>,
    },
    /// GCS bucket; uses the instance IAM identity unless a key file is given
    Gcp {
        #[arg(long)]
        configuration_name: String,
        #[arg(long)]
        bucket_name: String,
        /// Service account key (JSON)
        #[arg(long)]
        credentials_file: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ReleaseCommand {
    /// Add a release (or an architecture to an existing one) from a package URL
    Create { package_url: String },
}

#[derive(Subcommand, Debug)]
pub enum UniverseCommand {
    /// Create a universe from the Kubernetes universe template
    Create {
        #[command(flatten)]
        params: ParamArgs,
        #[command(flatten)]
        wait_args: WaitArgs,
    },
    /// Clone an existing universe with a new name and sizing
    Replicate {
        /// Name of the universe to copy
        #[arg(long)]
        source: String,
        /// Name of the new universe
        #[arg(long)]
        name: String,
        #[arg(long, requires = "tserver_memory")]
        tserver_cpus: Option<f64>,
        #[arg(long, requires = "tserver_cpus")]
        tserver_memory: Option<f64>,
        #[arg(long, requires = "master_memory")]
        master_cpus: Option<f64>,
        #[arg(long, requires = "master_cpus")]
        master_memory: Option<f64>,
        /// Volume size per node, in GB
        #[arg(long)]
        volume_size: Option<u64>,
        #[arg(long, env = "YBA_YSQL_PASSWORD", hide_env_values = true)]
        ysql_password: Option<String>,
        #[arg(long, env = "YBA_YCQL_PASSWORD", hide_env_values = true)]
        ycql_password: Option<String>,
        /// Validate only; do not create the universe
        #[arg(long, default_value_t = false)]
        what_if: bool,
        /// Use the first universe with the source name instead of failing on duplicates
        #[arg(long, default_value_t = false)]
        first_match: bool,
        #[command(flatten)]
        wait_args: WaitArgs,
    },
}
