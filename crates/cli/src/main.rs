mod args;
mod params;

use std::fs;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use reqwest::Method;
use serde_json::{Value, json};
use yba_api::invoker::API_TOKEN_HEADER;
use yba_api::{ApiError, ApiRequest, HttpSettings, HttpTransport, Registration, RequestInvoker};
use yba_engine::{
    AwsAccessKey, ControlPlane, DatabaseCredentials, EngineError, NodeResources, ReplicationOutcome, ResolvePolicy, TemplateSource,
    UniverseOverrides, render_family,
};
use yba_types::SessionContext;
use yba_util::urls::validate_base_url;
use yba_util::{join_url, redact_json, redact_sensitive};

use crate::args::{
    BackupStorageCommand, Cli, Command, ConnectionArgs, ProviderCommand, ReleaseCommand, TaskCommand, TemplateCommand, UniverseCommand,
};
use crate::params::collect_parameters;

const EXIT_GENERIC_FAILURE: u8 = 1;
const EXIT_VALIDATION_FAILURE: u8 = 2;
const EXIT_TASK_FAILURE: u8 = 3;
const EXIT_TRANSPORT_OR_AUTH_FAILURE: u8 = 4;
const EXIT_TASK_TIMEOUT: u8 = 5;

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {}", redact_sensitive(&format!("{error:#}")));
            if let Some(diagnostic) = diagnostic_of(&error) {
                let rendered = serde_json::to_string_pretty(&redact_json(diagnostic)).unwrap_or_default();
                eprintln!("{rendered}");
            }
            ExitCode::from(exit_code_of(&error))
        }
    }
}

fn init_tracing() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn run(cli: Cli) -> Result<()> {
    let connection = cli.connection;
    match cli.command {
        Command::Login { email, password } => {
            let base_url = base_url(&connection)?;
            let transport = transport(&connection)?;
            let login = yba_api::login(&transport, &base_url, &email, &password).await?;
            print_json(&json!({
                "apiToken": login.api_token,
                "customerUUID": login.customer_uuid,
                "userUUID": login.user_uuid,
            }))
        }
        Command::Register {
            code,
            name,
            email,
            password,
        } => {
            let base_url = base_url(&connection)?;
            let transport = transport(&connection)?;
            let registration = Registration {
                code,
                name,
                email,
                password,
            };
            let registered = yba_api::register(&transport, &base_url, &registration).await?;
            print_json(&json!({
                "apiToken": registered.api_token,
                "customerUUID": registered.customer_uuid,
                "userUUID": registered.user_uuid,
            }))
        }
        Command::Request {
            method,
            endpoint,
            body,
            body_file,
            wait,
            dry_run,
            wait_args,
        } => {
            let session = session(&connection)?;
            let method = parse_method(&method)?;
            let body = match (body, body_file) {
                (Some(text), _) => Some(serde_json::from_str::<Value>(&text).context("--body is not valid JSON")?),
                (None, Some(path)) => {
                    let text = fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display()))?;
                    Some(serde_json::from_str::<Value>(&text).with_context(|| format!("{} is not valid JSON", path.display()))?)
                }
                (None, None) => None,
            };

            if dry_run {
                let token_line = redact_sensitive(&format!("{API_TOKEN_HEADER}: {}", session.api_token()));
                let mut headers = serde_json::Map::new();
                headers.insert(
                    API_TOKEN_HEADER.to_string(),
                    json!(token_line.split_once(':').map(|(_, value)| value.trim()).unwrap_or_default()),
                );
                headers.insert("Content-Type".to_string(), json!("application/json"));
                return print_json(&json!({
                    "method": method.as_str(),
                    "url": join_url(session.base_url(), &endpoint),
                    "headers": headers,
                    "body": body,
                    "wait": wait,
                }));
            }

            let mut request = ApiRequest::new(method, endpoint);
            if let Some(body) = body {
                request = request.with_body(body);
            }
            if wait {
                request = request.wait(wait_args.policy());
            }
            let invoker = invoker(&connection)?;
            let outcome = invoker.invoke(&session, request).await?;
            print_json(&outcome.into_value())
        }
        Command::Task { command } => {
            let session = session(&connection)?;
            let invoker = invoker(&connection)?;
            let task = match command {
                TaskCommand::Show { task_id } => invoker.poll_task(&session, &task_id).await?,
                TaskCommand::Wait { task_id, wait_args } => invoker.wait_for_task(&session, &task_id, &wait_args.policy()).await?,
            };
            print_json(&task.document)
        }
        Command::Template { command } => match command {
            TemplateCommand::Describe { family } => print_json(&json!({
                "family": family.name(),
                "required": family.required_keys(),
                "defaults": family
                    .defaults()
                    .iter()
                    .map(|(key, value)| {
                        let text = value.to_bare_text();
                        (key.to_string(), serde_json::from_str(&text).unwrap_or(Value::String(text)))
                    })
                    .collect::<serde_json::Map<_, _>>(),
            })),
            TemplateCommand::Render { family, params } => {
                let parameters = collect_parameters(&params)?;
                let source = TemplateSource::from_path(params.template.clone());
                let payload = render_family(family, &source, &parameters)?;
                print_json(&payload)
            }
        },
        Command::Provider { command } => {
            let session = session(&connection)?;
            let invoker = invoker(&connection)?;
            let outcome = match command {
                ProviderCommand::Create {
                    family,
                    params,
                    wait_args,
                } => {
                    let plane = ControlPlane::new(&invoker, &session).with_wait_policy(wait_args.policy());
                    let parameters = collect_parameters(&params)?;
                    plane
                        .create_provider(family, &TemplateSource::from_path(params.template.clone()), &parameters)
                        .await?
                }
                ProviderCommand::CreateK8s {
                    no_suggested,
                    params,
                    wait_args,
                } => {
                    let plane = ControlPlane::new(&invoker, &session).with_wait_policy(wait_args.policy());
                    let parameters = collect_parameters(&params)?;
                    plane
                        .create_kubernetes_provider(&TemplateSource::from_path(params.template.clone()), &parameters, !no_suggested)
                        .await?
                }
            };
            print_json(&outcome.into_value())
        }
        Command::BackupStorage { command } => {
            let session = session(&connection)?;
            let invoker = invoker(&connection)?;
            let plane = ControlPlane::new(&invoker, &session);
            let created = match command {
                BackupStorageCommand::Aws {
                    configuration_name,
                    bucket_name,
                    access_key_id,
                    access_key_secret,
                } => {
                    let access_key = access_key_id.zip(access_key_secret).map(|(id, secret)| AwsAccessKey { id, secret });
                    plane
                        .create_backup_storage_aws(&configuration_name, &bucket_name, access_key.as_ref())
                        .await?
                }
                BackupStorageCommand::Gcp {
                    configuration_name,
                    bucket_name,
                    credentials_file,
                } => {
                    let credentials = credentials_file
                        .map(|path| fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display())))
                        .transpose()?;
                    plane
                        .create_backup_storage_gcp(&configuration_name, &bucket_name, credentials.as_deref())
                        .await?
                }
            };
            print_json(&created)
        }
        Command::Release {
            command: ReleaseCommand::Create { package_url },
        } => {
            let session = session(&connection)?;
            let invoker = invoker(&connection)?;
            let outcome = ControlPlane::new(&invoker, &session).create_release(&package_url).await?;
            print_json(&outcome.into_value())
        }
        Command::Universe { command } => {
            let session = session(&connection)?;
            let invoker = invoker(&connection)?;
            match command {
                UniverseCommand::Create { params, wait_args } => {
                    let plane = ControlPlane::new(&invoker, &session).with_wait_policy(wait_args.policy());
                    let parameters = collect_parameters(&params)?;
                    let outcome = plane
                        .create_universe(&TemplateSource::from_path(params.template.clone()), &parameters)
                        .await?;
                    print_json(&outcome.into_value())
                }
                UniverseCommand::Replicate {
                    source,
                    name,
                    tserver_cpus,
                    tserver_memory,
                    master_cpus,
                    master_memory,
                    volume_size,
                    ysql_password,
                    ycql_password,
                    what_if,
                    first_match,
                    wait_args,
                } => {
                    let mut overrides = UniverseOverrides::new(name);
                    if let (Some(cpus), Some(memory)) = (tserver_cpus, tserver_memory) {
                        overrides = overrides.with_tserver(NodeResources::new(cpus, memory));
                    }
                    if let (Some(cpus), Some(memory)) = (master_cpus, master_memory) {
                        overrides = overrides.with_master(NodeResources::new(cpus, memory));
                    }
                    if let Some(volume_size) = volume_size {
                        overrides = overrides.with_volume_size(volume_size);
                    }
                    let defaults = DatabaseCredentials::default();
                    let credentials = DatabaseCredentials {
                        ysql_password: ysql_password.unwrap_or(defaults.ysql_password),
                        ycql_password: ycql_password.unwrap_or(defaults.ycql_password),
                    };
                    if credentials.is_default() {
                        tracing::warn!("using the default database password; rotate it after creation");
                    }
                    overrides = overrides.with_credentials(credentials);

                    let policy = if first_match { ResolvePolicy::FirstMatch } else { ResolvePolicy::Unique };
                    let plane = ControlPlane::new(&invoker, &session)
                        .with_wait_policy(wait_args.policy())
                        .with_resolve_policy(policy);
                    match plane.replicate_universe(&source, &overrides, what_if).await? {
                        ReplicationOutcome::Validated(validated) => print_json(&json!({
                            "sourceUniverseUUID": validated.source_uuid,
                            "configuration": redact_json(&validated.configuration),
                            "validation": validated.validation,
                        })),
                        ReplicationOutcome::Submitted { task, .. } => print_json(&task.document),
                    }
                }
            }
        }
    }
}

fn base_url(connection: &ConnectionArgs) -> Result<String> {
    let url = connection.url.as_deref().context("missing --url (or YBA_URL)")?;
    validate_base_url(url).map_err(|reason| anyhow!("invalid --url '{url}': {reason}"))?;
    Ok(url.to_string())
}

fn session(connection: &ConnectionArgs) -> Result<SessionContext> {
    let base_url = base_url(connection)?;
    let api_token = connection
        .api_token
        .as_deref()
        .context("missing --api-token (or YBA_API_TOKEN); run `yba login` to obtain one")?;
    let customer_id = connection.customer_id.as_deref().context("missing --customer-id (or YBA_CUSTOMER_ID)")?;
    Ok(SessionContext::new(base_url, api_token, customer_id).with_tls_verification(!connection.insecure))
}

fn transport(connection: &ConnectionArgs) -> Result<HttpTransport> {
    let settings = HttpSettings {
        request_timeout: Duration::from_secs(connection.request_timeout_secs),
        verify_tls: !connection.insecure,
    };
    HttpTransport::new(&settings).context("failed to build HTTP client")
}

fn invoker(connection: &ConnectionArgs) -> Result<RequestInvoker<HttpTransport>> {
    Ok(RequestInvoker::new(transport(connection)?))
}

fn parse_method(method: &str) -> Result<Method> {
    match method.to_ascii_uppercase().as_str() {
        "GET" => Ok(Method::GET),
        "POST" => Ok(Method::POST),
        "PUT" => Ok(Method::PUT),
        "PATCH" => Ok(Method::PATCH),
        "DELETE" => Ok(Method::DELETE),
        other => Err(anyhow!("unsupported method: {other}")),
    }
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn api_error_of(error: &anyhow::Error) -> Option<&ApiError> {
    error.downcast_ref::<ApiError>().or_else(|| match error.downcast_ref::<EngineError>() {
        Some(EngineError::Api(api_error)) => Some(api_error),
        _ => None,
    })
}

fn diagnostic_of(error: &anyhow::Error) -> Option<&Value> {
    match error.downcast_ref::<EngineError>() {
        Some(engine_error) => engine_error.diagnostic(),
        None => api_error_of(error).and_then(ApiError::diagnostic),
    }
}

fn exit_code_of(error: &anyhow::Error) -> u8 {
    if matches!(error.downcast_ref::<EngineError>(), Some(EngineError::ValidationFailed { .. })) {
        return EXIT_VALIDATION_FAILURE;
    }
    match api_error_of(error) {
        Some(ApiError::TaskFailed { .. }) => EXIT_TASK_FAILURE,
        Some(ApiError::TaskTimeout { .. }) => EXIT_TASK_TIMEOUT,
        Some(ApiError::RequestFailed { status, .. }) if status.is_none_or(|code| code == 401 || code == 403) => {
            EXIT_TRANSPORT_OR_AUTH_FAILURE
        }
        _ => EXIT_GENERIC_FAILURE,
    }
}
