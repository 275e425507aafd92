//! Command-line surface: argument definitions and command dispatch.
//!
//! Every command prints a single JSON document on stdout. Link output is
//! built from secret-free views only.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use serde_json::{Value, json};

use areaflow_app::ports::ServiceRepository;
use areaflow_app::services::service_link_service::{LinkOutcome, LinkRequest};
use areaflow_domain::error::{AreaFlowError, NotFoundError};
use areaflow_domain::id::{AreaId, ServiceId, UserId};
use areaflow_domain::service::Service;
use areaflow_domain::user::User;

use crate::wiring::App;

/// Maintenance tool for areaflow service links and execution records.
#[derive(Parser)]
#[command(name = "areaflowctl", version, about)]
pub struct Cli {
    /// Configuration file; defaults to `areaflow.toml` when present.
    #[arg(long, short, global = true, env = "AREAFLOW_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Register a catalog service.
    AddService {
        #[arg(long)]
        name: String,
        /// The service needs no linked account.
        #[arg(long)]
        no_auth: bool,
    },
    /// Register a platform user.
    AddUser {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: Option<String>,
    },
    /// Link a user's provider account, exchanging an authorization code.
    Link {
        #[command(flatten)]
        target: LinkTarget,
        /// Authorization code; without it the command only confirms an
        /// existing link.
        #[arg(long)]
        code: Option<String>,
        #[arg(long)]
        redirect_uri: Option<String>,
        #[arg(long)]
        code_verifier: Option<String>,
    },
    /// Exchange the stored refresh token for a new access token.
    Refresh(LinkTarget),
    /// Remove a link.
    Unlink(LinkTarget),
    /// Show a link without its tokens.
    ShowLink(LinkTarget),
    /// List every link of a user.
    Links {
        #[arg(long)]
        user: UserId,
    },
    /// Execution counts per status and mean duration.
    Stats {
        #[arg(long)]
        area: Option<AreaId>,
    },
    /// Delete finished executions older than the retention period.
    Cleanup {
        #[arg(long)]
        older_than_days: Option<u32>,
    },
    /// Executions running for longer than the threshold.
    LongRunning {
        #[arg(long)]
        threshold_minutes: Option<u32>,
    },
    /// Most recently created executions.
    Recent {
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Failed executions.
    Failed {
        #[arg(long)]
        area: Option<AreaId>,
    },
}

/// A `(user, service)` pair. The service is given by id or by name.
#[derive(Args)]
pub struct LinkTarget {
    #[arg(long)]
    pub user: UserId,
    #[arg(long)]
    pub service: String,
}

/// Run `command` against `app` and return its JSON output.
///
/// # Errors
///
/// Returns the service error of the command, or a serialization error.
pub async fn run(command: Command, app: &App) -> anyhow::Result<Value> {
    let output = match command {
        Command::AddService { name, no_auth } => {
            let service = Service::builder()
                .name(name)
                .requires_auth(!no_auth)
                .build()?;
            serde_json::to_value(app.services.create(service).await?)?
        }
        Command::AddUser { email, name } => {
            let user = User {
                id: UserId::new(),
                email,
                name,
            };
            serde_json::to_value(app.users.create(user).await?)?
        }
        Command::Link {
            target,
            code,
            redirect_uri,
            code_verifier,
        } => {
            let service_id = resolve_service(app, &target.service).await?;
            let mut request = LinkRequest::new(target.user, service_id);
            if let Some(code) = code {
                request = request.authorization_code(code);
            }
            if let Some(redirect_uri) = redirect_uri {
                request = request.redirect_uri(redirect_uri);
            }
            if let Some(verifier) = code_verifier {
                request = request.code_verifier(verifier);
            }
            let outcome = app.links.link(request).await?;
            let account = app.links.find_one(target.user, service_id).await?;
            json!({ "outcome": outcome_label(outcome), "account": account })
        }
        Command::Refresh(target) => {
            let service_id = resolve_service(app, &target.service).await?;
            let outcome = app.links.refresh(target.user, service_id).await?;
            json!({
                "account_id": outcome.account_id,
                "token_expires_at": outcome.token_expires_at,
                "rotated": outcome.rotated,
            })
        }
        Command::Unlink(target) => {
            let service_id = resolve_service(app, &target.service).await?;
            app.links.unlink(target.user, service_id).await?;
            json!({ "unlinked": true })
        }
        Command::ShowLink(target) => {
            let service_id = resolve_service(app, &target.service).await?;
            serde_json::to_value(app.links.find_one(target.user, service_id).await?)?
        }
        Command::Links { user } => serde_json::to_value(app.links.find_by_user(user).await?)?,
        Command::Stats { area } => {
            serde_json::to_value(app.stats.get_execution_stats(area).await?)?
        }
        Command::Cleanup { older_than_days } => {
            let deleted = app.executions.cleanup(older_than_days).await?;
            json!({ "deleted": deleted })
        }
        Command::LongRunning { threshold_minutes } => serde_json::to_value(
            app.executions
                .find_long_running_executions(threshold_minutes)
                .await?,
        )?,
        Command::Recent { limit } => {
            serde_json::to_value(app.executions.find_recent_executions(limit).await?)?
        }
        Command::Failed { area } => {
            serde_json::to_value(app.executions.find_failed_executions(area).await?)?
        }
    };
    Ok(output)
}

fn outcome_label(outcome: LinkOutcome) -> &'static str {
    match outcome {
        LinkOutcome::Created(_) => "created",
        LinkOutcome::Relinked(_) => "relinked",
        LinkOutcome::AlreadyLinked(_) => "already_linked",
    }
}

/// Accept a service id, or look the service up by name.
async fn resolve_service(app: &App, service: &str) -> Result<ServiceId, AreaFlowError> {
    let found = match service.parse::<ServiceId>() {
        Ok(id) => app.services.get_by_id(id).await?,
        Err(_) => app.services.get_by_name(service).await?,
    };
    found.map(|s| s.id).ok_or_else(|| {
        NotFoundError {
            entity: "Service",
            id: service.to_string(),
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use areaflow_adapter_storage_sqlite_sqlx::pool;
    use areaflow_app::ports::ProviderSet;
    use areaflow_domain::error::ErrorKind;
    use clap::CommandFactory;

    async fn app() -> App {
        let db = pool::Config {
            database_url: "sqlite::memory:".to_string(),
        }
        .build()
        .await
        .unwrap();
        App::from_database(&db, ProviderSet::new())
    }

    fn parse(args: &[&str]) -> Command {
        let mut argv = vec!["areaflowctl"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap().command
    }

    fn error_kind(err: &anyhow::Error) -> Option<ErrorKind> {
        err.downcast_ref::<AreaFlowError>().map(AreaFlowError::kind)
    }

    #[test]
    fn should_have_consistent_argument_definitions() {
        Cli::command().debug_assert();
    }

    #[test]
    fn should_parse_link_target() {
        let user = UserId::new();
        let Command::ShowLink(target) =
            parse(&["show-link", "--user", &user.to_string(), "--service", "google"])
        else {
            panic!("expected show-link");
        };
        assert_eq!(target.user, user);
        assert_eq!(target.service, "google");
    }

    #[test]
    fn should_reject_malformed_user_id() {
        let result = Cli::try_parse_from(["areaflowctl", "links", "--user", "nope"]);
        assert!(result.is_err());
    }

    #[test]
    fn should_leave_optional_parameters_unset() {
        assert!(matches!(
            parse(&["cleanup"]),
            Command::Cleanup {
                older_than_days: None
            }
        ));
        assert!(matches!(
            parse(&["recent", "--limit", "5"]),
            Command::Recent { limit: Some(5) }
        ));
    }

    #[tokio::test]
    async fn should_register_service_and_resolve_it_by_name_or_id() {
        let app = app().await;
        let output = run(parse(&["add-service", "--name", "google"]), &app)
            .await
            .unwrap();
        assert_eq!(output["requires_auth"], true);

        let by_name = resolve_service(&app, "google").await.unwrap();
        let by_id = resolve_service(&app, &by_name.to_string()).await.unwrap();
        assert_eq!(by_name, by_id);
    }

    #[tokio::test]
    async fn should_report_unknown_service_as_not_found() {
        let app = app().await;
        let err = resolve_service(&app, "spotify").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn should_refuse_link_without_code_when_not_linked() {
        let app = app().await;
        run(parse(&["add-service", "--name", "google"]), &app)
            .await
            .unwrap();
        let user = run(parse(&["add-user", "--email", "ada@example.com"]), &app)
            .await
            .unwrap();
        let user_id = user["id"].as_str().unwrap().to_string();

        let err = run(
            parse(&["link", "--user", &user_id, "--service", "google"]),
            &app,
        )
        .await
        .unwrap_err();
        assert_eq!(error_kind(&err), Some(ErrorKind::Conflict));
    }

    #[tokio::test]
    async fn should_report_unconfigured_provider_on_link_with_code() {
        let app = app().await;
        run(parse(&["add-service", "--name", "google"]), &app)
            .await
            .unwrap();
        let user = run(parse(&["add-user", "--email", "ada@example.com"]), &app)
            .await
            .unwrap();
        let user_id = user["id"].as_str().unwrap().to_string();

        let err = run(
            parse(&["link", "--user", &user_id, "--service", "google", "--code", "abc"]),
            &app,
        )
        .await
        .unwrap_err();
        assert_eq!(error_kind(&err), Some(ErrorKind::Provider));
    }

    #[tokio::test]
    async fn should_report_empty_stats_and_cleanup_on_fresh_database() {
        let app = app().await;
        let stats = run(parse(&["stats"]), &app).await.unwrap();
        assert_eq!(stats["total"], 0);
        assert!(stats["avg_execution_time_ms"].is_null());

        let cleanup = run(parse(&["cleanup", "--older-than-days", "1"]), &app)
            .await
            .unwrap();
        assert_eq!(cleanup["deleted"], 0);

        let recent = run(parse(&["recent"]), &app).await.unwrap();
        assert_eq!(recent, json!([]));
    }
}
