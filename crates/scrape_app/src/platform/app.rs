use std::sync::Arc;

use scrape_core::{HealthResponse, Pagination, ScrapeRequest};
use scrape_engine::{
    optional_user, require_user, AuthError, JsonFileHistorySink, Orchestrator,
    StaticTokenIdentity,
};
use scrape_logging::{scrape_debug, scrape_info};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use super::config::AppConfig;

/// One request line on stdin.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Command {
    Scrape {
        urls: Vec<String>,
        #[serde(default)]
        authorization: Option<String>,
    },
    History {
        #[serde(default)]
        authorization: Option<String>,
        #[serde(default)]
        page: Option<usize>,
        #[serde(default)]
        page_size: Option<usize>,
    },
    ClearCache,
    Health,
    Whoami {
        #[serde(default)]
        authorization: Option<String>,
    },
}

/// One reply line on stdout; `status` follows HTTP conventions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reply {
    pub status: u16,
    pub body: Value,
}

impl Reply {
    fn ok(body: impl Serialize) -> Self {
        match serde_json::to_value(body) {
            Ok(body) => Self { status: 200, body },
            Err(err) => Self::error(500, err.to_string()),
        }
    }

    fn error(status: u16, detail: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({ "detail": detail.into() }),
        }
    }

    fn unauthorized(err: AuthError) -> Self {
        Self::error(401, err.to_string())
    }
}

pub struct Service {
    orchestrator: Orchestrator,
    identity: StaticTokenIdentity,
    config: AppConfig,
}

impl Service {
    pub fn new(config: AppConfig) -> Self {
        let history = Arc::new(JsonFileHistorySink::open(config.history_path.clone()));
        let orchestrator = Orchestrator::new(config.engine_config()).with_history(history);
        Self {
            orchestrator,
            identity: config.identity(),
            config,
        }
    }

    pub async fn handle_line(&self, line: &str) -> Reply {
        match serde_json::from_str::<Command>(line) {
            Ok(command) => self.handle(command).await,
            Err(err) => Reply::error(400, format!("invalid command: {err}")),
        }
    }

    pub async fn handle(&self, command: Command) -> Reply {
        match command {
            Command::Scrape {
                urls,
                authorization,
            } => {
                let caller = optional_user(&self.identity, authorization.as_deref());
                scrape_debug!(
                    "scrape request with {} url(s), caller {:?}",
                    urls.len(),
                    caller.as_ref().map(|u| u.id.as_str())
                );
                match self
                    .orchestrator
                    .scrape(&ScrapeRequest { urls }, caller.as_ref())
                    .await
                {
                    Ok(response) => Reply::ok(response),
                    Err(err) => Reply::error(400, err.to_string()),
                }
            }
            Command::History {
                authorization,
                page,
                page_size,
            } => {
                let user = match require_user(&self.identity, authorization.as_deref()) {
                    Ok(user) => user,
                    Err(err) => return Reply::unauthorized(err),
                };
                let pagination = match Pagination::with_max(
                    page.unwrap_or(1),
                    page_size.unwrap_or(self.config.default_page_size),
                    self.config.max_page_size,
                ) {
                    Ok(pagination) => pagination,
                    Err(err) => return Reply::error(422, err.to_string()),
                };
                let Some(sink) = self.orchestrator.history() else {
                    return Reply::error(503, "history is not configured");
                };
                match sink.read(&user.id, pagination).await {
                    Ok(page) => Reply::ok(page),
                    Err(err) => Reply::error(502, err.to_string()),
                }
            }
            Command::ClearCache => match self.orchestrator.clear_cache(self.config.environment) {
                Ok(()) => Reply::ok(json!({ "status": "Cache cleared" })),
                Err(err) => Reply::error(403, err.to_string()),
            },
            Command::Health => Reply::ok(HealthResponse::ok(env!("CARGO_PKG_VERSION"))),
            Command::Whoami { authorization } => {
                match optional_user(&self.identity, authorization.as_deref()) {
                    Some(user) => Reply::ok(json!({
                        "authenticated": true,
                        "user_id": user.id,
                        "email": user.email,
                    })),
                    None => Reply::ok(json!({ "authenticated": false })),
                }
            }
        }
    }
}

/// Serves newline-delimited JSON commands from stdin until EOF.
pub async fn run(service: Service) -> anyhow::Result<()> {
    scrape_info!(
        "scrape_app {} ready ({})",
        env!("CARGO_PKG_VERSION"),
        service.config.environment
    );
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let reply = service.handle_line(&line).await;
        let mut text = serde_json::to_string(&reply)?;
        text.push('\n');
        stdout.write_all(text.as_bytes()).await?;
        stdout.flush().await?;
    }

    scrape_info!("stdin closed; shutting down");
    Ok(())
}
