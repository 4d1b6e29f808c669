use std::env;
use std::path::PathBuf;

use staffhq_core::{AppError, SubjectId};
use url::Url;

/// Runtime configuration for the headless console.
#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    /// REST API base URL.
    pub api_url: Url,
    /// Push channel websocket URL.
    pub push_url: Url,
    /// File backing the persisted local session state.
    pub state_file: PathBuf,
    /// Login credentials used when no persisted session survives hydration.
    pub login: Option<LoginCredentials>,
    /// Subject to impersonate after authenticating, for admin sessions.
    pub impersonate: Option<SubjectId>,
    /// Page size for notification fetches.
    pub page_size: u32,
}

/// Email/password pair sourced from the environment.
#[derive(Debug, Clone)]
pub struct LoginCredentials {
    pub email: String,
    pub password: String,
}

impl ConsoleConfig {
    pub fn load() -> Result<Self, AppError> {
        let api_url = parse_url_env("STAFFHQ_API_URL", "http://localhost:3001")?;
        let push_url = parse_url_env("STAFFHQ_PUSH_URL", "ws://localhost:3001/push")?;

        let state_file = env::var("STAFFHQ_STATE_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(".staffhq/session.json"));

        let login = match (env::var("STAFFHQ_EMAIL"), env::var("STAFFHQ_PASSWORD")) {
            (Ok(email), Ok(password)) if !email.trim().is_empty() => {
                Some(LoginCredentials { email, password })
            }
            _ => None,
        };

        let impersonate = env::var("STAFFHQ_IMPERSONATE")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(|value| SubjectId::parse(&value))
            .transpose()?;

        let page_size = env::var("STAFFHQ_PAGE_SIZE")
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or(20);

        Ok(Self {
            api_url,
            push_url,
            state_file,
            login,
            impersonate,
            page_size,
        })
    }
}

fn parse_url_env(name: &str, default: &str) -> Result<Url, AppError> {
    let value = env::var(name).unwrap_or_else(|_| default.to_owned());
    Url::parse(&value).map_err(|error| AppError::Validation(format!("invalid {name}: {error}")))
}
