//! StaffHQ headless console: hydrates the session, authenticates if needed,
//! loads the notification page and follows the push channel until shutdown.

#![forbid(unsafe_code)]

mod console_config;
mod console_services;

use staffhq_application::{AccessDecision, AccessRequirement, RedirectTarget};
use staffhq_core::AppError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::console_config::ConsoleConfig;
use crate::console_services::build_console_state;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ConsoleConfig::load()?;
    let state = build_console_state(&config)?;

    let snapshot = state.session.hydrate().await?;
    if snapshot.is_authenticated() {
        info!("session restored from persisted credential");
    } else if let Some(login) = &config.login {
        state.session.login(&login.email, &login.password).await?;
        info!("logged in");
    } else {
        info!("no stored session; set STAFFHQ_EMAIL and STAFFHQ_PASSWORD to log in");
        return Ok(());
    }

    if let Some(target) = config.impersonate {
        let landing = state.impersonation.begin(target).await?;
        info!(%target, ?landing, "impersonation started");
    }

    // Guard check mirrors what every routed screen does before rendering.
    match state
        .access
        .require_authenticated(&AccessRequirement::authenticated())
    {
        AccessDecision::Allow => {}
        AccessDecision::Pending => {
            return Err(AppError::Internal(
                "session still pending after hydration".to_owned(),
            ));
        }
        AccessDecision::Redirect(target) => {
            let destination = match target {
                RedirectTarget::Login => "login",
                RedirectTarget::AdminLanding => "admin landing",
                RedirectTarget::StaffLanding => "staff landing",
                RedirectTarget::Unauthorized => "unauthorized",
            };
            warn!(%destination, "access denied; a UI shell would navigate now");
            return Ok(());
        }
    }

    state.feed.refresh(1, config.page_size).await?;
    info!(
        unread = state.feed.unread_in_page(),
        groups = state.feed.groups().len(),
        total_pages = state.feed.total_pages(),
        "notification page loaded"
    );

    tokio::select! {
        outcome = state.channel.run() => match outcome {
            Ok(()) => info!("push channel released after identity change"),
            Err(error) => warn!(%error, "push channel ended"),
        },
        result = tokio::signal::ctrl_c() => {
            if let Err(error) = result {
                warn!(%error, "shutdown signal unavailable");
            }
            info!("shutting down");
        }
    }

    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}
