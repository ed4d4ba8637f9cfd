//! Startup helpers for the `chatify` terminal chat.
//!
//! Configuration comes from the environment (see [`ChatifyConfig::from_env`]).
//! A snapshot export is reused when present; otherwise the profile is
//! collected with `SPOTIFY_ACCESS_TOKEN` (and optionally
//! `SPOTIFY_REFRESH_TOKEN`, `SPOTIFY_TOKEN_EXPIRES_IN`).

use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

use crate::core::config::ChatifyConfig;
use crate::core::errors::ChatifyError;
use crate::knowledge::store::InitializeOutcome;
use crate::profile::auth::{Credential, OAuthRefresher};
use crate::profile::collector::{ProfileCollector, load_snapshot};
use crate::profile::records::ProfileSnapshot;
use crate::profile::spotify::SpotifyClient;
use crate::session::ChatifySession;

const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 3600;

const HELP: &str = "Commands: /analyze  /update  /clear  /forget  /quit";

/// Run the terminal chat.
///
/// # Returns
/// `ExitCode::SUCCESS` on `/quit` or end of input, `1` on startup failure.
#[must_use]
pub fn run() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Starting Chatify v{}", env!("CARGO_PKG_VERSION"));

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to create runtime: {e}");
            return ExitCode::from(1);
        }
    };

    if let Err(e) = rt.block_on(chat()) {
        error!("{e:#}");
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn credential_from_env() -> Option<Credential> {
    let access_token = std::env::var("SPOTIFY_ACCESS_TOKEN").ok()?;
    let refresh_token = std::env::var("SPOTIFY_REFRESH_TOKEN").ok();
    let lifetime = std::env::var("SPOTIFY_TOKEN_EXPIRES_IN")
        .ok()
        .and_then(|secs| secs.parse().ok())
        .unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
    Some(Credential::new(
        access_token,
        refresh_token,
        Duration::from_secs(lifetime),
    ))
}

fn stored_snapshot(config: &ChatifyConfig) -> Option<ProfileSnapshot> {
    let path = config.storage.snapshot_path.as_deref()?;
    match load_snapshot(path) {
        Ok(snapshot) => snapshot.filter(ProfileSnapshot::has_profile),
        Err(err) => {
            warn!(error = %err, "ignoring unreadable snapshot export, will refetch");
            None
        }
    }
}

async fn open_session(config: &ChatifyConfig) -> anyhow::Result<ChatifySession> {
    let snapshot = stored_snapshot(config);
    let mut provider = match credential_from_env() {
        Some(credential) => {
            let collector = ProfileCollector::new(
                Arc::new(SpotifyClient::new(&config.provider)?),
                Arc::new(OAuthRefresher::new(&config.provider)?),
                config.collector.clone(),
                config.privacy.name_redaction,
            );
            Some((collector, credential))
        }
        None => None,
    };

    let user_id = match (&snapshot, provider.as_mut()) {
        (Some(snapshot), _) => snapshot.user.id.clone(),
        (None, Some((collector, credential))) => {
            collector
                .fetch_user_id(credential)
                .await
                .context("fetching the account profile")?
        }
        (None, None) => bail!("no snapshot export found and SPOTIFY_ACCESS_TOKEN is not set"),
    };

    let mut session = ChatifySession::open(config, &user_id)
        .await
        .context("opening the knowledge store")?;
    if let Some((collector, credential)) = provider {
        session = session.with_collector(collector, credential);
    }

    match session.initialize(snapshot).await {
        Ok(InitializeOutcome::Created { documents }) => {
            info!(documents, "music library indexed");
        }
        Ok(InitializeOutcome::AlreadyPresent) => info!("music library already indexed"),
        Err(ChatifyError::AuthExpired) => bail!("credential expired, please re-authenticate"),
        Err(err) => return Err(err).context("indexing the music library"),
    }
    Ok(session)
}

async fn chat() -> anyhow::Result<()> {
    let config = ChatifyConfig::from_env().context("loading configuration")?;
    let mut session = open_session(&config).await?;
    let stdin = BufReader::new(tokio::io::stdin());
    repl(&mut session, stdin, &mut std::io::stdout()).await
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

async fn repl<R, W>(session: &mut ChatifySession, input: R, out: &mut W) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin + Send,
    W: Write + Send,
{
    writeln!(out, "Chatify is ready. {HELP}")?;
    let mut lines = input.lines();
    loop {
        write!(out, "> ")?;
        out.flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        if handle_line(session, line.trim(), out).await? == Flow::Quit {
            break;
        }
    }
    Ok(())
}

async fn handle_line<W>(
    session: &mut ChatifySession,
    line: &str,
    out: &mut W,
) -> anyhow::Result<Flow>
where
    W: Write + Send,
{
    match line {
        "" => {}
        "/quit" | "/exit" => return Ok(Flow::Quit),
        "/help" => writeln!(out, "{HELP}")?,
        "/clear" => {
            session.clear_history();
            writeln!(out, "Conversation cleared.")?;
        }
        "/analyze" => match session.analyze_profile().await {
            Ok(analysis) => writeln!(out, "{analysis}")?,
            Err(err) => writeln!(out, "Analysis failed: {err}")?,
        },
        "/update" => match session.update().await {
            Ok(_) => writeln!(out, "Music library refreshed.")?,
            Err(ChatifyError::AuthExpired) => {
                writeln!(out, "Your session expired, please re-authenticate.")?;
            }
            Err(err) => writeln!(out, "Update failed: {err}")?,
        },
        "/forget" => match session.forget().await {
            Ok(()) => {
                writeln!(out, "Your indexed data was deleted.")?;
                return Ok(Flow::Quit);
            }
            Err(err) => writeln!(out, "Could not delete your data: {err}")?,
        },
        question => {
            let reply = session.ask(question).await;
            if let Some(notice) = &reply.notice {
                writeln!(out, "({notice})")?;
            }
            writeln!(out, "Chatify: {}", reply.answer)?;
        }
    }
    Ok(Flow::Continue)
}
