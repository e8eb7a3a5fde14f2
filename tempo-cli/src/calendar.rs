use anyhow::{Context, Result, bail};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};

use tempo_core::{CalendarEvent, CalendarProvider, CalendarStore, providers};

use crate::config::CalendarSection;

pub fn token_for(cfg: &CalendarSection, provider: CalendarProvider) -> Option<&str> {
    match provider {
        CalendarProvider::Google => cfg.google_token.as_deref(),
        CalendarProvider::Outlook => cfg.outlook_token.as_deref(),
    }
    .filter(|t| !t.trim().is_empty())
}

/// Bearer-authenticated GET of the provider's event list.
pub async fn fetch_events(
    client: &reqwest::Client,
    provider: CalendarProvider,
    token: &str,
) -> Result<Vec<CalendarEvent>> {
    let resp = client
        .get(provider.events_url())
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .header(CONTENT_TYPE, "application/json")
        .send()
        .await
        .with_context(|| format!("{} calendar request", provider.name()))?;

    let status = resp.status();
    if !status.is_success() {
        let txt = resp.text().await.unwrap_or_default();
        bail!("{} calendar error: {status} {txt}", provider.name());
    }

    let body = resp.text().await.context("read calendar response")?;
    providers::parse_events(provider, &body)
        .with_context(|| format!("parse {} events", provider.name()))
}

/// Fetch and ingest. Failures are logged and reported as `false`; stored events stay untouched.
pub async fn sync(
    client: &reqwest::Client,
    calendar: &mut CalendarStore,
    provider: CalendarProvider,
    token: &str,
) -> bool {
    match fetch_events(client, provider, token).await {
        Ok(events) => {
            calendar.ingest(provider, events);
            true
        }
        Err(e) => {
            tracing::warn!(provider = provider.name(), error = %e, "calendar sync failed");
            false
        }
    }
}
