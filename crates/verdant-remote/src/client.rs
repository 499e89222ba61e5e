// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use reqwest::StatusCode;
use reqwest::blocking::{Client as HttpClient, RequestBuilder, Response};
use reqwest::header::{CONTENT_RANGE, HeaderMap};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use url::Url;
use verdant_app::IdentityProvider;

use crate::{Backend, Query, Rows};

/// Blocking client for a Supabase project: PostgREST under `/rest/v1` and the
/// auth user endpoint under `/auth/v1`.
#[derive(Debug, Clone)]
pub struct RestClient {
    base_url: String,
    api_key: String,
    access_token: Option<String>,
    timeout: Duration,
    http: HttpClient,
}

impl RestClient {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_owned();
        if base_url.is_empty() {
            bail!("remote.url must not be empty");
        }
        Url::parse(&base_url).with_context(|| format!("remote.url {base_url:?} is not a URL"))?;
        if api_key.trim().is_empty() {
            bail!("remote.api_key must not be empty");
        }

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            base_url,
            api_key: api_key.trim().to_owned(),
            access_token: None,
            timeout,
            http,
        })
    }

    /// Signed-in session token; without one every request runs as `anon`.
    pub fn with_access_token(mut self, token: Option<&str>) -> Self {
        self.access_token = token
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(str::to_owned);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn has_session(&self) -> bool {
        self.access_token.is_some()
    }

    pub fn table_url(&self, query: &Query) -> Result<Url> {
        let mut url = Url::parse(&format!("{}/rest/v1/{}", self.base_url, query.table()))
            .with_context(|| format!("build URL for table {}", query.table()))?;
        url.query_pairs_mut().extend_pairs(query.to_params());
        Ok(url)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        let bearer = self.access_token.as_deref().unwrap_or(&self.api_key);
        builder
            .header("apikey", &self.api_key)
            .bearer_auth(bearer)
    }

    fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let response = self
            .authorized(builder)
            .send()
            .map_err(|error| connection_error(&self.base_url, error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(clean_error_response(status, &body));
        }
        Ok(response)
    }
}

impl Backend for RestClient {
    fn select(&self, query: &Query) -> Result<Rows> {
        let url = self.table_url(query)?;
        tracing::debug!(table = query.table(), url = %url, "select");

        let mut request = self.http.get(url).header("Accept", "application/json");
        if query.wants_count() {
            request = request.header("Prefer", "count=exact");
        }
        let response = self.send(request)?;

        let total = if query.wants_count() {
            parse_total(response.headers())?
        } else {
            None
        };
        let rows: Vec<Value> = response
            .json()
            .with_context(|| format!("decode {} rows", query.table()))?;
        Ok(Rows { rows, total })
    }

    fn insert(&self, table: &str, row: &Value) -> Result<()> {
        tracing::debug!(table, "insert");
        let request = self
            .http
            .post(format!("{}/rest/v1/{table}", self.base_url))
            .header("Prefer", "return=minimal")
            .json(row);
        self.send(request)?;
        Ok(())
    }
}

impl IdentityProvider for RestClient {
    fn authenticated_user_id(&self) -> Result<Option<String>> {
        if self.access_token.is_none() {
            return Ok(None);
        }
        let response = self.send(self.http.get(format!("{}/auth/v1/user", self.base_url)))?;
        let user: AuthUser = response.json().context("decode auth user")?;
        Ok(user.id.filter(|id| !id.is_empty()))
    }
}

/// Total from a `Content-Range: 0-29/45` (or `*/0`) header.
fn parse_total(headers: &HeaderMap) -> Result<Option<usize>> {
    let Some(raw) = headers.get(CONTENT_RANGE) else {
        return Ok(None);
    };
    let raw = raw
        .to_str()
        .context("Content-Range header is not valid text")?;
    let Some((_, total)) = raw.rsplit_once('/') else {
        bail!("malformed Content-Range header {raw:?}");
    };
    if total == "*" {
        return Ok(None);
    }
    let total = total
        .parse()
        .with_context(|| format!("malformed Content-Range total in {raw:?}"))?;
    Ok(Some(total))
}

fn connection_error(base_url: &str, error: reqwest::Error) -> anyhow::Error {
    anyhow!(
        "cannot reach {} -- check [remote].url and your network connection ({})",
        base_url,
        error
    )
}

fn clean_error_response(status: StatusCode, body: &str) -> anyhow::Error {
    if let Ok(parsed) = serde_json::from_str::<PostgrestError>(body)
        && let Some(message) = parsed.message.or(parsed.msg)
        && !message.is_empty()
    {
        return match parsed.code {
            Some(code) if !code.is_empty() => {
                anyhow!("server error ({}): {} [{}]", status.as_u16(), message, code)
            }
            _ => anyhow!("server error ({}): {}", status.as_u16(), message),
        };
    }

    if body.len() < 100 && !body.contains('{') && !body.trim().is_empty() {
        return anyhow!("server error ({}): {}", status.as_u16(), body.trim());
    }

    anyhow!("server returned {}", status.as_u16())
}

#[derive(Debug, Deserialize)]
struct PostgrestError {
    message: Option<String>,
    msg: Option<String>,
    code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::{RestClient, clean_error_response, parse_total};
    use crate::{Direction, Query};
    use anyhow::Result;
    use reqwest::StatusCode;
    use reqwest::header::{CONTENT_RANGE, HeaderMap, HeaderValue};
    use std::time::Duration;

    #[test]
    fn new_rejects_missing_url_and_key() {
        assert!(RestClient::new("", "key", Duration::from_secs(1)).is_err());
        assert!(RestClient::new("not a url", "key", Duration::from_secs(1)).is_err());
        let error = RestClient::new("https://demo.supabase.co", " ", Duration::from_secs(1))
            .expect_err("blank key should fail");
        assert!(error.to_string().contains("api_key"));
    }

    #[test]
    fn table_url_encodes_filters() -> Result<()> {
        let client = RestClient::new("https://demo.supabase.co/", "anon", Duration::from_secs(1))?;
        assert_eq!(client.base_url(), "https://demo.supabase.co");

        let query = Query::new("remedies")
            .select(&["id", "name"])
            .contains_any(&["name", "description"], "gin")
            .order("name", Direction::Ascending);
        let url = client.table_url(&query)?;
        assert_eq!(url.path(), "/rest/v1/remedies");
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();
        assert!(pairs.contains(&(
            "or".to_owned(),
            "(name.ilike.*gin*,description.ilike.*gin*)".to_owned()
        )));
        Ok(())
    }

    #[test]
    fn access_token_is_trimmed_and_blank_ignored() -> Result<()> {
        let client = RestClient::new("https://demo.supabase.co", "anon", Duration::from_secs(1))?
            .with_access_token(Some("  "));
        assert!(!client.has_session());
        let client = client.with_access_token(Some(" jwt "));
        assert!(client.has_session());
        Ok(())
    }

    #[test]
    fn content_range_totals() -> Result<()> {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_total(&headers)?, None);

        headers.insert(CONTENT_RANGE, HeaderValue::from_static("0-29/45"));
        assert_eq!(parse_total(&headers)?, Some(45));

        headers.insert(CONTENT_RANGE, HeaderValue::from_static("*/0"));
        assert_eq!(parse_total(&headers)?, Some(0));

        headers.insert(CONTENT_RANGE, HeaderValue::from_static("0-9/*"));
        assert_eq!(parse_total(&headers)?, None);

        headers.insert(CONTENT_RANGE, HeaderValue::from_static("garbage"));
        assert!(parse_total(&headers).is_err());
        Ok(())
    }

    #[test]
    fn postgrest_error_bodies_are_summarized() {
        let error = clean_error_response(
            StatusCode::CONFLICT,
            r#"{"code":"23505","details":null,"hint":null,"message":"duplicate key value violates unique constraint"}"#,
        );
        assert_eq!(
            error.to_string(),
            "server error (409): duplicate key value violates unique constraint [23505]"
        );

        let plain = clean_error_response(StatusCode::BAD_GATEWAY, "upstream down");
        assert_eq!(plain.to_string(), "server error (502): upstream down");

        let opaque = clean_error_response(StatusCode::INTERNAL_SERVER_ERROR, "{garbled");
        assert_eq!(opaque.to_string(), "server returned 500");
    }
}
