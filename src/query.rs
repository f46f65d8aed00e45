//! Question answering against the SUSI chat service.

use async_trait::async_trait;
use hark_core::LoginCredentials;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const DEFAULT_ENDPOINT: &str = "https://api.susi.ai/susi/chat.json";
pub const LOGIN_ENDPOINT: &str = "https://api.susi.ai/aaa/login.json";
pub const LOCATION_ENDPOINT: &str = "http://ip-api.com/json";

#[derive(Debug, Error)]
pub enum QueryError {
    /// The service could not be reached or did not answer in time
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("API request failed: {0}")]
    Api(String),

    #[error("invalid reply: {0}")]
    InvalidReply(String),
}

impl QueryError {
    pub fn is_connection(&self) -> bool {
        matches!(self, QueryError::Connection(_))
    }
}

impl From<reqwest::Error> for QueryError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() || e.is_connect() || e.is_request() {
            QueryError::Connection(e.to_string())
        } else if e.is_decode() {
            QueryError::InvalidReply(e.to_string())
        } else {
            QueryError::Api(e.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, QueryError>;

/// Tabular part of a reply. Rows hold cells in header order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Table {
    pub head: Vec<String>,
    pub data: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Entity {
    pub title: String,
    pub description: String,
    pub link: String,
}

/// List of feed entries. `count` is how many the service wants presented.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Feed {
    pub entities: Vec<Entity>,
    pub count: usize,
}

/// A structured answer. Every part is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Reply {
    pub answer: Option<String>,
    pub table: Option<Table>,
    pub feed: Option<Feed>,
}

/// Trait for question-answering backends.
#[async_trait]
pub trait QueryClient: Send + Sync {
    async fn ask(&self, text: &str) -> Result<Reply>;
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Location {
    #[serde(rename = "lat")]
    pub latitude: f64,
    #[serde(rename = "lon")]
    pub longitude: f64,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(default)]
    accepted: bool,
    access_token: Option<String>,
    message: Option<String>,
}

/// Client for the SUSI chat API.
///
/// Anonymous by default; `sign_in` and `locate` enrich later queries with an
/// access token and coordinates.
pub struct SusiClient {
    client: reqwest::Client,
    endpoint: String,
    access_token: Option<String>,
    location: Option<Location>,
}

impl SusiClient {
    pub fn new(client: reqwest::Client, endpoint: Option<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            access_token: None,
            location: None,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn is_signed_in(&self) -> bool {
        self.access_token.is_some()
    }

    pub fn location(&self) -> Option<Location> {
        self.location
    }

    /// Exchange account credentials for an access token.
    pub async fn sign_in(&mut self, login: &LoginCredentials) -> Result<()> {
        let response = self
            .client
            .get(LOGIN_ENDPOINT)
            .query(&[
                ("type", "access-token"),
                ("login", login.email.as_str()),
                ("password", login.password.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(QueryError::Api(format!("sign in failed with {}", status)));
        }

        let body: LoginResponse = response.json().await?;
        match (body.accepted, body.access_token) {
            (true, Some(token)) => {
                info!(email = %login.email, "signed in");
                self.access_token = Some(token);
                Ok(())
            }
            _ => Err(QueryError::Api(
                body.message
                    .unwrap_or_else(|| "sign in rejected".to_string()),
            )),
        }
    }

    /// Look up approximate coordinates from the public IP address.
    pub async fn locate(&mut self) -> Result<Location> {
        let location: Location = self
            .client
            .get(LOCATION_ENDPOINT)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        debug!(
            latitude = location.latitude,
            longitude = location.longitude,
            "location detected"
        );
        self.location = Some(location);
        Ok(location)
    }
}

#[async_trait]
impl QueryClient for SusiClient {
    async fn ask(&self, text: &str) -> Result<Reply> {
        let mut params = vec![("q", text.to_string())];
        if let Some(location) = self.location {
            params.push(("latitude", location.latitude.to_string()));
            params.push(("longitude", location.longitude.to_string()));
        }
        if let Some(token) = &self.access_token {
            params.push(("access_token", token.clone()));
        }

        debug!(endpoint = %self.endpoint, query = text, "sending query");
        let response = self.client.get(&self.endpoint).query(&params).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "query service returned an error");
            return Err(QueryError::Api(format!("{}: {}", status, body)));
        }

        let body: Value = response.json().await?;
        parse_reply(&body)
    }
}

/// Extract the structured reply from a chat response.
///
/// Only the first answer is used. Table rows and feed entries are read from
/// the answer's `data` array, keyed by the fields named in the action.
pub fn parse_reply(body: &Value) -> Result<Reply> {
    let answers = body
        .get("answers")
        .and_then(Value::as_array)
        .ok_or_else(|| QueryError::InvalidReply("missing answers".to_string()))?;

    let mut reply = Reply::default();
    let Some(first) = answers.first() else {
        return Ok(reply);
    };

    let data: &[Value] = first
        .get("data")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    let actions = first
        .get("actions")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    for action in actions {
        match action.get("type").and_then(Value::as_str) {
            Some("answer") if reply.answer.is_none() => {
                reply.answer = action
                    .get("expression")
                    .and_then(Value::as_str)
                    .map(str::to_string);
            }
            Some("table") => reply.table = Some(parse_table(action, data)?),
            Some("rss") => reply.feed = Some(parse_feed(action, data)),
            Some(other) => debug!(action = other, "ignoring reply action"),
            None => {}
        }
    }

    Ok(reply)
}

fn parse_table(action: &Value, data: &[Value]) -> Result<Table> {
    let columns = action
        .get("columns")
        .and_then(Value::as_object)
        .ok_or_else(|| QueryError::InvalidReply("table action without columns".to_string()))?;

    let head = columns.values().map(cell_text).collect();
    let data = data
        .iter()
        .map(|row| columns.keys().map(|key| cell_text(&row[key])).collect())
        .collect();

    Ok(Table { head, data })
}

fn parse_feed(action: &Value, data: &[Value]) -> Feed {
    let field = |name: &str| {
        action
            .get(name)
            .and_then(Value::as_str)
            .unwrap_or(name)
            .to_string()
    };
    let (title, description, link) = (field("title"), field("description"), field("link"));

    let entities: Vec<Entity> = data
        .iter()
        .map(|item| Entity {
            title: cell_text(&item[title.as_str()]),
            description: cell_text(&item[description.as_str()]),
            link: cell_text(&item[link.as_str()]),
        })
        .collect();

    let count = action
        .get("count")
        .and_then(Value::as_i64)
        .and_then(|count| usize::try_from(count).ok())
        .unwrap_or(entities.len());

    Feed { entities, count }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
