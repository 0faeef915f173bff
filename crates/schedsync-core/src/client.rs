use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ApiError;
use crate::gateway::ScheduleGateway;
use crate::model::{EscalationPolicy, Incident, IncidentQuery, Schedule};

pub const DEFAULT_API_URL: &str = "https://api.pagerduty.com";
const ACCEPT_V2: &str = "application/vnd.pagerduty+json;version=2";
const PAGE_LIMIT: usize = 100;

/// Blocking HTTP implementation of [`ScheduleGateway`] for the PagerDuty REST API.
#[derive(Debug, Clone)]
pub struct PagerDutyClient {
    http: Client,
    base_url: String,
}

impl PagerDutyClient {
    pub fn new(base_url: &str, token: &str) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Token token={}", token.trim()))
            .map_err(|err| ApiError::Transport(format!("invalid API token: {err}")))?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_V2));

        let http = Client::builder()
            .user_agent(concat!("schedsync/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, collection: &str, id: Option<&str>) -> String {
        match id {
            Some(id) => format!(
                "{}/{}/{}",
                self.base_url,
                collection,
                urlencoding::encode(id)
            ),
            None => format!("{}/{}", self.base_url, collection),
        }
    }

    fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = check_status(request.send()?)?;
        Ok(response.json()?)
    }
}

fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(decode_error(status, &body))
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<String>,
}

fn decode_error(status: StatusCode, body: &str) -> ApiError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => ApiError::status(status.as_u16(), envelope.error.message, envelope.error.errors),
        Err(_) => {
            let message = if body.trim().is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("unexpected status")
                    .to_string()
            } else {
                body.trim().to_string()
            };
            ApiError::status(status.as_u16(), message, Vec::new())
        }
    }
}

#[derive(Serialize)]
struct ScheduleEnvelopeOut<'a> {
    schedule: &'a Schedule,
}

#[derive(Deserialize)]
struct ScheduleEnvelope {
    schedule: Schedule,
}

#[derive(Serialize)]
struct PolicyEnvelopeOut<'a> {
    escalation_policy: &'a EscalationPolicy,
}

#[derive(Deserialize)]
struct PolicyEnvelope {
    escalation_policy: EscalationPolicy,
}

#[derive(Deserialize)]
struct IncidentPage {
    #[serde(default)]
    incidents: Vec<Incident>,
    #[serde(default)]
    more: bool,
}

/// Query pairs for one page of the incident listing.
fn incident_query_pairs(query: &IncidentQuery, offset: usize) -> Vec<(&'static str, String)> {
    let mut pairs = vec![("date_range", query.date_range.clone())];
    for status in &query.statuses {
        pairs.push(("statuses[]", status.as_str().to_string()));
    }
    for team in &query.team_ids {
        pairs.push(("team_ids[]", team.clone()));
    }
    pairs.push(("offset", offset.to_string()));
    pairs.push(("limit", PAGE_LIMIT.to_string()));
    pairs
}

impl ScheduleGateway for PagerDutyClient {
    fn create_schedule(&self, schedule: &Schedule, overflow: bool) -> Result<Schedule, ApiError> {
        let request = self
            .http
            .post(self.url("schedules", None))
            .query(&[("overflow", overflow)])
            .json(&ScheduleEnvelopeOut { schedule });
        self.send::<ScheduleEnvelope>(request).map(|env| env.schedule)
    }

    fn get_schedule(&self, id: &str) -> Result<Schedule, ApiError> {
        let request = self.http.get(self.url("schedules", Some(id)));
        self.send::<ScheduleEnvelope>(request).map(|env| env.schedule)
    }

    fn update_schedule(
        &self,
        id: &str,
        schedule: &Schedule,
        overflow: bool,
    ) -> Result<Schedule, ApiError> {
        let request = self
            .http
            .put(self.url("schedules", Some(id)))
            .query(&[("overflow", overflow)])
            .json(&ScheduleEnvelopeOut { schedule });
        self.send::<ScheduleEnvelope>(request).map(|env| env.schedule)
    }

    fn delete_schedule(&self, id: &str) -> Result<(), ApiError> {
        let response = self.http.delete(self.url("schedules", Some(id))).send()?;
        check_status(response).map(|_| ())
    }

    fn get_escalation_policy(&self, id: &str) -> Result<EscalationPolicy, ApiError> {
        let request = self.http.get(self.url("escalation_policies", Some(id)));
        self.send::<PolicyEnvelope>(request)
            .map(|env| env.escalation_policy)
    }

    fn update_escalation_policy(
        &self,
        id: &str,
        policy: &EscalationPolicy,
    ) -> Result<EscalationPolicy, ApiError> {
        let request = self
            .http
            .put(self.url("escalation_policies", Some(id)))
            .json(&PolicyEnvelopeOut {
                escalation_policy: policy,
            });
        self.send::<PolicyEnvelope>(request)
            .map(|env| env.escalation_policy)
    }

    fn list_open_incidents(&self, query: &IncidentQuery) -> Result<Vec<Incident>, ApiError> {
        let mut incidents = Vec::new();
        let mut offset = 0usize;
        loop {
            let request = self
                .http
                .get(self.url("incidents", None))
                .query(&incident_query_pairs(query, offset));
            let page: IncidentPage = self.send(request)?;
            let fetched = page.incidents.len();
            incidents.extend(page.incidents);
            debug!(offset, fetched, more = page.more, "fetched incident page");
            if !page.more || fetched == 0 {
                break;
            }
            offset += fetched;
        }
        Ok(incidents)
    }
}
