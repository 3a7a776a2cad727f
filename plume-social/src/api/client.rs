//! Thin wrapper around the official v2-style API with Plume defaults.
//!
//! Handles auth, request parameter shaping, and safe time windows before
//! delegating to the shared HTTP client.
use crate::api::types::{TimelineResponse, UserLookupResponse};
use crate::normalize::DateWindow;
use chrono::SecondsFormat;
use plume_http::{Auth, HttpClient, HttpError, RequestOpts};

#[derive(Clone)]
pub struct TimelineApi {
    http: HttpClient,
    bearer: String,
}

impl TimelineApi {
    pub fn new(endpoint: &str, bearer_token: String) -> Result<Self, HttpError> {
        let http = HttpClient::new(endpoint)?;
        Ok(Self {
            http,
            bearer: bearer_token,
        })
    }

    /// Look up the account behind a (already normalized) username.
    pub async fn user_by_username(&self, username: &str) -> Result<UserLookupResponse, HttpError> {
        self.http
            .get_json(
                &format!("2/users/by/username/{username}"),
                RequestOpts {
                    auth: Some(Auth::Bearer(&self.bearer)),
                    ..Default::default()
                },
            )
            .await
    }

    /// Recent posts for a resolved user id, newest first.
    ///
    /// The upstream rejects `max_results` outside 5..=100, so the requested
    /// count is clamped into that range; the caller re-truncates afterwards.
    pub async fn user_timeline(
        &self,
        user_id: &str,
        max_results: u32,
        window: Option<DateWindow>,
    ) -> Result<TimelineResponse, HttpError> {
        let max_results = max_results.clamp(5, 100).to_string();

        let mut params: Vec<(&str, std::borrow::Cow<'_, str>)> = vec![
            ("max_results", max_results.into()),
            ("tweet.fields", "created_at,public_metrics".into()),
        ];
        if let Some(w) = window {
            params.push((
                "start_time",
                w.from.to_rfc3339_opts(SecondsFormat::Secs, true).into(),
            ));
            params.push((
                "end_time",
                w.to.to_rfc3339_opts(SecondsFormat::Secs, true).into(),
            ));
        }

        self.http
            .get_json(
                &format!("2/users/{user_id}/tweets"),
                RequestOpts {
                    auth: Some(Auth::Bearer(&self.bearer)),
                    query: Some(params),
                    ..Default::default()
                },
            )
            .await
    }
}
