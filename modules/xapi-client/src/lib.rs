pub mod error;
pub mod rate_limit;
pub mod types;

pub use error::{Result, XApiError};
pub use rate_limit::SlidingWindow;
pub use types::FullRecord;

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use types::{SingleTweetResponse, TweetLookupResponse};

const API_BASE: &str = "https://api.twitter.com/2";

/// The batch lookup endpoint accepts at most 100 ids per request.
pub const BATCH_LIMIT: usize = 100;

const TWEET_FIELDS: &str = "id,text,created_at,author_id,entities,referenced_tweets";
const EXPANSIONS: &str = "author_id,entities.mentions.username";
const USER_FIELDS: &str = "id,username,name";

pub struct XApiClient {
    client: reqwest::Client,
    bearer_token: String,
    limiter: Mutex<SlidingWindow>,
}

impl XApiClient {
    /// `window_budget` is the number of requests allowed per 15-minute
    /// window (300 for app-only auth).
    pub fn new(bearer_token: &str, window_budget: usize) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            bearer_token: bearer_token.to_string(),
            limiter: Mutex::new(SlidingWindow::new(window_budget)),
        }
    }

    /// Block until the sliding window has room, then count this request.
    async fn throttle(&self) {
        loop {
            let wait = {
                let mut limiter = self.limiter.lock().await;
                match limiter.wait_needed(Instant::now()) {
                    None => {
                        limiter.record(Instant::now());
                        return;
                    }
                    Some(wait) => wait,
                }
            };
            tracing::warn!(wait_secs = wait.as_secs(), "Rate limit window full, waiting");
            tokio::time::sleep(wait).await;
        }
    }

    /// Fetch up to [`BATCH_LIMIT`] tweets in one request. Ids the API does
    /// not recognize (deleted, private) are simply absent from the result.
    pub async fn get_tweets_batch(&self, ids: &[String]) -> Result<HashMap<String, FullRecord>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let ids = &ids[..ids.len().min(BATCH_LIMIT)];

        self.throttle().await;

        let resp = self
            .client
            .get(format!("{API_BASE}/tweets"))
            .bearer_auth(&self.bearer_token)
            .query(&[
                ("ids", ids.join(",").as_str()),
                ("tweet.fields", TWEET_FIELDS),
                ("expansions", EXPANSIONS),
                ("user.fields", USER_FIELDS),
            ])
            .send()
            .await?;

        let resp = check_status(resp).await?;
        let body: TweetLookupResponse = resp.json().await?;

        let users = user_map(body.includes);
        let mut records = HashMap::new();
        for tweet in body.data {
            let record = tweet.into_record(&users);
            records.insert(record.id.clone(), record);
        }

        tracing::info!(requested = ids.len(), resolved = records.len(), "Batch tweet lookup");
        Ok(records)
    }

    /// Fetch a single tweet. Returns `Ok(None)` when the tweet no longer
    /// exists or is not visible to the app.
    pub async fn get_tweet(&self, id: &str) -> Result<Option<FullRecord>> {
        self.throttle().await;

        let resp = self
            .client
            .get(format!("{API_BASE}/tweets/{id}"))
            .bearer_auth(&self.bearer_token)
            .query(&[
                ("tweet.fields", TWEET_FIELDS),
                ("expansions", EXPANSIONS),
                ("user.fields", USER_FIELDS),
            ])
            .send()
            .await?;

        if resp.status().as_u16() == 404 {
            tracing::warn!(id, "Tweet not found (deleted or private)");
            return Ok(None);
        }

        let resp = check_status(resp).await?;
        let body: SingleTweetResponse = resp.json().await?;

        let users = user_map(body.includes);
        Ok(body.data.map(|tweet| tweet.into_record(&users)))
    }
}

fn user_map(includes: Option<types::Includes>) -> HashMap<String, String> {
    includes
        .map(|inc| inc.users.into_iter().map(|u| (u.id, u.username)).collect())
        .unwrap_or_default()
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    match status.as_u16() {
        429 => {
            let reset_at = resp
                .headers()
                .get("x-rate-limit-reset")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<i64>().ok())
                .and_then(|epoch| DateTime::<Utc>::from_timestamp(epoch, 0));
            Err(XApiError::RateLimited { reset_at })
        }
        401 => Err(XApiError::Auth("check bearer token".to_string())),
        403 => Err(XApiError::Auth("access forbidden, check app permissions".to_string())),
        _ if !status.is_success() => {
            let message = resp.text().await.unwrap_or_default();
            Err(XApiError::Api {
                status: status.as_u16(),
                message,
            })
        }
        _ => Ok(resp),
    }
}
