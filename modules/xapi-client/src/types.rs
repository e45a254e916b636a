use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Fully-resolved tweet data from the API. Text is never truncated here.
#[derive(Debug, Clone)]
pub struct FullRecord {
    pub id: String,
    pub text: String,
    pub author_username: Option<String>,
    pub hashtags: Vec<String>,
    pub mentions: Vec<String>,
    pub urls: Vec<String>,
    pub reply_to: Option<String>,
    pub quote_of: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

// --- Wire types ---

#[derive(Debug, Deserialize)]
pub(crate) struct TweetLookupResponse {
    #[serde(default)]
    pub data: Vec<ApiTweet>,
    pub includes: Option<Includes>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SingleTweetResponse {
    pub data: Option<ApiTweet>,
    pub includes: Option<Includes>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Includes {
    #[serde(default)]
    pub users: Vec<ApiUser>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiUser {
    pub id: String,
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiTweet {
    pub id: String,
    pub text: String,
    pub author_id: Option<String>,
    pub created_at: Option<String>,
    pub entities: Option<Entities>,
    #[serde(default)]
    pub referenced_tweets: Vec<ReferencedTweet>,
}

#[derive(Debug, Deserialize, Default)]
pub(crate) struct Entities {
    #[serde(default)]
    pub hashtags: Vec<TagEntity>,
    #[serde(default)]
    pub mentions: Vec<MentionEntity>,
    #[serde(default)]
    pub urls: Vec<UrlEntity>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TagEntity {
    pub tag: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MentionEntity {
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UrlEntity {
    #[serde(default)]
    pub url: String,
    pub expanded_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReferencedTweet {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
}

impl ApiTweet {
    /// Resolve the wire tweet into a [`FullRecord`], looking up the author
    /// username in the response's `includes.users` map.
    pub(crate) fn into_record(self, users: &HashMap<String, String>) -> FullRecord {
        let entities = self.entities.unwrap_or_default();

        let mut reply_to = None;
        let mut quote_of = None;
        for reference in &self.referenced_tweets {
            match reference.kind.as_str() {
                "replied_to" => reply_to = Some(reference.id.clone()),
                "quoted" => quote_of = Some(reference.id.clone()),
                _ => {}
            }
        }

        FullRecord {
            author_username: self.author_id.as_ref().and_then(|id| users.get(id).cloned()),
            text: self.text,
            hashtags: entities.hashtags.into_iter().map(|h| h.tag).collect(),
            mentions: entities.mentions.into_iter().map(|m| m.username).collect(),
            urls: entities
                .urls
                .into_iter()
                .map(|u| u.expanded_url.unwrap_or(u.url))
                .collect(),
            reply_to,
            quote_of,
            created_at: self
                .created_at
                .as_deref()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc)),
            id: self.id,
        }
    }
}
