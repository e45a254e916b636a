//! Item parser: one rendered tweet element → one [`BookmarkItem`].
//!
//! Returns `None` for anything unparsable (no permalink, no text element).
//! A dropped element is a parser miss, never a pipeline failure.

use std::collections::HashSet;

use browser_relay_client::ElementHandle;
use chrono::Utc;
use tweetgraph_common::extract::{
    extract_hashtags, extract_mentions, is_status_permalink, looks_truncated, strip_query,
};
use tweetgraph_common::{BookmarkItem, FetchMethod, MAX_URLS_PER_ITEM};

use crate::traits::CaptureDriver;

pub const TWEET_SELECTOR: &str = r#"[data-testid="tweet"]"#;
pub const PERMALINK_SELECTOR: &str = r#"a[href*="/status/"]"#;
pub const TEXT_SELECTOR: &str = r#"[data-testid="tweetText"]"#;
pub const USER_NAME_SELECTOR: &str = r#"[data-testid="User-Name"]"#;
pub const SHOW_MORE_SELECTOR: &str = r#"[data-testid="tweet-text-show-more-link"]"#;
pub const LINK_SELECTOR: &str = r#"a[href^="http"]"#;

const EXPAND_TIMEOUT_MS: u64 = 5000;

/// Parse one tweet element. Driver errors on sub-queries degrade to missing
/// fields (or `None` when the field is essential), never to an error.
pub async fn parse_item(
    driver: &dyn CaptureDriver,
    handle: &ElementHandle,
) -> Option<BookmarkItem> {
    let permalink = driver
        .query_within(handle, PERMALINK_SELECTOR)
        .await
        .ok()?
        .into_iter()
        .next()?;
    let href = driver.get_attribute(&permalink, "href").await.ok().flatten()?;
    let id = tweet_id_from_href(&href)?;

    let text_handle = driver
        .query_within(handle, TEXT_SELECTOR)
        .await
        .ok()?
        .into_iter()
        .next()?;
    let mut text = driver.get_text(&text_handle).await.ok()?;
    if text.trim().is_empty() {
        return None;
    }

    // Truncation policy, in priority order: a successfully expanded
    // affordance wins, a failed expansion keeps the clipped text flagged,
    // and only affordance-free elements fall back to the length heuristic.
    let is_truncated = match driver
        .query_within(handle, SHOW_MORE_SELECTOR)
        .await
        .unwrap_or_default()
        .into_iter()
        .next()
    {
        Some(affordance) => {
            let clicked = driver.click(&affordance, EXPAND_TIMEOUT_MS).await.unwrap_or(false);
            if clicked {
                match driver.get_text(&text_handle).await {
                    Ok(expanded) if !expanded.trim().is_empty() => {
                        text = expanded;
                        false
                    }
                    _ => true,
                }
            } else {
                true
            }
        }
        None => looks_truncated(&text),
    };

    let author_username = parse_author(driver, handle).await;
    let urls = parse_urls(driver, handle).await;

    let source_url = if href.starts_with("http") {
        strip_query(&href)
    } else {
        format!("https://x.com{}", strip_query(&href))
    };

    Some(BookmarkItem {
        hashtags: extract_hashtags(&text),
        mentions: extract_mentions(&text),
        id,
        text,
        is_truncated,
        author_username,
        urls,
        reply_to: None,
        quote_of: None,
        source_url,
        captured_at: Utc::now(),
        fetch_method: FetchMethod::Browser,
    })
}

async fn parse_author(driver: &dyn CaptureDriver, handle: &ElementHandle) -> Option<String> {
    let user = driver
        .query_within(handle, USER_NAME_SELECTOR)
        .await
        .ok()?
        .into_iter()
        .next()?;
    let block = driver.get_text(&user).await.ok()?;
    username_from_block(&block)
}

/// External content links only: platform permalinks are navigation, not
/// content. Query-stripped, deduplicated, capped.
async fn parse_urls(driver: &dyn CaptureDriver, handle: &ElementHandle) -> Vec<String> {
    let anchors = match driver.query_within(handle, LINK_SELECTOR).await {
        Ok(anchors) => anchors,
        Err(_) => return Vec::new(),
    };

    let mut urls = Vec::new();
    let mut seen = HashSet::new();
    for anchor in anchors {
        let Ok(Some(href)) = driver.get_attribute(&anchor, "href").await else {
            continue;
        };
        if !href.starts_with("http") || is_status_permalink(&href) {
            continue;
        }
        let clean = strip_query(&href);
        if seen.insert(clean.clone()) {
            urls.push(clean);
            if urls.len() >= MAX_URLS_PER_ITEM {
                break;
            }
        }
    }
    urls
}

/// The id is the path segment after `/status/`, with any query string or
/// trailing sub-path (`/photo/1`) removed.
fn tweet_id_from_href(href: &str) -> Option<String> {
    let (_, tail) = href.split_once("/status/")?;
    let id = tail.split(['?', '/']).next().unwrap_or_default();
    if id.is_empty() {
        None
    } else {
        Some(id.to_string())
    }
}

/// The User-Name block renders as "Display Name\n@handle\n·\n2h".
fn username_from_block(block: &str) -> Option<String> {
    let after_at = block.split('@').nth(1)?;
    let username = after_at.split('\n').next()?.trim();
    if username.is_empty() {
        None
    } else {
        Some(username.to_string())
    }
}
