// src/feed.rs
//! Poll feed (RSS) parsing and the sentinel-bounded digest.
//!
//! Contract: [`parse_feed`] returns entries newest-first. RSS publishes in
//! that order; if every entry has a parseable `pubDate` and the document
//! disagrees, entries are re-sorted so the sentinel walk stays correct.

use quick_xml::de::from_str;
use regex::Regex;
use serde::Deserialize;
use time::{format_description::well_known::Rfc2822, OffsetDateTime};

use crate::error::CheckError;

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    pub title: String,
    pub link: String,
    pub pub_date: String,
}

impl FeedEntry {
    fn published_unix(&self) -> Option<i64> {
        OffsetDateTime::parse(&self.pub_date, &Rfc2822)
            .ok()
            .map(|dt| dt.unix_timestamp())
    }
}

pub fn parse_feed(bytes: &[u8]) -> Result<Vec<FeedEntry>, CheckError> {
    let text = String::from_utf8_lossy(bytes);
    let xml_clean = scrub_html_entities_for_xml(&text);
    let rss: Rss = from_str(&xml_clean)
        .map_err(|e| CheckError::malformed(format!("poll feed xml: {e}")))?;

    let entries = rss
        .channel
        .item
        .into_iter()
        .map(|it| FeedEntry {
            title: clean(it.title.as_deref()),
            link: it.link.as_deref().unwrap_or_default().trim().to_string(),
            pub_date: it.pub_date.as_deref().unwrap_or_default().trim().to_string(),
        })
        .collect();
    Ok(newest_first(entries))
}

fn clean(s: Option<&str>) -> String {
    html_escape::decode_html_entities(s.unwrap_or_default().trim()).to_string()
}

/// Enforce the newest-first contract when dates allow checking it.
fn newest_first(mut entries: Vec<FeedEntry>) -> Vec<FeedEntry> {
    let stamps: Option<Vec<i64>> = entries.iter().map(FeedEntry::published_unix).collect();
    let Some(stamps) = stamps else {
        return entries;
    };
    if stamps.windows(2).all(|w| w[0] >= w[1]) {
        return entries;
    }
    tracing::warn!("poll feed is not newest-first, re-sorting by pubDate");
    let mut keyed: Vec<(i64, FeedEntry)> = stamps.into_iter().zip(entries.drain(..)).collect();
    keyed.sort_by(|a, b| b.0.cmp(&a.0));
    keyed.into_iter().map(|(_, e)| e).collect()
}

fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}

/// Entries newer than the sentinel, filtered by title.
#[derive(Debug, Clone, PartialEq)]
pub struct PollDigest {
    pub matched: Vec<FeedEntry>,
    /// Link of the newest entry; always becomes the new sentinel.
    pub newest_link: String,
    /// Entries walked before hitting the sentinel (matched or not).
    pub considered: usize,
}

/// Walk newest-first until the entry whose link equals `sentinel`.
/// `None` for an empty feed, which must not move the sentinel.
pub fn digest(entries: &[FeedEntry], sentinel: Option<&str>, pattern: &Regex) -> Option<PollDigest> {
    let newest = entries.first()?;
    let fresh = entries
        .iter()
        .take_while(|e| Some(e.link.as_str()) != sentinel);

    let mut considered = 0;
    let mut matched = Vec::new();
    for e in fresh {
        considered += 1;
        if pattern.is_match(&e.title) {
            matched.push(e.clone());
        }
    }

    Some(PollDigest {
        matched,
        newest_link: newest.link.clone(),
        considered,
    })
}
