//! Majordomo2 provider
//!
//! Majordomo2's token listing omits the subject line, so every pending token
//! costs an extra detail fetch, and messages without an inline text part
//! cost a third fetch for the first MIME part. Decisions are submitted one
//! request per message.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use tracing::debug;
use urlencoding::encode;

use crate::error::{Error, Result};
use crate::providers::{Provider, ProviderContext};
use crate::types::{Decision, EnumerateOutcome, Message, RemoteRef, StatusCallbacks};

// Patterns are fixed at compile time; compilation is exercised by the tests
// below.
#[allow(clippy::expect_used)]
static TOKEN_LIST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?s)<td><input type="checkbox" name="extra"\s+value="([^"]+)"><a href="[^"]+"\s+target="_token">[^<]+</a>\s*</td>\s*<td>\s*post"#,
    )
    .expect("static pattern")
});

#[allow(clippy::expect_used)]
static DETAIL_FULL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?s)<tr><td>From\s+</td><td>([^<]+)</td>.*?<tr><td>Subject\s+</td><td>([^<]+)</td>.*?<pre>\s+([^<]+)\s*</pre>",
    )
    .expect("static pattern")
});

#[allow(clippy::expect_used)]
static DETAIL_NO_SUBJECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<tr><td>From\s+</td><td>([^<]+)</td>.*?<pre>\s+([^<]+)\s*</pre>")
        .expect("static pattern")
});

#[allow(clippy::expect_used)]
static DETAIL_NO_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?s)<tr><td>From\s+</td><td>([^<]+)</td>.*?<tr><td>Subject\s+</td><td>([^<]+)</td>.*?<p>\s\[Part",
    )
    .expect("static pattern")
});

#[allow(clippy::expect_used)]
static NO_LIST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<pre>\*{4} The &quot;(.*?)&quot; mailing list is not supported at"#)
        .expect("static pattern")
});

const INVALID_PASSWORD_MARKER: &str =
    "<pre>The password is invalid.  Some common reasons for this error are:";

/// Majordomo2 web-admin provider
pub(crate) struct Majordomo2;

/// Decode the handful of HTML entities Majordomo2 puts in sender/subject.
fn trivial_decode(s: &str) -> String {
    s.replace("&quot;", "\"")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
}

/// Map a decision to the Majordomo2 function name submitted for it.
fn majordomo_func(decision: Decision) -> Option<&'static str> {
    match decision {
        Decision::Accept => Some("accept"),
        Decision::Reject => Some("reject-quiet"),
        Decision::Defer => None,
    }
}

impl Majordomo2 {
    fn command_url(ctx: &ProviderContext, func: &str, extra: Option<&str>) -> String {
        let mut url = format!(
            "{}?passw={}&list={}&func={}",
            ctx.root_url,
            encode(&ctx.password),
            encode(&ctx.list),
            func
        );
        if let Some(extra) = extra {
            url.push_str(&format!("&extra={}", encode(extra)));
        }
        url
    }

    /// Fetch one token's detail page and parse it into a message.
    ///
    /// Returns `None` when the token yields nothing usable (already
    /// moderated by someone else, or an unrecognized page shape).
    async fn fetch_token(ctx: &ProviderContext, token: &str) -> Result<Option<Message>> {
        let page = ctx
            .fetcher
            .fetch(&Self::command_url(ctx, "tokeninfo", Some(token)))
            .await?;
        if page.trim().is_empty() {
            // Maybe somebody moderated it while we were looking at others
            debug!(list = %ctx.list, token, "token detail came back empty, skipping");
            return Ok(None);
        }

        if let Some(c) = DETAIL_FULL.captures(&page) {
            return Ok(Some(Message::new(
                RemoteRef::Majordomo2Token(token.to_string()),
                trivial_decode(&c[1]),
                trivial_decode(&c[2]),
                &c[3],
            )));
        }
        if let Some(c) = DETAIL_NO_SUBJECT.captures(&page) {
            return Ok(Some(Message::new(
                RemoteRef::Majordomo2Token(token.to_string()),
                trivial_decode(&c[1]),
                "No subject",
                &c[2],
            )));
        }
        if let Some(c) = DETAIL_NO_TEXT.captures(&page) {
            // No inline text part; one more fetch for the first MIME part.
            let part = format!("{token} 1");
            let body = ctx
                .fetcher
                .fetch(&Self::command_url(ctx, "tokeninfo-part", Some(&part)))
                .await?;
            if body.trim().is_empty() {
                return Ok(None);
            }
            return Ok(Some(Message::new(
                RemoteRef::Majordomo2Token(token.to_string()),
                trivial_decode(&c[1]),
                trivial_decode(&c[2]),
                body,
            )));
        }

        debug!(list = %ctx.list, token, "token detail matched no known pattern, skipping");
        Ok(None)
    }
}

#[async_trait]
impl Provider for Majordomo2 {
    async fn enumerate(&self, ctx: &ProviderContext) -> Result<EnumerateOutcome> {
        // List all pending tokens in "consult" mode.
        let page = ctx
            .fetcher
            .fetch(&Self::command_url(ctx, "showtokens-consult", None))
            .await?;

        if NO_LIST.is_match(&page) {
            return Ok(EnumerateOutcome::NotFound(
                "List does not exist on server".into(),
            ));
        }
        if page.contains(INVALID_PASSWORD_MARKER) {
            return Ok(EnumerateOutcome::AuthFailed(
                "Authorization failed - invalid password?".into(),
            ));
        }

        let mut messages = Vec::new();
        for token in TOKEN_LIST.captures_iter(&page) {
            if let Some(message) = Self::fetch_token(ctx, &token[1]).await? {
                messages.push(message);
            }
        }
        Ok(EnumerateOutcome::Queue(messages))
    }

    async fn apply(
        &self,
        ctx: &ProviderContext,
        messages: &[Message],
        callbacks: &dyn StatusCallbacks,
    ) -> Result<()> {
        let flagged: Vec<(&str, &'static str)> = messages
            .iter()
            .filter_map(|m| match (&m.remote, majordomo_func(m.decision())) {
                (RemoteRef::Majordomo2Token(token), Some(func)) => Some((token.as_str(), func)),
                _ => None,
            })
            .collect();

        if flagged.is_empty() {
            // Don't construct a bad URL for an empty batch
            return Err(Error::Submission(
                "no messages are flagged for moderation".into(),
            ));
        }

        callbacks.set_message_count(flagged.len());
        for (i, (token, func)) in flagged.iter().enumerate() {
            callbacks.set_status_message(&format!(
                "Moderating message {} of {}",
                i + 1,
                flagged.len()
            ));
            // First failure aborts the remaining queue; some submissions may
            // already have succeeded.
            ctx.fetcher
                .fetch(&Self::command_url(ctx, func, Some(token)))
                .await
                .map_err(|e| Error::Submission(e.to_string()))?;
            callbacks.set_progress_value(i + 1);
        }
        Ok(())
    }

    fn individual_moderation(&self) -> bool {
        true
    }
}
