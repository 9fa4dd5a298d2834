//! GNU Mailman provider
//!
//! The whole queue is available from a single `details=all` admin page, and
//! a whole batch of decisions goes back in a single request. Mailman gives
//! no per-item confirmation: a submission either fails with a transport
//! error or is assumed to have been applied.

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
static MESSAGE_TABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<table CELLPADDING="0" WIDTH="100%" CELLSPACING="0">(.*?)</table>\s+<p>"#)
        .expect("static pattern")
});

#[allow(clippy::expect_used)]
static MESSAGE_FIELDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?s)<td ALIGN="right"><strong>From:</strong></td>\s+<td>([^<]+)</td>.*?<td ALIGN="right"><strong>Subject:</strong></td>\s+<td>([^<]+)</td>.*?<td><TEXTAREA NAME=fulltext-(\d+) ROWS=10 COLS=76 WRAP=soft READONLY>([^<]+)</TEXTAREA></td>"#,
    )
    .expect("static pattern")
});

/// GNU Mailman admin-queue provider
pub(crate) struct Mailman;

/// Map a decision to the POST code Mailman expects on its moderation form.
///
/// Reject maps to discard (3).
fn post_code(decision: Decision) -> Option<u8> {
    match decision {
        Decision::Accept => Some(1),
        Decision::Reject => Some(3),
        Decision::Defer => None,
    }
}

#[async_trait]
impl Provider for Mailman {
    async fn enumerate(&self, ctx: &ProviderContext) -> Result<EnumerateOutcome> {
        // The details=all page contains everything we need in one fetch.
        let url = format!(
            "{}/{}/?details=all&adminpw={}",
            ctx.root_url,
            encode(&ctx.list),
            encode(&ctx.password)
        );
        let page = ctx.fetcher.fetch(&url).await?;

        if page.contains("No such list") {
            return Ok(EnumerateOutcome::NotFound(
                "List does not exist on server".into(),
            ));
        }
        if page.contains("Authorization failed") {
            return Ok(EnumerateOutcome::AuthFailed(
                "Authorization failed - invalid password?".into(),
            ));
        }

        let mut messages = Vec::new();
        for block in MESSAGE_TABLE.captures_iter(&page) {
            let Some(fields) = MESSAGE_FIELDS.captures(&block[1]) else {
                // Partial matches are dropped, not fatal
                debug!(list = %ctx.list, "skipping queue block without message fields");
                continue;
            };
            let Ok(id) = fields[3].parse::<u64>() else {
                continue;
            };
            messages.push(Message::new(
                RemoteRef::MailmanId(id),
                &fields[1],
                &fields[2],
                &fields[4],
            ));
        }
        Ok(EnumerateOutcome::Queue(messages))
    }

    async fn apply(
        &self,
        ctx: &ProviderContext,
        messages: &[Message],
        callbacks: &dyn StatusCallbacks,
    ) -> Result<()> {
        let flagged: Vec<(u64, u8)> = messages
            .iter()
            .filter_map(|m| match (&m.remote, post_code(m.decision())) {
                (RemoteRef::MailmanId(id), Some(code)) => Some((*id, code)),
                _ => None,
            })
            .collect();

        if flagged.is_empty() {
            // Don't construct a bad URL for an empty batch
            return Err(Error::Submission(
                "no messages are flagged for moderation".into(),
            ));
        }

        callbacks.set_status_message(&format!("Moderating {} messages...", flagged.len()));

        // The whole batch goes in a single query string.
        let mut url = format!("{}/{}/?", ctx.root_url, encode(&ctx.list));
        for (id, code) in &flagged {
            url.push_str(&format!("{id}={code}&"));
        }
        url.push_str(&format!("adminpw={}", encode(&ctx.password)));

        // Mailman doesn't confirm individual results; a clean fetch is the
        // only success signal we get.
        ctx.fetcher
            .fetch(&url)
            .await
            .map_err(|e| Error::Submission(e.to_string()))?;
        Ok(())
    }

    fn individual_moderation(&self) -> bool {
        false
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{Fetcher, TrustPolicy};
    use std::sync::Mutex;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct NullCallbacks {
        statuses: Mutex<Vec<String>>,
    }

    impl NullCallbacks {
        fn new() -> Self {
            Self {
                statuses: Mutex::new(Vec::new()),
            }
        }
    }

    impl StatusCallbacks for NullCallbacks {
        fn set_status_message(&self, msg: &str) {
            self.statuses.lock().unwrap().push(msg.to_string());
        }
        fn set_progress_value(&self, _value: usize) {}
        fn set_message_count(&self, _count: usize) {}
        fn show_error(&self, _msg: &str) {}
    }

    fn queue_block(from: &str, subject: &str, id: u64, body: &str) -> String {
        format!(
            "<table CELLPADDING=\"0\" WIDTH=\"100%\" CELLSPACING=\"0\">\n\
             <tr><td ALIGN=\"right\"><strong>From:</strong></td>\n <td>{from}</td></tr>\n\
             <tr><td ALIGN=\"right\"><strong>Subject:</strong></td>\n <td>{subject}</td></tr>\n\
             <tr><td><TEXTAREA NAME=fulltext-{id} ROWS=10 COLS=76 WRAP=soft READONLY>{body}</TEXTAREA></td></tr>\n\
             </table>\n <p>\n"
        )
    }

    fn ctx(root_url: String) -> ProviderContext {
        ProviderContext {
            list: "mylist".into(),
            root_url,
            password: "pw".into(),
            fetcher: Fetcher::new(TrustPolicy::default()).unwrap(),
        }
    }

    fn mock_root(server: &MockServer) -> String {
        format!("{}/admindb", server.uri())
    }

    #[tokio::test]
    async fn enumerate_parses_queue_blocks() {
        let server = MockServer::start().await;
        let page = format!(
            "<html>{}{}</html>",
            queue_block("alice@example.com", "Hello list", 17, "First body"),
            queue_block("bob@example.com", "Second post", 42, "Second body"),
        );
        Mock::given(method("GET"))
            .and(path("/admindb/mylist/"))
            .and(query_param("details", "all"))
            .and(query_param("adminpw", "pw"))
            .respond_with(ResponseTemplate::new(200).set_body_string(page))
            .mount(&server)
            .await;

        let provider = Mailman;
        let outcome = provider.enumerate(&ctx(mock_root(&server))).await.unwrap();

        let EnumerateOutcome::Queue(messages) = outcome else {
            panic!("expected a queue");
        };
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].sender(), "alice@example.com");
        assert_eq!(messages[0].subject(), "Hello list");
        assert_eq!(messages[0].content(), "First body");
        assert_eq!(messages[0].remote, RemoteRef::MailmanId(17));
        assert_eq!(messages[1].remote, RemoteRef::MailmanId(42));
    }

    #[tokio::test]
    async fn enumerate_skips_blocks_without_message_fields() {
        let server = MockServer::start().await;
        let page = format!(
            "<table CELLPADDING=\"0\" WIDTH=\"100%\" CELLSPACING=\"0\">no fields here</table>\n <p>\n{}",
            queue_block("carol@example.com", "Kept", 7, "Body"),
        );
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(page))
            .mount(&server)
            .await;

        let provider = Mailman;
        let outcome = provider.enumerate(&ctx(mock_root(&server))).await.unwrap();

        let EnumerateOutcome::Queue(messages) = outcome else {
            panic!("expected a queue");
        };
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].sender(), "carol@example.com");
    }

    #[tokio::test]
    async fn enumerate_recognizes_missing_list_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<h2>No such list <em>mylist</em></h2>"),
            )
            .mount(&server)
            .await;

        let provider = Mailman;
        let outcome = provider.enumerate(&ctx(mock_root(&server))).await.unwrap();
        let EnumerateOutcome::NotFound(status) = outcome else {
            panic!("expected NotFound");
        };
        assert_eq!(status, "List does not exist on server");
    }

    #[tokio::test]
    async fn enumerate_recognizes_authorization_failure_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<strong>Authorization failed.</strong>"),
            )
            .mount(&server)
            .await;

        let provider = Mailman;
        let outcome = provider.enumerate(&ctx(mock_root(&server))).await.unwrap();
        let EnumerateOutcome::AuthFailed(status) = outcome else {
            panic!("expected AuthFailed");
        };
        assert_eq!(status, "Authorization failed - invalid password?");
    }

    #[tokio::test]
    async fn enumerate_treats_unrecognized_page_as_empty_queue() {
        // Deliberate: a page matching neither the failure markers nor any
        // message block is an empty, successful queue, not a parse error.
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>nothing here</html>"))
            .mount(&server)
            .await;

        let provider = Mailman;
        let outcome = provider.enumerate(&ctx(mock_root(&server))).await.unwrap();
        let EnumerateOutcome::Queue(messages) = outcome else {
            panic!("expected a queue");
        };
        assert!(messages.is_empty());
    }

    #[tokio::test]
    async fn apply_with_no_flagged_messages_fails_without_a_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let deferred = Message::new(RemoteRef::MailmanId(1), "a@b", "s", "c");
        let provider = Mailman;
        let callbacks = NullCallbacks::new();
        let err = provider
            .apply(&ctx(mock_root(&server)), &[deferred], &callbacks)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Submission(_)));
        // expect(0) verifies on drop that no request was issued
    }

    #[tokio::test]
    async fn apply_submits_one_batched_request_with_decision_codes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/admindb/mylist/"))
            .and(query_param("17", "1"))
            .and(query_param("42", "3"))
            .and(query_param("adminpw", "pw"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let mut accept = Message::new(RemoteRef::MailmanId(17), "a@b", "s", "c");
        accept.set_decision(Decision::Accept);
        let mut reject = Message::new(RemoteRef::MailmanId(42), "a@b", "s", "c");
        reject.set_decision(Decision::Reject);
        let deferred = Message::new(RemoteRef::MailmanId(99), "a@b", "s", "c");

        let provider = Mailman;
        let callbacks = NullCallbacks::new();
        provider
            .apply(
                &ctx(mock_root(&server)),
                &[accept, reject, deferred],
                &callbacks,
            )
            .await
            .unwrap();

        assert_eq!(
            callbacks.statuses.lock().unwrap().as_slice(),
            ["Moderating 2 messages..."]
        );
    }

    #[tokio::test]
    async fn apply_transport_failure_fails_the_whole_batch() {
        let mut flagged = Message::new(RemoteRef::MailmanId(5), "a@b", "s", "c");
        flagged.set_decision(Decision::Accept);

        let provider = Mailman;
        let callbacks = NullCallbacks::new();
        let err = provider
            .apply(
                &ctx("http://127.0.0.1:1/admindb".into()),
                &[flagged],
                &callbacks,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Submission(_)));
    }
}
