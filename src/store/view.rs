//! Read-time projection of a captured session

use chrono::{DateTime, Utc};
use mailparse::{MailAddr, MailHeaderMap, ParsedMail, addrparse_header};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::CaptureSession;

/// Text shown in place of a body when the transcript cannot be parsed.
pub const UNPARSABLE_TEXT: &str = "cannot parse this mail";

/// Header names that are surfaced as address lists rather than plain headers.
const ADDRESS_HEADERS: [&str; 4] = ["to", "cc", "bcc", "from"];

/// A single parsed mailbox from an address header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailAddress {
    pub name: Option<String>,
    pub address: String,
}

/// One non-address header, in its original position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewHeader {
    pub key: String,
    pub value: String,
}

/// Searchable, serializable view of one captured transaction.
///
/// Views are computed fresh from the session on every read and carry no
/// identity of their own. Parsed message content and envelope data live side
/// by side because they are two independent sources of truth that can
/// legitimately disagree (a BCC recipient appears in `smtp_to` but in none of
/// the header lists).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailView {
    // Message content, parsed from the transcript
    pub headers: Vec<ViewHeader>,
    pub from: Vec<MailAddress>,
    pub to: Vec<MailAddress>,
    pub cc: Vec<MailAddress>,
    pub bcc: Vec<MailAddress>,
    pub text: String,
    pub html: String,

    // SMTP transaction data
    pub smtp_from: String,
    pub smtp_to: Vec<String>,
    pub received_time: DateTime<Utc>,

    // Connection metadata
    pub client_addr: String,
    pub client_host: String,
    pub tls_used: bool,

    // Authentication outcome
    pub authenticated: bool,
    pub auth_mechanism: String,
}

/// Project one session to a view. Total: parse failures degrade to the
/// sentinel text instead of erroring, so malformed captures stay visible and
/// remain searchable through their envelope fields.
pub(crate) fn project(session: &CaptureSession) -> MailView {
    let tx = session.transaction();

    let mut view = MailView {
        headers: Vec::new(),
        from: Vec::new(),
        to: Vec::new(),
        cc: Vec::new(),
        bcc: Vec::new(),
        text: String::new(),
        html: String::new(),
        smtp_from: tx.mail_from.unwrap_or_default(),
        smtp_to: tx.rcpt_to,
        received_time: session.received_time(),
        client_addr: session.client_addr().to_owned(),
        client_host: tx.client_host,
        tls_used: session.tls_used(),
        authenticated: tx.authenticated,
        auth_mechanism: tx.auth_mechanism,
    };

    let data = match tx.data {
        Some(data) if !data.is_empty() => data,
        _ => {
            view.text = UNPARSABLE_TEXT.to_owned();
            return view;
        }
    };

    match mailparse::parse_mail(data.as_bytes()) {
        Ok(parsed) => {
            view.from = address_list(&parsed, "from");
            view.to = address_list(&parsed, "to");
            view.cc = address_list(&parsed, "cc");
            view.bcc = address_list(&parsed, "bcc");
            view.headers = plain_headers(&parsed);
            collect_bodies(&parsed, &mut view.text, &mut view.html);
        }
        Err(err) => {
            debug!(error = %err, "failed to parse captured message");
            view.text = UNPARSABLE_TEXT.to_owned();
        }
    }

    view
}

/// Parse one address header into a flat mailbox list. A missing or
/// unparsable header is an empty list, never an error.
fn address_list(parsed: &ParsedMail<'_>, key: &str) -> Vec<MailAddress> {
    let Some(header) = parsed.headers.get_first_header(key) else {
        return Vec::new();
    };

    match addrparse_header(header) {
        Ok(list) => list
            .iter()
            .flat_map(|addr| match addr {
                MailAddr::Single(single) => vec![MailAddress {
                    name: single.display_name.clone(),
                    address: single.addr.clone(),
                }],
                MailAddr::Group(group) => group
                    .addrs
                    .iter()
                    .map(|a| MailAddress {
                        name: a.display_name.clone(),
                        address: a.addr.clone(),
                    })
                    .collect(),
            })
            .collect(),
        Err(_) => Vec::new(),
    }
}

/// All headers except the four address headers, in encountered order.
fn plain_headers(parsed: &ParsedMail<'_>) -> Vec<ViewHeader> {
    parsed
        .headers
        .iter()
        .filter(|h| !is_address_header(&h.get_key()))
        .map(|h| ViewHeader {
            key: h.get_key(),
            value: h.get_value(),
        })
        .collect()
}

fn is_address_header(key: &str) -> bool {
    ADDRESS_HEADERS
        .iter()
        .any(|name| key.eq_ignore_ascii_case(name))
}

/// Pick the first text/plain and text/html bodies out of the MIME tree.
fn collect_bodies(part: &ParsedMail<'_>, text: &mut String, html: &mut String) {
    if part.subparts.is_empty() {
        match part.ctype.mimetype.as_str() {
            "text/plain" if text.is_empty() => {
                if let Ok(body) = part.get_body() {
                    *text = body;
                }
            }
            "text/html" if html.is_empty() => {
                if let Ok(body) = part.get_body() {
                    *html = body;
                }
            }
            _ => {}
        }
        return;
    }

    for sub in &part.subparts {
        collect_bodies(sub, text, html);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MailStore;

    fn captured_view(data: &str) -> MailView {
        let store = MailStore::new();
        let handle = store.create_session("192.0.2.1:4242".to_owned(), true);
        handle.set_client_host("client.example.com");
        handle.set_sender("envelope@example.com", None);
        handle.add_recipient("rcpt@example.com", None);
        if !data.is_empty() {
            handle.write_transcript(data.to_owned());
        }
        store.get_all_data().remove(0)
    }

    #[test]
    fn test_simple_message() {
        let view = captured_view(
            "From: Alice <alice@example.com>\r\n\
             To: bob@example.com\r\n\
             Subject: hello\r\n\
             \r\n\
             line one\r\nline two\r\n",
        );

        assert_eq!(view.from.len(), 1);
        assert_eq!(view.from[0].address, "alice@example.com");
        assert_eq!(view.from[0].name.as_deref(), Some("Alice"));
        assert_eq!(view.to.len(), 1);
        assert_eq!(view.to[0].address, "bob@example.com");
        assert!(view.cc.is_empty());
        assert!(view.bcc.is_empty());
        assert_eq!(view.text, "line one\r\nline two\r\n");
        assert!(view.html.is_empty());
    }

    #[test]
    fn test_address_headers_excluded_from_header_list() {
        let view = captured_view(
            "From: a@example.com\r\n\
             TO: b@example.com\r\n\
             Cc: c@example.com\r\n\
             Subject: s\r\n\
             X-Custom: v\r\n\
             \r\n\
             body\r\n",
        );

        let keys: Vec<&str> = view.headers.iter().map(|h| h.key.as_str()).collect();
        assert_eq!(keys, vec!["Subject", "X-Custom"]);
    }

    #[test]
    fn test_header_order_and_duplicates_preserved() {
        let view = captured_view(
            "Received: one\r\n\
             Subject: s\r\n\
             Received: two\r\n\
             \r\n\
             body\r\n",
        );

        assert_eq!(view.headers.len(), 3);
        assert_eq!(view.headers[0].value, "one");
        assert_eq!(view.headers[1].key, "Subject");
        assert_eq!(view.headers[2].value, "two");
    }

    #[test]
    fn test_multiple_recipients_in_one_header() {
        let view = captured_view(
            "To: a@example.com, Bee <b@example.com>\r\n\
             \r\n\
             body\r\n",
        );

        assert_eq!(view.to.len(), 2);
        assert_eq!(view.to[0].address, "a@example.com");
        assert_eq!(view.to[1].address, "b@example.com");
        assert_eq!(view.to[1].name.as_deref(), Some("Bee"));
    }

    #[test]
    fn test_multipart_text_and_html() {
        let view = captured_view(
            "From: a@example.com\r\n\
             Content-Type: multipart/alternative; boundary=\"xyz\"\r\n\
             \r\n\
             --xyz\r\n\
             Content-Type: text/plain\r\n\
             \r\n\
             plain body\r\n\
             --xyz\r\n\
             Content-Type: text/html\r\n\
             \r\n\
             <p>html body</p>\r\n\
             --xyz--\r\n",
        );

        assert!(view.text.contains("plain body"));
        assert!(view.html.contains("<p>html body</p>"));
    }

    #[test]
    fn test_empty_transcript_degrades_to_sentinel() {
        let view = captured_view("");

        assert_eq!(view.text, UNPARSABLE_TEXT);
        assert!(view.headers.is_empty());
        assert!(view.from.is_empty());
        assert!(view.to.is_empty());
        // Envelope data still present and searchable
        assert_eq!(view.smtp_from, "envelope@example.com");
        assert_eq!(view.smtp_to, vec!["rcpt@example.com"]);
    }

    #[test]
    fn test_envelope_and_metadata_copied_through() {
        let view = captured_view("Subject: s\r\n\r\nbody\r\n");

        assert_eq!(view.smtp_from, "envelope@example.com");
        assert_eq!(view.smtp_to, vec!["rcpt@example.com"]);
        assert_eq!(view.client_addr, "192.0.2.1:4242");
        assert_eq!(view.client_host, "client.example.com");
        assert!(view.tls_used);
        assert!(!view.authenticated);
        assert!(view.auth_mechanism.is_empty());
    }

    #[test]
    fn test_missing_address_headers_yield_empty_lists() {
        let view = captured_view("Subject: only\r\n\r\nbody\r\n");

        assert!(view.from.is_empty());
        assert!(view.to.is_empty());
        assert!(view.cc.is_empty());
        assert!(view.bcc.is_empty());
        assert_eq!(view.text, "body\r\n");
    }

    #[test]
    fn test_serialized_field_names() {
        let view = captured_view("Subject: s\r\n\r\nbody\r\n");
        let json = serde_json::to_string(&view).unwrap();

        for key in [
            "\"headers\"",
            "\"smtpFrom\"",
            "\"smtpTo\"",
            "\"receivedTime\"",
            "\"clientAddr\"",
            "\"clientHost\"",
            "\"tlsUsed\"",
            "\"authenticated\"",
            "\"authMechanism\"",
        ] {
            assert!(json.contains(key), "missing {key} in {json}");
        }
    }
}
