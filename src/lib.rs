//! # Mailsink
//!
//! Mailsink is a mail-capture server for testing.
//!
//! It accepts SMTP deliveries, records every transaction in an in-memory
//! store, and makes the captured mail searchable over an HTTP query API.
//! Nothing is ever relayed.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mailsink::{MailStore, SmtpLimits, SmtpServer};
//! use std::sync::Arc;
//! use std::thread;
//!
//! // Create the shared store and start the listener
//! let store = Arc::new(MailStore::new());
//! let server = SmtpServer::new("test.local", SmtpLimits::default(), Arc::clone(&store));
//!
//! thread::spawn(move || {
//!     server.start("127.0.0.1:2525").unwrap();
//! });
//!
//! // Application sends email to localhost:2525
//! // ...
//!
//! // Check what was captured
//! for view in store.get_all_data() {
//!     println!("Received email from: {}", view.smtp_from);
//! }
//!
//! // Or search for a specific recipient
//! let hits = store.search_by_field("to", "someone@example.com").unwrap();
//! assert!(hits.is_empty() || hits[0].smtp_to.contains(&"someone@example.com".to_owned()));
//! ```
//!
//! ## Supported SMTP commands
//!
//! - `HELO` / `EHLO` - Identify the sender
//! - `MAIL FROM` - Specify the sender's address
//! - `RCPT TO` - Specify the destination (multiple destinations are supported)
//! - `DATA` - Send the email body
//! - `RSET` - Reset the current transaction (captured data is retained)
//! - `NOOP` - Do nothing
//! - `QUIT` - Close connection
//!
//! ## Searching
//!
//! Captured mail is searchable by the fields `to`, `cc`, `bcc`, and `from`
//! (lowercase, exact). Matching is case-insensitive exact equality on the
//! address. `to` and `from` also consult the SMTP envelope, so recipients
//! delivered via BCC are found under `to` even though no header names them;
//! `cc` and `bcc` match headers only.
//!
//! ## Notes
//!
//! - Only the "minimal implementation" defined in RFC 821 is implemented.
//! - Runs in-memory only. Email persistence is not supported.
//! - SMTP authentication is not supported.
//! - SSL/TLS connection is not supported.
//! - Mail relay is not supported.
//! - The store is append-only: captured transactions are never deleted or
//!   overwritten while the server runs.
//!
//! ## Size Limits
//!
//! The server enforces RFC 821 size limits:
//! - User names: 64 characters max
//! - Domain names: 64 characters max
//! - Paths: 256 characters max
//! - Command lines: 512 characters max
//! - Text lines: 1000 characters max
//!
//! Recipient count (default 100) and message size (default 10 MiB) are
//! configurable per instance, see [`config::Config`].

pub mod config;
pub mod http;
pub mod smtp;
pub mod store;

pub use config::{Config, ConfigError};
pub use smtp::{SmtpError, SmtpLimits, SmtpResponse, SmtpServer, SmtpSession, SmtpState};
pub use store::{MailAddress, MailStore, MailView, SearchError, SessionHandle, UNPARSABLE_TEXT, ViewHeader};
