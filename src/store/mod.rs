//! Capture store for received mail transactions

pub mod search;
pub mod view;

pub use search::SearchError;
pub use view::{MailAddress, MailView, UNPARSABLE_TEXT, ViewHeader};

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use chrono::{DateTime, Utc};

/// One captured mail transaction.
///
/// Connection metadata is fixed at creation time. The transaction fields
/// (sender, recipients, transcript) are written by the single connection that
/// owns the session, through its [`SessionHandle`]; everyone else only reads.
#[derive(Debug)]
pub struct CaptureSession {
    received_time: DateTime<Utc>,
    client_addr: String,
    tls_used: bool,
    state: Mutex<Transaction>,
}

/// Mutable transaction state, owned by one connection during capture.
#[derive(Debug, Clone, Default)]
pub(crate) struct Transaction {
    pub(crate) client_host: String,
    pub(crate) mail_from: Option<String>,
    pub(crate) mail_options: Option<String>,
    pub(crate) rcpt_to: Vec<String>,
    pub(crate) rcpt_options: Vec<Option<String>>,
    pub(crate) data: Option<String>,
    pub(crate) authenticated: bool,
    pub(crate) auth_mechanism: String,
}

impl CaptureSession {
    pub fn received_time(&self) -> DateTime<Utc> {
        self.received_time
    }

    pub fn client_addr(&self) -> &str {
        &self.client_addr
    }

    pub fn tls_used(&self) -> bool {
        self.tls_used
    }

    /// Clone the transaction fields out from under the session lock.
    ///
    /// The lock is held only for the clone, never across parsing.
    pub(crate) fn transaction(&self) -> Transaction {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Transaction> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Write capability for the connection that owns a [`CaptureSession`].
///
/// This is the only way to mutate a session after it has been published to
/// the store, and it is handed to exactly one connection.
#[derive(Debug)]
pub struct SessionHandle {
    session: Arc<CaptureSession>,
}

impl SessionHandle {
    /// Record the hostname announced by the client (HELO/EHLO argument).
    pub fn set_client_host(&self, host: &str) {
        self.session.lock().client_host = host.to_owned();
    }

    /// Record the envelope sender. The first write wins; a session has
    /// exactly one sender for its whole lifetime.
    pub fn set_sender(&self, sender: &str, options: Option<&str>) {
        let mut tx = self.session.lock();
        if tx.mail_from.is_none() {
            tx.mail_from = Some(sender.to_owned());
            tx.mail_options = options.map(str::to_owned);
        }
    }

    /// Append an envelope recipient. The list only ever grows; duplicates
    /// are kept in the order they arrived.
    pub fn add_recipient(&self, recipient: &str, options: Option<&str>) {
        let mut tx = self.session.lock();
        tx.rcpt_to.push(recipient.to_owned());
        tx.rcpt_options.push(options.map(str::to_owned));
    }

    /// Record the raw message transcript, written once and in full.
    /// Subsequent writes are ignored.
    pub fn write_transcript(&self, data: String) {
        let mut tx = self.session.lock();
        if tx.data.is_none() {
            tx.data = Some(data);
        }
    }

    /// Protocol-level reset. Captured data is retained; the store is
    /// append-only and never forgets what it has seen.
    pub fn reset(&self) {}

    /// Release the write capability. The session stays in the store and is
    /// treated as immutable from here on.
    pub fn close(self) {}
}

/// Append-only, concurrency-safe collection of captured sessions.
///
/// The lock guards only the pointer list. Appends take it exclusively,
/// snapshots take it shared and clone the list of `Arc`s, so parsing and
/// encoding always happen with the lock released.
#[derive(Debug, Default)]
pub struct MailStore {
    sessions: RwLock<Vec<Arc<CaptureSession>>>,
}

impl MailStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a new session, publish it to the store, and hand the write
    /// capability to the calling connection. Never fails.
    pub fn create_session(&self, client_addr: String, tls_used: bool) -> SessionHandle {
        let session = Arc::new(CaptureSession {
            received_time: Utc::now(),
            client_addr,
            tls_used,
            state: Mutex::new(Transaction::default()),
        });

        self.write_lock().push(Arc::clone(&session));

        SessionHandle { session }
    }

    /// Copy of the current session list, in creation order.
    pub fn snapshot(&self) -> Vec<Arc<CaptureSession>> {
        self.read_lock().clone()
    }

    /// Project every captured session to a searchable view.
    pub fn get_all_data(&self) -> Vec<MailView> {
        self.snapshot().iter().map(|s| view::project(s)).collect()
    }

    pub fn len(&self) -> usize {
        self.read_lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_lock().is_empty()
    }

    fn read_lock(&self) -> std::sync::RwLockReadGuard<'_, Vec<Arc<CaptureSession>>> {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_lock(&self) -> std::sync::RwLockWriteGuard<'_, Vec<Arc<CaptureSession>>> {
        self.sessions.write().unwrap_or_else(PoisonError::into_inner)
    }
}
