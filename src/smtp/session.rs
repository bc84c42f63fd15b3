//! Per-connection SMTP protocol state

use crate::smtp::error::{SmtpError, SmtpLimits};
use crate::store::SessionHandle;

/// Represents the current state of an SMTP session
#[derive(Debug, Clone, PartialEq)]
pub enum SmtpState {
    /// Initial state - waiting for HELO/EHLO
    Initial,
    /// HELO received - ready for MAIL command
    GreetingReceived,
    /// MAIL FROM received - ready for RCPT commands
    MailReceived,
    /// At least one RCPT TO received - ready for DATA or more RCPT commands
    RecipientsReceived,
    /// DATA command received - collecting message data
    DataMode,
}

/// Protocol state machine for one connection.
///
/// Sequencing, size limits, and data collection live here; every accepted
/// envelope write goes straight through the capture handle, so the store sees
/// commands exactly as they were received. The capture handle enforces its
/// own invariants (sender once, transcript once, recipients append-only)
/// independently of the protocol state.
#[derive(Debug)]
pub struct SmtpSession {
    /// Current state of the session
    pub state: SmtpState,
    /// Whether we're currently in data collection mode
    pub in_data_mode: bool,
    /// Client domain from HELO/EHLO command
    pub client_domain: Option<String>,
    /// Message data lines collected during DATA mode
    data: Vec<String>,
    /// Total size of data collected so far
    data_size: usize,
    /// Recipients accepted in the current transaction
    recipient_count: usize,
    limits: SmtpLimits,
    handle: SessionHandle,
}

impl SmtpSession {
    /// Create the protocol state for a freshly captured connection
    pub fn new(handle: SessionHandle, limits: SmtpLimits) -> Self {
        Self {
            state: SmtpState::Initial,
            in_data_mode: false,
            client_domain: None,
            data: Vec::new(),
            data_size: 0,
            recipient_count: 0,
            limits,
            handle,
        }
    }

    /// Reset to post-HELO state, clearing protocol-level transaction state.
    /// The capture record is append-only and keeps everything seen so far.
    pub fn reset(&mut self) {
        self.state = SmtpState::GreetingReceived;
        self.data.clear();
        self.in_data_mode = false;
        self.data_size = 0;
        self.recipient_count = 0;
        // Keep client_domain as it's set by HELO
        self.handle.reset();
    }

    /// Record the sender address
    pub fn set_sender(&mut self, sender: String, options: Option<String>) -> Result<(), SmtpError> {
        if sender.len() > SmtpLimits::PATH_MAX_LENGTH {
            return Err(SmtpError::PathTooLong {
                max: SmtpLimits::PATH_MAX_LENGTH,
            });
        }

        self.handle.set_sender(&sender, options.as_deref());
        self.data.clear();
        self.data_size = 0;
        self.recipient_count = 0;
        self.state = SmtpState::MailReceived;
        Ok(())
    }

    /// Record a recipient address
    pub fn add_recipient(
        &mut self,
        recipient: String,
        options: Option<String>,
    ) -> Result<(), SmtpError> {
        if recipient.len() > SmtpLimits::PATH_MAX_LENGTH {
            return Err(SmtpError::PathTooLong {
                max: SmtpLimits::PATH_MAX_LENGTH,
            });
        }

        if self.recipient_count >= self.limits.max_recipients {
            return Err(SmtpError::TooManyRecipients {
                max: self.limits.max_recipients,
            });
        }

        self.handle.add_recipient(&recipient, options.as_deref());
        self.recipient_count += 1;
        self.state = SmtpState::RecipientsReceived;
        Ok(())
    }

    /// Start data collection mode
    pub fn start_data_mode(&mut self) -> Result<(), SmtpError> {
        if self.state != SmtpState::RecipientsReceived {
            return Err(SmtpError::InvalidState(
                "DATA command requires RCPT first".to_string(),
            ));
        }

        self.in_data_mode = true;
        self.data.clear();
        self.data_size = 0;
        self.state = SmtpState::DataMode;
        Ok(())
    }

    /// Add a line of data during data collection
    pub fn add_data_line(&mut self, line: String) -> Result<(), SmtpError> {
        let line_size = line.len() + 2; // +2 for CRLF

        if line_size > SmtpLimits::TEXT_LINE_MAX_LENGTH {
            return Err(SmtpError::LineTooLong {
                max: SmtpLimits::TEXT_LINE_MAX_LENGTH,
            });
        }

        if self.data_size + line_size > self.limits.max_data_size {
            return Err(SmtpError::TooMuchData {
                max: self.limits.max_data_size,
            });
        }

        self.data.push(line);
        self.data_size += line_size;
        Ok(())
    }

    /// Finish data collection and hand the transcript to the capture record
    pub fn finish_data_collection(&mut self) -> Result<(), SmtpError> {
        if !self.in_data_mode {
            return Err(SmtpError::InvalidState(
                "Not in data collection mode".to_string(),
            ));
        }

        let mut transcript = self.data.join("\r\n");
        transcript.push_str("\r\n");
        self.handle.write_transcript(transcript);

        self.data.clear();
        self.data_size = 0;
        self.in_data_mode = false;
        self.state = SmtpState::GreetingReceived;
        Ok(())
    }

    /// Record the client domain from the HELO/EHLO command
    pub fn set_client_domain(&mut self, domain: String) -> Result<(), SmtpError> {
        if domain.len() > SmtpLimits::DOMAIN_MAX_LENGTH {
            return Err(SmtpError::DomainTooLong {
                max: SmtpLimits::DOMAIN_MAX_LENGTH,
            });
        }

        self.handle.set_client_host(&domain);
        self.client_domain = Some(domain);
        self.reset(); // Clear any existing protocol transaction
        Ok(())
    }

    /// Check if the session is ready for a specific command
    pub fn can_execute_command(&self, command: &str) -> bool {
        match command.to_uppercase().as_str() {
            "HELO" | "EHLO" => true, // Greetings can be sent at any time
            "MAIL" => self.state == SmtpState::GreetingReceived,
            "RCPT" => {
                self.state == SmtpState::MailReceived || self.state == SmtpState::RecipientsReceived
            }
            "DATA" => self.state == SmtpState::RecipientsReceived,
            "RSET" => self.state != SmtpState::Initial,
            "NOOP" => true, // NOOP can be sent at any time
            "QUIT" => true, // QUIT can be sent at any time
            _ => false,
        }
    }

    /// Get the current recipient count for this transaction
    pub fn recipient_count(&self) -> usize {
        self.recipient_count
    }

    /// Get the current data size
    pub fn current_data_size(&self) -> usize {
        self.data_size
    }
}
