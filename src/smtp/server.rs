//! SMTP listener

use crate::smtp::commands::SmtpCommandHandler;
use crate::smtp::error::{SmtpError, SmtpLimits};
use crate::smtp::response::SmtpResponse;
use crate::smtp::session::SmtpSession;
use crate::store::MailStore;

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;

use tracing::{debug, info, warn};

/// SMTP server that records every transaction into a shared [`MailStore`]
#[derive(Debug, Clone)]
pub struct SmtpServer {
    /// Server hostname announced in the greeting
    hostname: String,
    limits: SmtpLimits,
    store: Arc<MailStore>,
}

impl SmtpServer {
    /// Create a new SMTP server backed by the given store
    pub fn new(hostname: &str, limits: SmtpLimits, store: Arc<MailStore>) -> Self {
        Self {
            hostname: hostname.to_owned(),
            limits,
            store,
        }
    }

    /// Start the server on the specified address (blocking).
    /// Each connection is served on its own thread.
    pub fn start(&self, addr: &str) -> Result<(), SmtpError> {
        let listener = TcpListener::bind(addr)?;
        self.serve(listener)
    }

    /// Start the server with an existing listener (blocking)
    pub fn start_with_listener(&self, listener: TcpListener) -> Result<(), SmtpError> {
        self.serve(listener)
    }

    fn serve(&self, listener: TcpListener) -> Result<(), SmtpError> {
        info!(
            addr = %listener.local_addr().map_err(SmtpError::Io)?,
            "SMTP server listening"
        );

        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    let server = self.clone();
                    thread::spawn(move || {
                        if let Err(e) = server.handle_client(stream) {
                            warn!("Error handling client: {e}");
                        }
                    });
                }
                Err(e) => {
                    warn!("Error accepting connection: {e}");
                }
            }
        }

        Ok(())
    }

    /// Handle a client connection
    fn handle_client(&self, mut stream: TcpStream) -> Result<(), SmtpError> {
        let client_addr = stream.peer_addr()?.to_string();
        debug!(client = %client_addr, "client connected");

        // Every connection gets a capture record, published up front
        let handle = self.store.create_session(client_addr, false);
        let mut session = SmtpSession::new(handle, self.limits);

        let command_handler = SmtpCommandHandler::new(&self.hostname, self.limits);
        let mut reader = BufReader::new(stream.try_clone()?);

        // Send greeting
        self.send_response(&mut stream, &SmtpResponse::greeting(&self.hostname))?;

        let mut line_buffer = Vec::new();
        loop {
            line_buffer.clear();

            match reader.read_until(b'\n', &mut line_buffer) {
                Ok(0) => break, // Connection closed
                Ok(_) => {
                    // Handle potential UTF-8 issues gracefully
                    let line = match String::from_utf8(line_buffer.clone()) {
                        Ok(s) => s,
                        Err(_) => String::from_utf8_lossy(&line_buffer).into_owned(),
                    };

                    if session.in_data_mode {
                        // Strip only the line terminator; leading whitespace
                        // is significant in message data
                        let line = line.trim_end_matches(['\r', '\n']);
                        match self.handle_data_line(line, &mut session) {
                            Ok(Some(response)) => {
                                self.send_response(&mut stream, &response)?;
                            }
                            Ok(None) => {
                                // Continue collecting data
                            }
                            Err(e) => {
                                let response = SmtpResponse::error(
                                    e.to_response_code(),
                                    &e.to_response_message(),
                                );
                                self.send_response(&mut stream, &response)?;
                                session.reset();
                            }
                        }
                    } else {
                        let command = line.trim();
                        if command.is_empty() {
                            continue;
                        }

                        match command_handler.process_command(command, &mut session) {
                            Ok(response) => {
                                self.send_response(&mut stream, &response)?;
                                if response.code == "221" {
                                    break; // QUIT command
                                }
                            }
                            Err(e) => {
                                let response = SmtpResponse::error(
                                    e.to_response_code(),
                                    &e.to_response_message(),
                                );
                                self.send_response(&mut stream, &response)?;

                                // Don't automatically reset on all 5xx errors
                                // Let the command handler manage session state
                            }
                        }
                    }
                }
                Err(e) => {
                    warn!("Error reading from client: {e}");
                    break;
                }
            }
        }

        debug!("client disconnected");
        Ok(())
    }

    /// Handle a line of data during DATA mode
    fn handle_data_line(
        &self,
        line: &str,
        session: &mut SmtpSession,
    ) -> Result<Option<SmtpResponse>, SmtpError> {
        if line == "." {
            // End of data
            session.finish_data_collection()?;
            Ok(Some(SmtpResponse::ok()))
        } else {
            // Transparency: a leading dot is doubled on the wire
            let line = if line.starts_with("..") { &line[1..] } else { line };
            session.add_data_line(line.to_string())?;
            Ok(None)
        }
    }

    /// Send a response to the client
    fn send_response(
        &self,
        stream: &mut TcpStream,
        response: &SmtpResponse,
    ) -> Result<(), SmtpError> {
        // Ensure response doesn't exceed maximum line length
        let formatted = response.format();
        if formatted.len() > SmtpLimits::REPLY_LINE_MAX_LENGTH {
            let truncated_response =
                SmtpResponse::new(&response.code, "Response too long (truncated)");
            stream.write_all(truncated_response.format().as_bytes())?;
        } else {
            stream.write_all(formatted.as_bytes())?;
        }
        stream.flush()?;
        Ok(())
    }
}
