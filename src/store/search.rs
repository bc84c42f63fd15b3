//! Field-based search over captured mail

use thiserror::Error;

use super::MailStore;
use super::view::{MailAddress, MailView};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SearchError {
    #[error("invalid search field: {0:?}")]
    InvalidField(String),
}

/// The four searchable fields. Tokens are matched exactly; `"TO"` and the
/// empty string are invalid, not aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SearchField {
    To,
    Cc,
    Bcc,
    From,
}

impl SearchField {
    fn parse(field: &str) -> Result<Self, SearchError> {
        match field {
            "to" => Ok(Self::To),
            "cc" => Ok(Self::Cc),
            "bcc" => Ok(Self::Bcc),
            "from" => Ok(Self::From),
            other => Err(SearchError::InvalidField(other.to_owned())),
        }
    }
}

impl MailStore {
    /// Return the views whose given field contains `email`, in capture order.
    ///
    /// The comparison is case-insensitive exact equality on the trimmed
    /// address. "to" and "from" consult both the parsed header and the SMTP
    /// envelope: the envelope is authoritative for delivery (it carries BCC
    /// recipients the headers deliberately omit) while headers are
    /// authoritative for what the message claims. "cc" and "bcc" have no
    /// envelope counterpart and match on headers only, so a delivered-but-
    /// headerless BCC recipient is found via "to", not via "bcc".
    pub fn search_by_field(&self, field: &str, email: &str) -> Result<Vec<MailView>, SearchError> {
        let field = SearchField::parse(field)?;
        let needle = email.trim().to_lowercase();

        let results = self
            .get_all_data()
            .into_iter()
            .filter(|view| match field {
                SearchField::To => {
                    contains_address(&view.to, &needle) || contains_string(&view.smtp_to, &needle)
                }
                SearchField::Cc => contains_address(&view.cc, &needle),
                SearchField::Bcc => contains_address(&view.bcc, &needle),
                SearchField::From => {
                    contains_address(&view.from, &needle)
                        || view.smtp_from.to_lowercase() == needle
                }
            })
            .collect();

        Ok(results)
    }
}

/// Membership test over a parsed address list. Placeholder entries with an
/// empty address never match.
fn contains_address(addresses: &[MailAddress], needle: &str) -> bool {
    addresses
        .iter()
        .any(|a| !a.address.is_empty() && a.address.to_lowercase() == needle)
}

fn contains_string(emails: &[String], needle: &str) -> bool {
    emails.iter().any(|e| e.to_lowercase() == needle)
}
