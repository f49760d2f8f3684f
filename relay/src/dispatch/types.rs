//! Message types carried through the dispatch queues.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which independent queue and worker handles a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DestinationKind {
    User,
    Group,
}

impl DestinationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DestinationKind::User => "user",
            DestinationKind::Group => "group",
        }
    }
}

impl fmt::Display for DestinationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message accepted from a producer, consumed exactly once by a worker.
///
/// Fields are private so the value cannot change after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    kind: DestinationKind,
    raw_identifier: String,
    body: String,
}

impl OutboundMessage {
    pub fn new(
        kind: DestinationKind,
        raw_identifier: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            raw_identifier: raw_identifier.into(),
            body: body.into(),
        }
    }

    pub fn user(raw_identifier: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(DestinationKind::User, raw_identifier, body)
    }

    pub fn group(raw_identifier: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(DestinationKind::Group, raw_identifier, body)
    }

    pub fn kind(&self) -> DestinationKind {
        self.kind
    }

    /// The identifier exactly as the request supplied it.
    pub fn raw_identifier(&self) -> &str {
        &self.raw_identifier
    }

    pub fn body(&self) -> &str {
        &self.body
    }
}

/// WhatsApp server suffix for individual users.
pub const USER_SERVER: &str = "s.whatsapp.net";

/// WhatsApp server suffix for groups.
pub const GROUP_SERVER: &str = "g.us";

/// Transport address of a user or group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    kind: DestinationKind,
    identifier: String,
}

impl Destination {
    pub(crate) fn new(kind: DestinationKind, identifier: String) -> Self {
        Self { kind, identifier }
    }

    pub fn kind(&self) -> DestinationKind {
        self.kind
    }

    /// Normalized identifier, without the server suffix.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn server(&self) -> &'static str {
        match self.kind {
            DestinationKind::User => USER_SERVER,
            DestinationKind::Group => GROUP_SERVER,
        }
    }

    /// Full JID, e.g. `491234567890@s.whatsapp.net`.
    pub fn jid(&self) -> String {
        format!("{}@{}", self.identifier, self.server())
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.identifier, self.server())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destination_jid() {
        let user = Destination::new(DestinationKind::User, "491234567890".to_string());
        assert_eq!(user.jid(), "491234567890@s.whatsapp.net");

        let group = Destination::new(DestinationKind::Group, "120363417630801571".to_string());
        assert_eq!(group.jid(), "120363417630801571@g.us");
        assert_eq!(group.to_string(), group.jid());
    }

    #[test]
    fn test_kind_serialization() {
        let kind: DestinationKind = serde_json::from_str("\"group\"").unwrap();
        assert_eq!(kind, DestinationKind::Group);
        assert_eq!(serde_json::to_string(&DestinationKind::User).unwrap(), "\"user\"");
        assert!(serde_json::from_str::<DestinationKind>("\"channel\"").is_err());
    }
}
