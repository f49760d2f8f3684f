//! Maps a raw request identifier to a transport destination.
//!
//! Resolution normalizes but does not validate: anything other than a
//! leading `+` on a phone number is passed through, and the transport is
//! the authority on whether the address exists.

use thiserror::Error;

use super::types::{Destination, DestinationKind};

/// The identifier is empty once normalized and names no address at all.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("empty {kind} identifier")]
pub struct ResolveError {
    pub kind: DestinationKind,
}

/// Resolve a raw identifier of the given kind.
pub fn resolve(kind: DestinationKind, raw_identifier: &str) -> Result<Destination, ResolveError> {
    let identifier = match kind {
        DestinationKind::User => raw_identifier.strip_prefix('+').unwrap_or(raw_identifier),
        DestinationKind::Group => raw_identifier,
    };

    if identifier.is_empty() {
        return Err(ResolveError { kind });
    }

    Ok(Destination::new(kind, identifier.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_strips_leading_plus() {
        let dest = resolve(DestinationKind::User, "+491234567890").unwrap();
        assert_eq!(dest.identifier(), "491234567890");
        assert_eq!(dest.jid(), "491234567890@s.whatsapp.net");
    }

    #[test]
    fn test_user_without_plus_unchanged() {
        let dest = resolve(DestinationKind::User, "1234567890").unwrap();
        assert_eq!(dest.identifier(), "1234567890");
    }

    #[test]
    fn test_user_only_first_plus_stripped() {
        // Not a validator: everything after the first character is passed through
        let dest = resolve(DestinationKind::User, "++49 (123) abc").unwrap();
        assert_eq!(dest.identifier(), "+49 (123) abc");
    }

    #[test]
    fn test_group_verbatim() {
        let dest = resolve(DestinationKind::Group, "+120363417630801571").unwrap();
        assert_eq!(dest.identifier(), "+120363417630801571");
        assert_eq!(dest.jid(), "+120363417630801571@g.us");
    }

    #[test]
    fn test_empty_identifier() {
        assert_eq!(
            resolve(DestinationKind::User, "+"),
            Err(ResolveError { kind: DestinationKind::User })
        );
        assert!(resolve(DestinationKind::Group, "").is_err());
    }

    #[test]
    fn test_deterministic() {
        let a = resolve(DestinationKind::User, "+4915").unwrap();
        let b = resolve(DestinationKind::User, "+4915").unwrap();
        assert_eq!(a, b);
    }
}
