//! Maps the `Authorization` header to the request's principal set (§4.F).
//! ACL assembly and the `Principal` type itself live in `queuey-core`;
//! this is the one I/O-adjacent piece, the application-key lookup.

use std::collections::HashMap;

use queuey_core::{Principal, QueueyError};

/// Parse `Authorization: Application <key>[; Application <key> ...]` into
/// the request's principal set. Every request carries `Everyone`; a
/// recognized key additionally grants `Application(<name>)`. A line
/// beginning `Application ` whose key isn't in `app_keys` fails the whole
/// request with `InvalidApplicationKey` — an unrecognized key is a
/// rejected credential, not silently ignored.
pub fn principals_from_header(
    header: Option<&str>,
    app_keys: &HashMap<String, String>,
) -> Result<Vec<Principal>, QueueyError> {
    let mut principals = vec![Principal::Everyone];
    let Some(header) = header else {
        return Ok(principals);
    };

    for line in header.split(';') {
        let line = line.trim();
        let Some(key) = line.strip_prefix("Application ") else {
            continue;
        };
        let key = key.trim();
        match app_keys.get(key) {
            Some(application) => principals.push(Principal::Application(application.clone())),
            None => return Err(QueueyError::InvalidApplicationKey),
        }
    }
    Ok(principals)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> HashMap<String, String> {
        HashMap::from([("abc123".to_string(), "acme".to_string())])
    }

    #[test]
    fn no_header_yields_only_everyone() {
        let principals = principals_from_header(None, &keys()).unwrap();
        assert_eq!(principals, vec![Principal::Everyone]);
    }

    #[test]
    fn recognized_key_grants_application_principal() {
        let principals = principals_from_header(Some("Application abc123"), &keys()).unwrap();
        assert!(principals.contains(&Principal::Application("acme".to_string())));
    }

    #[test]
    fn unrecognized_key_is_rejected() {
        let err = principals_from_header(Some("Application nope"), &keys()).unwrap_err();
        assert!(matches!(err, QueueyError::InvalidApplicationKey));
    }

    #[test]
    fn unrelated_auth_lines_are_ignored() {
        let principals = principals_from_header(Some("Basic deadbeef"), &keys()).unwrap();
        assert_eq!(principals, vec![Principal::Everyone]);
    }
}
