//! JetStream name validation.

use crate::{Error, Result};

/// Checks that `name` is usable as a JetStream stream or bucket name.
///
/// Names become subject tokens, so only ASCII letters, digits, `-` and `_` are accepted.
/// `what` names the resource in the error message.
pub fn validate(what: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::invalid_config(format!("{what} name cannot be empty")));
    }

    let valid = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(Error::invalid_config(format!(
            "{what} name '{name}' may only contain ASCII letters, digits, '-' and '_'"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_generated_names() {
        assert!(validate("queue", "message-queue-2f1e4d0a-9b1c-4e7b-8a55-0d6a3c1f2b3e").is_ok());
        assert!(validate("bucket", "bodies_v2").is_ok());
    }

    #[test]
    fn rejects_subject_characters() {
        assert!(validate("queue", "").is_err());
        assert!(validate("queue", "orders.created").is_err());
        assert!(validate("queue", "orders>").is_err());
        assert!(validate("bucket", "with space").is_err());
    }
}
