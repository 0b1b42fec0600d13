use std::fmt::{self, Debug, Display};

/// Wraps configuration values (tokens, keys) so that they never end up in logs by accident.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Secret<T>(T);

impl<T> Secret<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    pub fn reveal(&self) -> &T {
        &self.0
    }
}

impl Secret<String> {
    pub fn is_set(&self) -> bool {
        !self.0.is_empty()
    }
}

impl<T> Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

impl<T> Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

#[cfg(test)]
mod test {
    use super::Secret;

    #[test]
    fn secrets_are_not_printed() {
        let token = Secret::new("hunter2".to_string());
        assert_eq!(format!("{token}"), "<redacted>");
        assert_eq!(format!("{token:?}"), "Secret(<redacted>)");
        assert_eq!(token.reveal(), "hunter2");
        assert!(token.is_set());
        assert!(!Secret::new(String::new()).is_set());
    }
}
