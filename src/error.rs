/// Possible errors when writing to or reading from a container
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Only services can be registered as deferred
    #[error("`{key}` can't be registered as deferred service: value is not invokable")]
    NotInvokable { key: String },

    /// A service failed. The entry remains pending. The service's own error is
    /// kept unchanged as `source`, use `downcast_ref` on it to inspect the original type.
    #[error("service `{key}` failed: {source}")]
    Service {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("`{key}` holds a value of type {found}, but {expected} was requested")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        found: &'static str,
    },
}

pub type Result<T, E = Error> = core::result::Result<T, E>;

impl Error {
    pub fn key(&self) -> &str {
        match self {
            Error::NotInvokable { key }
            | Error::Service { key, .. }
            | Error::TypeMismatch { key, .. } => key.as_str(),
        }
    }
}

#[cfg(test)]
mod tests {
    use {super::*, std::error::Error as _};

    #[test]
    fn display_messages() {
        assert_eq!(
            "`mailer` can't be registered as deferred service: value is not invokable",
            Error::NotInvokable {
                key: "mailer".into()
            }
            .to_string()
        );
        assert_eq!(
            "`version` holds a value of type &str, but i32 was requested",
            Error::TypeMismatch {
                key: "version".into(),
                expected: "i32",
                found: "&str"
            }
            .to_string()
        );
    }

    #[test]
    fn service_error_keeps_source() {
        let error = Error::Service {
            key: "db".into(),
            source: anyhow::anyhow!("connection refused"),
        };
        assert_eq!("db", error.key());
        assert_eq!("service `db` failed: connection refused", error.to_string());
        assert_eq!(
            "connection refused",
            error.source().map(|s| s.to_string()).unwrap_or_default()
        );
    }
}
