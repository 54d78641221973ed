//! The `utils` module provides the pieces shared by every other module:
//! error types and logging setup.

pub mod error;
pub mod logging;

#[cfg(test)]
mod tests {
    use super::error::{CodecError, ProtocolError};
    use super::logging;

    #[test]
    fn logging_init_accepts_levels() {
        // Should not panic
        logging::init("info");
        logging::init("debug");
        logging::init("warn");
        logging::init("nonsense");
    }

    #[test]
    fn bad_format_keeps_raw_payload() {
        let err = ProtocolError::bad_format(b"%%%", CodecError::MissingRoot);
        assert!(err.is_recoverable());
        match &err {
            ProtocolError::BadFormat { payload, .. } => assert_eq!(payload, b"%%%"),
            other => panic!("expected BadFormat, got {other:?}"),
        }
        assert!(err.to_string().contains("%%%"));
    }

    #[test]
    fn io_errors_are_not_recoverable() {
        let err = ProtocolError::from(std::io::Error::from(std::io::ErrorKind::ConnectionReset));
        assert!(!err.is_recoverable());
    }
}
