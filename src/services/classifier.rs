use crate::models::job::ErrorKind;

const TRANSIENT_MARKERS: &[&str] = &["timeout", "connection", "network", "temporary"];
const API_MARKERS: &[&str] = &["api", "rate limit", "quota"];
const VALIDATION_MARKERS: &[&str] = &["validation", "invalid", "required"];

/// Classify an untyped error by its message text.
///
/// This is a heuristic: a case-insensitive substring match checked in the
/// order transient, api_error, validation. It only applies to
/// [`GenerationError::Opaque`](crate::error::GenerationError::Opaque);
/// typed errors report their own kind.
pub fn classify(message: &str) -> ErrorKind {
    let message = message.to_lowercase();
    let contains_any = |markers: &[&str]| markers.iter().any(|m| message.contains(m));

    if contains_any(TRANSIENT_MARKERS) {
        ErrorKind::Transient
    } else if contains_any(API_MARKERS) {
        ErrorKind::ApiError
    } else if contains_any(VALIDATION_MARKERS) {
        ErrorKind::Validation
    } else {
        ErrorKind::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_markers() {
        assert_eq!(classify("Connection reset by peer"), ErrorKind::Transient);
        assert_eq!(classify("read TIMEOUT"), ErrorKind::Transient);
        assert_eq!(classify("temporary failure in name resolution"), ErrorKind::Transient);
    }

    #[test]
    fn test_api_markers() {
        assert_eq!(classify("Rate limit reached"), ErrorKind::ApiError);
        assert_eq!(classify("monthly quota exhausted"), ErrorKind::ApiError);
    }

    #[test]
    fn test_validation_markers() {
        assert_eq!(classify("field destination is required"), ErrorKind::Validation);
        assert_eq!(classify("Invalid date"), ErrorKind::Validation);
    }

    #[test]
    fn test_precedence() {
        // Transient wins over api, api wins over validation.
        assert_eq!(classify("api connection dropped"), ErrorKind::Transient);
        assert_eq!(classify("invalid api key"), ErrorKind::ApiError);
    }

    #[test]
    fn test_unknown_fallback() {
        assert_eq!(classify("segfault in llama"), ErrorKind::Unknown);
        assert_eq!(classify(""), ErrorKind::Unknown);
    }
}
