//! Status mapping. This is the ONLY place that interprets status codes.

use crate::error::FetchError;
use crate::transport::RawResponse;
use crate::FetchOutcome;

/// Map a raw exchange to a fetch outcome.
///
/// 2xx yields the body, any other status is a server error, and a missing or
/// zero status is an unexpected response.
pub fn classify(response: RawResponse) -> FetchOutcome {
    match response.status {
        Some(200..=299) => Ok(response.body),
        Some(0) | None => Err(FetchError::UnexpectedResponse),
        Some(status) => Err(FetchError::Server { status }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use proptest::prelude::*;

    #[test]
    fn missing_status_is_unexpected() {
        let response = RawResponse {
            status: None,
            body: Bytes::from_static(b"?"),
        };
        assert!(matches!(
            classify(response),
            Err(FetchError::UnexpectedResponse)
        ));
        assert!(matches!(
            classify(RawResponse::new(0, "")),
            Err(FetchError::UnexpectedResponse)
        ));
    }

    #[test]
    fn success_keeps_body() {
        let body = classify(RawResponse::new(200, "{\"message\":[]}")).unwrap();
        assert_eq!(&body[..], b"{\"message\":[]}");
    }

    #[test]
    fn redirects_and_client_errors_are_server_errors() {
        for status in [301, 304, 404, 429] {
            assert!(matches!(
                classify(RawResponse::new(status, "")),
                Err(FetchError::Server { status: s }) if s == status
            ));
        }
    }

    proptest! {
        #[test]
        fn two_hundreds_are_success(status in 200u16..300) {
            prop_assert!(classify(RawResponse::new(status, "ok")).is_ok());
        }

        #[test]
        fn everything_else_is_server_error(
            status in prop_oneof![1u16..200, 300u16..=999]
        ) {
            let outcome = classify(RawResponse::new(status, ""));
            let is_server_error =
                matches!(outcome, Err(FetchError::Server { status: s }) if s == status);
            prop_assert!(is_server_error);
        }
    }
}
