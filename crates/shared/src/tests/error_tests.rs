use super::*;

#[test]
fn status_codes_map_to_error_codes() {
    assert_eq!(ErrorCode::from_status(400), ErrorCode::Validation);
    assert_eq!(ErrorCode::from_status(401), ErrorCode::Unauthorized);
    assert_eq!(ErrorCode::from_status(403), ErrorCode::Forbidden);
    assert_eq!(ErrorCode::from_status(404), ErrorCode::NotFound);
    assert_eq!(ErrorCode::from_status(409), ErrorCode::Conflict);
    assert_eq!(ErrorCode::from_status(429), ErrorCode::RateLimited);
    assert_eq!(ErrorCode::from_status(503), ErrorCode::ServiceUnavailable);
    assert_eq!(ErrorCode::from_status(500), ErrorCode::Internal);
    assert_eq!(ErrorCode::from_status(302), ErrorCode::Unexpected);
}

#[test]
fn only_server_side_codes_are_transient() {
    assert!(ErrorCode::RateLimited.is_transient());
    assert!(ErrorCode::ServiceUnavailable.is_transient());
    assert!(ErrorCode::Internal.is_transient());
    assert!(!ErrorCode::Validation.is_transient());
    assert!(!ErrorCode::NotFound.is_transient());
    assert!(!ErrorCode::Unexpected.is_transient());
}

#[test]
fn knora_error_body_is_unwrapped() {
    let err = ApiError::from_response(400, r#"{"error":"dsp.errors.BadRequestException: duplicate"}"#);
    assert_eq!(err.code, ErrorCode::Validation);
    assert_eq!(err.message, "dsp.errors.BadRequestException: duplicate");
}

#[test]
fn plain_body_is_kept() {
    let err = ApiError::from_response(502, "Bad Gateway");
    assert_eq!(err.message, "Bad Gateway");
    assert!(err.is_transient());
}
