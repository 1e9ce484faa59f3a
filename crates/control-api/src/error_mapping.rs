//! Maps `synopticon_types::ErrorKind` onto the HTTP status spec §7's
//! "External signal" column names.

use axum::http::StatusCode;
use synopticon_types::ErrorKind;

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InputValidation => StatusCode::BAD_REQUEST,
        ErrorKind::Initialization => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::ModelUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::ResourceExhausted => StatusCode::TOO_MANY_REQUESTS,
        ErrorKind::DownstreamFailure => StatusCode::BAD_GATEWAY,
        // `circuit_open` should never leak past a respected breaker (spec
        // §7); if it somehow does, treat it like any other internal fault
        // rather than inventing a bespoke status code for it.
        ErrorKind::CircuitOpen | ErrorKind::Unknown | ErrorKind::ProcessingTimeout => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
