/// Error code registry for wordtally
///
/// Error codes are organized by category:
/// - 1000-1999: Configuration and argument errors
/// - 2000-2999: Text source errors
/// - 3000-3999: Tokenization errors
/// - 4000-4999: Map/reduce execution errors
/// - 5000-5999: Cancellation
pub struct ErrorCode;

impl ErrorCode {
    // Configuration and argument errors (1000-1999)
    pub const CONFIG_GENERIC: u16 = 1000;
    pub const CONFIG_NOT_FOUND: u16 = 1001;
    pub const CONFIG_PARSE_ERROR: u16 = 1002;
    pub const INVALID_ARGUMENT: u16 = 1010;
    pub const INVALID_WORKER_COUNT: u16 = 1011;
    pub const INVALID_TOP_N: u16 = 1012;
    pub const INVALID_TIMEOUT: u16 = 1013;
    pub const INVALID_STATE_TRANSITION: u16 = 1020;

    // Text source errors (2000-2999)
    pub const FETCH_GENERIC: u16 = 2000;
    pub const FETCH_NOT_FOUND: u16 = 2001;
    pub const FETCH_HTTP_STATUS: u16 = 2002;
    pub const FETCH_NETWORK: u16 = 2003;
    pub const FETCH_IO: u16 = 2004;

    // Tokenization errors (3000-3999)
    pub const ENCODING_INVALID_UTF8: u16 = 3001;

    // Map/reduce execution errors (4000-4999)
    pub const WORKER_FAILED: u16 = 4001;
    pub const WORKER_PANICKED: u16 = 4002;
    pub const AGGREGATE_FAILURE: u16 = 4010;

    // Cancellation (5000-5999)
    pub const CANCELLED: u16 = 5001;
    pub const TIMED_OUT: u16 = 5002;
}

/// Get a human-readable description for an error code
pub fn describe_error_code(code: u16) -> &'static str {
    match code {
        ErrorCode::CONFIG_GENERIC => "General configuration error",
        ErrorCode::CONFIG_NOT_FOUND => "Configuration file not found",
        ErrorCode::CONFIG_PARSE_ERROR => "Configuration file could not be parsed",
        ErrorCode::INVALID_ARGUMENT => "Invalid argument",
        ErrorCode::INVALID_WORKER_COUNT => "Worker count must be at least 1",
        ErrorCode::INVALID_TOP_N => "Top-N must be at least 1",
        ErrorCode::INVALID_TIMEOUT => "Timeout must be at least 1 second",
        ErrorCode::INVALID_STATE_TRANSITION => "Illegal pipeline state transition",

        ErrorCode::FETCH_GENERIC => "Text source could not be read",
        ErrorCode::FETCH_NOT_FOUND => "Text source location does not exist",
        ErrorCode::FETCH_HTTP_STATUS => "Text source answered with an error status",
        ErrorCode::FETCH_NETWORK => "Text source is unreachable",
        ErrorCode::FETCH_IO => "I/O error while reading text source",

        ErrorCode::ENCODING_INVALID_UTF8 => "Document is not valid UTF-8 text",

        ErrorCode::WORKER_FAILED => "Map worker failed on its chunk",
        ErrorCode::WORKER_PANICKED => "Map worker panicked",
        ErrorCode::AGGREGATE_FAILURE => "Run aborted after chunk failure (fail-fast)",

        ErrorCode::CANCELLED => "Run was cancelled",
        ErrorCode::TIMED_OUT => "Run exceeded its deadline",

        _ => "Unknown error code",
    }
}
