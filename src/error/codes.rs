/// Error code registry for fitpal
///
/// Error codes are organized by category:
/// - 1000-1999: Configuration errors
/// - 2000-2999: Turn and checkpoint errors
/// - 3000-3999: Storage errors
/// - 4000-4999: Oracle errors
/// - 7000-7999: Validation errors
#[allow(dead_code)]
pub struct ErrorCode;

impl ErrorCode {
    // Configuration errors (1000-1999)
    pub const CONFIG_GENERIC: u16 = 1000;
    pub const CONFIG_NOT_FOUND: u16 = 1001;
    pub const CONFIG_INVALID_TOML: u16 = 1002;
    pub const CONFIG_INVALID_JSON: u16 = 1003;
    pub const CONFIG_MISSING_REQUIRED: u16 = 1004;
    pub const CONFIG_INVALID_VALUE: u16 = 1005;

    // Turn errors (2000-2999)
    pub const TURN_GENERIC: u16 = 2000;
    pub const TURN_NOT_FOUND: u16 = 2001;
    pub const TURN_IN_PROGRESS: u16 = 2002;
    pub const TURN_NOT_AWAITING: u16 = 2003;
    pub const CHECKPOINT_CORRUPTED: u16 = 2005;
    pub const CHECKPOINT_INCOMPATIBLE_VERSION: u16 = 2006;
    pub const CHECKPOINT_WRITE_FAILED: u16 = 2007;

    // Storage errors (3000-3999)
    pub const STORAGE_IO_ERROR: u16 = 3001;
    pub const STORAGE_PERMISSION_DENIED: u16 = 3002;
    pub const STORAGE_NOT_FOUND: u16 = 3004;
    pub const STORAGE_ALREADY_EXISTS: u16 = 3005;
    pub const STORAGE_CORRUPTED: u16 = 3006;
    pub const STORAGE_BACKEND_ERROR: u16 = 3010;
    pub const STORAGE_SERIALIZATION_ERROR: u16 = 3011;
    pub const STORAGE_WRITE_NOT_COMMITTED: u16 = 3013;

    // Oracle errors (4000-4999)
    pub const ORACLE_TRANSPORT: u16 = 4001;
    pub const ORACLE_TIMEOUT: u16 = 4002;
    pub const ORACLE_UNAVAILABLE: u16 = 4003;
    pub const ORACLE_INVALID_RESPONSE: u16 = 4004;
    pub const ORACLE_RATE_LIMITED: u16 = 4005;
    pub const ORACLE_UNAUTHORIZED: u16 = 4006;

    // Validation errors (7000-7999)
    pub const VALIDATION_INVALID_INPUT: u16 = 7001;
    pub const VALIDATION_EMPTY_TURN: u16 = 7003;
    pub const VALIDATION_INVALID_IDENTIFIER: u16 = 7004;
}

/// Get a human-readable description for an error code
pub fn describe_error_code(code: u16) -> &'static str {
    match code {
        ErrorCode::CONFIG_GENERIC => "General configuration error",
        ErrorCode::CONFIG_NOT_FOUND => "Configuration file not found",
        ErrorCode::CONFIG_INVALID_TOML => "Configuration file is not valid TOML",
        ErrorCode::CONFIG_INVALID_JSON => "Input is not valid JSON",
        ErrorCode::CONFIG_MISSING_REQUIRED => "Required configuration value is missing",
        ErrorCode::CONFIG_INVALID_VALUE => "Configuration value is invalid",

        ErrorCode::TURN_GENERIC => "General turn processing error",
        ErrorCode::TURN_NOT_FOUND => "No suspended turn found for the conversation",
        ErrorCode::TURN_IN_PROGRESS => "Another turn for this conversation is still in flight",
        ErrorCode::TURN_NOT_AWAITING => "The turn is not waiting for a confirmation",
        ErrorCode::CHECKPOINT_CORRUPTED => "Turn checkpoint could not be parsed",
        ErrorCode::CHECKPOINT_INCOMPATIBLE_VERSION => "Turn checkpoint version is not supported",
        ErrorCode::CHECKPOINT_WRITE_FAILED => "Turn checkpoint could not be written",

        ErrorCode::STORAGE_IO_ERROR => "Storage I/O failure",
        ErrorCode::STORAGE_PERMISSION_DENIED => "Storage permission denied",
        ErrorCode::STORAGE_NOT_FOUND => "Storage item not found",
        ErrorCode::STORAGE_ALREADY_EXISTS => "Storage item already exists",
        ErrorCode::STORAGE_CORRUPTED => "Storage data is corrupted",
        ErrorCode::STORAGE_BACKEND_ERROR => "Storage backend error",
        ErrorCode::STORAGE_SERIALIZATION_ERROR => "Storage serialization failure",
        ErrorCode::STORAGE_WRITE_NOT_COMMITTED => "Log entry write did not commit",

        ErrorCode::ORACLE_TRANSPORT => "Oracle request failed in transport",
        ErrorCode::ORACLE_TIMEOUT => "Oracle request timed out",
        ErrorCode::ORACLE_UNAVAILABLE => "No oracle is configured",
        ErrorCode::ORACLE_INVALID_RESPONSE => "Oracle returned an unusable answer",
        ErrorCode::ORACLE_RATE_LIMITED => "Oracle rate limit exceeded",
        ErrorCode::ORACLE_UNAUTHORIZED => "Oracle rejected the API key",

        ErrorCode::VALIDATION_INVALID_INPUT => "Invalid input",
        ErrorCode::VALIDATION_EMPTY_TURN => "A turn needs at least one food item",
        ErrorCode::VALIDATION_INVALID_IDENTIFIER => "Identifier contains unsupported characters",

        _ => "Unknown error code",
    }
}
