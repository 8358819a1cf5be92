//! CLI Exit Code Registry
//!
//! Single source of truth for exit codes. Scripts rely on them.
//!
//! | Range   | Domain    | Description                              |
//! |---------|-----------|------------------------------------------|
//! | 0       | Universal | Success                                  |
//! | 1       | Universal | General error (unspecified)              |
//! | 2       | Universal | CLI usage error (bad args)               |
//! | 3-9     | data      | Loading and query codes                  |
//! | 10-19   | ai        | AI provider/keychain codes               |

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, empty query.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Data (3-9)
// =============================================================================

/// The file could not be loaded (unsupported, too large, unreadable).
pub const EXIT_INGEST: u8 = 3;

/// The query resolved to a failed outcome.
pub const EXIT_QUERY_FAILED: u8 = 4;

// =============================================================================
// AI (10-19)
// =============================================================================

/// AI disabled (provider=none). Informational.
pub const EXIT_AI_DISABLED: u8 = 10;

/// AI provider configured but API key missing.
pub const EXIT_AI_MISSING_KEY: u8 = 11;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_distinct() {
        let codes = [
            EXIT_SUCCESS,
            EXIT_ERROR,
            EXIT_USAGE,
            EXIT_INGEST,
            EXIT_QUERY_FAILED,
            EXIT_AI_DISABLED,
            EXIT_AI_MISSING_KEY,
        ];
        for (i, a) in codes.iter().enumerate() {
            for b in &codes[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
