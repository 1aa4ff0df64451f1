//! CLI Exit Code Registry
//!
//! This is the single source of truth for all `gsx` exit codes.
//! Exit codes are part of the shell contract; scripts rely on them.
//!
//! | Code | Meaning                                                   |
//! |------|-----------------------------------------------------------|
//! | 0    | Success                                                   |
//! | 1    | Script error (resolution, execution, decode, metadata)    |
//! | 2    | CLI usage error (bad args, malformed input JSON)          |
//! | 3    | I/O error (script or input file unreadable, stdout)       |
//! | 4    | Settings error (engine.toml unreadable or invalid)        |
//! | 5    | Script needs a newer API level than the host provides     |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant
//! 2. Document what triggers it
//! 3. Update the table above

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// The script failed: it did not compile, raised an error, or produced
/// something that could not be decoded.
pub const EXIT_SCRIPT: u8 = 1;

/// Usage error - bad arguments or malformed input files.
pub const EXIT_USAGE: u8 = 2;

/// A file could not be read, or output could not be written.
pub const EXIT_IO: u8 = 3;

/// Engine settings could not be loaded or are invalid.
pub const EXIT_SETTINGS: u8 = 4;

/// `api-level --require N` with N above the available level.
pub const EXIT_API_LEVEL: u8 = 5;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_distinct() {
        let codes = [EXIT_SUCCESS, EXIT_SCRIPT, EXIT_USAGE, EXIT_IO, EXIT_SETTINGS, EXIT_API_LEVEL];
        let mut sorted = codes.to_vec();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), codes.len());
    }
}
