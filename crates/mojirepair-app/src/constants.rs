//! Cross-cutting application constants.

/// Default number of records requested per page.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// Collection scanned when no table is configured.
pub const DEFAULT_TABLE: &str = "places";

/// Columns projected from each record.
pub const RECORD_COLUMNS: &str = "id,title,description";

/// Gemini model used for oracle repairs.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";

/// Public Gemini API root.
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/";

/// Maximum character-count drift accepted from an oracle candidate.
pub const DEFAULT_LENGTH_TOLERANCE: usize = 5;

/// Pause after every oracle call, in milliseconds.
pub const DEFAULT_ORACLE_COOLDOWN_MS: u64 = 1000;

/// Characters that indicate a value still carries encoding damage.
///
/// `Ã` is the lead character of UTF-8 text decoded as Latin-1.
pub const RESIDUAL_MARKERS: &[char] = &['?', 'Ã', '\u{FFFD}'];
