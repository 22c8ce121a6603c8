use std::time::Duration;

// Configuration file name
pub const CONFIG_FILENAME: &str = "dbrecon.yaml";

// Bookkeeping columns the migration service appends on the target side.
// They never count as schema drift.
pub const IGNORED_TARGET_COLUMNS: [&str; 4] = [
    "OMS_OBJECT_NUMBER",
    "OMS_RELATIVE_FNO",
    "OMS_BLOCK_NUMBER",
    "OMS_ROW_NUMBER",
];

// Acceptable VARCHAR growth window on the target, as multiples of the
// source declared length. Overridable in config.
pub const DEFAULT_LENGTH_MIN_MULTIPLIER: f64 = 1.5;
pub const DEFAULT_LENGTH_MAX_MULTIPLIER: f64 = 2.5;

// External client invocation
pub const DEFAULT_CLIENT_TIMEOUT: Duration = Duration::from_secs(60);

// DDL conversion runs involve a JVM startup and a full schema export
pub const DEFAULT_CONVERTER_TIMEOUT: Duration = Duration::from_secs(600);

// Fixup output subdirectories that are not derived from an object type
pub const TABLE_ALTER_SUBDIR: &str = "table_alter";
pub const INDEX_SUBDIR: &str = "index";
pub const CONSTRAINT_SUBDIR: &str = "constraint";
pub const TRIGGER_SUBDIR: &str = "trigger";
pub const SEQUENCE_SUBDIR: &str = "sequence";
pub const COMPILE_SUBDIR: &str = "compile";
pub const GRANT_SUBDIR: &str = "grant";

pub const FIXUP_REVIEW_NOTE: &str =
    "Generated by the reconciliation tool. Review carefully before executing on the target.";
