//! Shared constants for the pipeline.

/// Minimum platform API level targeted by DEX compilation.
pub const DEFAULT_MIN_API: u32 = 26;

/// File extension of a bytecode container.
pub const CONTAINER_EXTENSION: &str = "dex";

/// Name of the primary container produced in the binary-output directory.
pub const PRIMARY_CONTAINER: &str = "classes.dex";

/// Subdirectory of the binary-output directory holding compiled class files.
pub const CLASSES_DIR: &str = "classes";

/// Subdirectory of the build directory holding per-library containers.
pub const LIBRARY_OUTPUT_DIR: &str = "libs";

/// Fixed message emitted by a success report.
pub const BUILD_SUCCESS_MESSAGE: &str = "Build completed successfully";

/// Env var overriding the external DEX compiler binary.
pub const D8_TOOL_ENV: &str = "DEXPIPE_D8";

/// Env var overriding the external VM binary used by the stock runtime.
pub const VM_TOOL_ENV: &str = "DEXPIPE_VM";
