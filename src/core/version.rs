//! Build metadata shared by the engine and the binary.
//! Includes the version.rs generated by the build script.

include!(concat!(env!("OUT_DIR"), "/version.rs"));

/// Wire format version stamped into serialized call envelopes.
/// Falls back to a stable default if the build metadata is missing.
pub fn wire_format_version() -> u32 {
    WIRE_FORMAT_VERSION.parse().unwrap_or(20261016)
}

/// Build time string from the build script (UTC)
pub fn build_time() -> &'static str {
    BUILD_TIME
}

/// Short git hash captured by the build script
pub fn git_hash() -> &'static str {
    GIT_HASH
}

/// One-line version banner used by `--version` and the startup log
pub fn long_version() -> String {
    format!(
        "{} (wire format {}, built {}, {})",
        env!("CARGO_PKG_VERSION"),
        wire_format_version(),
        build_time(),
        git_hash()
    )
}
