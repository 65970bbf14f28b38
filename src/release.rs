//! Multi-release archive conventions.
//!
//! A multi-release archive marks itself with a `Multi-Release` attribute in
//! the main section of its manifest and ships versioned overrides under
//! `META-INF/versions/<v>/`. Resolution probes from the configured runtime
//! feature version down to the fixed base version, first hit wins.

/// Reserved metadata prefix; names under it are never version-resolved.
pub const META_INF_PREFIX: &str = "META-INF/";

/// Manifest entry name.
pub const MANIFEST_NAME: &str = "META-INF/MANIFEST.MF";

/// Root of versioned overrides.
pub const VERSIONS_PREFIX: &str = "META-INF/versions/";

/// Main-attribute key marking a multi-release archive.
pub const MULTI_RELEASE_KEY: &str = "Multi-Release";

/// Lowest version that can carry an override; probes stop above it.
pub const BASE_VERSION: u32 = 8;

/// Default probe ceiling when the caller does not configure one.
pub const DEFAULT_RUNTIME_VERSION: u32 = 21;

/// Check the manifest's main attributes for the `Multi-Release` key.
///
/// The main section ends at the first blank line. Attribute names are
/// case-insensitive and continuation lines (leading space) never start an
/// attribute, so scanning line starts is sufficient: presence of the key with
/// any value marks the archive.
pub fn manifest_is_multi_release(manifest: &[u8]) -> bool {
    for line in manifest.split(|b| *b == b'\n') {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.is_empty() {
            break; // end of main section
        }
        if line.first() == Some(&b' ') {
            continue;
        }
        if let Some(colon) = line.iter().position(|b| *b == b':')
            && line[..colon].eq_ignore_ascii_case(MULTI_RELEASE_KEY.as_bytes())
        {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_key_case_insensitively() {
        assert!(manifest_is_multi_release(
            b"Manifest-Version: 1.0\r\nMulti-Release: true\r\n\r\n"
        ));
        assert!(manifest_is_multi_release(
            b"Manifest-Version: 1.0\nmulti-release: false\n\n"
        ));
    }

    #[test]
    fn ignores_key_outside_main_section() {
        assert!(!manifest_is_multi_release(
            b"Manifest-Version: 1.0\n\nName: x\nMulti-Release: true\n"
        ));
    }

    #[test]
    fn plain_manifest_is_not_multi_release() {
        assert!(!manifest_is_multi_release(b"Manifest-Version: 1.0\n\n"));
        assert!(!manifest_is_multi_release(b""));
    }
}
