//! Default values for configuration fields.
//!
//! These functions are used by serde for default deserialization.

pub fn r#true() -> bool {
    true
}

pub fn r#false() -> bool {
    false
}

// ============================================================================
// [build] Section Defaults
// ============================================================================

pub mod build {
    use std::path::PathBuf;

    pub fn root() -> Option<PathBuf> {
        None
    }

    pub fn sources() -> Vec<PathBuf> {
        vec!["src".into()]
    }

    pub fn templates() -> PathBuf {
        "templates".into()
    }

    pub fn static_dir() -> PathBuf {
        "static".into()
    }

    pub fn output() -> PathBuf {
        "build".into()
    }

    pub fn translations() -> PathBuf {
        "translations.json".into()
    }
}

// ============================================================================
// [highlight] Section Defaults
// ============================================================================

pub mod highlight {
    pub fn command() -> Vec<String> {
        ["pygmentize", "-f", "html", "-l", "{lang}"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    pub fn fallback_lang() -> String {
        "text".into()
    }

    pub fn timeout_ms() -> u64 {
        5000
    }

    pub fn workers() -> usize {
        4
    }
}
