mod archive;
pub mod rules;

pub use archive::{pack, ArchiveEntry, PackProgress, PackReport};
pub use rules::{Exclusion, ExclusionObserver, Rule, RuleSet, RuleTemplate, TraceObserver};

use uuid::Uuid;

/// `<base>-<token>.zip`, or exactly `<base>.zip` when `unique` is off.
pub fn archive_file_name(base: &str, unique: bool) -> String {
    if unique {
        format!("{base}-{}.zip", short_token())
    } else {
        format!("{base}.zip")
    }
}

/// First group of a v4 UUID: 8 hex digits.
pub fn short_token() -> String {
    let id = Uuid::new_v4().simple().to_string();
    id[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_name_has_short_token() {
        let name = archive_file_name("packnow", true);
        let token = name
            .strip_prefix("packnow-")
            .and_then(|rest| rest.strip_suffix(".zip"))
            .expect("shape");
        assert_eq!(token.len(), 8);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn plain_name_when_unique_disabled() {
        assert_eq!(archive_file_name("site", false), "site.zip");
    }

    #[test]
    fn tokens_differ_between_calls() {
        assert_ne!(short_token(), short_token());
    }
}
