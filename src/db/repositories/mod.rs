//! Database repositories
//!
//! One generic repository serves every entity type; entity-specific
//! behaviour lives in the column metadata and the services above.

pub mod entity;

use once_cell::sync::Lazy;
use regex::Regex;

pub use entity::{Repository, SqlxRepository};

/// Unique-violation messages, SQLite first, then MySQL (with and without the
/// table-qualified key name)
const UNIQUE_VIOLATION_PATTERNS: &[&str] = &[
    r"UNIQUE constraint failed: \w+\.(\w+)",
    r"Duplicate entry '.*' for key '(?:\w+\.)?(\w+)'",
];

static UNIQUE_VIOLATIONS: Lazy<Vec<Regex>> = Lazy::new(|| {
    UNIQUE_VIOLATION_PATTERNS
        .iter()
        .filter_map(|pattern| Regex::new(pattern).ok())
        .collect()
});

/// Foreign-key violation messages, SQLite then MySQL
static FOREIGN_KEY_VIOLATION: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"(?i)FOREIGN KEY constraint failed|a foreign key constraint fails").ok()
});

/// Column named by a unique-constraint violation anywhere in the error chain
pub fn conflict_field(err: &anyhow::Error) -> Option<String> {
    err.chain().find_map(|cause| {
        let message = cause.to_string();
        UNIQUE_VIOLATIONS
            .iter()
            .find_map(|re| re.captures(&message))
            .map(|caps| caps[1].to_string())
    })
}

/// True when a referenced row blocked the statement
pub fn is_foreign_key_violation(err: &anyhow::Error) -> bool {
    let Some(re) = FOREIGN_KEY_VIOLATION.as_ref() else {
        return false;
    };
    err.chain().any(|cause| re.is_match(&cause.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_patterns_compile() {
        assert_eq!(UNIQUE_VIOLATIONS.len(), UNIQUE_VIOLATION_PATTERNS.len());
    }

    #[test]
    fn test_sqlite_message() {
        let err = anyhow!("error returned from database: (code: 2067) UNIQUE constraint failed: users.username")
            .context("Failed to insert into users");

        assert_eq!(conflict_field(&err).as_deref(), Some("username"));
    }

    #[test]
    fn test_mysql_messages() {
        let qualified = anyhow!("Duplicate entry 'ana@example.com' for key 'users.email'");
        let bare = anyhow!("Duplicate entry '11 4002-8922' for key 'telefone'");

        assert_eq!(conflict_field(&qualified).as_deref(), Some("email"));
        assert_eq!(conflict_field(&bare).as_deref(), Some("telefone"));
    }

    #[test]
    fn test_other_errors() {
        let err = anyhow!("FOREIGN KEY constraint failed");
        assert_eq!(conflict_field(&err), None);
        assert!(is_foreign_key_violation(&err));
    }

    #[test]
    fn test_foreign_key_messages() {
        let mysql = anyhow!(
            "Cannot delete or update a parent row: a foreign key constraint fails (`rafa`.`posts`)"
        )
        .context("Failed to delete users 1");

        assert!(is_foreign_key_violation(&mysql));
        assert!(!is_foreign_key_violation(&anyhow!("UNIQUE constraint failed: users.email")));
    }
}
