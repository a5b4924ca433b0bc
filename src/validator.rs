use regex::Regex;

use crate::error::MigrationError;
use crate::sql::PRAGMA_WHITELIST;

pub fn validate_schema(script: &str) -> Result<(), MigrationError> {
    if script.trim().is_empty() {
        return Ok(());
    }

    let attach = Regex::new(r"(?i)ATTACH\s+DATABASE").expect("static regex");
    if attach.is_match(script) {
        return Err(MigrationError::InvalidSchema(
            "ATTACH DATABASE not allowed".to_string(),
        ));
    }

    let detach = Regex::new(r"(?i)DETACH\s+DATABASE").expect("static regex");
    if detach.is_match(script) {
        return Err(MigrationError::InvalidSchema(
            "DETACH DATABASE not allowed".to_string(),
        ));
    }

    let pragma = Regex::new(r"(?i)PRAGMA\s+([A-Za-z_][A-Za-z0-9_]*)").expect("static regex");
    for captures in pragma.captures_iter(script) {
        let name = captures[1].to_ascii_lowercase();
        if !PRAGMA_WHITELIST.contains(&name.as_str()) {
            return Err(MigrationError::InvalidSchema("unsafe PRAGMA".to_string()));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_script_passes() {
        assert!(validate_schema("").is_ok());
        assert!(validate_schema("   \n\t  ").is_ok());
    }

    #[test]
    fn plain_ddl_passes() {
        assert!(validate_schema("CREATE TABLE foo(id INTEGER PRIMARY KEY);").is_ok());
    }

    #[test]
    fn whitelisted_pragmas_pass() {
        assert!(validate_schema("PRAGMA user_version = 1;").is_ok());
        assert!(validate_schema("PRAGMA foreign_keys = ON;").is_ok());
    }

    #[test]
    fn attach_database_rejected() {
        let err = validate_schema("ATTACH DATABASE 'x.db' AS other;").unwrap_err();
        assert!(err.to_string().contains("ATTACH DATABASE"));
    }

    #[test]
    fn detach_database_rejected() {
        let err = validate_schema("DETACH DATABASE other;").unwrap_err();
        assert!(err.to_string().contains("DETACH DATABASE"));
    }

    #[test]
    fn unsafe_pragma_rejected() {
        let err = validate_schema("PRAGMA journal_mode = WAL;").unwrap_err();
        assert!(err.to_string().contains("unsafe PRAGMA"));
    }

    #[test]
    fn case_insensitive_matching() {
        let err = validate_schema("attach database 'x.db' as other;").unwrap_err();
        assert!(err.to_string().contains("ATTACH DATABASE"));
    }
}
