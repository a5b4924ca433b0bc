use crate::error::MigrationError;

pub const PRAGMA_WHITELIST: &[&str] = &[
    "foreign_keys",
    "user_version",
    "defer_foreign_keys",
    "foreign_key_check",
    "table_info",
];

pub fn quote(id: &str) -> String {
    let mut quoted = String::with_capacity(id.len() + 2);
    quoted.push('"');
    for ch in id.chars() {
        if ch == '"' {
            quoted.push('"');
        }
        quoted.push(ch);
    }
    quoted.push('"');
    quoted
}

pub fn ensure_pragma_allowed(name: &str) -> Result<(), MigrationError> {
    if PRAGMA_WHITELIST.contains(&name) {
        Ok(())
    } else {
        Err(MigrationError::UnsafePragma(name.to_string()))
    }
}
