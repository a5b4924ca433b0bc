use regex::Regex;

// Lexical only, not a parser: two statements are equivalent iff their
// normalized forms are byte-equal.
pub fn normalize(sql: &str) -> String {
    let without_comments = strip_line_comments(sql);

    let whitespace = Regex::new(r"\s+").expect("static regex");
    let collapsed = whitespace.replace_all(&without_comments, " ");

    let punctuation = Regex::new(r"\s*([(),])\s*").expect("static regex");
    let tightened = punctuation.replace_all(&collapsed, "$1");

    let plain_quoted_identifier = Regex::new(r#""([A-Za-z_][A-Za-z0-9_]*)""#).expect("static regex");
    let unquoted = plain_quoted_identifier.replace_all(&tightened, "$1");

    unquoted.trim().to_string()
}

fn strip_line_comments(sql: &str) -> String {
    let comment = Regex::new(r"--[^\n]*\n?").expect("static regex");
    comment.replace_all(sql, "").into_owned()
}
