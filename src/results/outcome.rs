use std::fmt;

/// Commands whose tag carries a row count.
const COUNTED: &[&str] = &["INSERT", "UPDATE", "DELETE", "SELECT", "MERGE", "MOVE", "FETCH", "COPY"];

/// Verbs whose tag goes on to name the object kind.
const OBJECT_VERBS: &[&str] = &["CREATE", "ALTER", "DROP", "REFRESH"];

/// Object kinds spelled with more than one word.
const MULTI_WORD_OBJECTS: &[&[&str]] = &[
    &["MATERIALIZED", "VIEW"],
    &["FOREIGN", "TABLE"],
    &["FOREIGN", "DATA", "WRAPPER"],
    &["EVENT", "TRIGGER"],
    &["USER", "MAPPING"],
    &["ACCESS", "METHOD"],
    &["DEFAULT", "PRIVILEGES"],
    &["OPERATOR", "CLASS"],
    &["OPERATOR", "FAMILY"],
    &["TEXT", "SEARCH", "CONFIGURATION"],
    &["TEXT", "SEARCH", "DICTIONARY"],
    &["TEXT", "SEARCH", "PARSER"],
    &["TEXT", "SEARCH", "TEMPLATE"],
];

/// Words between a DDL verb and the object kind that the engine leaves out of the tag.
const DDL_MODIFIERS: &[&str] = &[
    "OR", "REPLACE", "UNIQUE", "TEMP", "TEMPORARY", "UNLOGGED", "GLOBAL", "LOCAL", "RECURSIVE",
    "CONSTRAINT", "TRUSTED", "PROCEDURAL", "DEFAULT",
];

/// What a non-query statement did: the command verb and the rows it touched.
///
/// `Display` renders the engine-style command tag, e.g. `INSERT 0 3`,
/// `UPDATE 2`, `CREATE TABLE`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutcome {
    command: String,
    rows_affected: u64,
}

impl CommandOutcome {
    #[must_use]
    pub fn new(command: impl Into<String>, rows_affected: u64) -> Self {
        Self {
            command: command.into(),
            rows_affected,
        }
    }

    /// Build the outcome for `sql`, naming the command after its last statement.
    #[must_use]
    pub fn from_statement(sql: &str, rows_affected: u64) -> Self {
        Self::new(command_of(last_statement(sql)), rows_affected)
    }

    /// Upper-case command name (`INSERT`, `CREATE TABLE`, ...). Empty for an empty statement.
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    #[must_use]
    pub fn rows_affected(&self) -> u64 {
        self.rows_affected
    }

    #[must_use]
    pub fn is_insert(&self) -> bool {
        self.command == "INSERT"
    }

    #[must_use]
    pub fn is_update(&self) -> bool {
        self.command == "UPDATE"
    }

    #[must_use]
    pub fn is_delete(&self) -> bool {
        self.command == "DELETE"
    }

    #[must_use]
    pub fn is_select(&self) -> bool {
        self.command == "SELECT"
    }
}

impl fmt::Display for CommandOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.command.as_str() {
            "INSERT" => write!(f, "INSERT 0 {}", self.rows_affected),
            cmd if COUNTED.contains(&cmd) => write!(f, "{cmd} {}", self.rows_affected),
            cmd => f.write_str(cmd),
        }
    }
}

#[derive(Debug, PartialEq)]
enum Token<'a> {
    Word(&'a str),
    Open,
    Close,
    Semi,
    Other,
}

/// Minimal lexer: words, parentheses and statement separators. Quoted
/// strings, quoted identifiers, dollar-quoted bodies and comments are skipped.
fn tokens(sql: &str) -> Vec<(usize, Token<'_>)> {
    let bytes = sql.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match b {
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                let mut depth = 1;
                i += 2;
                while i < bytes.len() && depth > 0 {
                    if bytes[i] == b'/' && bytes.get(i + 1) == Some(&b'*') {
                        depth += 1;
                        i += 2;
                    } else if bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/') {
                        depth -= 1;
                        i += 2;
                    } else {
                        i += 1;
                    }
                }
            }
            b'\'' | b'"' => {
                let start = i;
                i += 1;
                while i < bytes.len() {
                    if bytes[i] == b {
                        if bytes.get(i + 1) == Some(&b) {
                            i += 2;
                            continue;
                        }
                        break;
                    }
                    i += 1;
                }
                i += 1;
                out.push((start, Token::Other));
            }
            b'$' => {
                let start = i;
                let tag_end = sql[i + 1..]
                    .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                    .map(|n| i + 1 + n);
                match tag_end {
                    Some(end) if bytes[end] == b'$' => {
                        let tag = &sql[i..=end];
                        i = sql[end + 1..]
                            .find(tag)
                            .map_or(bytes.len(), |n| end + 1 + n + tag.len());
                    }
                    _ => i += 1,
                }
                out.push((start, Token::Other));
            }
            b'(' => {
                out.push((i, Token::Open));
                i += 1;
            }
            b')' => {
                out.push((i, Token::Close));
                i += 1;
            }
            b';' => {
                out.push((i, Token::Semi));
                i += 1;
            }
            _ if b.is_ascii_alphabetic() || b == b'_' => {
                let start = i;
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
                out.push((start, Token::Word(&sql[start..i])));
            }
            _ if b.is_ascii_whitespace() => i += 1,
            _ => {
                out.push((i, Token::Other));
                i += 1;
            }
        }
    }
    out
}

/// Text of the last non-empty statement in a `;`-separated script.
fn last_statement(sql: &str) -> &str {
    let mut start = 0;
    let mut last = sql;
    let mut has_content = false;
    for (pos, token) in tokens(sql) {
        if token == Token::Semi {
            if has_content {
                last = &sql[start..pos];
            }
            start = pos + 1;
            has_content = false;
        } else {
            has_content = true;
        }
    }
    if has_content {
        last = &sql[start..];
    }
    last
}

fn command_of(statement: &str) -> String {
    // Upper-cased words with their parenthesis depth.
    let mut depth = 0_i32;
    let mut words = Vec::new();
    for (_, token) in tokens(statement) {
        match token {
            Token::Open => depth += 1,
            Token::Close => depth -= 1,
            Token::Word(w) => words.push((depth, w.to_ascii_uppercase())),
            _ => {}
        }
    }
    let Some((_, verb)) = words.first() else {
        return String::new();
    };
    let top_level = || words.iter().filter(|(d, _)| *d == 0).map(|(_, w)| w.as_str());

    match verb.as_str() {
        // The command is the first data-modifying or select keyword outside the CTE bodies.
        "WITH" => top_level()
            .find(|w| matches!(*w, "INSERT" | "UPDATE" | "DELETE" | "MERGE" | "SELECT"))
            .unwrap_or("SELECT")
            .to_string(),
        "VALUES" | "TABLE" => "SELECT".to_string(),
        "TRUNCATE" => "TRUNCATE TABLE".to_string(),
        v if OBJECT_VERBS.contains(&v) => {
            let rest: Vec<&str> = words[1..].iter().map(|(_, w)| w.as_str()).collect();
            let Some(object) = object_kind(&rest) else {
                return verb.clone();
            };
            if v == "CREATE" && matches!(object.as_str(), "TABLE" | "MATERIALIZED VIEW") {
                if let Some(tag) = create_as(top_level().collect(), &object) {
                    return tag;
                }
            }
            format!("{v} {object}")
        }
        _ => verb.clone(),
    }
}

/// The object kind following a DDL verb, skipping modifiers like `OR REPLACE`.
fn object_kind(words: &[&str]) -> Option<String> {
    let mut rest = words;
    loop {
        let first = *rest.first()?;
        let phrase = MULTI_WORD_OBJECTS.iter().find(|phrase| {
            rest.len() >= phrase.len() && phrase.iter().zip(rest).all(|(a, b)| a == b)
        });
        if let Some(phrase) = phrase {
            return Some(phrase.join(" "));
        }
        if !DDL_MODIFIERS.contains(&first) {
            return Some(first.to_string());
        }
        rest = &rest[1..];
    }
}

/// `CREATE TABLE ... AS` and `CREATE MATERIALIZED VIEW ... AS` report the rows
/// they stored as `SELECT n`, unless created `WITH NO DATA`.
fn create_as(top_level: Vec<&str>, object: &str) -> Option<String> {
    if !top_level.contains(&"AS") {
        return None;
    }
    if top_level.ends_with(&["WITH", "NO", "DATA"]) {
        return Some(if object == "TABLE" {
            "CREATE TABLE AS".to_string()
        } else {
            format!("CREATE {object}")
        });
    }
    Some("SELECT".to_string())
}
