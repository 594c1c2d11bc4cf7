//! Rendering of SQL text for log output.
//!
//! Statements can carry credentials or personal data in literals, so the
//! pool never logs raw SQL. Every statement passes through
//! [`SanitizationConfig::sanitize`] and is tagged with its
//! [`extract_operation`] verb.

/// Configuration for SQL statement sanitization.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SanitizationConfig {
    /// Whether to mask literal values.
    pub enabled: bool,
    /// Maximum length of statement to record.
    pub max_length: usize,
    /// Placeholder to use for masked values.
    pub placeholder: String,
}

impl Default for SanitizationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_length: 512,
            placeholder: "?".to_string(),
        }
    }
}

impl SanitizationConfig {
    /// A configuration that logs statements verbatim (still truncated).
    #[must_use]
    pub fn verbatim(max_length: usize) -> Self {
        Self {
            enabled: false,
            max_length,
            placeholder: String::new(),
        }
    }

    /// Render a statement for logging.
    #[must_use]
    pub fn sanitize(&self, sql: &str) -> String {
        if !self.enabled {
            return truncate(sql, self.max_length);
        }
        truncate(&mask_literals(sql, &self.placeholder), self.max_length)
    }
}

/// Replace quoted strings and numeric literals with `placeholder`.
fn mask_literals(sql: &str, placeholder: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();
    let mut quote: Option<char> = None;

    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            if c == '\\' {
                chars.next();
            } else if c == q {
                // Doubled quote is an escaped quote inside the literal.
                if chars.peek() == Some(&q) {
                    chars.next();
                    continue;
                }
                quote = None;
                out.push_str(placeholder);
            }
            continue;
        }

        if c == '\'' || c == '"' {
            quote = Some(c);
            continue;
        }

        if c.is_ascii_digit() && !out.ends_with(|ch: char| ch.is_alphanumeric() || ch == '_') {
            while chars
                .peek()
                .is_some_and(|ch| ch.is_ascii_digit() || *ch == '.')
            {
                chars.next();
            }
            out.push_str(placeholder);
            continue;
        }

        out.push(c);
    }

    if quote.is_some() {
        out.push_str(placeholder);
    }

    out
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let keep = max_len.saturating_sub(3);
    let end = s
        .char_indices()
        .map(|(i, _)| i)
        .take_while(|&i| i <= keep)
        .last()
        .unwrap_or(0);
    format!("{}...", &s[..end])
}

/// The leading verb of a statement, for log fields.
#[must_use]
pub fn extract_operation(sql: &str) -> &'static str {
    let verb = sql
        .trim_start()
        .split(|c: char| c.is_whitespace() || c == '(')
        .next()
        .unwrap_or("");

    const VERBS: &[&str] = &[
        "SELECT", "INSERT", "UPDATE", "DELETE", "REPLACE", "CALL", "BEGIN", "START", "COMMIT",
        "ROLLBACK", "CREATE", "ALTER", "DROP", "SET", "SHOW", "WITH",
    ];

    VERBS
        .iter()
        .find(|v| v.eq_ignore_ascii_case(verb))
        .copied()
        .unwrap_or("OTHER")
}
