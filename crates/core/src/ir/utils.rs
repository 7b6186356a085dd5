//! Identifier casing shared by every pass.
//!
//! All three generators derive type, field, function and module names from
//! these functions, so the same schema or operation always gets the same
//! identifier no matter which pass asked. Every transform here is idempotent.

use heck::{ToLowerCamelCase, ToSnakeCase};
use std::collections::HashSet;
use std::sync::LazyLock;

/// Rust keywords that cannot be used as bare identifiers.
pub static RUST_RESERVED_WORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "as", "async", "await", "break", "const", "continue", "crate", "dyn", "else", "enum",
        "extern", "false", "fn", "for", "gen", "if", "impl", "in", "let", "loop", "match", "mod",
        "move", "mut", "pub", "ref", "return", "self", "Self", "static", "struct", "super",
        "trait", "true", "type", "unsafe", "use", "where", "while", "abstract", "become", "box",
        "do", "final", "macro", "override", "priv", "try", "typeof", "unsized", "virtual",
        "yield",
    ]
    .into_iter()
    .collect()
});

/// Keywords that are not accepted even as raw identifiers.
const NON_RAW_KEYWORDS: [&str; 5] = ["self", "Self", "super", "crate", "_"];

/// Characters spelled out when they appear in schema names.
const SYMBOL_WORDS: [(char, &str); 4] = [('.', "_DOT_"), ('+', "_PLUS_"), ('*', "_STAR_"), ('/', "_SLASH_")];

/// Convert a schema or title into a type name.
///
/// - `.`, `+`, `*` and `/` are spelled out (`_DOT_`, ...)
/// - names without `_`, `-` or spaces only get their first letter upper-cased,
///   so `PascalCase` input is kept as is
/// - otherwise each word is capitalized and the rest lower-cased
/// - a leading digit gets an `N` prefix
pub fn to_type_name(name: &str) -> String {
    let mut spelled = String::with_capacity(name.len());
    for c in name.chars() {
        match SYMBOL_WORDS.iter().find(|(symbol, _)| *symbol == c) {
            Some((_, word)) => spelled.push_str(word),
            None if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | ' ') => spelled.push(c),
            None => spelled.push('_'),
        }
    }

    let result = if spelled.contains(['_', '-', ' ']) {
        spelled
            .split(['_', '-', ' '])
            .filter(|part| !part.is_empty())
            .map(|part| {
                let lower = part.to_ascii_lowercase();
                capitalize_first(&lower)
            })
            .collect::<String>()
    } else {
        capitalize_first(&spelled)
    };

    if result.is_empty() {
        return "Empty".to_string();
    }
    if result.starts_with(|c: char| c.is_ascii_digit()) {
        return format!("N{result}");
    }
    if result == "Self" {
        return "SelfType".to_string();
    }
    result
}

/// Convert to `snake_case` suitable for modules and file names.
///
/// The result is never a keyword-escaped identifier; use [`to_field_name`] or
/// [`to_fn_name`] for that.
pub fn to_snake_ident(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    let snake = cleaned.to_snake_case();
    if snake.is_empty() {
        return "value".to_string();
    }
    if snake.starts_with(|c: char| c.is_ascii_digit()) {
        return format!("n_{snake}");
    }
    snake
}

/// Struct field or local binding name.
pub fn to_field_name(name: &str) -> String {
    escape_keyword(&to_snake_ident(name))
}

/// Function or method name.
pub fn to_fn_name(name: &str) -> String {
    escape_keyword(&to_snake_ident(name))
}

/// Module name for a package or file stem.
pub fn to_module_name(name: &str) -> String {
    escape_keyword(&to_snake_ident(name))
}

/// `UpperCamelCase` for enum variants and builder segments.
///
/// Anything but ASCII letters and digits separates words. Without
/// separators only the first letter is upper-cased. Otherwise each word is
/// capitalized, and all-caps words (`IN_PROGRESS`) are lower-cased first.
pub fn to_variant_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    let camel = if cleaned.contains('_') {
        cleaned
            .split('_')
            .filter(|word| !word.is_empty())
            .map(|word| {
                if word.chars().any(|c| c.is_ascii_lowercase()) {
                    capitalize_first(word)
                } else {
                    capitalize_first(&word.to_ascii_lowercase())
                }
            })
            .collect::<String>()
    } else {
        capitalize_first(&cleaned)
    };
    if camel.is_empty() {
        return "Empty".to_string();
    }
    if camel.starts_with(|c: char| c.is_ascii_digit()) {
        return format!("N{camel}");
    }
    if camel == "Self" {
        return "SelfValue".to_string();
    }
    camel
}

/// `lowerCamelCase` join of words, used to synthesize operation ids.
pub fn to_lower_camel(words: &[&str]) -> String {
    words.join("_").to_lower_camel_case()
}

/// Escape a snake_case identifier that collides with a keyword.
pub fn escape_keyword(ident: &str) -> String {
    if NON_RAW_KEYWORDS.contains(&ident) {
        format!("{ident}_")
    } else if RUST_RESERVED_WORDS.contains(ident) {
        format!("r#{ident}")
    } else {
        ident.to_string()
    }
}

/// Strip a raw-identifier prefix, for use in file names and string contexts.
pub fn unraw(ident: &str) -> &str {
    ident.strip_prefix("r#").unwrap_or(ident)
}

/// Capitalize the first letter of a string.
pub fn capitalize_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first.to_uppercase().chain(chars).collect(),
    }
}

/// Reserve `base` in `used`, suffixing `_2`, `_3`, ... until it is free.
pub fn unique_name(base: &str, used: &mut HashSet<String>) -> String {
    if used.insert(base.to_string()) {
        return base.to_string();
    }
    let stem = unraw(base);
    let mut n = 2;
    loop {
        let candidate = format!("{stem}_{n}");
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

/// Same as [`unique_name`] for `UpperCamelCase` names (`Foo`, `Foo2`, ...).
pub fn unique_type_name(base: &str, used: &mut HashSet<String>) -> String {
    if used.insert(base.to_string()) {
        return base.to_string();
    }
    let mut n = 2;
    loop {
        let candidate = format!("{base}{n}");
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

/// Quote a string as a Rust string literal.
pub fn string_literal(s: &str) -> String {
    format!("{s:?}")
}

/// Split free text into doc comment lines.
///
/// `\r\n` and lone `\r` end a line. Other control characters, which a doc
/// comment cannot carry, become spaces.
pub fn doc_lines(text: &str) -> Vec<String> {
    let normalized: String = text
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .chars()
        .map(|c| if c.is_control() && c != '\n' && c != '\t' { ' ' } else { c })
        .collect();
    let lines: Vec<String> = normalized.lines().map(|l| l.trim_end().to_string()).collect();
    let start = lines.iter().position(|l| !l.is_empty()).unwrap_or(lines.len());
    let end = lines.iter().rposition(|l| !l.is_empty()).map_or(start, |i| i + 1);
    lines[start..end].to_vec()
}
