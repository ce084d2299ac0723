//! Utility functions for proc macro implementations.

use syn::parse::ParseStream;
use syn::Attribute;

const NUMERIC_RULES: &[&str] = &["min", "max", "gte", "lte", "gt", "lt", "len"];
const TEXT_RULES: &[&str] = &["oneof", "pattern"];
const FIELD_RULES: &[&str] = &["eqfield", "nefield", "gtfield", "ltfield"];

/// Join `///` doc comments into one line.
pub fn doc_string(attrs: &[Attribute]) -> Option<String> {
    let lines: Vec<String> = attrs
        .iter()
        .filter(|a| a.path().is_ident("doc"))
        .filter_map(|a| {
            if let syn::Meta::NameValue(nv) = &a.meta {
                if let syn::Expr::Lit(lit) = &nv.value {
                    if let syn::Lit::Str(s) = &lit.lit {
                        return Some(s.value().trim().to_string());
                    }
                }
            }
            None
        })
        .filter(|line| !line.is_empty())
        .collect();
    if lines.is_empty() {
        None
    } else {
        Some(lines.join(" "))
    }
}

/// Apply a serde `rename_all` style to a snake_case field name.
pub fn rename_field(name: &str, style: Option<&str>) -> String {
    let name = name.strip_prefix("r#").unwrap_or(name);
    let words: Vec<&str> = name.split('_').filter(|w| !w.is_empty()).collect();
    match style {
        Some("camelCase") => words
            .iter()
            .enumerate()
            .map(|(i, w)| if i == 0 { w.to_lowercase() } else { capitalize(w) })
            .collect(),
        Some("PascalCase") => words.iter().map(|w| capitalize(w)).collect(),
        Some("kebab-case") => words.join("-"),
        Some("SCREAMING_SNAKE_CASE") => words.join("_").to_uppercase(),
        Some("SCREAMING-KEBAB-CASE") => words.join("-").to_uppercase(),
        Some("lowercase") => name.to_lowercase(),
        Some("UPPERCASE") => name.to_uppercase(),
        _ => name.to_string(),
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Check a rule list at expansion time.
///
/// Catches missing or non-numeric parameters and cross-field rules naming
/// an undeclared field. Regex syntax is checked when the shape is built.
pub fn check_rules(rules: &str, fields: &[&str]) -> Result<(), String> {
    for token in split_rules(rules) {
        let (name, param) = match token.split_once('=') {
            Some((name, param)) => (name.trim(), Some(param.trim())),
            None => (token.trim(), None),
        };
        if NUMERIC_RULES.contains(&name) {
            let param = param.ok_or_else(|| format!("rule `{name}` requires a number"))?;
            param
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .ok_or_else(|| format!("rule `{name}` expects a number, got `{param}`"))?;
        } else if TEXT_RULES.contains(&name) {
            if param.map_or(true, str::is_empty) {
                return Err(format!("rule `{name}` requires a parameter"));
            }
        } else if FIELD_RULES.contains(&name) {
            match param {
                Some(other) if fields.contains(&other) => {}
                Some(other) => {
                    return Err(format!("rule `{name}` refers to unknown field `{other}`"))
                }
                None => return Err(format!("rule `{name}` requires a field name")),
            }
        }
    }
    Ok(())
}

fn split_rules(rules: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut chars = rules.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&',') => {
                current.push(',');
                chars.next();
            }
            ',' => tokens.push(std::mem::take(&mut current)),
            other => current.push(other),
        }
    }
    tokens.push(current);
    tokens.retain(|t| !t.trim().is_empty());
    tokens
}

/// Consume a parenthesized group without interpreting it.
pub fn skip_paren_group(input: ParseStream<'_>) -> syn::Result<()> {
    let content;
    syn::parenthesized!(content in input);
    let _: proc_macro2::TokenStream = content.parse()?;
    Ok(())
}
