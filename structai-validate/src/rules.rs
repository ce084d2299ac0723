//! Declarative field rules.
//!
//! A rule list is a comma separated string such as
//! `"required,min=3,max=50,email"`. Lists are parsed once when a shape is
//! built; evaluation never re-parses. Rule names that are not recognised
//! are kept and evaluate as no-ops.
//!
//! A literal comma inside a parameter (for example in a `pattern`) is
//! written as `\,`.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use structai_core::{ValidationError, ValidationErrors, Value};

use crate::context::ValidationContext;
use crate::error::ShapeError;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$")
        .expect("email regex")
});

static NUMERIC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-+]?[0-9]+(?:\.[0-9]+)?$").expect("numeric regex"));

/// A single parsed rule.
#[derive(Debug, Clone)]
pub enum Rule {
    /// Field must be present.
    Required,
    /// Lower bound: string length, list/map length, or numeric value.
    Min(f64),
    /// Upper bound: string length, list/map length, or numeric value.
    Max(f64),
    /// `>=` bound.
    Gte(f64),
    /// `<=` bound.
    Lte(f64),
    /// `>` bound.
    Gt(f64),
    /// `<` bound.
    Lt(f64),
    /// Exact length (or exact numeric value).
    Len(f64),
    /// Value must be one of the listed plain strings.
    OneOf(Vec<String>),
    /// Email address.
    Email,
    /// Absolute URL.
    Url,
    /// UUID.
    Uuid,
    /// Non-empty ASCII letters.
    Alpha,
    /// Non-empty ASCII letters and digits.
    AlphaNum,
    /// Numeric string.
    Numeric,
    /// Regex match on the plain string form.
    Pattern(Regex),
    /// Equal to a sibling field.
    EqField(String),
    /// Not equal to a sibling field.
    NeField(String),
    /// Greater than a numeric sibling field.
    GtField(String),
    /// Less than a numeric sibling field.
    LtField(String),
    /// Unrecognised rule; never fails.
    Unknown,
}

/// A rule together with its declared name and parameter.
#[derive(Debug, Clone)]
pub struct RuleSpec {
    name: String,
    param: Option<String>,
    rule: Rule,
}

impl RuleSpec {
    /// Parse a single `name` or `name=param` token.
    pub fn parse(token: &str) -> Result<Self, ShapeError> {
        let (name, param) = match token.split_once('=') {
            Some((name, param)) => (name.trim(), Some(param.trim().to_string())),
            None => (token.trim(), None),
        };
        let rule = build_rule(name, param.as_deref())?;
        Ok(Self {
            name: name.to_string(),
            param,
            rule,
        })
    }

    /// Declared rule name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared parameter.
    #[must_use]
    pub fn param(&self) -> Option<&str> {
        self.param.as_deref()
    }

    /// The parsed rule.
    #[must_use]
    pub fn rule(&self) -> &Rule {
        &self.rule
    }

    fn violation(&self, message: impl Into<String>, value: &Value) -> ValidationError {
        ValidationError::constraint(&self.name, self.param.clone(), message, value)
    }

    /// Check `value`, returning the violation if any.
    pub fn check(&self, value: &Value, ctx: &ValidationContext<'_>) -> Option<ValidationError> {
        match &self.rule {
            Rule::Required | Rule::Unknown => None,
            Rule::Min(n) | Rule::Gte(n) => {
                let measured = measure(value)?;
                (measured.amount < *n)
                    .then(|| self.violation(measured.describe("at least", *n), value))
            }
            Rule::Max(n) | Rule::Lte(n) => {
                let measured = measure(value)?;
                (measured.amount > *n)
                    .then(|| self.violation(measured.describe("at most", *n), value))
            }
            Rule::Gt(n) => {
                let measured = measure(value)?;
                (measured.amount <= *n)
                    .then(|| self.violation(measured.describe("greater than", *n), value))
            }
            Rule::Lt(n) => {
                let measured = measure(value)?;
                (measured.amount >= *n)
                    .then(|| self.violation(measured.describe("less than", *n), value))
            }
            Rule::Len(n) => {
                let measured = measure(value)?;
                #[allow(clippy::float_cmp)]
                let differs = measured.amount != *n;
                differs.then(|| self.violation(measured.describe("exactly", *n), value))
            }
            Rule::OneOf(options) => {
                let plain = scalar_text(value)?;
                (!options.iter().any(|o| *o == plain)).then(|| {
                    self.violation(format!("must be one of [{}]", options.join(" ")), value)
                })
            }
            Rule::Email => {
                let text = scalar_text(value)?;
                (!EMAIL_RE.is_match(&text))
                    .then(|| self.violation("must be a valid email address", value))
            }
            Rule::Url => {
                let text = scalar_text(value)?;
                let valid = url::Url::parse(&text).is_ok_and(|u| !u.cannot_be_a_base());
                (!valid).then(|| self.violation("must be a valid URL", value))
            }
            Rule::Uuid => {
                let text = scalar_text(value)?;
                uuid::Uuid::parse_str(&text)
                    .is_err()
                    .then(|| self.violation("must be a valid UUID", value))
            }
            Rule::Alpha => {
                let text = scalar_text(value)?;
                let valid = !text.is_empty() && text.chars().all(|c| c.is_ascii_alphabetic());
                (!valid).then(|| self.violation("must contain only letters", value))
            }
            Rule::AlphaNum => {
                let text = scalar_text(value)?;
                let valid = !text.is_empty() && text.chars().all(|c| c.is_ascii_alphanumeric());
                (!valid).then(|| self.violation("must contain only letters and digits", value))
            }
            Rule::Numeric => {
                if matches!(value, Value::Int(_) | Value::Float(_)) {
                    return None;
                }
                let text = scalar_text(value)?;
                (!NUMERIC_RE.is_match(&text))
                    .then(|| self.violation("must be a numeric string", value))
            }
            Rule::Pattern(re) => {
                let text = scalar_text(value)?;
                (!re.is_match(&text))
                    .then(|| self.violation(format!("must match pattern {}", re.as_str()), value))
            }
            Rule::EqField(other) => {
                let sibling = ctx.sibling(other)?;
                (sibling != value)
                    .then(|| self.violation(format!("must be equal to {other}"), value))
            }
            Rule::NeField(other) => {
                let sibling = ctx.sibling(other)?;
                (sibling == value)
                    .then(|| self.violation(format!("must not be equal to {other}"), value))
            }
            Rule::GtField(other) => {
                let (mine, theirs) = (value.as_f64()?, ctx.sibling(other)?.as_f64()?);
                (mine <= theirs)
                    .then(|| self.violation(format!("must be greater than {other}"), value))
            }
            Rule::LtField(other) => {
                let (mine, theirs) = (value.as_f64()?, ctx.sibling(other)?.as_f64()?);
                (mine >= theirs)
                    .then(|| self.violation(format!("must be less than {other}"), value))
            }
        }
    }
}

impl fmt::Display for RuleSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.param {
            Some(param) => write!(f, "{}={}", self.name, param),
            None => f.write_str(&self.name),
        }
    }
}

/// An ordered, pre-parsed rule list.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<RuleSpec>,
}

impl RuleSet {
    /// Parse a comma separated rule list. Empty tokens are ignored.
    pub fn parse(source: &str) -> Result<Self, ShapeError> {
        let rules = split_tokens(source)
            .iter()
            .map(|token| RuleSpec::parse(token))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    /// Whether `required` is declared.
    #[must_use]
    pub fn is_required(&self) -> bool {
        self.rules.iter().any(|r| matches!(r.rule, Rule::Required))
    }

    /// Whether any rule other than `required` is declared.
    #[must_use]
    pub fn has_constraints(&self) -> bool {
        self.rules
            .iter()
            .any(|r| !matches!(r.rule, Rule::Required | Rule::Unknown))
    }

    /// Whether the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Iterate over the rules in declaration order.
    pub fn iter(&self) -> std::slice::Iter<'_, RuleSpec> {
        self.rules.iter()
    }

    /// Find a rule by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&RuleSpec> {
        self.rules.iter().find(|r| r.name == name)
    }

    /// Evaluate every rule against `value`.
    ///
    /// All violations are reported; there is no short-circuit. Null values
    /// are never checked. Errors are path-less.
    pub fn evaluate(&self, value: &Value, ctx: &ValidationContext<'_>) -> ValidationErrors {
        if value.is_null() {
            return ValidationErrors::new();
        }
        self.rules.iter().filter_map(|r| r.check(value, ctx)).collect()
    }
}

impl<'a> IntoIterator for &'a RuleSet {
    type Item = &'a RuleSpec;
    type IntoIter = std::slice::Iter<'a, RuleSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}

/// What a bound rule measured.
struct Measured {
    amount: f64,
    unit: Option<&'static str>,
}

impl Measured {
    fn describe(&self, relation: &str, bound: f64) -> String {
        match self.unit {
            Some(unit) => format!("length must be {relation} {} {unit}", format_number(bound)),
            None => format!("must be {relation} {}", format_number(bound)),
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn measure(value: &Value) -> Option<Measured> {
    match value {
        Value::Int(i) => Some(Measured {
            amount: *i as f64,
            unit: None,
        }),
        Value::Float(f) => Some(Measured {
            amount: *f,
            unit: None,
        }),
        Value::String(_) => Some(Measured {
            amount: value.len()? as f64,
            unit: Some("characters"),
        }),
        Value::List(_) | Value::Map(_) => Some(Measured {
            amount: value.len()? as f64,
            unit: Some("items"),
        }),
        Value::Null | Value::Bool(_) => None,
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Int(_) | Value::Float(_) | Value::Bool(_) => Some(value.to_plain_string()),
        Value::Null | Value::List(_) | Value::Map(_) => None,
    }
}

#[allow(clippy::cast_possible_truncation)]
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

fn split_tokens(source: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut chars = source.chars().peekable();
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
    tokens
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

fn build_rule(name: &str, param: Option<&str>) -> Result<Rule, ShapeError> {
    let number = || -> Result<f64, ShapeError> {
        let raw = param.ok_or_else(|| ShapeError::missing_param(name))?;
        let parsed: f64 = raw
            .parse()
            .map_err(|_| ShapeError::invalid_param(name, raw, "expected a number"))?;
        if parsed.is_finite() {
            Ok(parsed)
        } else {
            Err(ShapeError::invalid_param(name, raw, "expected a finite number"))
        }
    };
    let text = || -> Result<String, ShapeError> {
        match param {
            Some(raw) if !raw.is_empty() => Ok(raw.to_string()),
            _ => Err(ShapeError::missing_param(name)),
        }
    };

    Ok(match name {
        "required" => Rule::Required,
        "min" => Rule::Min(number()?),
        "max" => Rule::Max(number()?),
        "gte" => Rule::Gte(number()?),
        "lte" => Rule::Lte(number()?),
        "gt" => Rule::Gt(number()?),
        "lt" => Rule::Lt(number()?),
        "len" => Rule::Len(number()?),
        "oneof" => {
            let options: Vec<String> = text()?.split_whitespace().map(str::to_string).collect();
            Rule::OneOf(options)
        }
        "email" => Rule::Email,
        "url" => Rule::Url,
        "uuid" => Rule::Uuid,
        "alpha" => Rule::Alpha,
        "alphanum" => Rule::AlphaNum,
        "numeric" => Rule::Numeric,
        "pattern" => {
            let pattern = text()?;
            let re = Regex::new(&pattern)
                .map_err(|source| ShapeError::InvalidPattern { pattern, source })?;
            Rule::Pattern(re)
        }
        "eqfield" => Rule::EqField(text()?),
        "nefield" => Rule::NeField(text()?),
        "gtfield" => Rule::GtField(text()?),
        "ltfield" => Rule::LtField(text()?),
        _ => Rule::Unknown,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn eval(rules: &str, value: Value) -> ValidationErrors {
        let raw = Value::Null;
        let ctx = ValidationContext::root(&raw);
        RuleSet::parse(rules).unwrap().evaluate(&value, &ctx)
    }

    #[rstest]
    #[case("abc", true)]
    #[case("ab", false)]
    #[case("héé", true)]
    fn test_min_string_length(#[case] input: &str, #[case] ok: bool) {
        assert_eq!(eval("min=3", Value::from(input)).is_empty(), ok);
    }

    #[rstest]
    #[case(0, true)]
    #[case(150, true)]
    #[case(-1, false)]
    #[case(151, false)]
    fn test_numeric_bounds(#[case] age: i64, #[case] ok: bool) {
        assert_eq!(eval("gte=0,lte=150", Value::Int(age)).is_empty(), ok);
    }

    #[test]
    fn test_max_list_length() {
        let errs = eval("max=2", Value::from(vec![1, 2, 3]));
        assert_eq!(errs.len(), 1);
        assert_eq!(errs.errors()[0].message, "length must be at most 2 items");
    }

    #[rstest]
    #[case::gte_below("gte=5", 4.9, false)]
    #[case::gte_at("gte=5", 5.0, true)]
    #[case::gte_above("gte=5", 5.1, true)]
    #[case::gt_below("gt=5", 4.9, false)]
    #[case::gt_at("gt=5", 5.0, false)]
    #[case::gt_above("gt=5", 5.1, true)]
    #[case::lte_below("lte=5", 4.9, true)]
    #[case::lte_at("lte=5", 5.0, true)]
    #[case::lte_above("lte=5", 5.1, false)]
    #[case::lt_below("lt=5", 4.9, true)]
    #[case::lt_at("lt=5", 5.0, false)]
    #[case::lt_above("lt=5", 5.1, false)]
    fn test_bound_boundaries(#[case] rule: &str, #[case] value: f64, #[case] ok: bool) {
        assert_eq!(eval(rule, Value::Float(value)).is_empty(), ok);
    }

    #[rstest]
    #[case::gt_at("gt=5", 5, false)]
    #[case::gt_above("gt=5", 6, true)]
    #[case::lt_below("lt=5", 4, true)]
    #[case::lt_at("lt=5", 5, false)]
    fn test_exclusive_bounds_on_ints(#[case] rule: &str, #[case] value: i64, #[case] ok: bool) {
        assert_eq!(eval(rule, Value::Int(value)).is_empty(), ok);
    }

    #[test]
    fn test_len_exact() {
        assert!(eval("len=2", Value::from("ab")).is_empty());
        assert!(!eval("len=2", Value::from("abc")).is_empty());
    }

    #[test]
    fn test_no_short_circuit() {
        let errs = eval("min=5,email", Value::from("ab"));
        let names: Vec<_> = errs
            .iter()
            .filter_map(|e| e.constraint_descriptor())
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["min", "email"]);
    }

    #[test]
    fn test_constraint_descriptor_carries_param() {
        let errs = eval("min=3", Value::from("ab"));
        let constraint = errs.errors()[0].constraint_descriptor().unwrap();
        assert_eq!(constraint.to_string(), "min=3");
        assert_eq!(errs.errors()[0].message, "length must be at least 3 characters");
    }

    #[rstest]
    #[case("a@example.com", true)]
    #[case("first.last+tag@sub.example.org", true)]
    #[case("not-an-email", false)]
    #[case("a@b", false)]
    fn test_email(#[case] input: &str, #[case] ok: bool) {
        assert_eq!(eval("email", Value::from(input)).is_empty(), ok);
    }

    #[test]
    fn test_oneof_uses_plain_string() {
        assert!(eval("oneof=1 2 3", Value::Int(2)).is_empty());
        assert!(eval("oneof=red green", Value::from("red")).is_empty());
        let errs = eval("oneof=red green", Value::from("blue"));
        assert_eq!(errs.errors()[0].message, "must be one of [red green]");
    }

    #[test]
    fn test_formats() {
        assert!(eval("url", Value::from("https://example.com/a")).is_empty());
        assert!(!eval("url", Value::from("example")).is_empty());
        assert!(eval("uuid", Value::from("67e55044-10b1-426f-9247-bb680e5fe0c8")).is_empty());
        assert!(!eval("uuid", Value::from("nope")).is_empty());
        assert!(eval("alpha", Value::from("abc")).is_empty());
        assert!(!eval("alpha", Value::from("")).is_empty());
        assert!(!eval("alphanum", Value::from("ab-1")).is_empty());
        assert!(eval("numeric", Value::from("-12.5")).is_empty());
        assert!(!eval("numeric", Value::from("12a")).is_empty());
    }

    #[test]
    fn test_pattern_with_escaped_comma() {
        assert!(eval(r"pattern=^[a-z]{2\,3}$", Value::from("abc")).is_empty());
        assert!(!eval(r"pattern=^[a-z]{2\,3}$", Value::from("abcd")).is_empty());
    }

    #[test]
    fn test_unknown_rule_is_noop() {
        let set = RuleSet::parse("frobnicate=7,required").unwrap();
        assert!(set.is_required());
        assert!(!set.has_constraints());
        assert!(eval("frobnicate=7", Value::from("x")).is_empty());
    }

    #[test]
    fn test_null_is_not_checked() {
        assert!(eval("min=3,email", Value::Null).is_empty());
    }

    #[test]
    fn test_cross_field() {
        let raw = Value::Null;
        let mut ctx = ValidationContext::root(&raw);
        ctx.scoped("start", |ctx| ctx.record(Value::Int(10)));
        let set = RuleSet::parse("gtfield=start").unwrap();
        let errs = ctx.scoped("end", |ctx| set.evaluate(&Value::Int(5), ctx));
        assert_eq!(errs.errors()[0].message, "must be greater than start");
        let ok = ctx.scoped("end", |ctx| set.evaluate(&Value::Int(11), ctx));
        assert!(ok.is_empty());
    }

    #[test]
    fn test_cross_field_missing_sibling_is_noop() {
        assert!(eval("eqfield=password", Value::from("x")).is_empty());
    }

    #[rstest]
    #[case("min")]
    #[case("min=")]
    #[case("oneof")]
    #[case("pattern=(")]
    #[case("max=inf")]
    fn test_parse_errors(#[case] rules: &str) {
        assert!(RuleSet::parse(rules).is_err());
    }
}
