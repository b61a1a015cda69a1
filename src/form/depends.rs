//! Dependency expressions.
//!
//! An option's dependencies are a disjunction of [`DependencyGroup`]s, each
//! a conjunction of conditions on other options' live values. A group may be
//! inverted (`!reverse`), may test containment instead of equality
//! (`!contains`) or may mark the option as visible by default (`!default`).

use std::{collections::BTreeMap, fmt, str::FromStr};

use regex::Regex;
use serde::Deserialize;

use crate::storage::Value;

/// A reference to another option.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OptionPath {
    /// An option bound to the same record of the same configuration.
    Local(String),
    /// An option addressed as `config.record.option`.
    Global {
        /// The configuration name.
        config: String,
        /// The record name.
        record: String,
        /// The option name.
        option: String,
    },
}

impl OptionPath {
    /// Parses a path. Anything other than exactly three dotted components is
    /// taken as a local option name.
    #[must_use]
    pub fn parse(path: &str) -> Self {
        let mut parts = path.splitn(3, '.');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(config), Some(record), Some(option))
                if !config.is_empty() && !record.is_empty() && !option.is_empty() =>
            {
                Self::Global {
                    config: config.to_string(),
                    record: record.to_string(),
                    option: option.to_string(),
                }
            }
            _ => Self::Local(path.to_string()),
        }
    }

    /// The name of the referenced option.
    #[must_use]
    pub fn option(&self) -> &str {
        match self {
            Self::Local(option) | Self::Global { option, .. } => option,
        }
    }
}

impl FromStr for OptionPath {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for OptionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(option) => f.write_str(option),
            Self::Global {
                config,
                record,
                option,
            } => write!(f, "{config}.{record}.{option}"),
        }
    }
}

/// The value a condition expects.
#[derive(Debug, Clone)]
pub enum Expected {
    /// The option has no live value.
    Absent,
    /// A scalar value.
    Text(String),
    /// A list value, compared element-wise.
    List(Vec<String>),
    /// A pattern the live value must match.
    Pattern(Regex),
}

impl PartialEq for Expected {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Absent, Self::Absent) => true,
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Pattern(a), Self::Pattern(b)) => a.as_str() == b.as_str(),
            _ => false,
        }
    }
}

impl From<&str> for Expected {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Expected {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for Expected {
    fn from(value: bool) -> Self {
        Self::Text(if value { "1" } else { "0" }.to_string())
    }
}

impl From<Vec<&str>> for Expected {
    fn from(items: Vec<&str>) -> Self {
        Self::List(items.into_iter().map(str::to_string).collect())
    }
}

impl From<Regex> for Expected {
    fn from(pattern: Regex) -> Self {
        Self::Pattern(pattern)
    }
}

impl From<Option<Value>> for Expected {
    fn from(value: Option<Value>) -> Self {
        match value {
            None => Self::Absent,
            Some(Value::Text(text)) => Self::Text(text),
            Some(Value::List(items)) => Self::List(items),
        }
    }
}

/// Deep equality between a live value and an expected one.
///
/// A pattern never matches an absent value and matches a list if any item
/// matches. An absent value equals only [`Expected::Absent`]. Scalars never
/// equal lists.
#[must_use]
pub fn is_equal(actual: Option<&Value>, expected: &Expected) -> bool {
    match (actual, expected) {
        (None, Expected::Absent) => true,
        (None, _) | (Some(_), Expected::Absent) => false,
        (Some(Value::Text(text)), Expected::Pattern(pattern)) => pattern.is_match(text),
        (Some(Value::List(items)), Expected::Pattern(pattern)) => {
            items.iter().any(|item| pattern.is_match(item))
        }
        (Some(Value::Text(text)), Expected::Text(expected)) => text == expected,
        (Some(Value::List(items)), Expected::List(expected)) => items == expected,
        (Some(_), _) => false,
    }
}

/// Containment: list membership for list values, substring search for
/// scalars.
#[must_use]
pub fn is_contained(actual: Option<&Value>, expected: &Expected) -> bool {
    match (actual, expected) {
        (Some(Value::List(items)), Expected::Text(expected)) => {
            items.iter().any(|item| item == expected)
        }
        (Some(Value::List(items)), Expected::Pattern(pattern)) => {
            items.iter().any(|item| pattern.is_match(item))
        }
        (Some(Value::Text(text)), Expected::Text(expected)) => text.contains(expected.as_str()),
        (Some(Value::Text(text)), Expected::Pattern(pattern)) => pattern.is_match(text),
        _ => false,
    }
}

/// A conjunction of conditions plus its modifiers.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(try_from = "BTreeMap<String, ExpectedRepr>")]
pub struct DependencyGroup {
    conditions: Vec<(OptionPath, Expected)>,
    reverse: bool,
    contains: bool,
    fallback: bool,
}

impl DependencyGroup {
    /// Creates an empty group.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a condition on the option at `path`.
    #[must_use]
    pub fn when(mut self, path: &str, expected: impl Into<Expected>) -> Self {
        self.conditions
            .push((OptionPath::parse(path), expected.into()));
        self
    }

    /// Inverts the group's result (`!reverse`).
    #[must_use]
    pub const fn reverse(mut self) -> Self {
        self.reverse = true;
        self
    }

    /// Tests containment instead of equality (`!contains`).
    #[must_use]
    pub const fn contains(mut self) -> Self {
        self.contains = true;
        self
    }

    /// Marks the option as active when no other group matches (`!default`).
    #[must_use]
    pub const fn fallback(mut self) -> Self {
        self.fallback = true;
        self
    }

    /// The conditions of the group.
    #[must_use]
    pub fn conditions(&self) -> &[(OptionPath, Expected)] {
        &self.conditions
    }

    /// Whether the group carries no condition and no `!default` marker.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty() && !self.fallback
    }

    fn matches(&self, lookup: &mut impl FnMut(&OptionPath) -> Option<Value>) -> bool {
        let mut matched = !self.fallback;

        for (path, expected) in &self.conditions {
            let actual = lookup(path);
            let ok = if self.contains {
                is_contained(actual.as_ref(), expected)
            } else {
                is_equal(actual.as_ref(), expected)
            };
            matched = matched && ok;
        }

        matched ^ self.reverse
    }
}

/// Evaluates a disjunction of groups.
///
/// `lookup` returns the live value of a referenced option, or `None` when
/// the option is not rendered or not active. Without groups the result is
/// `true`. Otherwise the result is `true` if any group matches, else `true`
/// only when some group is marked `!default`.
pub fn is_satisfied(
    groups: &[DependencyGroup],
    mut lookup: impl FnMut(&OptionPath) -> Option<Value>,
) -> bool {
    if groups.is_empty() {
        return true;
    }

    let mut fallback = false;
    for group in groups {
        fallback |= group.fallback;
        if group.matches(&mut lookup) {
            return true;
        }
    }

    fallback
}

/// An expected value as written in a form description.
///
/// Strings, booleans, integers and string lists are taken literally;
/// `{ regex = "..." }` is a pattern and `{ absent = true }` matches an
/// option without a live value.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ExpectedRepr {
    /// A string.
    Text(String),
    /// A boolean, compared as `1`/`0`.
    Bool(bool),
    /// An integer, compared as its decimal text.
    Integer(i64),
    /// A list of strings.
    List(Vec<String>),
    /// A regular expression.
    Pattern {
        /// The pattern source.
        regex: String,
    },
    /// No live value, or with `false` any non-empty one.
    Absent {
        /// Whether the value must be absent.
        absent: bool,
    },
}

impl ExpectedRepr {
    fn is_truthy(&self) -> bool {
        match self {
            Self::Text(text) => !text.is_empty() && text != "0",
            Self::Bool(flag) => *flag,
            Self::Integer(n) => *n != 0,
            Self::List(items) => !items.is_empty(),
            Self::Pattern { .. } => true,
            Self::Absent { absent } => *absent,
        }
    }
}

impl TryFrom<ExpectedRepr> for Expected {
    type Error = regex::Error;

    fn try_from(repr: ExpectedRepr) -> Result<Self, Self::Error> {
        Ok(match repr {
            ExpectedRepr::Text(text) => Self::Text(text),
            ExpectedRepr::Bool(flag) => Self::from(flag),
            ExpectedRepr::Integer(n) => Self::Text(n.to_string()),
            ExpectedRepr::List(items) => Self::List(items),
            ExpectedRepr::Pattern { regex } => Self::Pattern(Regex::new(&regex)?),
            ExpectedRepr::Absent { absent: true } => Self::Absent,
            ExpectedRepr::Absent { absent: false } => Self::Pattern(Regex::new(".")?),
        })
    }
}

impl TryFrom<BTreeMap<String, ExpectedRepr>> for DependencyGroup {
    type Error = String;

    fn try_from(entries: BTreeMap<String, ExpectedRepr>) -> Result<Self, Self::Error> {
        let mut group = Self::new();

        for (key, value) in entries {
            match key.as_str() {
                "!reverse" => group.reverse = value.is_truthy(),
                "!contains" => group.contains = value.is_truthy(),
                "!default" => group.fallback = true,
                modifier if modifier.starts_with('!') => {
                    return Err(format!("unknown dependency modifier '{modifier}'"));
                }
                path => {
                    let expected = Expected::try_from(value)
                        .map_err(|e| format!("invalid pattern for '{path}': {e}"))?;
                    group.conditions.push((OptionPath::parse(path), expected));
                }
            }
        }

        Ok(group)
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    fn values<'a>(
        pairs: &'a [(&'a str, &'a str)],
    ) -> impl FnMut(&OptionPath) -> Option<Value> + 'a {
        move |path| {
            pairs
                .iter()
                .find(|(name, _)| *name == path.to_string())
                .map(|(_, value)| Value::from(*value))
        }
    }

    #[test_case("proto", OptionPath::Local("proto".into()); "bare name")]
    #[test_case("network.wan.proto", OptionPath::Global {
        config: "network".into(), record: "wan".into(), option: "proto".into()
    }; "dotted")]
    #[test_case("wan.proto", OptionPath::Local("wan.proto".into()); "two components")]
    fn parse_paths(input: &str, expected: OptionPath) {
        assert_eq!(OptionPath::parse(input), expected);
    }

    #[test]
    fn equality() {
        let text = Value::from("static");
        let list = Value::from(vec!["a", "b"]);

        assert!(is_equal(Some(&text), &Expected::from("static")));
        assert!(!is_equal(Some(&text), &Expected::from("dhcp")));
        assert!(!is_equal(None, &Expected::from("static")));
        assert!(!is_equal(Some(&text), &Expected::Absent));
        assert!(is_equal(None, &Expected::Absent));

        assert!(is_equal(Some(&list), &Expected::from(vec!["a", "b"])));
        assert!(!is_equal(Some(&list), &Expected::from(vec!["b", "a"])));
        assert!(!is_equal(Some(&list), &Expected::from("a")));
    }

    #[test]
    fn patterns() {
        let pattern = Expected::from(Regex::new("^(static|dhcp)$").unwrap());

        assert!(is_equal(Some(&Value::from("dhcp")), &pattern));
        assert!(!is_equal(Some(&Value::from("pppoe")), &pattern));
        assert!(!is_equal(None, &pattern));
        assert!(is_equal(Some(&Value::from(vec!["x", "static"])), &pattern));
    }

    #[test]
    fn containment() {
        let list = Value::from(vec!["lan", "wan"]);
        let text = Value::from("eth0.2");

        assert!(is_contained(Some(&list), &Expected::from("wan")));
        assert!(!is_contained(Some(&list), &Expected::from("wa")));
        assert!(is_contained(Some(&text), &Expected::from(".2")));
        assert!(!is_contained(None, &Expected::from("")));
    }

    #[test]
    fn no_groups_is_always_satisfied() {
        assert!(is_satisfied(&[], |_| None));
    }

    #[test]
    fn groups_are_or_of_and() {
        let groups = [
            DependencyGroup::new().when("a", "1").when("b", "1"),
            DependencyGroup::new().when("c", "1"),
        ];

        assert!(is_satisfied(&groups, values(&[("a", "1"), ("b", "1")])));
        assert!(!is_satisfied(&groups, values(&[("a", "1"), ("b", "0")])));
        assert!(is_satisfied(&groups, values(&[("c", "1")])));
        assert!(!is_satisfied(&groups, values(&[])));
    }

    #[test]
    fn reverse_inverts_a_group() {
        let groups = [DependencyGroup::new().when("proto", "static").reverse()];

        assert!(!is_satisfied(&groups, values(&[("proto", "static")])));
        assert!(is_satisfied(&groups, values(&[("proto", "dhcp")])));
        assert!(is_satisfied(&groups, values(&[])));
    }

    #[test]
    fn default_group_is_a_fallback() {
        let groups = [
            DependencyGroup::new().when("proto", "static"),
            DependencyGroup::new().fallback(),
        ];

        assert!(is_satisfied(&groups, values(&[("proto", "static")])));
        assert!(is_satisfied(&groups, values(&[("proto", "dhcp")])));

        let only_default = [
            DependencyGroup::new().fallback().when("proto", "static"),
        ];
        assert!(is_satisfied(&only_default, values(&[("proto", "static")])));
    }

    #[test]
    fn contains_modifier() {
        let groups = [DependencyGroup::new().when("network", "wan").contains()];
        let mut lookup = |_: &OptionPath| Some(Value::from(vec!["lan", "wan"]));
        assert!(is_satisfied(&groups, &mut lookup));
    }

    #[test]
    fn deserializes_modifiers_and_patterns() {
        #[derive(Deserialize)]
        struct Form {
            depends: Vec<DependencyGroup>,
        }

        let form: Form = toml::from_str(
            r#"
            depends = [
                { proto = "static", "!reverse" = true },
                { "network.wan.ifname" = { regex = "^eth" }, "!contains" = 1 },
                { "!default" = true },
            ]
            "#,
        )
        .unwrap();

        assert_eq!(
            form.depends[0],
            DependencyGroup::new().when("proto", "static").reverse()
        );
        assert_eq!(
            form.depends[1],
            DependencyGroup::new()
                .when("network.wan.ifname", Regex::new("^eth").unwrap())
                .contains()
        );
        assert_eq!(form.depends[2], DependencyGroup::new().fallback());
    }

    #[test]
    fn rejects_unknown_modifiers() {
        let entries = BTreeMap::from([("!sometimes".to_string(), ExpectedRepr::Bool(true))]);
        assert!(DependencyGroup::try_from(entries).is_err());
    }
}
