//! Rule and Filter types for inline formatting.

use doctree_core::TextStyle;

use crate::service::{Dialect, DoctreeOptions};

/// Type alias for substitution functions.
///
/// A substitution receives the fragment text and the style accumulated so far,
/// and returns the rewritten text. Style flags set by one rule are kept.
pub type SubstituteFn = Box<dyn Fn(&str, &mut TextStyle) -> String + Send + Sync>;

/// A filter determines which inputs a rule applies to
pub enum Filter {
    /// Match every input
    Any,
    /// Match inputs of one dialect
    Dialect(Dialect),
    /// Match using a predicate function
    Predicate(Box<dyn Fn(Dialect, &DoctreeOptions) -> bool + Send + Sync>),
}

impl Filter {
    /// Create a filter with a predicate
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(Dialect, &DoctreeOptions) -> bool + Send + Sync + 'static,
    {
        Filter::Predicate(Box::new(f))
    }

    /// Check if this filter matches the current input
    pub fn matches(&self, dialect: Dialect, options: &DoctreeOptions) -> bool {
        match self {
            Filter::Any => true,
            Filter::Dialect(d) => *d == dialect,
            Filter::Predicate(f) => f(dialect, options),
        }
    }
}

/// A rule rewrites one concern of a text fragment
pub struct Rule {
    /// Filter to determine which inputs this rule applies to
    pub filter: Filter,
    /// Substitution applied to the fragment
    pub substitute: SubstituteFn,
}

impl Rule {
    /// Create a new rule
    pub fn new<F>(filter: Filter, substitute: F) -> Self
    where
        F: Fn(&str, &mut TextStyle) -> String + Send + Sync + 'static,
    {
        Self {
            filter,
            substitute: Box::new(substitute),
        }
    }

    /// Create a rule for every dialect
    pub fn any<F>(substitute: F) -> Self
    where
        F: Fn(&str, &mut TextStyle) -> String + Send + Sync + 'static,
    {
        Self::new(Filter::Any, substitute)
    }

    /// Create a rule for a single dialect
    pub fn for_dialect<F>(dialect: Dialect, substitute: F) -> Self
    where
        F: Fn(&str, &mut TextStyle) -> String + Send + Sync + 'static,
    {
        Self::new(Filter::Dialect(dialect), substitute)
    }

    /// Apply this rule's substitution
    pub fn apply(&self, text: &str, style: &mut TextStyle) -> String {
        (self.substitute)(text, style)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_matches() {
        let options = DoctreeOptions::default();
        assert!(Filter::Any.matches(Dialect::Latex, &options));
        assert!(Filter::Dialect(Dialect::Markdown).matches(Dialect::Markdown, &options));
        assert!(!Filter::Dialect(Dialect::Markdown).matches(Dialect::Latex, &options));

        let quotes = Filter::predicate(|_, options| options.straighten_quotes);
        assert!(!quotes.matches(Dialect::Latex, &options));
        let options = DoctreeOptions {
            straighten_quotes: true,
            ..Default::default()
        };
        assert!(quotes.matches(Dialect::Latex, &options));
    }

    #[test]
    fn test_rule_sets_style() {
        let rule = Rule::any(|text, style| {
            style.bold = true;
            text.to_uppercase()
        });
        let mut style = TextStyle::default();
        assert_eq!(rule.apply("abc", &mut style), "ABC");
        assert!(style.bold);
    }
}
