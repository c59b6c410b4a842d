//! Rule system for inline text formatting.

mod builtin;
mod rule;

pub use builtin::builtin_rules;
pub use rule::{Filter, Rule, SubstituteFn};

use doctree_core::TextStyle;
use indexmap::IndexMap;

use crate::service::{Dialect, DoctreeOptions};
use crate::utilities::collapse_whitespace;

/// Plain text of a fragment together with the style its markup implied
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Formatted {
    pub text: String,
    pub style: TextStyle,
}

/// Collection of rules for formatting
pub struct Rules {
    /// Custom rules added by the user (run after the built-ins)
    custom_rules: IndexMap<String, Rule>,
    /// Built-in rules, in application order
    builtin_rules: Vec<Rule>,
}

impl Rules {
    /// Create a new Rules instance with the built-in rules
    pub fn new() -> Self {
        Self {
            custom_rules: IndexMap::new(),
            builtin_rules: builtin_rules(),
        }
    }

    /// Add a custom rule, replacing any rule with the same key
    pub fn add(&mut self, key: &str, rule: Rule) {
        self.custom_rules.insert(key.to_string(), rule);
    }

    /// Remove a custom rule
    pub fn remove(&mut self, key: &str) -> Option<Rule> {
        self.custom_rules.shift_remove(key)
    }

    /// Number of custom rules
    pub fn custom_len(&self) -> usize {
        self.custom_rules.len()
    }

    /// Run every matching rule over `text`, then collapse whitespace
    pub fn format(&self, text: &str, dialect: Dialect, options: &DoctreeOptions) -> Formatted {
        let mut style = TextStyle::default();
        let mut current = text.to_string();

        let rules = self.builtin_rules.iter().chain(self.custom_rules.values());
        for rule in rules {
            if rule.filter.matches(dialect, options) {
                current = rule.apply(&current, &mut style);
            }
        }

        Formatted {
            text: collapse_whitespace(&current),
            style,
        }
    }
}

impl Default for Rules {
    fn default() -> Self {
        Self::new()
    }
}

/// Formatting context handed to the block builders
#[derive(Clone, Copy)]
pub(crate) struct InlineFormatter<'a> {
    pub rules: &'a Rules,
    pub dialect: Dialect,
    pub options: &'a DoctreeOptions,
}

impl InlineFormatter<'_> {
    pub fn format(&self, text: &str) -> Formatted {
        self.rules.format(text, self.dialect, self.options)
    }

    /// Formatted text with the style dropped
    pub fn text(&self, text: &str) -> String {
        self.format(text).text
    }
}
