use std::fmt;

/// One filter applied to a candidate element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    AttrEquals { name: String, value: String },
    AttrContains { name: String, fragment: String },
    /// The element's full string value (own text plus descendants) contains the text.
    TextContains(String),
    /// The element's first own text node contains the text.
    OwnTextContains(String),
}

/// A structured element selector.
///
/// Rendered to XPath 1.0 for a real driver; the test fake evaluates the same
/// structure directly against its in-memory document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementQuery {
    pub tag: Option<String>,
    pub conditions: Vec<Condition>,
    pub ancestor: Option<Box<ElementQuery>>,
}

impl ElementQuery {
    /// Matches any element.
    pub fn any() -> Self {
        Self {
            tag: None,
            conditions: Vec::new(),
            ancestor: None,
        }
    }

    pub fn tag(tag: &str) -> Self {
        Self {
            tag: Some(tag.to_string()),
            ..Self::any()
        }
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.conditions.push(Condition::AttrEquals {
            name: name.to_string(),
            value: value.to_string(),
        });
        self
    }

    pub fn attr_contains(mut self, name: &str, fragment: &str) -> Self {
        self.conditions.push(Condition::AttrContains {
            name: name.to_string(),
            fragment: fragment.to_string(),
        });
        self
    }

    pub fn class(self, fragment: &str) -> Self {
        self.attr_contains("class", fragment)
    }

    pub fn text_contains(mut self, text: &str) -> Self {
        self.conditions.push(Condition::TextContains(text.to_string()));
        self
    }

    pub fn own_text_contains(mut self, text: &str) -> Self {
        self.conditions
            .push(Condition::OwnTextContains(text.to_string()));
        self
    }

    /// Restricts matches to descendants of elements matching `ancestor`.
    pub fn within(mut self, ancestor: ElementQuery) -> Self {
        self.ancestor = Some(Box::new(ancestor));
        self
    }

    pub fn to_xpath(&self) -> String {
        let mut out = String::new();
        if let Some(ancestor) = &self.ancestor {
            out.push_str(&ancestor.to_xpath());
        }
        out.push_str("//");
        out.push_str(self.tag.as_deref().unwrap_or("*"));
        if !self.conditions.is_empty() {
            let clauses: Vec<String> = self.conditions.iter().map(condition_xpath).collect();
            out.push('[');
            out.push_str(&clauses.join(" and "));
            out.push(']');
        }
        out
    }
}

impl fmt::Display for ElementQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_xpath())
    }
}

fn condition_xpath(condition: &Condition) -> String {
    match condition {
        Condition::AttrEquals { name, value } => format!("@{name}={}", xpath_literal(value)),
        Condition::AttrContains { name, fragment } => {
            format!("contains(@{name}, {})", xpath_literal(fragment))
        }
        Condition::TextContains(text) => format!("contains(., {})", xpath_literal(text)),
        Condition::OwnTextContains(text) => format!("contains(text(), {})", xpath_literal(text)),
    }
}

/// Quotes a string as an XPath 1.0 literal. XPath has no escape sequences, so
/// text holding both quote kinds is assembled with `concat()`.
pub fn xpath_literal(text: &str) -> String {
    if !text.contains('\'') {
        return format!("'{text}'");
    }
    if !text.contains('"') {
        return format!("\"{text}\"");
    }
    let parts: Vec<String> = text
        .split('\'')
        .map(|part| format!("'{part}'"))
        .collect();
    format!("concat({})", parts.join(", \"'\", "))
}
