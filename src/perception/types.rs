use std::fmt;

use serde::{Deserialize, Serialize};

/// Element family a selector intent is restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementType {
    Button,
    InputButton,
    Submit,
    Link,
    Input,
    Any,
}

impl ElementType {
    /// CSS form of the element family, used for display.
    pub fn css_tag(&self) -> &'static str {
        match self {
            ElementType::Button => "button",
            ElementType::InputButton => "input[type='button']",
            ElementType::Submit => "input[type='submit']",
            ElementType::Link => "a",
            ElementType::Input => "input",
            ElementType::Any => "*",
        }
    }

    /// XPath node test for the element family.
    pub fn xpath_step(&self) -> &'static str {
        match self {
            ElementType::Button => "button",
            ElementType::InputButton => "input[@type='button']",
            ElementType::Submit => "input[@type='submit']",
            ElementType::Link => "a",
            ElementType::Input => "input",
            ElementType::Any => "*",
        }
    }

    /// Input-based buttons carry their label in `value` rather than text content.
    pub fn labelled_by_value(&self) -> bool {
        matches!(self, ElementType::InputButton | ElementType::Submit)
    }
}

/// A UI query expressed as intent. Concrete syntax (CSS, XPath, ...) is
/// produced by the driver adapter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Selector {
    /// Raw CSS selector.
    Css { css: String },
    /// Raw XPath expression.
    XPath { xpath: String },
    /// Element of the given family whose visible text contains `text` (case-insensitive).
    HasText { element: ElementType, text: String },
    /// Innermost element whose own text contains `text` (case-insensitive).
    Text { text: String },
    /// Element of the given family whose attribute contains `needle` (case-insensitive).
    Attribute {
        element: ElementType,
        attr: String,
        needle: String,
    },
    /// The page's dedicated search input.
    SearchInput,
}

impl Selector {
    pub fn css(css: impl Into<String>) -> Self {
        Selector::Css { css: css.into() }
    }

    pub fn xpath(xpath: impl Into<String>) -> Self {
        Selector::XPath {
            xpath: xpath.into(),
        }
    }

    pub fn has_text(element: ElementType, text: impl Into<String>) -> Self {
        Selector::HasText {
            element,
            text: text.into(),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Selector::Text { text: text.into() }
    }

    pub fn attribute(element: ElementType, attr: &str, needle: impl Into<String>) -> Self {
        Selector::Attribute {
            element,
            attr: attr.to_string(),
            needle: needle.into(),
        }
    }

    /// Root document element; present on every loaded page.
    pub fn document_root() -> Self {
        Selector::css("body")
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Css { css } => f.write_str(css),
            Selector::XPath { xpath } => write!(f, "xpath={xpath}"),
            Selector::HasText { element, text } => {
                write!(f, "{}:has-text('{text}')", element.css_tag())
            }
            Selector::Text { text } => write!(f, "text={text}"),
            Selector::Attribute {
                element,
                attr,
                needle,
            } => write!(f, "{}[{attr}*='{needle}' i]", element.css_tag()),
            Selector::SearchInput => f.write_str("input[type='search']"),
        }
    }
}
