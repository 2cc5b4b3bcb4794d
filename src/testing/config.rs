//! Suite file configuration types
//!
//! Defines the data structures for deserializing YAML suite files.

use serde::Deserialize;

/// A complete suite file loaded from YAML
#[derive(Deserialize, Debug, Default)]
pub struct SuiteFile {
    /// Suites in registration order
    #[serde(default)]
    pub suites: Vec<SuiteSpec>,
}

/// One `describe` block
#[derive(Deserialize, Debug)]
pub struct SuiteSpec {
    /// Name of the suite
    pub name: String,
    /// Default selector for the suite's tests
    pub selector: Option<String>,
    /// Focus this suite
    #[serde(default)]
    pub only: bool,
    /// Per-test timeout for the suite's tests, in milliseconds
    pub timeout_ms: Option<u64>,
    /// Retries for the suite's tests
    pub retry: Option<u32>,
    /// Tests in registration order
    #[serde(default)]
    pub tests: Vec<TestSpec>,
}

/// One test and the element checks it makes
#[derive(Deserialize, Debug)]
pub struct TestSpec {
    /// Name of the test
    pub name: String,
    /// Selector overriding the suite's
    pub selector: Option<String>,
    /// Skip without running
    #[serde(default)]
    pub skip: bool,
    /// Mark as not implemented: `true` or a reason
    pub todo: Option<TodoSpec>,
    /// Focus this test
    #[serde(default)]
    pub only: bool,
    /// Timeout overriding the suite's, in milliseconds
    pub timeout_ms: Option<u64>,
    /// Retries overriding the suite's
    pub retry: Option<u32>,
    /// Skip at runtime unless the element contains a match for this selector
    pub skip_unless: Option<String>,
    /// Checks made against each matched element, in order
    #[serde(default)]
    pub expect: Vec<Check>,
}

/// `todo: true` or `todo: "reason"`
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum TodoSpec {
    Flag(bool),
    Reason(String),
}

/// A built-in assertion about the element under test
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum Check {
    /// The attribute is present
    HasAttribute { name: String },
    /// The attribute is present with exactly this value
    AttributeEquals { name: String, value: String },
    /// The element's text content contains `value`
    TextContains { value: String },
    /// At least one descendant matches `selector`
    Contains { selector: String },
    /// The element's tag, compared case-insensitively
    TagName { value: String },
    /// The element has child elements or non-whitespace text
    NotEmpty,
}

impl Check {
    /// Name used in failure messages
    pub fn name(&self) -> &'static str {
        match self {
            Check::HasAttribute { .. } => "has_attribute",
            Check::AttributeEquals { .. } => "attribute_equals",
            Check::TextContains { .. } => "text_contains",
            Check::Contains { .. } => "contains",
            Check::TagName { .. } => "tag_name",
            Check::NotEmpty => "not_empty",
        }
    }
}
