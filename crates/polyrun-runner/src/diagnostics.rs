//! Diagnostic extraction from compiler and runtime error text.
//!
//! Each toolchain family registers one or more [`DiagnosticRule`]s. Parsing
//! tries the family's rules in registration order; when none match, the
//! parser degrades to the raw error text with no line number. A rule that
//! fails to match is never an error.

use std::collections::HashMap;
use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::toolchain::Language;

/// Structured error extracted from compiler or runtime output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// 1-based source line, when one could be found.
    pub line: Option<u32>,
    /// The error message.
    pub message: String,
    /// A hint for fixing the error.
    pub suggestion: Option<String>,
}

impl Diagnostic {
    /// Create a diagnostic without a suggestion.
    pub fn new(line: Option<u32>, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
            suggestion: None,
        }
    }

    /// Attach a suggestion.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "Error on line {}: {}", line, self.message),
            None => write!(f, "Error: {}", self.message),
        }
    }
}

/// Families of error-message grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticFamily {
    /// GCC/Clang `file:line:col: error: message`.
    Gcc,
    /// javac errors and JVM stack traces.
    Java,
    /// CPython tracebacks.
    Python,
    /// Node.js stack traces.
    Node,
    /// PHP `... in file on line N`.
    Php,
    /// Rscript errors.
    R,
}

impl From<Language> for DiagnosticFamily {
    fn from(language: Language) -> Self {
        match language {
            Language::C | Language::Cpp => DiagnosticFamily::Gcc,
            Language::Java => DiagnosticFamily::Java,
            Language::Python => DiagnosticFamily::Python,
            Language::JavaScript => DiagnosticFamily::Node,
            Language::Php => DiagnosticFamily::Php,
            Language::R => DiagnosticFamily::R,
        }
    }
}

/// One pattern/extractor pair.
pub trait DiagnosticRule: Send + Sync {
    /// Extract `(line, message)` from error text, or `None` if the rule does not apply.
    fn extract(&self, text: &str) -> Option<(Option<u32>, String)>;
}

/// Rule driven by a single regex.
///
/// `line_group` names the capture holding the line number; the captures in
/// `message_groups` are joined with `": "` to form the message.
pub struct RegexRule {
    pattern: Regex,
    line_group: Option<usize>,
    message_groups: Vec<usize>,
}

impl RegexRule {
    /// Compile a rule.
    pub fn new(
        pattern: &str,
        line_group: Option<usize>,
        message_groups: &[usize],
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            line_group,
            message_groups: message_groups.to_vec(),
        })
    }
}

impl DiagnosticRule for RegexRule {
    fn extract(&self, text: &str) -> Option<(Option<u32>, String)> {
        let caps = self.pattern.captures(text)?;
        let line = self
            .line_group
            .and_then(|g| caps.get(g))
            .and_then(|m| m.as_str().parse().ok());
        let message = self
            .message_groups
            .iter()
            .filter_map(|g| caps.get(*g))
            .map(|m| m.as_str().trim())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(": ");
        if message.is_empty() {
            return None;
        }
        Some((line, message))
    }
}

/// Rule for stack-trace style output: the line comes from the last frame
/// that matches `frame`, the message from the last line that matches `message`.
pub struct TraceRule {
    frame: Regex,
    message: Regex,
}

impl TraceRule {
    /// Compile a rule. `frame` must capture the line number in group 1;
    /// `message` must match the whole message line.
    pub fn new(frame: &str, message: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            frame: Regex::new(frame)?,
            message: Regex::new(message)?,
        })
    }
}

impl DiagnosticRule for TraceRule {
    fn extract(&self, text: &str) -> Option<(Option<u32>, String)> {
        let message = text
            .lines()
            .rev()
            .map(str::trim)
            .find(|l| self.message.is_match(l))?
            .to_string();
        let line = self
            .frame
            .captures_iter(text)
            .last()
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok());
        Some((line, message))
    }
}

/// Keyword hints, matched case-insensitively against the message.
const HINTS: &[(&str, &str)] = &[
    ("expected ';'", "Check for a missing semicolon at the end of the previous statement."),
    ("expected ‘;’", "Check for a missing semicolon at the end of the previous statement."),
    ("or ';' before", "Check for a missing semicolon at the end of the previous statement."),
    ("or ‘;’ before", "Check for a missing semicolon at the end of the previous statement."),
    ("';' expected", "Check for a missing semicolon at the end of the previous statement."),
    ("indentationerror", "Make sure the block is indented consistently, using either spaces or tabs."),
    ("unexpected indent", "Make sure the block is indented consistently, using either spaces or tabs."),
    ("undeclared", "Check the spelling of the identifier and declare it before use."),
    ("was not declared", "Check the spelling of the identifier and declare it before use."),
    ("cannot find symbol", "Check the spelling of the identifier and declare it before use."),
    ("is not defined", "Check the spelling of the name and define it before use."),
    ("nameerror", "Check the spelling of the name and define it before use."),
    ("object '", "Check the spelling of the name and assign it before use."),
    ("undefined reference", "A function is declared but never defined. Check its name and that its definition is included."),
    ("no module named", "The module is not installed in this environment. Only the standard library is available."),
    ("modulenotfounderror", "The module is not installed in this environment. Only the standard library is available."),
    ("cannot find module", "The module is not installed in this environment. Only built-in modules are available."),
    ("eoferror", "The program tried to read input that was never sent. Provide input while the program is waiting."),
    ("nosuchelementexception", "The program tried to read input that was never sent. Provide input while the program is waiting."),
    ("zerodivisionerror", "Guard the division against a zero divisor."),
    ("division by zero", "Guard the division against a zero divisor."),
    ("/ by zero", "Guard the division against a zero divisor."),
    ("indexerror", "An index is outside the bounds of the sequence. Check loop limits and lengths."),
    ("out of range", "An index is outside the bounds of the sequence. Check loop limits and lengths."),
    ("outofbounds", "An index is outside the bounds of the array. Check loop limits and lengths."),
    ("nullpointerexception", "A reference is null. Initialize it before use."),
    ("typeerror", "A value has the wrong type for this operation. Check the types of the operands."),
    ("valueerror", "A value has the right type but an invalid content, for example int('abc')."),
    ("keyerror", "The key is missing from the dictionary. Check it with 'in' or use .get()."),
    ("class main is public", "In Java the public class must be named Main to match Main.java."),
    ("should be declared in a file named", "In Java the public class must be named Main to match Main.java."),
    ("syntax error", "Check the syntax near the reported line: unbalanced brackets, quotes or a missing operator."),
    ("syntaxerror", "Check the syntax near the reported line: unbalanced brackets, quotes or a missing operator."),
    ("unexpected", "Check the syntax near the reported line: unbalanced brackets, quotes or a missing operator."),
    ("segmentation fault", "The program accessed invalid memory. Check pointers and array bounds."),
];

/// Look up a hint for an error message.
pub fn suggest(message: &str) -> Option<&'static str> {
    let lower = message.to_lowercase();
    HINTS
        .iter()
        .find(|(needle, _)| lower.contains(needle))
        .map(|(_, hint)| *hint)
}

/// Strategy table of diagnostic rules keyed by toolchain family.
pub struct DiagnosticParser {
    rules: HashMap<DiagnosticFamily, Vec<Box<dyn DiagnosticRule>>>,
}

impl Default for DiagnosticParser {
    fn default() -> Self {
        Self::new()
    }
}

impl DiagnosticParser {
    /// Create a parser with the built-in rules for every supported family.
    pub fn new() -> Self {
        let mut parser = Self::empty();

        parser.register_regex(
            DiagnosticFamily::Gcc,
            r"(?m)^[^:\n]*:(\d+):(?:\d+:)?\s*(?:fatal )?error:\s*(.+)$",
            Some(1),
            &[2],
        );
        parser.register_regex(
            DiagnosticFamily::Gcc,
            r"(?m)^.*?(undefined reference to .+)$",
            None,
            &[1],
        );

        parser.register_regex(
            DiagnosticFamily::Java,
            r"(?m)^[^:\n]*\.java:(\d+):\s*error:\s*(.+)$",
            Some(1),
            &[2],
        );
        parser.register_trace(
            DiagnosticFamily::Java,
            r"\(Main\.java:(\d+)\)",
            r#"^Exception in thread "[^"]*" \S+"#,
        );

        parser.register_trace(
            DiagnosticFamily::Python,
            r#"File "[^"]*script\.py", line (\d+)"#,
            r"^[A-Za-z_][\w.]*(Error|Exception|Interrupt|Exit|Warning)\b",
        );

        parser.register_trace(
            DiagnosticFamily::Node,
            r"(?m)script\.js:(\d+)",
            r"^[A-Za-z_]*(Error|Exception)\b(:.*)?$",
        );

        parser.register_regex(
            DiagnosticFamily::Php,
            r"(?i)(?:PHP )?(Parse error|Fatal error|Warning)\s*:\s*(.+?) in \S+ on line (\d+)",
            Some(3),
            &[1, 2],
        );

        parser.register_regex(
            DiagnosticFamily::R,
            r"(?m)^\S*\.R:(\d+):\d+:\s*(.+)$",
            Some(1),
            &[2],
        );
        parser.register_regex(
            DiagnosticFamily::R,
            r"(?m)^Error(?: in [^:\n]+)?\s*:\s*(.+)$",
            None,
            &[1],
        );

        parser
    }

    /// Create a parser with no rules; every parse degrades to raw text.
    pub fn empty() -> Self {
        Self {
            rules: HashMap::new(),
        }
    }

    /// Register a rule for a family. Rules run in registration order.
    pub fn register(&mut self, family: DiagnosticFamily, rule: Box<dyn DiagnosticRule>) {
        self.rules.entry(family).or_default().push(rule);
    }

    fn register_regex(
        &mut self,
        family: DiagnosticFamily,
        pattern: &str,
        line_group: Option<usize>,
        message_groups: &[usize],
    ) {
        match RegexRule::new(pattern, line_group, message_groups) {
            Ok(rule) => self.register(family, Box::new(rule)),
            Err(e) => tracing::warn!(
                pattern = %pattern,
                error = %e,
                "invalid diagnostic pattern, rule skipped"
            ),
        }
    }

    fn register_trace(&mut self, family: DiagnosticFamily, frame: &str, message: &str) {
        match TraceRule::new(frame, message) {
            Ok(rule) => self.register(family, Box::new(rule)),
            Err(e) => tracing::warn!(
                frame = %frame,
                error = %e,
                "invalid diagnostic pattern, rule skipped"
            ),
        }
    }

    /// Number of registered rules across all families.
    pub fn len(&self) -> usize {
        self.rules.values().map(|v| v.len()).sum()
    }

    /// Check if no rules are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Extract a diagnostic from error text.
    ///
    /// Returns `None` only when the text is blank.
    pub fn parse(&self, family: DiagnosticFamily, text: &str) -> Option<Diagnostic> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        let extracted = self
            .rules
            .get(&family)
            .into_iter()
            .flatten()
            .find_map(|rule| rule.extract(text));

        let (line, message) = extracted.unwrap_or_else(|| (None, raw_message(text)));

        let suggestion = suggest(&message).or_else(|| suggest(text));
        let mut diagnostic = Diagnostic::new(line, message);
        diagnostic.suggestion = suggestion.map(str::to_string);
        Some(diagnostic)
    }
}

/// Fallback message: the last non-blank line of the raw text.
fn raw_message(text: &str) -> String {
    text.lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or(text)
        .to_string()
}
