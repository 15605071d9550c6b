//! Structured diagnostics.
//!
//! spec.md's three error kinds (lexical, syntactic, semantic-at-compile-time)
//! share one record shape and one sink, per the design note in spec.md §9
//! ("structured diagnostic record... delivered to an injectable sink"). This
//! collapses the teacher's three sibling `Error` enums (`LexerError` /
//! `ParserError` / `CompileError`, see `error/mod.rs`) into the single shape
//! this crate's scope actually needs.

use std::fmt;

use crate::span::Span;

/// Where a [`Diagnostic`] originated. Purely informational — all three kinds
/// are reported identically (spec.md §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    Lexical,
    Syntactic,
    Semantic,
}

/// What to print after the `[line:col]` prefix, per spec.md §4.6's three
/// renderings: a normal token quotes its lexeme, `EOF` prints "at end", and
/// an `ERROR` token (already carrying its own diagnostic text as its
/// payload) skips the "at ..." clause entirely — the canonical clox
/// `errorAt` behavior this spec is modeled on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticLocation {
    Lexeme(String),
    End,
    ErrorToken,
}

/// One compiler diagnostic: what went wrong, where, and in what phase.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub span: Span,
    pub message: String,
    pub location: DiagnosticLocation,
}

impl Diagnostic {
    pub fn new(
        kind: DiagnosticKind,
        span: Span,
        message: impl Into<String>,
        location: DiagnosticLocation,
    ) -> Self {
        Self {
            kind,
            span,
            message: message.into(),
            location,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            DiagnosticLocation::Lexeme(lexeme) => write!(
                f,
                "[{}] Error at '{}': {}",
                self.span, lexeme, self.message
            ),
            DiagnosticLocation::End => write!(f, "[{}] Error at end: {}", self.span, self.message),
            DiagnosticLocation::ErrorToken => write!(f, "[{}] Error: {}", self.span, self.message),
        }
    }
}

/// Where diagnostics go. An injectable sink so tests can capture output
/// without scraping stderr, per spec.md §9's testability design note.
pub trait DiagnosticSink {
    fn report(&mut self, diagnostic: Diagnostic);
}

/// Collects diagnostics in emission order — the sink used by `compile()`.
#[derive(Debug, Default)]
pub struct DiagnosticBag {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn as_slice(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

impl DiagnosticSink for DiagnosticBag {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }
}

/// Writes each diagnostic to stderr as it is reported, colored the way the
/// teacher's CLI colors its own error output (`colored`, red "Error").
pub struct StderrSink;

impl DiagnosticSink for StderrSink {
    fn report(&mut self, diagnostic: Diagnostic) {
        use colored::Colorize;
        eprintln!("{}", diagnostic.to_string().red());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_with_lexeme() {
        let d = Diagnostic::new(
            DiagnosticKind::Syntactic,
            Span::new(3, 7),
            "Expect expression.",
            DiagnosticLocation::Lexeme("+".to_string()),
        );
        assert_eq!(d.to_string(), "[3:7] Error at '+': Expect expression.");
    }

    #[test]
    fn formats_at_end() {
        let d = Diagnostic::new(
            DiagnosticKind::Syntactic,
            Span::new(1, 1),
            "Expect expression.",
            DiagnosticLocation::End,
        );
        assert_eq!(d.to_string(), "[1:1] Error at end: Expect expression.");
    }

    /// Distinct from `formats_at_end`: an `ERROR` token (e.g. an unterminated
    /// string or a bad character, see `lexer::scanner`'s `error_token`) skips
    /// the "at ..." clause entirely, per spec.md §4.6 — it must never render
    /// as "at end" just because it happens to trail off the rest of the file.
    #[test]
    fn formats_error_token_without_at_clause() {
        let d = Diagnostic::new(
            DiagnosticKind::Lexical,
            Span::new(2, 4),
            "Unterminated string.",
            DiagnosticLocation::ErrorToken,
        );
        assert_eq!(d.to_string(), "[2:4] Error: Unterminated string.");
    }

    #[test]
    fn bag_preserves_order() {
        let mut bag = DiagnosticBag::new();
        bag.report(Diagnostic::new(
            DiagnosticKind::Lexical,
            Span::new(1, 1),
            "a",
            DiagnosticLocation::End,
        ));
        bag.report(Diagnostic::new(
            DiagnosticKind::Semantic,
            Span::new(2, 1),
            "b",
            DiagnosticLocation::End,
        ));
        let msgs: Vec<_> = bag.as_slice().iter().map(|d| d.message.clone()).collect();
        assert_eq!(msgs, vec!["a", "b"]);
    }
}
