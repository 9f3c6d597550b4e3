//! Contains the diagnostic model of the semantic core.
//!
//! Diagnostics are surfaced, never thrown: every operation that can fail in
//! a user-visible way reports to the compilation's [`Diagnostics`] sink and
//! produces a bad sentinel for its caller.

use std::cell::RefCell;

use velac_base::span::Span;

/// The stable code identifying what a [`Diagnostic`] is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DiagCode {
    // lookup
    UndeclaredIdentifier,
    AmbiguousWildcardImport,
    HierarchicalNotAllowed,
    UsedBeforeDeclared,
    UnknownPackage,
    UnknownDefinition,
    Redefinition,

    // types
    BadAssignment,
    BadArgumentType,
    BadCast,
    BadBitstreamCast,
    DynamicNotAllowed,
    MixedDimensionOrder,
    InvalidDimensionRange,
    InvalidSelect,
    InvalidOperands,
    NotAType,
    NotAValue,
    AssignToParameter,
    AssignToNet,
    AssignToCHandle,

    // class access
    StaticAccessToInstance,
    InvalidClassAccess,
    UnknownMember,

    // argument and parameter matching
    TooFewArguments,
    TooManyArguments,
    MixedOrderedNamed,
    DuplicateNamedArgument,
    UnknownNamedArgument,
    MissingArgumentDefault,
    DuplicateParameter,
    OverridingLocalParameter,
    MixedParamAssignment,
    ParamHasNoValue,
    NotASubroutine,
    UnknownSystemSubroutine,

    // constant evaluation
    ConstEvalNonConstVariable,
    ConstEvalTaskNotAllowed,
    ConstEvalDpiNotAllowed,
    ConstEvalVirtualNotAllowed,
    ConstEvalVoidNotAllowed,
    ConstEvalOutputArgNotAllowed,
    ConstEvalGenerateFunction,
    ConstEvalHierarchical,
    ConstEvalDivByZero,
    ConstEvalUnknownCondition,
    RecursionLimitExceeded,
    DisableTargetNotActive,

    // cycles
    RecursiveDefinition,
}

impl DiagCode {
    /// The severity a diagnostic with this code is reported at.
    #[must_use]
    pub const fn severity(self) -> Severity {
        match self {
            Self::ConstEvalDivByZero | Self::ConstEvalUnknownCondition => {
                Severity::Warning
            }
            _ => Severity::Error,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Warning,
    Error,
}

/// A note attached to a [`Diagnostic`], pointing at a second location.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Related {
    /// The location of the related information.
    pub span: Span,

    /// The message explaining the relation.
    pub message: String,
}

impl Related {
    /// A `previously used here` note.
    #[must_use]
    pub fn previous_usage(span: Span) -> Self {
        Self { span, message: "previously used here".to_owned() }
    }

    /// A `declared here` note.
    #[must_use]
    pub fn declared_here(span: Span) -> Self {
        Self { span, message: "declared here".to_owned() }
    }
}

/// A structured diagnostic collected by the compilation's sink.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Diagnostic {
    /// The stable code of the diagnostic.
    pub code: DiagCode,

    /// The severity of the diagnostic.
    pub severity: Severity,

    /// The primary location the diagnostic points at.
    pub span: Span,

    /// The rendered message.
    pub message: String,

    /// An optional additional hint.
    pub help_message: Option<String>,

    /// Secondary locations with their own messages.
    pub related: Vec<Related>,
}

impl Diagnostic {
    /// Creates a diagnostic with the code's default severity and no notes.
    #[must_use]
    pub fn new(code: DiagCode, span: Span, message: impl Into<String>) -> Self {
        Self {
            code,
            severity: code.severity(),
            span,
            message: message.into(),
            help_message: None,
            related: Vec::new(),
        }
    }

    /// Attaches a related note.
    #[must_use]
    pub fn with_related(mut self, related: Related) -> Self {
        self.related.push(related);
        self
    }

    /// Attaches a help message.
    #[must_use]
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help_message = Some(help.into());
        self
    }
}

/// The diagnostic sink a compilation owns.
///
/// Append-only and insertion-ordered. A compilation is never shared across
/// threads, so plain interior mutability is enough to let any part of the
/// core report while it holds the compilation immutably; nothing here ever
/// aborts, the consumer decides what a collected error means.
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: RefCell<Vec<Diagnostic>>,
}

impl Diagnostics {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Appends a diagnostic.
    pub fn add(&self, diagnostic: Diagnostic) {
        self.entries.borrow_mut().push(diagnostic);
    }

    /// The number of diagnostics collected so far.
    #[must_use]
    pub fn len(&self) -> usize { self.entries.borrow().len() }

    /// Whether nothing has been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.entries.borrow().is_empty() }

    /// Whether any collected diagnostic is an error, as opposed to only
    /// warnings.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.entries
            .borrow()
            .iter()
            .any(|diagnostic| diagnostic.severity == Severity::Error)
    }

    /// Clones out everything collected so far, in insertion order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Diagnostic> { self.entries.borrow().clone() }

    /// Consumes the sink and returns the collection.
    #[must_use]
    pub fn into_vec(self) -> Vec<Diagnostic> { self.entries.into_inner() }
}

#[cfg(test)]
mod tests {
    use velac_base::span::Span;

    use super::{DiagCode, Diagnostic, Diagnostics};

    #[test]
    fn sink_keeps_insertion_order_and_severity() {
        let sink = Diagnostics::new();
        assert!(sink.is_empty());

        sink.add(Diagnostic::new(
            DiagCode::ConstEvalDivByZero,
            Span::new(0, 1),
            "divided by zero",
        ));
        assert!(!sink.has_errors());

        sink.add(Diagnostic::new(
            DiagCode::UndeclaredIdentifier,
            Span::new(2, 3),
            "unknown name",
        ));
        assert!(sink.has_errors());

        let collected = sink.into_vec();
        assert_eq!(collected.len(), 2);
        assert_eq!(collected[0].code, DiagCode::ConstEvalDivByZero);
        assert_eq!(collected[1].code, DiagCode::UndeclaredIdentifier);
    }
}
