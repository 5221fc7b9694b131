//! `Interval` — a magnitude tagged with the domain/echelon pair that gives
//! it musical meaning (§3, §4.2).
//!
//! Two intervals with the same underlying ratio but different domain or
//! echelon are different values: `3/2` (linear, relative) multiplies like a
//! ratio, while `3/2 []` tagged logarithmic would add like a tempered step,
//! and `C4 * 3/2` wouldn't type-check at all (you can't multiply two
//! absolute pitches). Operators live in `sonicweave-core`; this module only
//! carries the tag and formatting hints.

use std::rc::Rc;

use sonicweave_base::Span;
use sonicweave_numeric::Magnitude;

use crate::ast::Expr;

/// Linear (ratio-like) or logarithmic (cents-like) interpretation of the
/// underlying magnitude (§3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
    Linear,
    Logarithmic,
}

/// Relative (interval-like, combines with `*`) or absolute (pitch-like,
/// anchored to a reference frequency, combines with `+`) positioning (§3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Echelon {
    Relative,
    Absolute,
}

/// The syntactic flavor an interval was built from, kept only so it can be
/// echoed back in `str()`/`simplify()` output (§3.3: formatting follows the
/// node that produced a value, not a canonical re-derivation).
#[derive(Debug, Clone)]
pub enum FormattingNode<'a> {
    /// No original syntax to echo; format from the raw magnitude.
    None,
    /// Echo the literal/expression node that produced this value.
    Source(&'a Expr<'a>),
}

/// A musical interval or pitch: a magnitude plus the domain/echelon pair
/// that says how to combine it with others, plus optional display metadata.
#[derive(Debug, Clone)]
pub struct Interval<'a> {
    pub magnitude: Magnitude,
    pub domain: Domain,
    pub echelon: Echelon,
    /// What to print this as, before falling back to the raw magnitude.
    pub node: FormattingNode<'a>,
    /// `hue(x, sat, lightness)` or a bare color name set via `color` (§3.5).
    pub color: Option<Rc<str>>,
    /// A user-assigned label (`label` keyword or string-literal suffix).
    pub label: Option<Rc<str>>,
    /// Tracking ids stamped by `track()`, propagated through broadcasts by
    /// copying every non-scalar operand's ids onto the result (§5, tracking
    /// propagation rule).
    pub tracking_ids: Rc<[u64]>,
}

impl<'a> Interval<'a> {
    /// Builds a bare relative-linear interval with no formatting metadata.
    pub fn bare(magnitude: Magnitude, domain: Domain, echelon: Echelon) -> Self {
        Self {
            magnitude,
            domain,
            echelon,
            node: FormattingNode::None,
            color: None,
            label: None,
            tracking_ids: Rc::from([]),
        }
    }

    /// A value annotated with the syntax node that produced it.
    pub fn with_node(mut self, node: &'a Expr<'a>) -> Self {
        self.node = FormattingNode::Source(node);
        self
    }

    /// Reports whether this interval's magnitude is still exact.
    pub fn is_exact(&self) -> bool {
        self.magnitude.is_exact()
    }

    /// A span to blame this value's formatting on, if any is known.
    pub fn span(&self) -> Option<Span> {
        match self.node {
            FormattingNode::Source(expr) => Some(expr_span(expr)),
            FormattingNode::None => None,
        }
    }
}

fn expr_span(expr: &Expr) -> Span {
    match expr {
        Expr::IntegerLiteral { span, .. }
        | Expr::DecimalLiteral { span, .. }
        | Expr::FractionLiteral { span, .. }
        | Expr::CentsLiteral { span, .. }
        | Expr::MonzoLiteral { span, .. }
        | Expr::NedjiLiteral { span, .. }
        | Expr::RadicalLiteral { span, .. }
        | Expr::FJS { span, .. }
        | Expr::AbsoluteFJS { span, .. }
        | Expr::Pythagorean { span, .. }
        | Expr::MOSLiteral { span, .. }
        | Expr::Identifier { span, .. }
        | Expr::NicheLiteral { span, .. }
        | Expr::BoolLiteral { span, .. }
        | Expr::StringLiteral { span, .. }
        | Expr::ColorLiteral { span, .. }
        | Expr::Unary { span, .. }
        | Expr::Binary { span, .. }
        | Expr::Call { span, .. }
        | Expr::ArrowFunction { span, .. }
        | Expr::Array { span, .. }
        | Expr::Record { span, .. }
        | Expr::Range { span, .. }
        | Expr::HarmonicSegment { span, .. }
        | Expr::EnumeratedChord { span, .. }
        | Expr::Index { span, .. }
        | Expr::Slice { span, .. }
        | Expr::ParentScale { span, .. }
        | Expr::CurrentScale { span, .. }
        | Expr::Comprehension { span, .. }
        | Expr::Conditional { span, .. } => *span,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sonicweave_numeric::{FactorBudget, TimeMonzo, DEFAULT_PRIMES};

    #[test]
    fn bare_interval_has_no_formatting_node() {
        let mut budget = FactorBudget::new(16);
        let m = TimeMonzo::from_fraction(3, 2, DEFAULT_PRIMES, &mut budget);
        let iv = Interval::bare(Magnitude::Exact(m), Domain::Linear, Echelon::Relative);
        assert!(iv.span().is_none());
        assert!(iv.is_exact());
    }
}
