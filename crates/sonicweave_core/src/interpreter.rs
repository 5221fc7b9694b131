//! Tree-walking interpreter for SonicWeave ASTs (§3).
//!
//! Execution never raises Rust panics for user-reachable mistakes; every
//! failure path becomes a [`Signal`] so `try`/`catch`/`finally` and `defer`
//! can observe it. [`Flow`] carries the handful of non-local-exit shapes a
//! statement can produce (`return`, `break`, the generator-style fallthrough
//! used by loop bodies) without needing exceptions for ordinary control
//! flow.

use std::rc::Rc;

use sonicweave_base::{EvalError, Interner, Span, Symbol};
use sonicweave_lang::{
    ArrowBody, AssignOp, AssignOutcome, BinaryOp, Block, Callable, Expr, Param, Pattern, RootContext, Scope, Stmt, Value,
};
use sonicweave_numeric::{rational, FactorBudget, Magnitude, TimeMonzo};

use crate::gas;
use crate::operators;

/// Non-local exit signal carried out of an expression or statement.
pub enum Signal<'a> {
    /// A host- or operator-raised error (`TypeError`, `OutOfGasError`, …).
    Error(EvalError),
    /// A user `throw expr`.
    Throw(Value<'a>),
}

impl<'a> From<EvalError> for Signal<'a> {
    fn from(err: EvalError) -> Self {
        Signal::Error(err)
    }
}

/// What a statement did, once it finished without raising a [`Signal`].
pub enum Flow<'a> {
    /// Fell through to the next statement normally.
    Normal,
    /// `return value;` (or `return;`, which returns `niente`).
    Return(Value<'a>),
    /// `break`, unwinding to the nearest enclosing loop.
    Break,
}

type EvalResult<'a, T> = Result<T, Signal<'a>>;

/// Evaluates a tree built from one [`Interner`] against one [`RootContext`].
pub struct Interpreter<'b> {
    pub interner: &'b Interner,
    pub ctx: &'b RootContext,
    pub basis_primes: &'b [u64],
}

impl<'b> Interpreter<'b> {
    pub fn new(interner: &'b Interner, ctx: &'b RootContext, basis_primes: &'b [u64]) -> Self {
        Self { interner, ctx, basis_primes }
    }

    fn resolve(&self, sym: Symbol) -> &str {
        self.interner.resolve(sym)
    }

    /// Builds an exact relative-linear integer interval.
    pub fn integer<'a>(&self, n: i64) -> Value<'a> {
        let mut budget = FactorBudget::new(64);
        let m = TimeMonzo::from_fraction(n, 1, self.basis_primes, &mut budget);
        Value::Interval(Rc::new(sonicweave_lang::Interval::bare(
            Magnitude::Exact(m),
            sonicweave_lang::Domain::Linear,
            sonicweave_lang::Echelon::Relative,
        )))
    }

    fn integer_value<'a>(&self, value: &Value<'a>, span: Span) -> EvalResult<'a, i64> {
        use num_traits::{One, ToPrimitive};
        match value {
            Value::Interval(iv) => match &iv.magnitude {
                Magnitude::Exact(m) => {
                    let fraction = m
                        .as_fraction(self.basis_primes)
                        .ok_or_else(|| Signal::from(EvalError::type_error("expected an integer").with_span(span)))?;
                    if !fraction.denom().is_one() {
                        return Err(EvalError::type_error("expected an integer").with_span(span).into());
                    }
                    fraction
                        .numer()
                        .to_i64()
                        .ok_or_else(|| Signal::from(EvalError::value_error("integer too large").with_span(span)))
                }
                _ => Err(EvalError::type_error("expected an integer").with_span(span).into()),
            },
            _ => Err(EvalError::type_error("expected an integer").with_span(span).into()),
        }
    }

    /// Executes a whole program, returning the final implicit scale (the
    /// top-level `` ` `` array, §3.4) — the value a host presents as the
    /// constructed scale.
    pub fn evaluate_program<'a>(&self, scope: &Scope<'a>, stmts: &'a [Stmt<'a>]) -> EvalResult<'a, Vec<Value<'a>>> {
        for stmt in stmts {
            match self.execute_stmt(scope, stmt)? {
                Flow::Normal => {}
                Flow::Return(_) | Flow::Break => break,
            }
        }
        Ok(scope.take_implicit())
    }

    fn run_block<'a>(&self, parent: &Scope<'a>, body: Block<'a>) -> EvalResult<'a, Flow<'a>> {
        let child = parent.child();
        let mut outcome: EvalResult<'a, Flow<'a>> = Ok(Flow::Normal);
        for stmt in body {
            match self.execute_stmt(&child, stmt) {
                Ok(Flow::Normal) => continue,
                Ok(other) => {
                    outcome = Ok(other);
                    break;
                }
                Err(sig) => {
                    outcome = Err(sig);
                    break;
                }
            }
        }
        for deferred in child.take_deferred() {
            if let Err(sig) = self.execute_stmt(&child, deferred.body) {
                // A defer's own failure overrides a clean exit but never a
                // `return`/`break`/`throw`/error already in flight.
                if matches!(outcome, Ok(Flow::Normal)) {
                    outcome = Err(sig);
                }
            }
        }
        parent.extend_implicit(child.take_implicit());
        outcome
    }

    fn execute_stmt<'a>(&self, scope: &Scope<'a>, stmt: &'a Stmt<'a>) -> EvalResult<'a, Flow<'a>> {
        match stmt {
            Stmt::ExprStmt { expr, .. } => {
                let value = self.evaluate_expr(scope, *expr)?;
                // Harmonic segments and enumerated chords are scale generators: a
                // bare `4::8` or `4|5|6` spreads its elements directly onto the
                // scale rather than nesting them as one array entry (§9's
                // "generator-like statements" note). Every other array-valued
                // expression (array literals, `sorted()`, ...) pushes as a single
                // value, so intentional sub-scales still nest.
                match (*expr, value) {
                    (Expr::HarmonicSegment { .. } | Expr::EnumeratedChord { .. }, Value::Array(items)) => {
                        scope.extend_implicit(items.as_ref().clone());
                    }
                    // A bare val pushed as a statement tempers the whole
                    // scale built so far in place, rather than joining it
                    // as a new element (§4.3's "implicit tempering").
                    (_, Value::Val(val)) => {
                        let current = scope.take_implicit();
                        let mut retuned = Vec::with_capacity(current.len());
                        for item in current {
                            match item {
                                Value::Interval(iv) => retuned.push(Value::Interval(Rc::new(operators::temper(&iv, &val, self.basis_primes)?))),
                                other => retuned.push(other),
                            }
                        }
                        scope.set_implicit(retuned);
                    }
                    (_, Value::Niente) => {}
                    (_, other) => scope.push_implicit(other),
                }
                Ok(Flow::Normal)
            }

            Stmt::VariableDeclaration { pattern, value, mutable, span } => {
                let v = match *value {
                    Some(e) => self.evaluate_expr(scope, e)?,
                    None => Value::Niente,
                };
                self.bind_pattern(scope, *pattern, v, *mutable, *span)?;
                Ok(Flow::Normal)
            }

            Stmt::Assignment { target, op, value, span } => {
                self.execute_assignment(scope, *target, *op, *value, *span)?;
                Ok(Flow::Normal)
            }

            Stmt::PitchDeclaration { name, value, .. } => {
                let v = self.evaluate_expr(scope, *value)?;
                scope.declare(*name, v, true);
                Ok(Flow::Normal)
            }

            Stmt::Block { body, .. } => self.run_block(scope, *body),

            Stmt::If { condition, then_branch, else_branch, .. } => {
                let cond = self.evaluate_expr(scope, *condition)?;
                if cond.is_truthy() {
                    self.run_block(scope, *then_branch)
                } else if let Some(else_b) = *else_branch {
                    self.run_block(scope, else_b)
                } else {
                    Ok(Flow::Normal)
                }
            }

            Stmt::While { condition, body, else_branch, .. } => {
                let mut iterated = false;
                loop {
                    gas::loop_iteration(self.ctx)?;
                    let cond = self.evaluate_expr(scope, *condition)?;
                    if !cond.is_truthy() {
                        break;
                    }
                    iterated = true;
                    match self.run_block(scope, *body)? {
                        Flow::Break => return Ok(Flow::Normal),
                        Flow::Return(v) => return Ok(Flow::Return(v)),
                        Flow::Normal => {}
                    }
                }
                if !iterated {
                    if let Some(else_b) = *else_branch {
                        return self.run_block(scope, else_b);
                    }
                }
                Ok(Flow::Normal)
            }

            Stmt::ForOf { binding, iterable, body, else_branch, .. } => {
                let iter_value = self.evaluate_expr(scope, *iterable)?;
                let items = self.iterate_values(&iter_value, Span::default())?;
                if items.is_empty() {
                    if let Some(else_b) = *else_branch {
                        return self.run_block(scope, else_b);
                    }
                    return Ok(Flow::Normal);
                }
                for item in items {
                    gas::loop_iteration(self.ctx)?;
                    let child = scope.child();
                    child.declare(*binding, item, false);
                    match self.run_block(&child, *body)? {
                        Flow::Break => return Ok(Flow::Normal),
                        Flow::Return(v) => return Ok(Flow::Return(v)),
                        Flow::Normal => {}
                    }
                }
                Ok(Flow::Normal)
            }

            Stmt::ForIn { binding, iterable, body, else_branch, .. } => {
                let iter_value = self.evaluate_expr(scope, *iterable)?;
                let keys = self.iterate_keys(&iter_value, Span::default())?;
                if keys.is_empty() {
                    if let Some(else_b) = *else_branch {
                        return self.run_block(scope, else_b);
                    }
                    return Ok(Flow::Normal);
                }
                for key in keys {
                    gas::loop_iteration(self.ctx)?;
                    let child = scope.child();
                    child.declare(*binding, key, false);
                    match self.run_block(&child, *body)? {
                        Flow::Break => return Ok(Flow::Normal),
                        Flow::Return(v) => return Ok(Flow::Return(v)),
                        Flow::Normal => {}
                    }
                }
                Ok(Flow::Normal)
            }

            Stmt::Return { value, .. } => {
                let v = match *value {
                    Some(e) => self.evaluate_expr(scope, e)?,
                    None => Value::Niente,
                };
                Ok(Flow::Return(v))
            }

            Stmt::Throw { value, .. } => {
                let v = self.evaluate_expr(scope, *value)?;
                Err(Signal::Throw(v))
            }

            Stmt::Try { body, catch_binding, catch_body, finally_body, .. } => {
                let result = match self.run_block(scope, *body) {
                    Err(Signal::Throw(payload)) => self.run_catch(scope, catch_binding, catch_body, payload),
                    Err(Signal::Error(err)) if err.is_catchable() => {
                        self.run_catch(scope, catch_binding, catch_body, Value::String(Rc::from(err.message.as_str())))
                    }
                    other => other,
                };
                if let Some(finally_b) = *finally_body {
                    match self.run_block(scope, finally_b)? {
                        Flow::Normal => result,
                        other_flow => Ok(other_flow),
                    }
                } else {
                    result
                }
            }

            Stmt::Defer { body, .. } => {
                scope.defer(*body);
                Ok(Flow::Normal)
            }

            Stmt::FunctionDeclaration { name, params, rest, body, .. } => {
                let callable = Callable::Riff { name: *name, params: *params, rest: *rest, body: *body, closure: scope.clone() };
                scope.declare(*name, Value::Function(Rc::new(callable)), false);
                Ok(Flow::Normal)
            }
        }
    }

    fn run_catch<'a>(
        &self,
        scope: &Scope<'a>,
        catch_binding: &Option<Symbol>,
        catch_body: &Option<Block<'a>>,
        payload: Value<'a>,
    ) -> EvalResult<'a, Flow<'a>> {
        match catch_body {
            Some(body) => {
                let child = scope.child();
                if let Some(name) = catch_binding {
                    child.declare(*name, payload, false);
                }
                self.run_block(&child, *body)
            }
            None => Ok(Flow::Normal),
        }
    }

    fn iterate_values<'a>(&self, value: &Value<'a>, span: Span) -> EvalResult<'a, Vec<Value<'a>>> {
        match value {
            Value::Array(a) => Ok(a.as_ref().clone()),
            Value::Record(r) => Ok(r.iter().map(|(_, v)| v.clone()).collect()),
            Value::String(s) => Ok(s.chars().map(|c| Value::String(Rc::from(c.to_string()))).collect()),
            other => Err(EvalError::type_error(format!("cannot iterate over {}", other.type_name())).with_span(span).into()),
        }
    }

    fn iterate_keys<'a>(&self, value: &Value<'a>, span: Span) -> EvalResult<'a, Vec<Value<'a>>> {
        match value {
            Value::Record(r) => Ok(r.iter().map(|(k, _)| Value::String(k.clone())).collect()),
            Value::Array(a) => Ok((0..a.len()).map(|i| self.integer(i as i64)).collect()),
            other => Err(EvalError::type_error(format!("cannot iterate keys over {}", other.type_name())).with_span(span).into()),
        }
    }

    fn bind_pattern<'a>(
        &self,
        scope: &Scope<'a>,
        pattern: &'a Pattern<'a>,
        value: Value<'a>,
        mutable: bool,
        span: Span,
    ) -> EvalResult<'a, ()> {
        match pattern {
            Pattern::Name(name) => {
                scope.declare(*name, value, mutable);
                Ok(())
            }
            Pattern::Array { elements, rest } => {
                let items = self.iterate_values(&value, span)?;
                for (i, p) in elements.iter().enumerate() {
                    let v = items.get(i).cloned().unwrap_or(Value::Niente);
                    self.bind_pattern(scope, p, v, mutable, span)?;
                }
                if let Some(rest_name) = rest {
                    let remaining: Vec<_> = items.into_iter().skip(elements.len()).collect();
                    scope.declare(*rest_name, Value::Array(Rc::new(remaining)), mutable);
                }
                Ok(())
            }
            Pattern::Record { fields, rest } => {
                for (key, p) in fields.iter() {
                    let v = value.record_get(self.resolve(*key)).unwrap_or(Value::Niente);
                    self.bind_pattern(scope, p, v, mutable, span)?;
                }
                if let Some(rest_name) = rest {
                    if let Value::Record(r) = &value {
                        let used: Vec<&str> = fields.iter().map(|(k, _)| self.resolve(*k)).collect();
                        let remaining: Vec<_> = r.iter().filter(|(k, _)| !used.contains(&k.as_ref())).cloned().collect();
                        scope.declare(*rest_name, Value::Record(Rc::new(remaining)), mutable);
                    }
                }
                Ok(())
            }
        }
    }

    fn execute_assignment<'a>(
        &self,
        scope: &Scope<'a>,
        target: &'a Expr<'a>,
        op: AssignOp,
        value_expr: &'a Expr<'a>,
        span: Span,
    ) -> EvalResult<'a, ()> {
        match target {
            Expr::Identifier { name, .. } => {
                let new_value = self.compute_assigned_value(scope, *name, op, value_expr, span)?;
                match scope.assign(*name, new_value) {
                    AssignOutcome::Assigned => Ok(()),
                    AssignOutcome::Unbound => {
                        Err(EvalError::name_error(format!("'{}' is not defined", self.resolve(*name))).with_span(span).into())
                    }
                    AssignOutcome::Immutable => {
                        Err(EvalError::type_error(format!("'{}' is declared const", self.resolve(*name))).with_span(span).into())
                    }
                }
            }
            Expr::Index { target: base, index, .. } => {
                let Expr::Identifier { name, .. } = *base else {
                    return Err(EvalError::value_error("indexed assignment target must be a plain variable").with_span(span).into());
                };
                let current = scope
                    .get(*name)
                    .ok_or_else(|| Signal::from(EvalError::name_error(format!("'{}' is not defined", self.resolve(*name))).with_span(span)))?;
                let Value::Array(arr) = &current else {
                    return Err(EvalError::type_error("can only index-assign into an array").with_span(span).into());
                };
                let idx_value = self.evaluate_expr(scope, *index)?;
                let idx = normalize_index(self.integer_value(&idx_value, span)?, arr.len(), span)?;
                let new_elem = match op {
                    AssignOp::Assign => self.evaluate_expr(scope, value_expr)?,
                    AssignOp::NullishAssign => {
                        if matches!(arr[idx], Value::Niente) {
                            self.evaluate_expr(scope, value_expr)?
                        } else {
                            arr[idx].clone()
                        }
                    }
                    _ => {
                        let rhs = self.evaluate_expr(scope, value_expr)?;
                        operators::apply_binary(assign_op_to_binary(op), arr[idx].clone(), rhs, self.ctx, self.basis_primes, span)?
                    }
                };
                let mut updated = arr.as_ref().clone();
                updated[idx] = new_elem;
                scope.assign(*name, Value::Array(Rc::new(updated)));
                Ok(())
            }
            _ => Err(EvalError::value_error("unsupported assignment target").with_span(span).into()),
        }
    }

    fn compute_assigned_value<'a>(
        &self,
        scope: &Scope<'a>,
        name: Symbol,
        op: AssignOp,
        value_expr: &'a Expr<'a>,
        span: Span,
    ) -> EvalResult<'a, Value<'a>> {
        let rhs = self.evaluate_expr(scope, value_expr)?;
        if op == AssignOp::Assign {
            return Ok(rhs);
        }
        let current = scope
            .get(name)
            .ok_or_else(|| Signal::from(EvalError::name_error(format!("'{}' is not defined", self.resolve(name))).with_span(span)))?;
        if op == AssignOp::NullishAssign {
            return Ok(if matches!(current, Value::Niente) { rhs } else { current });
        }
        Ok(operators::apply_binary(assign_op_to_binary(op), current, rhs, self.ctx, self.basis_primes, span)?)
    }

    fn evaluate_expr<'a>(&self, scope: &Scope<'a>, expr: &'a Expr<'a>) -> EvalResult<'a, Value<'a>> {
        match expr {
            Expr::IntegerLiteral { value, .. } => Ok(self.integer(*value)),
            Expr::DecimalLiteral { value, .. } => Ok(Value::Interval(Rc::new(sonicweave_lang::Interval::bare(
                Magnitude::Real(sonicweave_numeric::TimeReal::relative(*value)),
                sonicweave_lang::Domain::Linear,
                sonicweave_lang::Echelon::Relative,
            )))),
            Expr::FractionLiteral { numer, denom, .. } => {
                let mut budget = FactorBudget::new(64);
                let m = TimeMonzo::from_fraction(*numer, *denom, self.basis_primes, &mut budget);
                Ok(Value::Interval(Rc::new(sonicweave_lang::Interval::bare(
                    Magnitude::Exact(m),
                    sonicweave_lang::Domain::Linear,
                    sonicweave_lang::Echelon::Relative,
                ))))
            }
            Expr::CentsLiteral { value, .. } => Ok(Value::Interval(Rc::new(sonicweave_lang::Interval::bare(
                Magnitude::Real(sonicweave_numeric::TimeReal::relative(2f64.powf(*value / 1200.0))),
                sonicweave_lang::Domain::Logarithmic,
                sonicweave_lang::Echelon::Relative,
            )))),
            Expr::MonzoLiteral { exponents, span } => {
                let num_components = self.ctx.config.num_components.max(exponents.len());
                let mut prime_exponents = vec![rational::int(0); num_components];
                for (i, e) in exponents.iter().enumerate() {
                    let value = self.evaluate_expr(scope, e)?;
                    let n = self.integer_value(&value, *span)?;
                    prime_exponents[i] = rational::int(n);
                }
                let m = TimeMonzo { time_exponent: rational::int(0), prime_exponents, residual: rational::int(1) };
                Ok(Value::Interval(Rc::new(sonicweave_lang::Interval::bare(
                    Magnitude::Exact(m),
                    sonicweave_lang::Domain::Linear,
                    sonicweave_lang::Echelon::Relative,
                ))))
            }
            Expr::NedjiLiteral { numer, divisions, equave, span } => {
                let equave_monzo = match *equave {
                    Some(e) => {
                        let v = self.evaluate_expr(scope, e)?;
                        match v {
                            Value::Interval(iv) => match &iv.magnitude {
                                Magnitude::Exact(m) => m.clone(),
                                Magnitude::Real(_) => {
                                    return Err(EvalError::domain_error("NEDJI equave must be exact").with_span(*span).into())
                                }
                            },
                            _ => return Err(EvalError::type_error("NEDJI equave must be an interval").with_span(*span).into()),
                        }
                    }
                    None => {
                        let mut budget = FactorBudget::new(16);
                        TimeMonzo::from_fraction(2, 1, self.basis_primes, &mut budget)
                    }
                };
                let exponent = rational::ratio(*numer, *divisions);
                let mut budget = FactorBudget::new(256);
                let magnitude = match equave_monzo.pow(&exponent, self.basis_primes, &mut budget) {
                    Ok(m) => Magnitude::Exact(m),
                    Err(_) => Magnitude::Real(Magnitude::Exact(equave_monzo).as_real(self.basis_primes).pow(rational::to_f64(&exponent))),
                };
                Ok(Value::Interval(Rc::new(sonicweave_lang::Interval::bare(
                    magnitude,
                    sonicweave_lang::Domain::Linear,
                    sonicweave_lang::Echelon::Relative,
                ))))
            }
            Expr::RadicalLiteral { radicand, index, span } => {
                let v = self.evaluate_expr(scope, *radicand)?;
                let Value::Interval(iv) = v else {
                    return Err(EvalError::type_error("radical operand must be an interval").with_span(*span).into());
                };
                let exponent = rational::ratio(1, *index);
                let mut budget = FactorBudget::new(256);
                let magnitude = iv.magnitude.pow(&exponent, self.basis_primes, &mut budget);
                Ok(Value::Interval(Rc::new(sonicweave_lang::Interval {
                    magnitude,
                    domain: iv.domain,
                    echelon: iv.echelon,
                    node: sonicweave_lang::FormattingNode::None,
                    color: iv.color.clone(),
                    label: None,
                    tracking_ids: iv.tracking_ids.clone(),
                })))
            }
            Expr::Pythagorean { quality, degree, span } => self.pythagorean(*quality, *degree, *span),
            Expr::FJS { pythagorean, superscripts, subscripts, span } => {
                let base = self.evaluate_expr(scope, *pythagorean)?;
                self.apply_fjs_commas(base, superscripts, subscripts, *span)
            }
            Expr::AbsoluteFJS { note, octave, superscripts, subscripts, span } => {
                let base = self.absolute_pitch(*note, *octave, *span)?;
                self.apply_fjs_commas(base, superscripts, subscripts, *span)
            }
            Expr::MOSLiteral { large_count, small_count, degree, .. } => {
                let total = (*large_count + *small_count).max(1) as f64;
                let equave_cents = self.ctx.config.mos_config.as_ref().map(|m| m.equave_cents).unwrap_or(1200.0);
                let cents = equave_cents * (*degree as f64) / total;
                Ok(Value::Interval(Rc::new(sonicweave_lang::Interval::bare(
                    Magnitude::Real(sonicweave_numeric::TimeReal::relative(2f64.powf(cents / 1200.0))),
                    sonicweave_lang::Domain::Logarithmic,
                    sonicweave_lang::Echelon::Relative,
                ))))
            }

            Expr::Identifier { name, span } => scope
                .get(*name)
                .ok_or_else(|| Signal::from(EvalError::name_error(format!("'{}' is not defined", self.resolve(*name))).with_span(*span))),
            Expr::NicheLiteral { .. } => Ok(Value::Niente),
            Expr::BoolLiteral { value, .. } => Ok(Value::Bool(*value)),
            Expr::StringLiteral { value, .. } => Ok(Value::String(Rc::from(*value))),
            Expr::ColorLiteral { value, .. } => Ok(Value::Color(Rc::from(*value))),

            Expr::Unary { op, operand, span } => {
                let v = self.evaluate_expr(scope, *operand)?;
                Ok(operators::apply_unary(*op, v, self.basis_primes, *span)?)
            }
            Expr::Binary { op: BinaryOp::Temper, left, right, span } => {
                let l = self.evaluate_expr(scope, *left)?;
                let r = self.evaluate_expr(scope, *right)?;
                let (Value::Interval(iv), Value::Val(val)) = (&l, &r) else {
                    return Err(EvalError::type_error("tempering requires an interval and a val").with_span(*span).into());
                };
                Ok(Value::Interval(Rc::new(operators::temper(iv, val, self.basis_primes)?)))
            }
            Expr::Binary { op, left, right, span } => {
                let l = self.evaluate_expr(scope, *left)?;
                let r = self.evaluate_expr(scope, *right)?;
                Ok(operators::apply_binary(*op, l, r, self.ctx, self.basis_primes, *span)?)
            }

            Expr::Call { callee, args, span } => {
                let callee_value = self.evaluate_expr(scope, *callee)?;
                let mut arg_values = Vec::with_capacity(args.len());
                for a in args.iter() {
                    arg_values.push(self.evaluate_expr(scope, a)?);
                }
                self.call_function(&callee_value, arg_values, *span)
            }
            Expr::ArrowFunction { params, rest, body, .. } => {
                Ok(Value::Function(Rc::new(Callable::Arrow { params: *params, rest: *rest, body: body.clone(), closure: scope.clone() })))
            }

            Expr::Array { elements, .. } => {
                let mut out = Vec::with_capacity(elements.len());
                for e in elements.iter() {
                    out.push(self.evaluate_expr(scope, e)?);
                }
                Ok(Value::Array(Rc::new(out)))
            }
            Expr::Record { fields, .. } => {
                let mut out = Vec::with_capacity(fields.len());
                for (key, e) in fields.iter() {
                    out.push((Rc::from(self.resolve(*key)), self.evaluate_expr(scope, e)?));
                }
                Ok(Value::Record(Rc::new(out)))
            }

            Expr::Range { start, end, step, inclusive, span } => {
                let s = self.integer_value(&self.evaluate_expr(scope, *start)?, *span)?;
                let e = self.integer_value(&self.evaluate_expr(scope, *end)?, *span)?;
                let step_n = match *step {
                    Some(expr) => self.integer_value(&self.evaluate_expr(scope, expr)?, *span)?,
                    None => 1,
                };
                if step_n == 0 {
                    return Err(EvalError::value_error("range step cannot be zero").with_span(*span).into());
                }
                let mut out = Vec::new();
                let mut n = s;
                loop {
                    let done = if step_n > 0 {
                        if *inclusive { n > e } else { n >= e }
                    } else if *inclusive {
                        n < e
                    } else {
                        n <= e
                    };
                    if done {
                        break;
                    }
                    gas::segment_step(self.ctx)?;
                    out.push(self.integer(n));
                    n += step_n;
                }
                Ok(Value::Array(Rc::new(out)))
            }

            Expr::HarmonicSegment { start, end, span } => {
                let a = self.integer_value(&self.evaluate_expr(scope, *start)?, *span)?;
                let b = self.integer_value(&self.evaluate_expr(scope, *end)?, *span)?;
                if a <= 0 {
                    return Err(EvalError::value_error("harmonic segment start must be positive").with_span(*span).into());
                }
                let mut out = Vec::new();
                for n in (a + 1)..=b {
                    gas::segment_step(self.ctx)?;
                    let mut budget = FactorBudget::new(64);
                    let m = TimeMonzo::from_fraction(n, a, self.basis_primes, &mut budget);
                    out.push(Value::Interval(Rc::new(sonicweave_lang::Interval::bare(
                        Magnitude::Exact(m),
                        sonicweave_lang::Domain::Linear,
                        sonicweave_lang::Echelon::Relative,
                    ))));
                }
                Ok(Value::Array(Rc::new(out)))
            }

            Expr::EnumeratedChord { notes, span } => {
                let mut values = Vec::with_capacity(notes.len());
                for n in notes.iter() {
                    values.push(self.evaluate_expr(scope, n)?);
                }
                let Some(first) = values.first().cloned() else {
                    return Ok(Value::Array(Rc::new(Vec::new())));
                };
                let mut out = Vec::with_capacity(values.len().saturating_sub(1));
                for v in values.into_iter().skip(1) {
                    out.push(operators::apply_binary(BinaryOp::Div, v, first.clone(), self.ctx, self.basis_primes, *span)?);
                }
                Ok(Value::Array(Rc::new(out)))
            }

            Expr::Index { target, index, span } => {
                let t = self.evaluate_expr(scope, *target)?;
                let i = self.evaluate_expr(scope, *index)?;
                match &t {
                    Value::Array(arr) => {
                        let idx = normalize_index(self.integer_value(&i, *span)?, arr.len(), *span)?;
                        Ok(arr[idx].clone())
                    }
                    Value::Record(_) => {
                        let Value::String(key) = &i else {
                            return Err(EvalError::type_error("record index must be a string").with_span(*span).into());
                        };
                        t.record_get(key).ok_or_else(|| Signal::from(EvalError::index_error(format!("no key '{key}'")).with_span(*span)))
                    }
                    other => Err(EvalError::type_error(format!("cannot index {}", other.type_name())).with_span(*span).into()),
                }
            }

            Expr::Slice { target, start, end, span } => {
                let t = self.evaluate_expr(scope, *target)?;
                let Value::Array(arr) = &t else {
                    return Err(EvalError::type_error("can only slice an array").with_span(*span).into());
                };
                let s = match *start {
                    Some(e) => self.integer_value(&self.evaluate_expr(scope, e)?, *span)?.max(0) as usize,
                    None => 0,
                };
                let e = match *end {
                    Some(e) => (self.integer_value(&self.evaluate_expr(scope, e)?, *span)? as usize).min(arr.len()),
                    None => arr.len(),
                };
                if s > e {
                    return Ok(Value::Array(Rc::new(Vec::new())));
                }
                Ok(Value::Array(Rc::new(arr[s..e].to_vec())))
            }

            Expr::ParentScale { depth, .. } => Ok(Value::Array(Rc::new(scope.parent_scale(*depth)))),
            Expr::CurrentScale { .. } => Ok(Value::Array(Rc::new(scope.current_scale()))),

            Expr::Comprehension { binding, iterable, filter, result, span } => {
                let iter_value = self.evaluate_expr(scope, *iterable)?;
                let items = self.iterate_values(&iter_value, *span)?;
                let mut out = Vec::new();
                for item in items {
                    gas::loop_iteration(self.ctx)?;
                    let child = scope.child();
                    child.declare(*binding, item, false);
                    if let Some(f) = *filter {
                        if !self.evaluate_expr(&child, f)?.is_truthy() {
                            continue;
                        }
                    }
                    out.push(self.evaluate_expr(&child, *result)?);
                }
                Ok(Value::Array(Rc::new(out)))
            }

            Expr::Conditional { condition, then_expr, else_expr, .. } => {
                if self.evaluate_expr(scope, *condition)?.is_truthy() {
                    self.evaluate_expr(scope, *then_expr)
                } else {
                    self.evaluate_expr(scope, *else_expr)
                }
            }
        }
    }

    fn pythagorean<'a>(&self, quality: Symbol, degree: i64, span: Span) -> EvalResult<'a, Value<'a>> {
        let (numer, denom) = pythagorean_ratio(self.resolve(quality), degree)
            .ok_or_else(|| Signal::from(EvalError::value_error(format!("unrecognized Pythagorean interval {} {degree}", self.resolve(quality))).with_span(span)))?;
        let mut budget = FactorBudget::new(64);
        let m = TimeMonzo::from_fraction(numer, denom, self.basis_primes, &mut budget);
        Ok(Value::Interval(Rc::new(sonicweave_lang::Interval::bare(
            Magnitude::Exact(m),
            sonicweave_lang::Domain::Linear,
            sonicweave_lang::Echelon::Relative,
        ))))
    }

    fn absolute_pitch<'a>(&self, note: Symbol, octave: i64, span: Span) -> EvalResult<'a, Value<'a>> {
        let name = self.resolve(note);
        let fifths = note_fifths(name).ok_or_else(|| Signal::from(EvalError::value_error(format!("unrecognized note name '{name}'")).with_span(span)))?;
        let octave_shift = 2f64.powi((octave - 4) as i32);
        let value = self.ctx.config.c4_hz * fifths_to_octave_reduced_ratio(fifths) * octave_shift;
        Ok(Value::Interval(Rc::new(sonicweave_lang::Interval::bare(
            Magnitude::Real(sonicweave_numeric::TimeReal { time_exponent: -1.0, value }),
            sonicweave_lang::Domain::Linear,
            sonicweave_lang::Echelon::Absolute,
        ))))
    }

    fn apply_fjs_commas<'a>(&self, base: Value<'a>, superscripts: &'a [i64], subscripts: &'a [i64], span: Span) -> EvalResult<'a, Value<'a>> {
        let Value::Interval(iv) = base else {
            return Err(EvalError::type_error("FJS inflection requires an interval").with_span(span).into());
        };
        let mut magnitude = iv.magnitude.clone();
        for &p in superscripts {
            let (n, d) = fjs_comma_for_prime(p);
            magnitude = magnitude.mul(&scalar_ratio(n, d, self.basis_primes), self.basis_primes);
        }
        for &p in subscripts {
            let (n, d) = fjs_comma_for_prime(p);
            magnitude = magnitude.div(&scalar_ratio(n, d, self.basis_primes), self.basis_primes);
        }
        Ok(Value::Interval(Rc::new(sonicweave_lang::Interval {
            magnitude,
            domain: iv.domain,
            echelon: iv.echelon,
            node: sonicweave_lang::FormattingNode::None,
            color: iv.color.clone(),
            label: None,
            tracking_ids: iv.tracking_ids.clone(),
        })))
    }

    fn call_function<'a>(&self, func: &Value<'a>, args: Vec<Value<'a>>, span: Span) -> EvalResult<'a, Value<'a>> {
        let Value::Function(callable) = func else {
            return Err(EvalError::type_error(format!("{} is not callable", func.type_name())).with_span(span).into());
        };
        gas::call(self.ctx)?;
        match callable.as_ref() {
            Callable::Native { func, arity, name } => {
                if !arity.contains(args.len()) {
                    return Err(EvalError::arity_error(format!("{name} expects {} arguments, got {}", arity.min, args.len())).with_span(span).into());
                }
                Ok(func(&args)?)
            }
            Callable::Riff { params, rest, body, closure, .. } => {
                let call_scope = closure.child();
                self.bind_params(&call_scope, params, *rest, &args, span)?;
                match self.run_block(&call_scope, body)? {
                    Flow::Return(v) => Ok(v),
                    Flow::Normal | Flow::Break => Ok(spread_or_niente(call_scope.take_implicit())),
                }
            }
            Callable::Arrow { params, rest, body, closure } => {
                let call_scope = closure.child();
                self.bind_params(&call_scope, params, *rest, &args, span)?;
                match body {
                    ArrowBody::Expr(e) => self.evaluate_expr(&call_scope, e),
                    ArrowBody::Block(block) => match self.run_block(&call_scope, block)? {
                        Flow::Return(v) => Ok(v),
                        Flow::Normal | Flow::Break => Ok(spread_or_niente(call_scope.take_implicit())),
                    },
                }
            }
        }
    }

    fn bind_params<'a>(&self, call_scope: &Scope<'a>, params: &'a [Param<'a>], rest: Option<Symbol>, args: &[Value<'a>], span: Span) -> EvalResult<'a, ()> {
        for (i, param) in params.iter().enumerate() {
            let value = match args.get(i) {
                Some(v) => v.clone(),
                None => match param.default {
                    Some(default_expr) => self.evaluate_expr(call_scope, default_expr)?,
                    None => return Err(EvalError::arity_error(format!("missing required argument {}", i + 1)).with_span(span).into()),
                },
            };
            self.bind_pattern(call_scope, param.pattern, value, true, span)?;
        }
        if let Some(rest_name) = rest {
            let remaining: Vec<_> = args.iter().skip(params.len()).cloned().collect();
            call_scope.declare(rest_name, Value::Array(Rc::new(remaining)), false);
        } else if args.len() > params.len() {
            return Err(EvalError::arity_error(format!("expected at most {} arguments, got {}", params.len(), args.len())).with_span(span).into());
        }
        Ok(())
    }
}

fn spread_or_niente<'a>(mut produced: Vec<Value<'a>>) -> Value<'a> {
    match produced.len() {
        0 => Value::Niente,
        1 => produced.pop().unwrap(),
        _ => Value::Array(Rc::new(produced)),
    }
}

fn normalize_index<'a>(idx: i64, len: usize, span: Span) -> EvalResult<'a, usize> {
    let resolved = if idx < 0 { idx + len as i64 } else { idx };
    if resolved < 0 || resolved as usize >= len {
        return Err(EvalError::index_error(format!("index {idx} out of bounds for length {len}")).with_span(span).into());
    }
    Ok(resolved as usize)
}

fn assign_op_to_binary(op: AssignOp) -> BinaryOp {
    match op {
        AssignOp::Add => BinaryOp::Add,
        AssignOp::Sub => BinaryOp::Sub,
        AssignOp::Mul => BinaryOp::Mul,
        AssignOp::Div => BinaryOp::Div,
        AssignOp::Mod => BinaryOp::Mod,
        AssignOp::Pow => BinaryOp::Pow,
        AssignOp::TildeAdd => BinaryOp::TildeAdd,
        AssignOp::TildeSub => BinaryOp::TildeSub,
        AssignOp::TildeMul => BinaryOp::TildeMul,
        AssignOp::TildeDiv => BinaryOp::TildeDiv,
        AssignOp::Assign | AssignOp::NullishAssign => unreachable!("handled before reaching operator dispatch"),
    }
}

fn scalar_ratio(numer: i64, denom: i64, basis_primes: &[u64]) -> Magnitude {
    let mut budget = FactorBudget::new(16);
    Magnitude::Exact(TimeMonzo::from_fraction(numer, denom, basis_primes, &mut budget))
}

/// Helmholtz-Ellis-style FJS commas for the primes this implementation
/// spells explicitly; primes without a named comma pass through unaltered.
fn fjs_comma_for_prime(p: i64) -> (i64, i64) {
    match p {
        5 => (81, 80),
        7 => (64, 63),
        11 => (33, 32),
        13 => (27, 26),
        _ => (1, 1),
    }
}

/// The twelve basic Pythagorean interval ratios, reduced to one octave.
fn pythagorean_ratio(quality: &str, degree: i64) -> Option<(i64, i64)> {
    let degree = ((degree - 1).rem_euclid(7)) + 1;
    Some(match (quality, degree) {
        ("P", 1) => (1, 1),
        ("m", 2) => (256, 243),
        ("M", 2) => (9, 8),
        ("m", 3) => (32, 27),
        ("M", 3) => (81, 64),
        ("P", 4) => (4, 3),
        ("A", 4) | ("d", 5) => (729, 512),
        ("P", 5) => (3, 2),
        ("m", 6) => (128, 81),
        ("M", 6) => (27, 16),
        ("m", 7) => (16, 9),
        ("M", 7) => (243, 128),
        _ => return None,
    })
}

/// Fifths-from-C for the seven diatonic note letters.
fn note_fifths(name: &str) -> Option<i32> {
    Some(match name {
        "F" => -1,
        "C" => 0,
        "G" => 1,
        "D" => 2,
        "A" => 3,
        "E" => 4,
        "B" => 5,
        _ => return None,
    })
}

fn fifths_to_octave_reduced_ratio(fifths: i32) -> f64 {
    let mut ratio = 3f64.powi(fifths) / 2f64.powi(fifths);
    while ratio >= 2.0 {
        ratio /= 2.0;
    }
    while ratio < 1.0 {
        ratio *= 2.0;
    }
    ratio
}
