//! First-pass semantic analysis: scoped symbol tables, duplicate
//! detection, and name resolution. Type inference, trait resolution, and
//! borrow checking are explicitly deferred.

use std::collections::HashMap;

use crate::diagnostics::{self, Diagnostic};
use crate::lexer::token::SourceLocation;
use crate::parser::ast::{
    Expr, ExprKind, Item, ItemKind, MatchArm, Module, Pattern, PatternKind, Stmt, Type,
};

#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub ty: Option<Type>,
    pub mutable: bool,
    pub initialized: bool,
    pub location: SourceLocation,
}

#[derive(Debug, Default)]
struct Scope {
    symbols: HashMap<String, Symbol>,
}

pub struct SemanticAnalyzer {
    scopes: Vec<Scope>,
    loop_depth: usize,
    diagnostics: Vec<Diagnostic>,
}

impl SemanticAnalyzer {
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::default()],
            loop_depth: 0,
            diagnostics: Vec::new(),
        }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    pub fn has_errors(&self) -> bool {
        diagnostics::has_errors(&self.diagnostics)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| !d.is_error())
    }

    /// Number of live scopes; used to verify push/pop discipline.
    pub fn scope_depth(&self) -> usize {
        self.scopes.len()
    }

    /// Analyze a module: pass 1 collects the top-level items into the
    /// module scope, pass 2 walks each item body.
    pub fn analyze(&mut self, module: &Module) -> bool {
        for item in &module.items {
            self.collect_item(item);
        }

        for item in &module.items {
            self.analyze_item(item);
        }

        !self.has_errors()
    }

    fn collect_item(&mut self, item: &Item) {
        match &item.kind {
            ItemKind::Function(_) | ItemKind::Struct { .. } | ItemKind::Enum { .. } => {
                let symbol = Symbol {
                    name: item.name.clone(),
                    ty: None,
                    mutable: false,
                    initialized: true,
                    location: item.location,
                };
                if !self.define(symbol) {
                    self.error(
                        item.location,
                        format!("redefinition of '{}'", item.name),
                    );
                }
            }
            // Declarations inside an extern block are module-scope names.
            ItemKind::Extern { items } => {
                for inner in items {
                    self.collect_item(inner);
                }
            }
            _ => {}
        }
    }

    fn analyze_item(&mut self, item: &Item) {
        match &item.kind {
            ItemKind::Function(function) => {
                self.push_scope();

                for param in &function.params {
                    match param.pattern.binding_name() {
                        Some(name) => {
                            let symbol = Symbol {
                                name: name.to_string(),
                                ty: Some(param.ty.clone()),
                                mutable: param.pattern.is_mutable(),
                                initialized: true,
                                location: param.location,
                            };
                            if !self.define(symbol) {
                                self.error(
                                    param.location,
                                    format!("redefinition of parameter '{name}'"),
                                );
                            }
                        }
                        None => {
                            if !matches!(param.pattern.kind, PatternKind::Wildcard) {
                                self.error(
                                    param.location,
                                    "parameter pattern must bind a name".to_string(),
                                );
                            }
                        }
                    }
                }

                if let Some(body) = &function.body {
                    self.analyze_expr(body);
                }

                self.pop_scope();
            }
            ItemKind::Struct { fields } => {
                for (i, field) in fields.iter().enumerate() {
                    if fields[..i].iter().any(|f| f.name == field.name) {
                        self.error(
                            field.location,
                            format!("duplicate field '{}'", field.name),
                        );
                    }
                }
            }
            ItemKind::Enum { variants } => {
                for (i, variant) in variants.iter().enumerate() {
                    if variants[..i].iter().any(|v| v.name == variant.name) {
                        self.error(
                            variant.location,
                            format!("duplicate variant '{}'", variant.name),
                        );
                    }
                }
            }
            ItemKind::Impl { items, .. }
            | ItemKind::Trait { items }
            | ItemKind::Module { items, .. }
            | ItemKind::Extern { items } => {
                for inner in items {
                    self.analyze_item(inner);
                }
            }
            ItemKind::TypeAlias { .. } | ItemKind::Import { .. } => {}
        }
    }

    fn analyze_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Let {
                pattern,
                ty,
                initializer,
                location,
            } => {
                if let Some(init) = initializer {
                    self.analyze_expr(init);
                }

                match &pattern.kind {
                    PatternKind::Identifier { name, mutable } => {
                        if name.is_empty() {
                            self.error(*location, "let binding has an empty name".to_string());
                            return;
                        }
                        let symbol = Symbol {
                            name: name.clone(),
                            ty: ty.clone(),
                            mutable: *mutable,
                            initialized: initializer.is_some(),
                            location: *location,
                        };
                        if !self.define(symbol) {
                            self.error(*location, format!("redefinition of '{name}'"));
                        }
                    }
                    PatternKind::Wildcard => {}
                    _ => {
                        // Destructuring lets are parsed but unsupported
                        // downstream; insist on a named binding.
                        self.error(*location, "let pattern must bind a name".to_string());
                    }
                }
            }
            Stmt::Expr { expr, .. } => self.analyze_expr(expr),
            Stmt::Item(item) => self.analyze_item(item),
        }
    }

    fn analyze_expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Literal(_) => {}
            ExprKind::Identifier(name) => {
                self.resolve(name, expr.location);
            }
            ExprKind::Binary { op, left, right } => {
                if op.is_assignment() {
                    if let ExprKind::Identifier(name) = &left.kind {
                        match self.lookup(name).map(|symbol| symbol.mutable) {
                            // Reportable but non-fatal; codegen enforces.
                            Some(false) => self.warn(
                                left.location,
                                format!("assignment to immutable binding '{name}'"),
                            ),
                            Some(true) => {}
                            None => self.error(
                                left.location,
                                format!("undefined identifier '{name}'"),
                            ),
                        }
                    } else {
                        self.analyze_expr(left);
                    }
                    self.analyze_expr(right);
                } else {
                    self.analyze_expr(left);
                    self.analyze_expr(right);
                }
            }
            ExprKind::Unary { operand, .. } => self.analyze_expr(operand),
            ExprKind::Call { callee, args } => {
                self.analyze_expr(callee);
                for arg in args {
                    self.analyze_expr(arg);
                }
            }
            ExprKind::Index { object, index } => {
                self.analyze_expr(object);
                self.analyze_expr(index);
            }
            ExprKind::FieldAccess { object, .. } => self.analyze_expr(object),
            ExprKind::Cast { value, .. } => self.analyze_expr(value),
            ExprKind::StructLiteral { path, fields } => {
                if let Some(first) = path.first() {
                    self.resolve(first, expr.location);
                }
                for field in fields {
                    self.analyze_expr(&field.value);
                }
            }
            ExprKind::ArrayLiteral(elements) => {
                for element in elements {
                    self.analyze_expr(element);
                }
            }
            ExprKind::ArrayRepeat { value, count } => {
                self.analyze_expr(value);
                self.analyze_expr(count);
            }
            ExprKind::Tuple(elements) => {
                for element in elements {
                    self.analyze_expr(element);
                }
            }
            ExprKind::Block { stmts, tail } => {
                self.push_scope();
                for stmt in stmts {
                    self.analyze_stmt(stmt);
                }
                if let Some(tail) = tail {
                    self.analyze_expr(tail);
                }
                self.pop_scope();
            }
            ExprKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.analyze_expr(condition);
                self.analyze_expr(then_branch);
                if let Some(else_branch) = else_branch {
                    self.analyze_expr(else_branch);
                }
            }
            ExprKind::Match { scrutinee, arms } => {
                self.analyze_expr(scrutinee);
                for arm in arms {
                    self.analyze_match_arm(arm);
                }
            }
            ExprKind::Range { start, end, .. } => {
                if let Some(start) = start {
                    self.analyze_expr(start);
                }
                if let Some(end) = end {
                    self.analyze_expr(end);
                }
            }
            ExprKind::Return(value) => {
                if let Some(value) = value {
                    self.analyze_expr(value);
                }
            }
            ExprKind::While { condition, body } => {
                self.analyze_expr(condition);
                self.loop_depth += 1;
                self.analyze_expr(body);
                self.loop_depth -= 1;
            }
            ExprKind::For {
                pattern,
                iterator,
                body,
            } => {
                self.analyze_expr(iterator);

                self.push_scope();
                self.bind_pattern(pattern, expr.location);
                self.loop_depth += 1;
                self.analyze_expr(body);
                self.loop_depth -= 1;
                self.pop_scope();
            }
            ExprKind::Break(_) => {
                if self.loop_depth == 0 {
                    self.error(expr.location, "'break' outside of a loop".to_string());
                }
            }
            ExprKind::Continue(_) => {
                if self.loop_depth == 0 {
                    self.error(expr.location, "'continue' outside of a loop".to_string());
                }
            }
        }
    }

    fn analyze_match_arm(&mut self, arm: &MatchArm) {
        self.push_scope();
        self.bind_pattern(&arm.pattern, arm.location);
        if let Some(guard) = &arm.guard {
            self.analyze_expr(guard);
        }
        self.analyze_expr(&arm.body);
        self.pop_scope();
    }

    /// Introduce any names a pattern binds into the current scope.
    fn bind_pattern(&mut self, pattern: &Pattern, location: SourceLocation) {
        match &pattern.kind {
            PatternKind::Identifier { name, mutable } => {
                let symbol = Symbol {
                    name: name.clone(),
                    ty: None,
                    mutable: *mutable,
                    initialized: true,
                    location,
                };
                self.define(symbol);
            }
            PatternKind::Tuple(patterns) | PatternKind::Or(patterns) => {
                for sub in patterns {
                    self.bind_pattern(sub, location);
                }
            }
            PatternKind::Struct { fields, .. } => {
                for (_, sub) in fields {
                    self.bind_pattern(sub, location);
                }
            }
            PatternKind::Enum { args, .. } => {
                for sub in args {
                    self.bind_pattern(sub, location);
                }
            }
            PatternKind::Wildcard | PatternKind::Literal(_) | PatternKind::Range { .. } => {}
        }
    }

    fn push_scope(&mut self) {
        self.scopes.push(Scope::default());
    }

    fn pop_scope(&mut self) {
        debug_assert!(self.scopes.len() > 1, "module scope must stay live");
        self.scopes.pop();
    }

    /// Define a symbol in the innermost scope. Returns false if the name is
    /// already taken there; shadowing an outer scope is allowed.
    fn define(&mut self, symbol: Symbol) -> bool {
        let scope = self
            .scopes
            .last_mut()
            .expect("scope stack is never empty");
        if scope.symbols.contains_key(&symbol.name) {
            return false;
        }
        scope.symbols.insert(symbol.name.clone(), symbol);
        true
    }

    fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.symbols.get(name))
    }

    fn resolve(&mut self, name: &str, location: SourceLocation) {
        if self.lookup(name).is_none() {
            self.error(location, format!("undefined identifier '{name}'"));
        }
    }

    fn error(&mut self, location: SourceLocation, message: String) {
        self.diagnostics.push(Diagnostic::error(message, location));
    }

    fn warn(&mut self, location: SourceLocation, message: String) {
        self.diagnostics
            .push(Diagnostic::warning(message, location));
    }
}

impl Default for SemanticAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}
