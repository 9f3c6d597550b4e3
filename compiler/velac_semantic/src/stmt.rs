//! Contains bound statements and the statement binder.
//!
//! Statements capture the side effects expressions are not allowed to
//! hold. Binding is sequential: a local declaration becomes visible the
//! moment it is bound, so earlier statements cannot see later locals.

use std::sync::Arc;

use velac_base::span::Span;
use velac_syntax::statement::StatementSyntax;

use crate::{
    arena::ID,
    bind::BindContext,
    diagnostic::{DiagCode, Diagnostic},
    expr::Expression,
    symbol::{
        Block, BlockKind, BlockSyntax, LookupLocation, ScopeData, ScopeState,
        SubroutineKind, SymbolId, Variable, VarFlavor,
    },
    Compilation,
};

#[derive(Debug, Clone)]
pub enum Statement {
    /// A sequence of statements, optionally carrying the block symbol a
    /// `begin`/`end` introduced.
    Block {
        block: Option<ID<Block>>,
        statements: Vec<Statement>,
    },
    Expression(Expression),
    VarDecl {
        var: ID<Variable>,
        init: Option<Expression>,
    },
    Conditional {
        condition: Expression,
        then_branch: Box<Statement>,
        else_branch: Option<Box<Statement>>,
    },
    For {
        initializers: Vec<Statement>,
        stop: Option<Expression>,
        steps: Vec<Expression>,
        body: Box<Statement>,
    },
    Return {
        expr: Option<Expression>,
        span: Span,
    },
    Break {
        span: Span,
    },
    Continue {
        span: Span,
    },
    Disable {
        target: Option<ID<Block>>,
        span: Span,
    },
    Empty,
}

impl Compilation {
    /// Binds a statement in the given context, creating block and
    /// variable symbols as they are encountered.
    pub fn bind_statement(
        &mut self,
        syntax: &StatementSyntax,
        ctx: &BindContext,
    ) -> Statement {
        match syntax {
            StatementSyntax::SequentialBlock(block_syntax) => {
                let name = block_syntax.label.as_ref().map_or(
                    crate::arena::NameId::EMPTY,
                    |label| self.interner.intern(label.value_text()),
                );
                let decl_index = self
                    .scope_data(ctx.scope)
                    .map_or(0, |data| data.members.len() as u32);
                let block = self.blocks.insert(Block {
                    name,
                    span: block_syntax.span,
                    parent: ctx.scope,
                    kind: BlockKind::Sequential,
                    scope: ScopeData {
                        state: ScopeState::Initialized,
                        ..ScopeData::default()
                    },
                    syntax: BlockSyntax::Sequential(Arc::new(
                        block_syntax.clone(),
                    )),
                    body: None,
                    decl_index,
                });
                if name == crate::arena::NameId::EMPTY {
                    if let Some(data) = self.scope_data_mut(ctx.scope) {
                        data.members.push(SymbolId::Block(block));
                    }
                } else {
                    self.insert_member(
                        ctx.scope,
                        name,
                        SymbolId::Block(block),
                        block_syntax.span,
                    );
                }

                let child =
                    BindContext { scope: SymbolId::Block(block), ..ctx.clone() };
                let statements = block_syntax
                    .statements
                    .iter()
                    .map(|statement| self.bind_statement(statement, &child))
                    .collect();
                Statement::Block { block: Some(block), statements }
            }
            StatementSyntax::VariableDeclaration(declaration) => {
                let mut statements = Vec::new();
                for declarator in &declaration.declarators {
                    let name =
                        self.interner.intern(declarator.name.value_text());
                    let location = LookupLocation::before(
                        self.scope_data(ctx.scope)
                            .map_or(0, |data| data.members.len() as u32),
                    );
                    let base = self.type_from_syntax(
                        &declaration.data_type,
                        ctx.scope,
                        location,
                        false,
                        None,
                    );
                    let ty = self.apply_unpacked_dims(
                        base,
                        &declarator.dimensions,
                        ctx.scope,
                        location,
                    );

                    let var = self.variables.insert(Variable {
                        name,
                        span: declarator.name.span,
                        parent: ctx.scope,
                        ty,
                        is_const: declaration.is_const,
                        is_static_member: false,
                        visibility: Default::default(),
                        flavor: VarFlavor::Normal,
                        initializer: declarator.initializer.clone(),
                        decl_index: location.before_index,
                    });
                    self.insert_member(
                        ctx.scope,
                        name,
                        SymbolId::Variable(var),
                        declarator.name.span,
                    );

                    let init = declarator
                        .initializer
                        .as_ref()
                        .map(|init| self.bind_rvalue(init, ty, ctx));
                    statements.push(Statement::VarDecl { var, init });
                }

                if statements.len() == 1 {
                    statements.pop().unwrap()
                } else {
                    Statement::Block { block: None, statements }
                }
            }
            StatementSyntax::Conditional(conditional) => {
                let condition =
                    self.bind_expression(&conditional.condition, ctx);
                let then_branch =
                    self.bind_statement(&conditional.then_branch, ctx);
                let else_branch = conditional
                    .else_branch
                    .as_ref()
                    .map(|branch| Box::new(self.bind_statement(branch, ctx)));
                Statement::Conditional {
                    condition,
                    then_branch: Box::new(then_branch),
                    else_branch,
                }
            }
            StatementSyntax::ForLoop(for_loop) => {
                let initializers = for_loop
                    .initializers
                    .iter()
                    .map(|initializer| self.bind_statement(initializer, ctx))
                    .collect();
                let stop = for_loop
                    .stop_expression
                    .as_ref()
                    .map(|stop| self.bind_expression(stop, ctx));
                let steps = for_loop
                    .step_expressions
                    .iter()
                    .map(|step| self.bind_expression(step, ctx))
                    .collect();
                let body = self.bind_statement(&for_loop.body, ctx);
                Statement::For {
                    initializers,
                    stop,
                    steps,
                    body: Box::new(body),
                }
            }
            StatementSyntax::Expression(statement) => Statement::Expression(
                self.bind_expression(&statement.expression, ctx),
            ),
            StatementSyntax::Return(statement) => {
                let subroutine = self.enclosing_subroutine(ctx.scope);
                let expr = match (&statement.expression, subroutine) {
                    (Some(expression), Some(subroutine)) => {
                        let return_type =
                            self.subroutine(subroutine).return_type;
                        if return_type == self.types.void_type() {
                            self.report(Diagnostic::new(
                                DiagCode::BadAssignment,
                                statement.span,
                                "a void subroutine cannot return a value"
                                    .to_owned(),
                            ));
                            None
                        } else {
                            Some(self.bind_rvalue(expression, return_type, ctx))
                        }
                    }
                    (Some(expression), None) => {
                        // return outside a subroutine still binds, so the
                        // tree stays usable
                        Some(self.bind_expression(expression, ctx))
                    }
                    (None, _) => None,
                };
                Statement::Return { expr, span: statement.span }
            }
            StatementSyntax::Break { span } => Statement::Break { span: *span },
            StatementSyntax::Continue { span } => {
                Statement::Continue { span: *span }
            }
            StatementSyntax::Disable(disable) => {
                let name = self.interner.intern(disable.target.value_text());
                let result = self.lookup(
                    ctx.scope,
                    name,
                    crate::symbol::Namespace::Members,
                    LookupLocation::MAX,
                    crate::lookup::LookupOptions {
                        allow_declared_after: true,
                    },
                    disable.target.span,
                );
                let target = match result.symbol {
                    Some(SymbolId::Block(block)) => Some(block),
                    Some(_) | None => {
                        if !result.reported {
                            self.report(Diagnostic::new(
                                DiagCode::UndeclaredIdentifier,
                                disable.target.span,
                                format!(
                                    "no block named `{}` to disable",
                                    self.name(name)
                                ),
                            ));
                        }
                        None
                    }
                };
                Statement::Disable { target, span: disable.span }
            }
            StatementSyntax::Empty { .. } => Statement::Empty,
        }
    }

    /// The nearest enclosing subroutine of a scope, if any.
    pub(crate) fn enclosing_subroutine(
        &self,
        mut scope: SymbolId,
    ) -> Option<ID<crate::symbol::Subroutine>> {
        loop {
            match scope {
                SymbolId::Subroutine(id) => return Some(id),
                SymbolId::Root => return None,
                _ => scope = self.symbol_parent(scope),
            }
        }
    }

    /// Whether a subroutine is a function as opposed to a task.
    #[must_use]
    pub fn is_function(&self, id: ID<crate::symbol::Subroutine>) -> bool {
        self.subroutine(id).kind == SubroutineKind::Function
    }
}
