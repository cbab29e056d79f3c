//! Statement lowering

use super::Lowerer;
use crate::compiler::ir::{ArithOp, Code, IndexKind, Op};
use crate::parser::ast::{CompoundOp, Expr, Stmt};
use crate::parser::checker::Resolution;
use crate::parser::types::Type;
use rustc_hash::FxHashMap;

impl Lowerer<'_> {
    /// Lower a block in its own scope; temporaries are released after each
    /// statement
    pub(super) fn lower_block(&mut self, body: &[Stmt]) -> Vec<Op> {
        self.scopes.push(FxHashMap::default());
        let mut ops = Vec::with_capacity(body.len());
        for stmt in body {
            self.lower_stmt(stmt, &mut ops);
            self.flush(&mut ops);
        }
        self.scopes.pop();
        ops
    }

    fn lower_stmt(&mut self, stmt: &Stmt, ops: &mut Vec<Op>) {
        let ctx = self.ctx;
        match stmt {
            Stmt::Let { name, init, .. } => {
                let value = match (init, ctx.check.decl_type(stmt)) {
                    (Some(init), _) => self.lower_expr(init),
                    (None, Some(ty)) => Code::Default {
                        ty: ty.clone(),
                        constructed: true,
                    },
                    (None, None) => self.missing("local type"),
                };
                let slot = self.temps.mint();
                self.bind(name, slot);
                ops.push(Op::Store { slot, value });
            }

            Stmt::Assign { target, value, .. } => {
                let op = self.lower_store(target, |lowerer| lowerer.lower_expr(value));
                ops.push(op);
            }

            Stmt::Compound { op, target, value, .. } => {
                let lowered = self.lower_compound(*op, target, value);
                ops.push(lowered);
            }

            Stmt::Expr { expr, .. } => {
                let code = self.lower_expr(expr);
                ops.push(Op::Eval(code));
            }

            Stmt::If { cond, then, otherwise, .. } => {
                let cond = self.lower_expr(cond);
                let then = self.lower_block(then);
                let otherwise = self.lower_block(otherwise);
                ops.push(Op::If { cond, then, otherwise });
            }

            Stmt::While { cond, body, .. } => {
                let cond = self.lower_expr(cond);
                let body = self.lower_block(body);
                ops.push(Op::While { cond, body });
            }

            Stmt::For { key, value, iter, body, .. } => {
                let Some(plan) = ctx.check.loop_plan(stmt) else {
                    self.missing("loop");
                    return;
                };
                let source = self.lower_expr(iter);
                self.scopes.push(FxHashMap::default());
                let first = self.temps.mint();
                self.bind(key, first);
                let second = match (value, &plan.second) {
                    (Some(name), Some(_)) => {
                        let slot = self.temps.mint();
                        self.bind(name, slot);
                        Some(slot)
                    }
                    _ => None,
                };
                let body = self.lower_block(body);
                self.scopes.pop();
                ops.push(Op::ForEach {
                    source,
                    kind: plan.kind,
                    first,
                    second,
                    body,
                });
            }

            Stmt::Return { value, .. } => {
                let code = match value {
                    Some(value) => self.lower_expr(value),
                    None => Code::Null,
                };
                ops.push(Op::Return(code));
            }

            Stmt::Break { .. } => ops.push(Op::Break),
            Stmt::Continue { .. } => ops.push(Op::Continue),

            Stmt::Extend { target, .. } | Stmt::Retract { target, .. } => {
                let Some(class) = ctx.check.stmt_class(stmt) else {
                    self.missing("class");
                    return;
                };
                let target = self.lower_expr(target);
                if matches!(stmt, Stmt::Extend { .. }) {
                    ops.push(Op::Extend { target, class });
                } else {
                    ops.push(Op::Retract { target, class });
                }
            }

            Stmt::Enforce { suggestion, .. } => {
                let code = self.lower_expr(suggestion);
                ops.push(Op::Enforce(code));
            }
        }
    }

    /// Store into an assignable location. `value` is lowered after the
    /// location's object and index so evaluation runs left to right.
    fn lower_store(&mut self, target: &Expr, value: impl FnOnce(&mut Self) -> Code) -> Op {
        let ctx = self.ctx;
        match target {
            Expr::Name { path } => match path.as_slice() {
                [name] => match self.local(name) {
                    Some(slot) => Op::Store { slot, value: value(self) },
                    None => Op::Eval(self.missing("local")),
                },
                _ => Op::Eval(self.missing("local")),
            },
            Expr::Field { object, .. } => match ctx.check.resolution(target) {
                Some(Resolution::Field(info)) => {
                    let object = self.lower_expr(object);
                    Op::SetField {
                        object,
                        field: info.id,
                        value: value(self),
                    }
                }
                _ => Op::Eval(self.missing("field")),
            },
            Expr::Index { object, index } => {
                let kind = self.index_kind(object);
                let target = self.lower_expr(object);
                let index = self.lower_expr(index);
                Op::SetIndex {
                    target,
                    kind,
                    index,
                    value: value(self),
                }
            }
            _ => Op::Eval(self.missing("assignable location")),
        }
    }

    fn lower_compound(&mut self, op: CompoundOp, target: &Expr, value: &Expr) -> Op {
        let target_ty = self.type_of(target);
        match (op, &target_ty) {
            (CompoundOp::Add, Type::Array(_) | Type::Set(_)) => {
                let target = self.lower_expr(target);
                Op::Append {
                    target,
                    value: self.lower_expr(value),
                }
            }
            (CompoundOp::Sub, Type::Map(..) | Type::Set(_)) => {
                let target = self.lower_expr(target);
                Op::Remove {
                    target,
                    value: self.lower_expr(value),
                }
            }
            _ => self.lower_update(op, &target_ty, target, value),
        }
    }

    /// `target = target op value`, evaluating the target's object and index
    /// only once through scratch temporaries
    fn lower_update(&mut self, op: CompoundOp, ty: &Type, target: &Expr, value: &Expr) -> Op {
        let ctx = self.ctx;
        let combine = |current: Code, rhs: Code| -> Code {
            let (left, right) = (Box::new(current), Box::new(rhs));
            match (op, ty) {
                (CompoundOp::Add, Type::Str) => Code::Concat { left, right },
                (CompoundOp::Add, Type::Suggestion) => Code::Merge { left, right },
                (CompoundOp::Add, _) => Code::Arith { op: ArithOp::Add, left, right },
                (CompoundOp::Sub, _) => Code::Arith { op: ArithOp::Sub, left, right },
                (CompoundOp::Mul, _) => Code::Arith { op: ArithOp::Mul, left, right },
                (CompoundOp::Div, _) => Code::Arith { op: ArithOp::Div, left, right },
            }
        };

        match target {
            Expr::Name { path } => match path.as_slice() {
                [name] => match self.local(name) {
                    Some(slot) => {
                        let rhs = self.lower_expr(value);
                        Op::Store {
                            slot,
                            value: combine(Code::Local(slot), rhs),
                        }
                    }
                    None => Op::Eval(self.missing("local")),
                },
                _ => Op::Eval(self.missing("local")),
            },

            Expr::Field { object, .. } => match ctx.check.resolution(target) {
                Some(Resolution::Field(info)) => {
                    let temp = self.temps.alloc();
                    self.temps.defer_release(temp);
                    let object = Code::Tee {
                        slot: temp,
                        value: Box::new(self.lower_expr(object)),
                    };
                    let current = Code::GetField {
                        object: Box::new(Code::Local(temp)),
                        field: info.id,
                        ty: info.ty.clone(),
                    };
                    let rhs = self.lower_expr(value);
                    Op::SetField {
                        object,
                        field: info.id,
                        value: combine(current, rhs),
                    }
                }
                _ => Op::Eval(self.missing("field")),
            },

            Expr::Index { object, index } => {
                let kind = self.index_kind(object);
                if kind == IndexKind::Str {
                    return Op::Eval(self.missing("assignable location"));
                }
                let container = self.temps.alloc();
                let key = self.temps.alloc();
                self.temps.defer_release(container);
                self.temps.defer_release(key);
                let target = Code::Tee {
                    slot: container,
                    value: Box::new(self.lower_expr(object)),
                };
                let index = Code::Tee {
                    slot: key,
                    value: Box::new(self.lower_expr(index)),
                };
                let current = Code::Index {
                    object: Box::new(Code::Local(container)),
                    kind,
                    index: Box::new(Code::Local(key)),
                    ty: ty.clone(),
                };
                let rhs = self.lower_expr(value);
                Op::SetIndex {
                    target,
                    kind,
                    index,
                    value: combine(current, rhs),
                }
            }

            _ => Op::Eval(self.missing("assignable location")),
        }
    }
}
