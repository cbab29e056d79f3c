//! Expression lowering

use super::Lowerer;
use crate::compiler::ir::{ArithOp, Code, CompareOp, IndexKind, StepCode};
use crate::parser::ast::{BinaryOp, Expr, SuggestStep, UnaryOp};
use crate::parser::checker::Resolution;
use crate::parser::types::Type;

impl Lowerer<'_> {
    fn boxed(&mut self, expr: &Expr) -> Box<Code> {
        Box::new(self.lower_expr(expr))
    }

    fn lower_all(&mut self, exprs: &[Expr]) -> Vec<Code> {
        exprs.iter().map(|e| self.lower_expr(e)).collect()
    }

    pub(super) fn type_of(&mut self, expr: &Expr) -> Type {
        match self.ctx.check.type_of(expr) {
            Some(ty) => ty.clone(),
            None => {
                self.missing("expression type");
                Type::Void
            }
        }
    }

    pub(super) fn index_kind(&mut self, object: &Expr) -> IndexKind {
        match self.type_of(object) {
            Type::Map(..) => IndexKind::Map,
            Type::Str => IndexKind::Str,
            _ => IndexKind::Array,
        }
    }

    /// Lower an expression
    pub(super) fn lower_expr(&mut self, expr: &Expr) -> Code {
        let ctx = self.ctx;
        match expr {
            Expr::Num { value } => Code::Num(*value),
            Expr::Str { value } => Code::Str(value.as_str().into()),
            Expr::Bool { value } => Code::Bool(*value),
            Expr::Null => Code::Null,
            Expr::This => Code::This,
            Expr::Caller => Code::Caller,
            Expr::Random => Code::Random,

            Expr::Name { path } => {
                if let [name] = path.as_slice() {
                    if let Some(slot) = self.local(name) {
                        return Code::Local(slot);
                    }
                }
                match ctx.check.resolution(expr) {
                    Some(Resolution::Fabric(id)) => match ctx.fabric(*id) {
                        Some(value) => Code::Const(value),
                        None => self.missing("fabric value"),
                    },
                    _ => self.missing("name"),
                }
            }

            Expr::Field { object, .. } => match ctx.check.resolution(expr) {
                Some(Resolution::Field(info)) => Code::GetField {
                    object: self.boxed(object),
                    field: info.id,
                    ty: info.ty.clone(),
                },
                _ => self.missing("field"),
            },

            Expr::Index { object, index } => {
                if let Some(Resolution::TupleIndex(position)) = ctx.check.resolution(expr) {
                    return Code::TupleGet {
                        tuple: self.boxed(object),
                        index: *position,
                    };
                }
                let kind = self.index_kind(object);
                let ty = self.type_of(expr);
                Code::Index {
                    object: self.boxed(object),
                    kind,
                    index: self.boxed(index),
                    ty,
                }
            }

            Expr::Call { object, args, .. } => match ctx.check.resolution(expr) {
                Some(Resolution::Method(sig)) => Code::Call {
                    object: self.boxed(object),
                    slot: sig.slot(),
                    args: self.lower_all(args),
                    ret: sig.ret.clone(),
                },
                _ => self.missing("method"),
            },

            Expr::SuperCall { args, .. } => match ctx.check.resolution(expr) {
                Some(Resolution::SuperMethod { parent, sig }) => Code::SuperCall {
                    parent: *parent,
                    slot: sig.slot(),
                    args: self.lower_all(args),
                },
                _ => self.missing("super method"),
            },

            Expr::New { .. } => match self.type_of(expr) {
                Type::Object(class) => Code::New(class),
                Type::Array(_) => Code::NewArray,
                Type::Map(..) => Code::NewMap,
                Type::Set(_) => Code::NewSet,
                _ => self.missing("instantiated type"),
            },

            Expr::Binary { op, left, right } => {
                let is_concat = *op == BinaryOp::Add && self.type_of(expr) == Type::Str;
                let left = self.boxed(left);
                let right = self.boxed(right);
                match op {
                    BinaryOp::Add if is_concat => Code::Concat { left, right },
                    BinaryOp::Add => Code::Arith { op: ArithOp::Add, left, right },
                    BinaryOp::Sub => Code::Arith { op: ArithOp::Sub, left, right },
                    BinaryOp::Mul => Code::Arith { op: ArithOp::Mul, left, right },
                    BinaryOp::Div => Code::Arith { op: ArithOp::Div, left, right },
                    BinaryOp::Rem => Code::Arith { op: ArithOp::Rem, left, right },
                    BinaryOp::Eq => Code::Equal { negate: false, left, right },
                    BinaryOp::Ne => Code::Equal { negate: true, left, right },
                    BinaryOp::Lt => Code::Compare { op: CompareOp::Lt, left, right },
                    BinaryOp::Le => Code::Compare { op: CompareOp::Le, left, right },
                    BinaryOp::Gt => Code::Compare { op: CompareOp::Gt, left, right },
                    BinaryOp::Ge => Code::Compare { op: CompareOp::Ge, left, right },
                    BinaryOp::And => Code::Logic { and: true, left, right },
                    BinaryOp::Or => Code::Logic { and: false, left, right },
                }
            }

            Expr::Unary { op, operand } => match op {
                UnaryOp::Neg => Code::Neg(self.boxed(operand)),
                UnaryOp::Not => Code::Not(self.boxed(operand)),
            },

            Expr::Array { elements } => Code::ArrayLit(self.lower_all(elements)),
            Expr::Tuple { elements } => Code::TupleLit(self.lower_all(elements)),

            Expr::Cast { value, .. } => {
                let to = self.type_of(expr);
                Code::Cast {
                    value: self.boxed(value),
                    to,
                }
            }

            Expr::Clone { value } => Code::Clone(self.boxed(value)),
            Expr::Len { value } => Code::Len(self.boxed(value)),
            Expr::Has { collection, key } => Code::Has {
                collection: self.boxed(collection),
                key: self.boxed(key),
            },

            Expr::Is { value, .. } => match ctx.check.resolution(expr) {
                Some(Resolution::Class(class)) => Code::Is {
                    value: self.boxed(value),
                    class: *class,
                },
                _ => self.missing("class"),
            },

            Expr::Suggest { steps } => {
                let steps = steps.iter().filter_map(|step| self.lower_step(step)).collect();
                Code::Suggest(steps)
            }
        }
    }

    fn lower_step(&mut self, step: &SuggestStep) -> Option<StepCode> {
        let ctx = self.ctx;
        let resolution = ctx.check.step(step);
        let code = match (step, resolution) {
            (SuggestStep::Extend { target, .. }, Some(Resolution::Class(class))) => StepCode::Extend {
                target: self.lower_expr(target),
                class: *class,
            },
            (SuggestStep::Retract { target, .. }, Some(Resolution::Class(class))) => StepCode::Retract {
                target: self.lower_expr(target),
                class: *class,
            },
            (SuggestStep::Call { target, args, .. }, Some(Resolution::Method(sig))) => StepCode::Call {
                target: self.lower_expr(target),
                slot: sig.slot(),
                args: self.lower_all(args),
            },
            _ => {
                self.missing("suggestion step");
                return None;
            }
        };
        Some(code)
    }
}
