//! Statement checking and write classification

use super::checker::{IterKind, LoopPlan, TypeChecker};
use super::effects::{write_requirement, Place, Requirement, Root};
use super::error::CheckError;
use crate::parser::ast::{CompoundOp, Expr, Stmt};
use crate::parser::types::{Relation, Type};
use rustc_hash::FxHashMap;

impl TypeChecker<'_> {
    pub(super) fn check_block(&mut self, body: &[Stmt]) -> Result<(), CheckError> {
        for stmt in body {
            self.check_stmt(stmt)?;
        }
        Ok(())
    }

    fn scoped(&mut self, body: &[Stmt], bindings: FxHashMap<String, Type>) -> Result<(), CheckError> {
        self.scopes.push(bindings);
        let outcome = self.check_block(body);
        self.scopes.pop();
        outcome
    }

    fn declare_local(&mut self, name: &str, ty: Type) -> Result<(), CheckError> {
        if self.scopes.is_empty() {
            self.scopes.push(FxHashMap::default());
        }
        let span = self.span;
        if let Some(scope) = self.scopes.last_mut() {
            if scope.contains_key(name) {
                return Err(CheckError::DuplicateLocal {
                    name: name.to_string(),
                    span,
                });
            }
            scope.insert(name.to_string(), ty);
        }
        Ok(())
    }

    fn check_stmt(&mut self, stmt: &Stmt) -> Result<(), CheckError> {
        self.span = stmt.span();
        match stmt {
            Stmt::Let { name, ty, init, .. } => {
                let declared = match ty {
                    Some(ty) => Some(self.ctx.resolver.resolve_type(ty, self.span)?),
                    None => None,
                };
                let ty = match (declared, init) {
                    (Some(declared), Some(init)) => {
                        self.expect_type(init, &declared)?;
                        declared
                    }
                    (Some(declared), None) => declared,
                    (None, Some(init)) => {
                        let inferred = self.expect_value(init)?;
                        if inferred == Type::Null {
                            return Err(CheckError::CannotInferType {
                                name: name.clone(),
                                span: self.span,
                            });
                        }
                        inferred
                    }
                    (None, None) => {
                        return Err(CheckError::CannotInferType {
                            name: name.clone(),
                            span: self.span,
                        })
                    }
                };
                if !ty.is_value() {
                    return Err(CheckError::VoidValue { span: self.span });
                }
                self.result.record_decl(stmt, ty.clone());
                self.declare_local(name, ty)
            }

            Stmt::Assign { target, value, .. } => {
                let target_ty = self.check_target(target)?;
                self.expect_type(value, &target_ty)?;
                self.check_write(target, "Assigning")
            }

            Stmt::Compound { op, target, value, .. } => self.check_compound(*op, target, value),

            Stmt::Expr { expr, .. } => self.check_expr(expr).map(|_| ()),

            Stmt::If { cond, then, otherwise, .. } => {
                self.expect_type(cond, &Type::Bool)?;
                self.scoped(then, FxHashMap::default())?;
                self.scoped(otherwise, FxHashMap::default())
            }

            Stmt::While { cond, body, .. } => {
                self.expect_type(cond, &Type::Bool)?;
                self.loop_depth += 1;
                let outcome = self.scoped(body, FxHashMap::default());
                self.loop_depth -= 1;
                outcome
            }

            Stmt::For {
                key,
                value,
                key_ty,
                value_ty,
                iter,
                body,
                ..
            } => {
                let iter_ty = self.expect_value(iter)?;
                let plan = self.loop_plan(&iter_ty, value.is_some())?;

                for (annotation, actual) in [(key_ty, Some(&plan.first)), (value_ty, plan.second.as_ref())] {
                    if let (Some(annotation), Some(actual)) = (annotation, actual) {
                        let annotated = self.ctx.resolver.resolve_type(annotation, self.span)?;
                        if annotated != *actual {
                            return Err(CheckError::LoopBinding {
                                message: format!(
                                    "declared {} but the collection yields {}",
                                    self.describe(&annotated),
                                    self.describe(actual)
                                ),
                                span: self.span,
                            });
                        }
                    }
                }

                let mut bindings = FxHashMap::default();
                bindings.insert(key.clone(), plan.first.clone());
                if let (Some(name), Some(ty)) = (value, &plan.second) {
                    if name == key {
                        return Err(CheckError::DuplicateLocal {
                            name: name.clone(),
                            span: self.span,
                        });
                    }
                    bindings.insert(name.clone(), ty.clone());
                }
                self.result.record_loop(stmt, plan);

                self.loop_depth += 1;
                let outcome = self.scoped(body, bindings);
                self.loop_depth -= 1;
                outcome
            }

            Stmt::Return { value, .. } => match (value, self.ret.clone()) {
                (None, Type::Void) => Ok(()),
                (None, expected) => Err(CheckError::MissingReturnValue {
                    expected: self.describe(&expected),
                    span: self.span,
                }),
                (Some(value), Type::Void) => {
                    let actual = self.check_expr(value)?;
                    Err(self.mismatch(&Type::Void, &actual))
                }
                (Some(value), expected) => self.expect_type(value, &expected),
            },

            Stmt::Break { .. } | Stmt::Continue { .. } => {
                if self.loop_depth == 0 {
                    let keyword = if matches!(stmt, Stmt::Break { .. }) { "break" } else { "continue" };
                    return Err(CheckError::OutsideLoop {
                        keyword,
                        span: self.span,
                    });
                }
                Ok(())
            }

            Stmt::Extend { target, class, .. } | Stmt::Retract { target, class, .. } => {
                let verb = if matches!(stmt, Stmt::Extend { .. }) { "Extending" } else { "Retracting" };
                let ty = self.expect_value(target)?;
                if ty.class().is_none() {
                    return Err(CheckError::NotAnObject {
                        name: verb.to_lowercase(),
                        ty: self.describe(&ty),
                        span: self.span,
                    });
                }
                let class = self.resolve_class(class)?;
                let requirement = if matches!(target, Expr::This) {
                    Requirement::MutatingThis
                } else {
                    Requirement::Mutating
                };
                let what = if requirement == Requirement::MutatingThis { "this" } else { "another object" };
                self.effects
                    .require(requirement, || format!("{} {}", verb, what), self.span)?;
                self.result.record_stmt_class(stmt, class);
                Ok(())
            }

            Stmt::Enforce { suggestion, .. } => {
                self.expect_type(suggestion, &Type::Suggestion)?;
                self.effects.require(
                    Requirement::Mutating,
                    || "Enforcing a suggestion".to_string(),
                    self.span,
                )
            }
        }
    }

    fn loop_plan(&self, iter_ty: &Type, two: bool) -> Result<LoopPlan, CheckError> {
        let plan = match (iter_ty, two) {
            (Type::Array(el), false) => LoopPlan {
                kind: IterKind::Array,
                first: (**el).clone(),
                second: None,
            },
            (Type::Array(el), true) => LoopPlan {
                kind: IterKind::Array,
                first: Type::Num,
                second: Some((**el).clone()),
            },
            (Type::Str, false) => LoopPlan {
                kind: IterKind::Str,
                first: Type::Str,
                second: None,
            },
            (Type::Str, true) => LoopPlan {
                kind: IterKind::Str,
                first: Type::Num,
                second: Some(Type::Str),
            },
            (Type::Map(k, v), two) => LoopPlan {
                kind: IterKind::Map,
                first: (**k).clone(),
                second: two.then(|| (**v).clone()),
            },
            (Type::Set(el), false) => LoopPlan {
                kind: IterKind::Set,
                first: (**el).clone(),
                second: None,
            },
            (Type::Set(_), true) => {
                return Err(CheckError::LoopBinding {
                    message: "sets have no keys; use a single loop variable".to_string(),
                    span: self.span,
                })
            }
            (other, _) => {
                return Err(CheckError::NotIterable {
                    ty: self.describe(other),
                    span: self.span,
                })
            }
        };
        Ok(plan)
    }

    /// Type of an assignable location
    fn check_target(&mut self, target: &Expr) -> Result<Type, CheckError> {
        match target {
            Expr::Name { .. } | Expr::Field { .. } => self.check_expr(target),
            Expr::Index { object, .. } => {
                let ty = self.check_expr(target)?;
                match self.result.type_of(object) {
                    Some(Type::Array(_)) | Some(Type::Map(..)) => Ok(ty),
                    _ => Err(CheckError::NotAssignable { span: self.span }),
                }
            }
            _ => Err(CheckError::NotAssignable { span: self.span }),
        }
    }

    /// Effect check for storing into a (checked) target location
    fn check_write(&self, target: &Expr, verb: &str) -> Result<(), CheckError> {
        match target {
            Expr::Name { path } => {
                if path.len() == 1 && self.local(&path[0]).is_some() {
                    return Ok(());
                }
                match self.place_of(target).root {
                    Root::Fabric(name) => Err(CheckError::ImmutableFabric { name, span: self.span }),
                    _ => Err(CheckError::NotAssignable { span: self.span }),
                }
            }
            Expr::Field { name, .. } => {
                let primitive = self.result.type_of(target).is_some_and(Type::is_primitive);
                self.require_write(&self.place_of(target), primitive, || format!("{} field '{}'", verb, name))
            }
            Expr::Index { object, .. } => {
                let primitive = self.result.type_of(target).is_some_and(Type::is_primitive);
                self.require_write(&self.place_of(object), primitive, || format!("{} an element", verb))
            }
            _ => Err(CheckError::NotAssignable { span: self.span }),
        }
    }

    fn require_write(&self, place: &Place, primitive: bool, action: impl FnOnce() -> String) -> Result<(), CheckError> {
        if let Root::Fabric(name) = &place.root {
            return Err(CheckError::ImmutableFabric {
                name: name.clone(),
                span: self.span,
            });
        }
        self.effects
            .require(write_requirement(place, primitive), action, self.span)
    }

    fn check_compound(&mut self, op: CompoundOp, target: &Expr, value: &Expr) -> Result<(), CheckError> {
        let target_ty = self.check_target(target).or_else(|err| match target {
            // Containers reached through calls can still be mutated in place
            Expr::Call { .. } => self.check_expr(target),
            _ => Err(err),
        })?;
        let in_place = match (op, &target_ty) {
            (CompoundOp::Add, Type::Array(el)) | (CompoundOp::Add, Type::Set(el)) => {
                self.expect_type(value, el)?;
                true
            }
            (CompoundOp::Sub, Type::Map(key, _)) => {
                self.expect_type(value, key)?;
                true
            }
            (CompoundOp::Sub, Type::Set(el)) => {
                self.expect_type(value, el)?;
                true
            }
            (_, Type::Num) => {
                self.expect_type(value, &Type::Num)?;
                false
            }
            (CompoundOp::Add, Type::Str) => {
                let ty = self.expect_value(value)?;
                if !ty.equals(&Type::Str, Relation::Castable, self.ctx.classes) {
                    return Err(self.mismatch(&Type::Str, &ty));
                }
                false
            }
            (CompoundOp::Add, Type::Suggestion) => {
                self.expect_type(value, &Type::Suggestion)?;
                false
            }
            (op, other) => {
                return Err(CheckError::InvalidCompound {
                    op: op.as_str().to_string(),
                    ty: self.describe(other),
                    span: self.span,
                })
            }
        };

        if in_place {
            let what = if op == CompoundOp::Add { "Adding to" } else { "Removing from" };
            self.require_write(&self.place_of(target), false, || format!("{} a collection", what))
        } else {
            self.check_write(target, "Updating")
        }
    }
}
