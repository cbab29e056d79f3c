//! Type checker
//!
//! Checks method bodies and field initializers of one module against the
//! composed class tables, enforcing the mutation-effect rules as it goes.
//! Results are recorded per syntax node (keyed by node address) for the
//! code generator.

use super::effects::{call_requirement, Effects, Place, Root};
use super::error::CheckError;
use super::resolver::NameResolver;
use super::symbols::Target;
use crate::compiler::classes::{ClassId, ClassRegistry, Entry, FieldInfo};
use crate::compiler::module::FabricId;
use crate::parser::ast::{BinaryOp, Expr, FieldDecl, MethodDecl, Stmt, SuggestStep, UnaryOp};
use crate::parser::types::{is_subclass, MethodSig, Relation, Type};
use crate::parser::Span;
use rustc_hash::FxHashMap;

/// Address of a syntax node, used as the key of checker results
pub(crate) fn node_key<T>(node: &T) -> usize {
    node as *const T as usize
}

/// What a name, member access or class path in the tree refers to
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Module-level fabric
    Fabric(FabricId),
    /// Field read or write
    Field(FieldInfo),
    /// Dynamically dispatched method
    Method(MethodSig),
    /// Parent implementation called through `super`
    SuperMethod {
        /// Parent whose manifest supplies the implementation
        parent: ClassId,
        /// Signature found in that parent
        sig: MethodSig,
    },
    /// Literal tuple index
    TupleIndex(usize),
    /// Class named by `new`, `is`, `extend`, `retract` or a suggestion step
    Class(ClassId),
}

/// Collection kind iterated by a `for` loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterKind {
    /// Characters of a string
    Str,
    /// Array elements
    Array,
    /// Map entries in key order
    Map,
    /// Set elements in order
    Set,
}

/// Typing of a `for` loop
#[derive(Debug, Clone, PartialEq)]
pub struct LoopPlan {
    /// Iterated collection kind
    pub kind: IterKind,
    /// Type of the first variable
    pub first: Type,
    /// Type of the second variable, for two-variable loops
    pub second: Option<Type>,
}

/// Per-node results of checking one module
#[derive(Debug, Default)]
pub struct CheckResult {
    expr_types: FxHashMap<usize, Type>,
    resolutions: FxHashMap<usize, Resolution>,
    steps: FxHashMap<usize, Resolution>,
    decl_types: FxHashMap<usize, Type>,
    stmt_classes: FxHashMap<usize, ClassId>,
    loops: FxHashMap<usize, LoopPlan>,
}

impl CheckResult {
    /// Type of a checked expression
    pub fn type_of(&self, expr: &Expr) -> Option<&Type> {
        self.expr_types.get(&node_key(expr))
    }

    /// What an expression refers to
    pub fn resolution(&self, expr: &Expr) -> Option<&Resolution> {
        self.resolutions.get(&node_key(expr))
    }

    /// What a suggestion step refers to
    pub fn step(&self, step: &SuggestStep) -> Option<&Resolution> {
        self.steps.get(&node_key(step))
    }

    /// Declared or inferred type of a `let`
    pub fn decl_type(&self, stmt: &Stmt) -> Option<&Type> {
        self.decl_types.get(&node_key(stmt))
    }

    /// Class of an `extend` or `retract`
    pub fn stmt_class(&self, stmt: &Stmt) -> Option<ClassId> {
        self.stmt_classes.get(&node_key(stmt)).copied()
    }

    /// Typing of a `for`
    pub fn loop_plan(&self, stmt: &Stmt) -> Option<&LoopPlan> {
        self.loops.get(&node_key(stmt))
    }

    pub(super) fn record_decl(&mut self, stmt: &Stmt, ty: Type) {
        self.decl_types.insert(node_key(stmt), ty);
    }

    pub(super) fn record_stmt_class(&mut self, stmt: &Stmt, class: ClassId) {
        self.stmt_classes.insert(node_key(stmt), class);
    }

    pub(super) fn record_loop(&mut self, stmt: &Stmt, plan: LoopPlan) {
        self.loops.insert(node_key(stmt), plan);
    }
}

/// Module-wide facts the checker consults
pub struct CheckContext<'a> {
    /// Composed classes
    pub classes: &'a ClassRegistry,
    /// Resolver for the module being checked
    pub resolver: NameResolver<'a>,
    /// Implicit root class (type of `caller`)
    pub root_class: Option<ClassId>,
    /// Classes deriving from this one may be cloned
    pub clonable_class: Option<ClassId>,
}

/// Type checker for one module
pub struct TypeChecker<'a> {
    pub(super) ctx: CheckContext<'a>,
    pub(super) result: CheckResult,
    pub(super) class: ClassId,
    pub(super) effects: Effects,
    pub(super) ret: Type,
    pub(super) scopes: Vec<FxHashMap<String, Type>>,
    pub(super) loop_depth: usize,
    pub(super) span: Span,
}

impl<'a> TypeChecker<'a> {
    /// Create a checker over `ctx`
    pub fn new(ctx: CheckContext<'a>) -> Self {
        Self {
            ctx,
            result: CheckResult::default(),
            class: ClassId::new(0),
            effects: Effects::NONE,
            ret: Type::Void,
            scopes: Vec::new(),
            loop_depth: 0,
            span: Span::default(),
        }
    }

    /// Check a method body declared by `class` with signature `sig`
    pub fn check_method(&mut self, class: ClassId, sig: &MethodSig, decl: &MethodDecl) -> Result<(), CheckError> {
        self.class = class;
        self.effects = Effects::of(sig);
        self.ret = sig.ret.clone();
        self.span = decl.span;
        self.loop_depth = 0;

        let mut params = FxHashMap::default();
        for (param, ty) in decl.params.iter().zip(&sig.params) {
            if params.insert(param.name.clone(), ty.clone()).is_some() {
                return Err(CheckError::DuplicateLocal {
                    name: param.name.clone(),
                    span: decl.span,
                });
            }
        }
        self.scopes = vec![params];
        let outcome = self.check_block(&decl.body);
        self.scopes.clear();
        outcome
    }

    /// Check a field initializer of `class`; initializers run with no effects
    pub fn check_initializer(&mut self, class: ClassId, ty: &Type, field: &FieldDecl) -> Result<(), CheckError> {
        self.class = class;
        self.effects = Effects::NONE;
        self.ret = ty.clone();
        self.span = field.span;
        self.scopes = vec![FxHashMap::default()];
        let outcome = match &field.init {
            Some(init) => self.expect_type(init, ty),
            None => Ok(()),
        };
        self.scopes.clear();
        outcome
    }

    /// Consume the checker, yielding the per-node results
    pub fn finish(self) -> CheckResult {
        self.result
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    pub(super) fn describe(&self, ty: &Type) -> String {
        ty.describe(self.ctx.classes)
    }

    pub(super) fn local(&self, name: &str) -> Option<&Type> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    pub(super) fn mismatch(&self, expected: &Type, actual: &Type) -> CheckError {
        CheckError::TypeMismatch {
            expected: self.describe(expected),
            actual: self.describe(actual),
            span: self.span,
        }
    }

    /// Check an expression that must produce a value
    pub(super) fn expect_value(&mut self, expr: &Expr) -> Result<Type, CheckError> {
        let ty = self.check_expr(expr)?;
        if !ty.is_value() {
            return Err(CheckError::VoidValue { span: self.span });
        }
        Ok(ty)
    }

    /// Check an expression against an expected type
    pub(super) fn expect_type(&mut self, expr: &Expr, expected: &Type) -> Result<(), CheckError> {
        let ty = self.expect_value(expr)?;
        if expected.accepts(&ty, self.ctx.classes) {
            Ok(())
        } else {
            Err(self.mismatch(expected, &ty))
        }
    }

    fn object_class(&self, ty: &Type, member: &str) -> Result<ClassId, CheckError> {
        ty.class().ok_or_else(|| CheckError::NotAnObject {
            name: member.to_string(),
            ty: self.describe(ty),
            span: self.span,
        })
    }

    fn class_name(&self, class: ClassId) -> String {
        self.ctx.classes.get(class).map(|c| c.name.clone()).unwrap_or_default()
    }

    pub(super) fn lookup_method(&self, class: ClassId, name: &str) -> Result<MethodSig, CheckError> {
        let def = self.ctx.classes.get(class);
        match def.and_then(|d| d.methods.get(name)) {
            Some(Entry::Member(sig)) => Ok(sig.clone()),
            Some(Entry::Conflict) => Err(CheckError::InheritanceConflict {
                class: self.class_name(class),
                name: name.to_string(),
                span: self.span,
            }),
            None => Err(CheckError::UndefinedMember {
                class: self.class_name(class),
                name: name.to_string(),
                span: self.span,
            }),
        }
    }

    pub(super) fn lookup_field(&self, class: ClassId, name: &str) -> Result<FieldInfo, CheckError> {
        let def = self.ctx.classes.get(class);
        match def.and_then(|d| d.fields.get(name)) {
            Some(Entry::Member(info)) => Ok(info.clone()),
            Some(Entry::Conflict) => Err(CheckError::InheritanceConflict {
                class: self.class_name(class),
                name: name.to_string(),
                span: self.span,
            }),
            None if def.and_then(|d| d.method(name)).is_some() => Err(CheckError::MethodAsValue {
                name: name.to_string(),
                span: self.span,
            }),
            None => Err(CheckError::UndefinedMember {
                class: self.class_name(class),
                name: name.to_string(),
                span: self.span,
            }),
        }
    }

    pub(super) fn resolve_class(&self, path: &[String]) -> Result<ClassId, CheckError> {
        Ok(self.ctx.resolver.resolve_class(path, self.span)?)
    }

    fn check_args(&mut self, sig: &MethodSig, args: &[Expr]) -> Result<(), CheckError> {
        if args.len() != sig.params.len() {
            return Err(CheckError::ArgumentCount {
                method: sig.name.clone(),
                expected: sig.params.len(),
                actual: args.len(),
                span: self.span,
            });
        }
        for (arg, param) in args.iter().zip(&sig.params) {
            self.expect_type(arg, param)?;
        }
        Ok(())
    }

    fn is_clonable(&self, ty: &Type) -> bool {
        match ty {
            Type::Array(_) | Type::Map(..) | Type::Set(_) => true,
            Type::Object(class) => self
                .ctx
                .clonable_class
                .is_some_and(|clonable| is_subclass(self.ctx.classes, *class, clonable)),
            _ => false,
        }
    }

    /// Place of a method receiver: the receiver object itself counts as a
    /// crossing unless it is the root of its chain
    pub(super) fn receiver_place(&self, receiver: &Expr) -> Place {
        let place = self.place_of(receiver);
        Place {
            crosses_object: place.crosses_object || !is_chain_root(receiver),
            root: place.root,
        }
    }

    /// Classify the location an access chain designates
    pub(super) fn place_of(&self, expr: &Expr) -> Place {
        match expr {
            Expr::This => Place::at(Root::This),
            Expr::Name { path } if path.len() == 1 && self.local(&path[0]).is_some() => Place::at(Root::Local),
            Expr::Name { path } => match self.result.resolution(expr) {
                Some(Resolution::Fabric(_)) => Place::at(Root::Fabric(path.join("."))),
                _ => Place::at(Root::Other),
            },
            Expr::Field { object, .. } => {
                let inner = self.place_of(object);
                Place {
                    crosses_object: inner.crosses_object || !is_chain_root(object),
                    root: inner.root,
                }
            }
            Expr::Index { object, .. } => self.place_of(object),
            _ => Place::at(Root::Other),
        }
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    /// Check an expression, recording its type
    pub(super) fn check_expr(&mut self, expr: &Expr) -> Result<Type, CheckError> {
        let ty = self.check_expr_inner(expr)?;
        self.result.expr_types.insert(node_key(expr), ty.clone());
        Ok(ty)
    }

    fn resolve(&mut self, expr: &Expr, resolution: Resolution) {
        self.result.resolutions.insert(node_key(expr), resolution);
    }

    fn check_expr_inner(&mut self, expr: &Expr) -> Result<Type, CheckError> {
        let span = self.span;
        match expr {
            Expr::Num { .. } => Ok(Type::Num),
            Expr::Str { .. } => Ok(Type::Str),
            Expr::Bool { .. } => Ok(Type::Bool),
            Expr::Null => Ok(Type::Null),
            Expr::This => Ok(Type::Object(self.class)),
            Expr::Caller => Ok(self.ctx.root_class.map(Type::Object).unwrap_or(Type::Null)),
            Expr::Random => Ok(Type::Num),

            Expr::Name { path } => {
                if let [name] = path.as_slice() {
                    if let Some(ty) = self.local(name) {
                        return Ok(ty.clone());
                    }
                }
                match self.ctx.resolver.resolve_path(path, span)? {
                    Target::Fabric(id) => {
                        self.resolve(expr, Resolution::Fabric(id));
                        Ok(Type::array(Type::Str))
                    }
                    Target::Module(_) | Target::Class(_) => Err(CheckError::NotAValue {
                        name: path.join("."),
                        span,
                    }),
                }
            }

            Expr::Field { object, name } => {
                let object_ty = self.expect_value(object)?;
                let class = self.object_class(&object_ty, name)?;
                let info = self.lookup_field(class, name)?;
                let ty = info.ty.clone();
                self.resolve(expr, Resolution::Field(info));
                Ok(ty)
            }

            Expr::Index { object, index } => {
                let object_ty = self.expect_value(object)?;
                match &object_ty {
                    Type::Array(element) => {
                        self.expect_type(index, &Type::Num)?;
                        Ok((**element).clone())
                    }
                    Type::Str => {
                        self.expect_type(index, &Type::Num)?;
                        Ok(Type::Str)
                    }
                    Type::Map(key, value) => {
                        self.expect_type(index, key)?;
                        Ok((**value).clone())
                    }
                    Type::Tuple(elements) => {
                        let len = elements.len();
                        let position = match index.as_ref() {
                            Expr::Num { value } if value.fract() == 0.0 && *value >= 0.0 && (*value as usize) < len => {
                                *value as usize
                            }
                            _ => return Err(CheckError::TupleIndex { len, span }),
                        };
                        self.check_expr(index)?;
                        self.resolve(expr, Resolution::TupleIndex(position));
                        Ok(elements[position].clone())
                    }
                    other => Err(CheckError::NotIndexable {
                        ty: self.describe(other),
                        span,
                    }),
                }
            }

            Expr::Call { object, method, args } => {
                let object_ty = self.expect_value(object)?;
                let class = self.object_class(&object_ty, method)?;
                let sig = self.lookup_method(class, method)?;
                let place = self.receiver_place(object);
                self.effects
                    .require(call_requirement(&sig, &place), || format!("Calling '{}'", method), span)?;
                self.check_args(&sig, args)?;
                let ret = sig.ret.clone();
                self.resolve(expr, Resolution::Method(sig));
                Ok(ret)
            }

            Expr::SuperCall { method, args } => {
                let parents = self
                    .ctx
                    .classes
                    .get(self.class)
                    .map(|c| c.parents.clone())
                    .unwrap_or_default();
                let mut found = None;
                for parent in parents {
                    match self.ctx.classes.get(parent).and_then(|c| c.methods.get(method)) {
                        Some(Entry::Member(sig)) => {
                            found = Some((parent, sig.clone()));
                            break;
                        }
                        Some(Entry::Conflict) => {
                            return Err(CheckError::InheritanceConflict {
                                class: self.class_name(parent),
                                name: method.clone(),
                                span,
                            })
                        }
                        None => {}
                    }
                }
                let (parent, sig) = found.ok_or_else(|| CheckError::NoSuperMethod {
                    class: self.class_name(self.class),
                    name: method.clone(),
                    span,
                })?;
                self.effects.require(
                    call_requirement(&sig, &Place::at(Root::This)),
                    || format!("Calling 'super.{}'", method),
                    span,
                )?;
                self.check_args(&sig, args)?;
                let ret = sig.ret.clone();
                self.resolve(expr, Resolution::SuperMethod { parent, sig });
                Ok(ret)
            }

            Expr::New { ty } => {
                let ty = self.ctx.resolver.resolve_type(ty, span)?;
                match &ty {
                    Type::Object(class) => {
                        self.resolve(expr, Resolution::Class(*class));
                        Ok(ty)
                    }
                    Type::Array(_) | Type::Map(..) | Type::Set(_) => Ok(ty),
                    other => Err(CheckError::NotInstantiable {
                        ty: self.describe(other),
                        span,
                    }),
                }
            }

            Expr::Binary { op, left, right } => {
                let l = self.expect_value(left)?;
                let r = self.expect_value(right)?;
                self.check_binary(*op, &l, &r)
            }

            Expr::Unary { op, operand } => {
                let (expected, result) = match op {
                    UnaryOp::Neg => (Type::Num, Type::Num),
                    UnaryOp::Not => (Type::Bool, Type::Bool),
                };
                self.expect_type(operand, &expected)?;
                Ok(result)
            }

            Expr::Array { elements } => {
                if elements.is_empty() {
                    return Err(CheckError::EmptyArrayLiteral { span });
                }
                let mut types = Vec::with_capacity(elements.len());
                for element in elements {
                    types.push(self.expect_value(element)?);
                }
                let common = types
                    .iter()
                    .find(|t| **t != Type::Null)
                    .cloned()
                    .ok_or(CheckError::EmptyArrayLiteral { span })?;
                for ty in &types {
                    let fits = *ty == common || (*ty == Type::Null && common.is_nullable());
                    if !fits {
                        return Err(CheckError::MixedArrayLiteral {
                            first: self.describe(&common),
                            other: self.describe(ty),
                            span,
                        });
                    }
                }
                Ok(Type::array(common))
            }

            Expr::Tuple { elements } => {
                let mut types = Vec::with_capacity(elements.len());
                for element in elements {
                    types.push(self.expect_value(element)?);
                }
                Ok(Type::Tuple(types))
            }

            Expr::Cast { value, ty } => {
                let from = self.expect_value(value)?;
                let to = self.ctx.resolver.resolve_type(ty, span)?;
                if !from.equals(&to, Relation::Castable, self.ctx.classes) {
                    return Err(CheckError::InvalidCast {
                        from: self.describe(&from),
                        to: self.describe(&to),
                        span,
                    });
                }
                Ok(to)
            }

            Expr::Clone { value } => {
                let ty = self.expect_value(value)?;
                if !self.is_clonable(&ty) {
                    return Err(CheckError::NotClonable {
                        ty: self.describe(&ty),
                        span,
                    });
                }
                Ok(ty)
            }

            Expr::Len { value } => match self.expect_value(value)? {
                Type::Str | Type::Array(_) | Type::Map(..) | Type::Set(_) => Ok(Type::Num),
                other => Err(CheckError::InvalidOperands {
                    op: "len".to_string(),
                    left: self.describe(&other),
                    right: String::new(),
                    span,
                }),
            },

            Expr::Has { collection, key } => {
                let collection_ty = self.expect_value(collection)?;
                match &collection_ty {
                    Type::Map(k, _) | Type::Set(k) => {
                        self.expect_type(key, k)?;
                        Ok(Type::Bool)
                    }
                    other => Err(CheckError::InvalidOperands {
                        op: "has".to_string(),
                        left: self.describe(other),
                        right: String::new(),
                        span,
                    }),
                }
            }

            Expr::Is { value, class } => {
                let ty = self.expect_value(value)?;
                self.object_class(&ty, "is")?;
                let class = self.resolve_class(class)?;
                self.resolve(expr, Resolution::Class(class));
                Ok(Type::Bool)
            }

            Expr::Suggest { steps } => {
                for step in steps {
                    self.check_step(step)?;
                }
                Ok(Type::Suggestion)
            }
        }
    }

    fn check_step(&mut self, step: &SuggestStep) -> Result<(), CheckError> {
        let resolution = match step {
            SuggestStep::Extend { target, class } | SuggestStep::Retract { target, class } => {
                let ty = self.expect_value(target)?;
                self.object_class(&ty, "extend")?;
                Resolution::Class(self.resolve_class(class)?)
            }
            SuggestStep::Call { target, method, args } => {
                let ty = self.expect_value(target)?;
                let class = self.object_class(&ty, method)?;
                let sig = self.lookup_method(class, method)?;
                self.check_args(&sig, args)?;
                Resolution::Method(sig)
            }
        };
        self.result.steps.insert(node_key(step), resolution);
        Ok(())
    }

    fn check_binary(&self, op: BinaryOp, l: &Type, r: &Type) -> Result<Type, CheckError> {
        let classes = self.ctx.classes;
        let invalid = || CheckError::InvalidOperands {
            op: op.as_str().to_string(),
            left: self.describe(l),
            right: self.describe(r),
            span: self.span,
        };
        match op {
            BinaryOp::Add => match (l, r) {
                (Type::Num, Type::Num) => Ok(Type::Num),
                (Type::Str, other) | (other, Type::Str)
                    if other.equals(&Type::Str, Relation::Castable, classes) =>
                {
                    Ok(Type::Str)
                }
                _ => Err(invalid()),
            },
            BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => match (l, r) {
                (Type::Num, Type::Num) => Ok(Type::Num),
                _ => Err(invalid()),
            },
            BinaryOp::Eq | BinaryOp::Ne => {
                if l.comparable(r, classes) {
                    Ok(Type::Bool)
                } else {
                    Err(invalid())
                }
            }
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => match (l, r) {
                (Type::Num, Type::Num) | (Type::Str, Type::Str) => Ok(Type::Bool),
                _ => Err(invalid()),
            },
            BinaryOp::And | BinaryOp::Or => match (l, r) {
                (Type::Bool, Type::Bool) => Ok(Type::Bool),
                _ => Err(invalid()),
            },
        }
    }
}

/// `this` and bare names start an access chain
fn is_chain_root(expr: &Expr) -> bool {
    matches!(expr, Expr::This | Expr::Name { .. })
}
