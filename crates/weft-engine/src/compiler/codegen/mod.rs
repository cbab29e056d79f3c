//! Code generation
//!
//! Lowers checked method bodies and field initializers into [`Unit`]s. The
//! lowering is split across files like the statement/expression split of
//! the checker: `expr.rs` for expressions, `stmt.rs` for statements.

mod expr;
mod stmt;
pub mod temps;

use crate::compiler::ir::{Code, Op, Slot, Unit};
use crate::compiler::module::{FabricId, ModuleId, ModuleRegistry};
use crate::parser::ast::{FieldDecl, MethodDecl};
use crate::parser::checker::CheckResult;
use crate::parser::types::{MethodSig, Type};
use crate::vm::Value;
use rustc_hash::FxHashMap;
use temps::Temporaries;
use thiserror::Error;

/// Code generation failures
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CodegenError {
    /// A node reached the generator without checker results
    #[error("No type information for {what} in '{unit}'")]
    MissingCheckInfo {
        /// Unit being generated
        unit: String,
        /// What was missing
        what: String,
    },
}

/// Inputs shared by every unit of a module
pub struct CodegenContext<'a> {
    /// Per-node checker results
    pub check: &'a CheckResult,
    /// Already imported modules
    pub modules: &'a ModuleRegistry,
    /// Module being generated
    pub module: ModuleId,
    /// Fabrics of the module being generated
    pub fabrics: &'a [Value],
}

impl CodegenContext<'_> {
    fn fabric(&self, id: FabricId) -> Option<Value> {
        if id.module == self.module {
            self.fabrics.get(id.index as usize).cloned()
        } else {
            self.modules.fabric(id).cloned()
        }
    }
}

/// Lowers one unit
pub(crate) struct Lowerer<'a> {
    ctx: &'a CodegenContext<'a>,
    scopes: Vec<FxHashMap<String, Slot>>,
    temps: Temporaries,
    unit: String,
    missing: Option<String>,
}

impl<'a> Lowerer<'a> {
    fn new(ctx: &'a CodegenContext<'a>, unit: String) -> Self {
        Self {
            ctx,
            scopes: Vec::new(),
            temps: Temporaries::new(),
            unit,
            missing: None,
        }
    }

    fn local(&self, name: &str) -> Option<Slot> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name).copied())
    }

    fn bind(&mut self, name: &str, slot: Slot) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), slot);
        }
    }

    /// Note that checker results were missing; generation fails at the end
    fn missing(&mut self, what: &str) -> Code {
        if self.missing.is_none() {
            self.missing = Some(what.to_string());
        }
        Code::Null
    }

    fn flush(&mut self, ops: &mut Vec<Op>) {
        if let Some(release) = self.temps.flush() {
            ops.push(release);
        }
    }

    fn finish(self, arity: usize, ret: Type, body: Vec<Op>) -> Result<Unit, CodegenError> {
        if let Some(what) = self.missing {
            return Err(CodegenError::MissingCheckInfo { unit: self.unit, what });
        }
        Ok(Unit {
            name: self.unit,
            arity,
            slot_count: self.temps.slot_count(),
            ret,
            body,
        })
    }
}

/// Generate the unit for a method body
pub fn lower_method(ctx: &CodegenContext<'_>, class_name: &str, sig: &MethodSig, decl: &MethodDecl) -> Result<Unit, CodegenError> {
    let mut lowerer = Lowerer::new(ctx, format!("{}.{}", class_name, decl.name));
    let mut params = FxHashMap::default();
    for param in &decl.params {
        params.insert(param.name.clone(), lowerer.temps.mint());
    }
    lowerer.scopes.push(params);
    let body = lowerer.lower_block(&decl.body);
    lowerer.finish(sig.params.len(), sig.ret.clone(), body)
}

/// Generate the unit computing a field's initial value
pub fn lower_initializer(ctx: &CodegenContext<'_>, class_name: &str, field: &FieldDecl, ty: &Type) -> Result<Unit, CodegenError> {
    let mut lowerer = Lowerer::new(ctx, format!("{}.{}", class_name, field.name));
    lowerer.scopes.push(FxHashMap::default());
    let value = match &field.init {
        Some(init) => lowerer.lower_expr(init),
        None => Code::Default {
            ty: ty.clone(),
            constructed: true,
        },
    };
    lowerer.finish(0, ty.clone(), vec![Op::Return(value)])
}
