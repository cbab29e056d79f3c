//! Dotted-name and type-expression resolution
//!
//! The first segment of a path is looked up in the module's own symbol
//! table; every further segment steps through the export table of the
//! module named so far.

use super::error::ResolveError;
use super::symbols::{SymbolTable, Target};
use crate::compiler::classes::ClassId;
use crate::compiler::module::{ModuleId, ModuleRegistry};
use crate::parser::ast::TypeExpr;
use crate::parser::types::Type;
use crate::parser::Span;

/// Resolves names against one module's symbol table and the registry
pub struct NameResolver<'a> {
    modules: &'a ModuleRegistry,
    symbols: &'a SymbolTable,
}

impl<'a> NameResolver<'a> {
    /// Create a resolver for the module owning `symbols`
    pub fn new(modules: &'a ModuleRegistry, symbols: &'a SymbolTable) -> Self {
        Self { modules, symbols }
    }

    /// Resolve a dotted path to its target
    pub fn resolve_path(&self, path: &[String], span: Span) -> Result<Target, ResolveError> {
        let (first, rest) = path.split_first().ok_or(ResolveError::EmptyPath { span })?;
        let mut target = self
            .symbols
            .lookup(first)
            .map(|binding| binding.target)
            .ok_or_else(|| ResolveError::UndefinedSymbol {
                name: first.clone(),
                span,
            })?;

        for (i, step) in rest.iter().enumerate() {
            let Target::Module(module) = target else {
                return Err(ResolveError::InvalidPathStep {
                    path: path.join("."),
                    step: step.clone(),
                    parent: path[i].clone(),
                    span,
                });
            };
            target = self
                .modules
                .get(module)
                .and_then(|m| m.exports.get(step))
                .ok_or_else(|| ResolveError::UndefinedSymbol {
                    name: path[..=i + 1].join("."),
                    span,
                })?;
        }
        Ok(target)
    }

    /// Resolve a dotted path that must name a class
    pub fn resolve_class(&self, path: &[String], span: Span) -> Result<ClassId, ResolveError> {
        match self.resolve_path(path, span)? {
            Target::Class(id) => Ok(id),
            _ => Err(ResolveError::NotAClass {
                path: path.join("."),
                span,
            }),
        }
    }

    /// Resolve a dotted path that must name a module
    pub fn resolve_module(&self, path: &[String], span: Span) -> Result<ModuleId, ResolveError> {
        match self.resolve_path(path, span)? {
            Target::Module(id) => Ok(id),
            _ => Err(ResolveError::NotAModule {
                path: path.join("."),
                span,
            }),
        }
    }

    /// Resolve a type expression
    pub fn resolve_type(&self, ty: &TypeExpr, span: Span) -> Result<Type, ResolveError> {
        Ok(match ty {
            TypeExpr::Num => Type::Num,
            TypeExpr::String => Type::Str,
            TypeExpr::Bool => Type::Bool,
            TypeExpr::Void => Type::Void,
            TypeExpr::Suggestion => Type::Suggestion,
            TypeExpr::Array { element } => Type::array(self.resolve_type(element, span)?),
            TypeExpr::Set { element } => Type::set(self.resolve_type(element, span)?),
            TypeExpr::Map { key, value } => {
                Type::map(self.resolve_type(key, span)?, self.resolve_type(value, span)?)
            }
            TypeExpr::Tuple { elements } => Type::Tuple(
                elements
                    .iter()
                    .map(|el| self.resolve_type(el, span))
                    .collect::<Result<_, _>>()?,
            ),
            TypeExpr::Named { path } => Type::Object(self.resolve_class(path, span)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::module::Module;

    fn path(s: &str) -> Vec<String> {
        s.split('.').map(String::from).collect()
    }

    /// Registry with module 0 exporting `Shape` and module 1 exporting `geo` -> module 0
    fn registry() -> ModuleRegistry {
        let mut modules = ModuleRegistry::new();
        let mut shapes = Module::new("shapes", false, [0; 32]);
        shapes.exports.insert("Shape", Target::Class(ClassId::new(5)));
        let shapes_id = modules.register(shapes);

        let mut lib = Module::new("lib", false, [0; 32]);
        lib.exports.insert("geo", Target::Module(shapes_id));
        modules.register(lib);
        modules
    }

    #[test]
    fn test_resolve_local_and_dotted() {
        let modules = registry();
        let mut symbols = SymbolTable::new();
        symbols
            .define_local("lib", Target::Module(ModuleId::new(1)), Span::default())
            .unwrap();
        symbols
            .define_local("Local", Target::Class(ClassId::new(9)), Span::default())
            .unwrap();
        let resolver = NameResolver::new(&modules, &symbols);

        assert_eq!(
            resolver.resolve_class(&path("Local"), Span::default()).unwrap(),
            ClassId::new(9)
        );
        assert_eq!(
            resolver.resolve_class(&path("lib.geo.Shape"), Span::default()).unwrap(),
            ClassId::new(5)
        );
    }

    #[test]
    fn test_invalid_path_step() {
        let modules = registry();
        let mut symbols = SymbolTable::new();
        symbols
            .define_local("lib", Target::Module(ModuleId::new(1)), Span::default())
            .unwrap();
        let resolver = NameResolver::new(&modules, &symbols);

        let err = resolver
            .resolve_path(&path("lib.geo.Shape.area"), Span::default())
            .unwrap_err();
        assert!(matches!(
            err,
            ResolveError::InvalidPathStep { ref step, ref parent, .. } if step == "area" && parent == "Shape"
        ));
    }

    #[test]
    fn test_undefined_export() {
        let modules = registry();
        let mut symbols = SymbolTable::new();
        symbols
            .define_local("lib", Target::Module(ModuleId::new(1)), Span::default())
            .unwrap();
        let resolver = NameResolver::new(&modules, &symbols);

        let err = resolver.resolve_path(&path("lib.nope"), Span::default()).unwrap_err();
        assert!(matches!(err, ResolveError::UndefinedSymbol { ref name, .. } if name == "lib.nope"));
    }

    #[test]
    fn test_resolve_nested_type() {
        let modules = ModuleRegistry::new();
        let mut symbols = SymbolTable::new();
        symbols
            .define_local("Point", Target::Class(ClassId::new(2)), Span::default())
            .unwrap();
        let resolver = NameResolver::new(&modules, &symbols);

        let ty = TypeExpr::Map {
            key: Box::new(TypeExpr::Tuple {
                elements: vec![TypeExpr::Num, TypeExpr::Num],
            }),
            value: Box::new(TypeExpr::Named { path: path("Point") }),
        };
        assert_eq!(
            resolver.resolve_type(&ty, Span::default()).unwrap(),
            Type::map(Type::Tuple(vec![Type::Num, Type::Num]), Type::Object(ClassId::new(2)))
        );

        let bad = TypeExpr::Named { path: path("Missing") };
        assert!(resolver.resolve_type(&bad, Span::default()).is_err());
    }
}
