//! Module loader
//!
//! Importing a module runs these phases in order, failing fast:
//!
//! 1. fetch, checksum and parse the source
//! 2. copyright and license validation
//! 3. import of the core module and every imported module
//! 4. module-scope symbols: imports, classes, fabrics, then aliases and
//!    wildcards in declaration order, exports and `main`
//! 5. class composition, parents before children
//! 6. type and effect checking of every method body and initializer
//! 7. lowering, and installation of the units into the class tables
//!
//! Classes declared by a module that fails to import are removed again.

use super::fetch::Fetch;
use super::registry::{FabricId, Module, ModuleId, ModuleRegistry};
use super::ImportError;
use crate::compiler::classes::{ClassId, ComposeError, MemberSpec};
use crate::compiler::codegen::{lower_initializer, lower_method, CodegenContext};
use crate::config::EngineOptions;
use crate::parser::ast::{self, ClassDecl, Decl, Member};
use crate::parser::checker::{CheckContext, NameResolver, ResolveError, Target, TypeChecker};
use crate::parser::types::{MethodSlot, Type};
use crate::parser::{SourceParser, Span};
use crate::vm::{Runtime, Value};
use rustc_hash::FxHashMap;
use sha2::{Digest, Sha256};
use std::rc::Rc;
use tracing::debug;

/// Imports modules into a registry and a runtime
pub struct ModuleLoader<'a> {
    fetcher: &'a dyn Fetch,
    parser: &'a dyn SourceParser,
    options: &'a EngineOptions,
    modules: &'a mut ModuleRegistry,
    runtime: &'a mut Runtime,
    in_progress: Vec<String>,
}

/// Resolved parents, members and declaration site of classes awaiting
/// composition
type Pending = FxHashMap<ClassId, (Vec<ClassId>, Vec<MemberSpec>, Span)>;

/// Composition state of a class during the topological walk
#[derive(Clone, Copy, PartialEq)]
enum Visit {
    Active,
    Done,
}

impl<'a> ModuleLoader<'a> {
    /// Create a loader over the engine's collaborators and state
    pub fn new(
        fetcher: &'a dyn Fetch,
        parser: &'a dyn SourceParser,
        options: &'a EngineOptions,
        modules: &'a mut ModuleRegistry,
        runtime: &'a mut Runtime,
    ) -> Self {
        Self {
            fetcher,
            parser,
            options,
            modules,
            runtime,
            in_progress: Vec::new(),
        }
    }

    /// Import `url` and everything it depends on; already imported modules
    /// are returned as they are
    pub fn import(&mut self, url: &str) -> Result<ModuleId, ImportError> {
        if let Some(id) = self.modules.id_of(url) {
            return Ok(id);
        }
        if let Some(start) = self.in_progress.iter().position(|u| u == url) {
            let mut chain = self.in_progress[start..].to_vec();
            chain.push(url.to_string());
            return Err(ImportError::Cycle { chain });
        }

        let text = self.fetcher.fetch(url).map_err(|source| ImportError::Fetch {
            url: url.to_string(),
            source,
        })?;
        let checksum: [u8; 32] = Sha256::digest(text.as_bytes()).into();
        let tree = self.parser.parse(url, &text)?;
        debug!(url, checksum = %hex::encode(checksum), "importing module");

        let resolve_err = |source| ImportError::Resolve {
            url: url.to_string(),
            source,
        };
        let (copyright, license) = validate_notices(url, &tree).map_err(resolve_err)?;

        let mut module = Module::new(url, self.options.is_privileged(url), checksum);
        module.copyright = copyright;
        module.license = license;

        self.in_progress.push(url.to_string());
        let mark = self.runtime.classes().len();
        let outcome = self.build(module, &tree);
        self.in_progress.pop();

        match outcome {
            Ok(module) => {
                let classes = module.classes.len();
                let checksum = module.checksum_hex();
                let id = self.modules.register(module);
                debug!(url, checksum = %checksum, classes, "imported module");
                Ok(id)
            }
            Err(err) => {
                let keep = self.first_unowned_class(mark);
                self.runtime.truncate_classes(keep);
                Err(err)
            }
        }
    }

    /// First class index past `mark` and past every class of a registered
    /// module; dependencies imported along the way keep their classes
    fn first_unowned_class(&self, mark: usize) -> usize {
        self.modules
            .iter()
            .flat_map(|m| m.classes.iter())
            .map(|c| c.index() + 1)
            .fold(mark, usize::max)
    }

    fn build(&mut self, mut module: Module, tree: &ast::Module) -> Result<Module, ImportError> {
        let url = module.url.clone();
        let resolve_err = |source| ImportError::Resolve {
            url: url.clone(),
            source,
        };

        // Dependencies
        let options = self.options;
        let is_core = url == options.core_url;
        let core = if is_core { None } else { Some(self.import(&options.core_url)?) };
        let mut imports = Vec::new();
        for decl in &tree.declarations {
            if let Decl::Import { url: dep, name, span } = decl {
                let id = self.import(dep)?;
                imports.push((name.as_str(), id, *span));
            }
        }

        let id = self.modules.next_id();

        // Module-scope declarations
        if let Some(core) = core {
            module.symbols.define_nonlocal("core", Target::Module(core), Span::default());
        }
        for (name, dep, span) in imports {
            module
                .symbols
                .define_local(name, Target::Module(dep), span)
                .map_err(resolve_err)?;
        }

        let mut classes: Vec<(ClassId, &ClassDecl)> = Vec::new();
        for decl in &tree.declarations {
            match decl {
                Decl::Class(class) => {
                    let cid = self
                        .runtime
                        .classes_mut()
                        .declare(&class.name, &url, id, class.span);
                    module.classes.push(cid);
                    classes.push((cid, class));
                    module
                        .symbols
                        .define_local(&class.name, Target::Class(cid), class.span)
                        .map_err(resolve_err)?;
                    if class.exported {
                        module.exports.insert(&class.name, Target::Class(cid));
                    }
                }
                Decl::Fabric(fabric) => {
                    let width = fabric.lines.first().map(|l| l.chars().count());
                    if fabric.lines.iter().any(|l| Some(l.chars().count()) != width) {
                        return Err(resolve_err(ResolveError::RaggedFabric {
                            name: fabric.name.clone(),
                            span: fabric.span,
                        }));
                    }
                    let lines = fabric.lines.iter().map(|l| Value::str(l)).collect();
                    let target = Target::Fabric(FabricId {
                        module: id,
                        index: module.fabrics.len() as u32,
                    });
                    module.fabrics.push(self.runtime.new_array(lines));
                    module
                        .symbols
                        .define_local(&fabric.name, target, fabric.span)
                        .map_err(resolve_err)?;
                    if fabric.exported {
                        module.exports.insert(&fabric.name, target);
                    }
                }
                _ => {}
            }
        }

        for decl in &tree.declarations {
            match decl {
                Decl::Alias {
                    name,
                    path,
                    exported,
                    span,
                } => {
                    let target = NameResolver::new(self.modules, &module.symbols)
                        .resolve_path(path, *span)
                        .map_err(resolve_err)?;
                    module.symbols.define_local(name, target, *span).map_err(resolve_err)?;
                    if *exported {
                        module.exports.insert(name, target);
                    }
                }
                Decl::Wildcard { path, span } => {
                    let source = NameResolver::new(self.modules, &module.symbols)
                        .resolve_module(path, *span)
                        .map_err(resolve_err)?;
                    let names: Vec<(String, Target)> = self
                        .modules
                        .get(source)
                        .map(|m| m.exports.iter().map(|(n, t)| (n.to_string(), t)).collect())
                        .unwrap_or_default();
                    for (name, target) in names {
                        module.symbols.define_nonlocal(&name, target, *span);
                    }
                }
                _ => {}
            }
        }

        for decl in &tree.declarations {
            if let Decl::Main { path, span } = decl {
                if module.main.is_some() {
                    return Err(resolve_err(ResolveError::MainRedeclared { span: *span }));
                }
                let class = NameResolver::new(self.modules, &module.symbols)
                    .resolve_class(path, *span)
                    .map_err(resolve_err)?;
                module.main = Some(class);
            }
        }

        // Composition
        let root = self.root_class(&module, is_core).map_err(resolve_err)?;
        self.compose_all(&module, &classes, root)?;

        // Checking
        let clonable = self.core_class(&module, is_core, &options.clonable_class);
        let check = {
            let mut checker = TypeChecker::new(CheckContext {
                classes: self.runtime.classes(),
                resolver: NameResolver::new(self.modules, &module.symbols),
                root_class: root,
                clonable_class: clonable,
            });
            for (cid, decl) in &classes {
                let def = self.runtime.classes().get(*cid);
                for member in &decl.members {
                    let outcome = match member {
                        Member::Method(method) => match def.and_then(|d| d.own_methods().iter().find(|m| m.name == method.name)) {
                            Some(sig) => checker.check_method(*cid, sig, method),
                            None => Ok(()),
                        },
                        Member::Field(field) => match def.and_then(|d| d.own_fields().iter().find(|f| f.name == field.name)) {
                            Some(own) => checker.check_initializer(*cid, &own.ty, field),
                            None => Ok(()),
                        },
                    };
                    outcome.map_err(|source| ImportError::Check {
                        url: url.clone(),
                        source,
                    })?;
                }
            }
            checker.finish()
        };

        // Lowering
        let mut units = Vec::new();
        {
            let ctx = CodegenContext {
                check: &check,
                modules: &*self.modules,
                module: id,
                fabrics: &module.fabrics,
            };
            let codegen_err = |source| ImportError::Codegen {
                url: url.clone(),
                source,
            };
            for (cid, decl) in &classes {
                let Some(def) = self.runtime.classes().get(*cid) else { continue };
                for member in &decl.members {
                    match member {
                        Member::Method(method) => {
                            if let Some(sig) = def.own_methods().iter().find(|m| m.name == method.name) {
                                let unit = lower_method(&ctx, &def.name, sig, method).map_err(codegen_err)?;
                                units.push((*cid, Installed::Body(sig.slot()), unit));
                            }
                        }
                        Member::Field(field) => {
                            let Some(own) = def.own_fields().iter().find(|f| f.name == field.name) else {
                                continue;
                            };
                            if field.init.is_some() {
                                let unit = lower_initializer(&ctx, &def.name, field, &own.ty).map_err(codegen_err)?;
                                units.push((*cid, Installed::Initializer(field.name.clone()), unit));
                            }
                        }
                    }
                }
            }
        }
        for (cid, place, unit) in units {
            let Some(def) = self.runtime.classes_mut().get_mut(cid) else { continue };
            match place {
                Installed::Body(slot) => {
                    def.bodies.insert(slot, Rc::new(unit));
                }
                Installed::Initializer(name) => {
                    def.initializers.insert(name, Rc::new(unit));
                }
            }
        }

        Ok(module)
    }

    /// Class named `name` in the core module (or in `module` when it is
    /// the core module)
    fn core_class(&self, module: &Module, is_core: bool, name: &str) -> Option<ClassId> {
        let binding = if is_core {
            module.symbols.lookup(name).map(|b| b.target)
        } else {
            self.modules
                .get_by_url(&self.options.core_url)
                .and_then(|core| core.symbols.lookup(name))
                .map(|b| b.target)
        };
        match binding {
            Some(Target::Class(class)) => Some(class),
            _ => None,
        }
    }

    /// Implicit parent of classes declared without parents; privileged
    /// modules have none
    fn root_class(&self, module: &Module, is_core: bool) -> Result<Option<ClassId>, ResolveError> {
        let root = self.core_class(module, is_core, &self.options.root_class);
        if root.is_none() && !module.privileged {
            return Err(ResolveError::MissingRootClass {
                name: self.options.root_class.clone(),
            });
        }
        Ok(root)
    }

    /// Compose every class of the module, parents first
    fn compose_all(&mut self, module: &Module, classes: &[(ClassId, &ClassDecl)], root: Option<ClassId>) -> Result<(), ImportError> {
        let url = module.url.as_str();
        let mut specs = Pending::default();
        for (cid, decl) in classes {
            let resolver = NameResolver::new(self.modules, &module.symbols);
            let mut parents = Vec::with_capacity(decl.parents.len());
            for path in &decl.parents {
                let parent = resolver.resolve_class(path, decl.span).map_err(|source| ImportError::Resolve {
                    url: url.to_string(),
                    source,
                })?;
                parents.push(parent);
            }
            if parents.is_empty() && !module.privileged {
                parents.extend(root.filter(|r| r != cid));
            }
            let members = member_specs(&resolver, decl).map_err(|source| ImportError::Resolve {
                url: url.to_string(),
                source,
            })?;
            specs.insert(*cid, (parents, members, decl.span));
        }

        let mut state: FxHashMap<ClassId, Visit> = FxHashMap::default();
        for (cid, _) in classes {
            self.compose_one(*cid, &mut specs, &mut state)
                .map_err(|source| ImportError::Compose {
                    url: url.to_string(),
                    source,
                })?;
        }
        Ok(())
    }

    fn compose_one(
        &mut self,
        cid: ClassId,
        specs: &mut Pending,
        state: &mut FxHashMap<ClassId, Visit>,
    ) -> Result<(), ComposeError> {
        match state.get(&cid) {
            Some(Visit::Done) => return Ok(()),
            Some(Visit::Active) => {
                let (class, span) = self.describe(cid, specs);
                return Err(ComposeError::InheritanceCycle { class, span });
            }
            None => {}
        }
        // classes of earlier modules are already composed
        let Some(parents) = specs.get(&cid).map(|(p, _, _)| p.clone()) else {
            return Ok(());
        };

        state.insert(cid, Visit::Active);
        for parent in &parents {
            self.compose_one(*parent, specs, state)?;
        }
        if let Some((parents, members, _)) = specs.remove(&cid) {
            self.runtime.classes_mut().compose(cid, parents, members)?;
        }
        state.insert(cid, Visit::Done);
        Ok(())
    }

    fn describe(
        &self,
        cid: ClassId,
        specs: &Pending,
    ) -> (String, Span) {
        let name = self
            .runtime
            .classes()
            .get(cid)
            .map(|c| c.name.clone())
            .unwrap_or_default();
        let span = specs.get(&cid).map(|(_, _, s)| *s).unwrap_or_default();
        (name, span)
    }
}

/// Where a lowered unit goes
enum Installed {
    Body(MethodSlot),
    Initializer(String),
}

/// Copyright lines and the license, checked before anything else
fn validate_notices(url: &str, tree: &ast::Module) -> Result<(Vec<String>, String), ResolveError> {
    let mut copyright = Vec::new();
    let mut licenses = Vec::new();
    for decl in &tree.declarations {
        match decl {
            Decl::Copyright { text, .. } => copyright.push(text.clone()),
            Decl::License { text, .. } => licenses.push(text.clone()),
            _ => {}
        }
    }
    if copyright.is_empty() {
        return Err(ResolveError::MissingCopyright { url: url.to_string() });
    }
    if licenses.len() != 1 {
        return Err(ResolveError::LicenseCount {
            url: url.to_string(),
            count: licenses.len(),
        });
    }
    Ok((copyright, licenses.remove(0)))
}

/// Resolved members of a class declaration
fn member_specs(resolver: &NameResolver<'_>, decl: &ClassDecl) -> Result<Vec<MemberSpec>, ResolveError> {
    decl.members
        .iter()
        .map(|member| {
            Ok(match member {
                Member::Field(field) => MemberSpec::Field {
                    name: field.name.clone(),
                    ty: resolver.resolve_type(&field.ty, field.span)?,
                    span: field.span,
                },
                Member::Method(method) => MemberSpec::Method {
                    name: method.name.clone(),
                    params: method
                        .params
                        .iter()
                        .map(|p| resolver.resolve_type(&p.ty, method.span))
                        .collect::<Result<Vec<Type>, _>>()?,
                    ret: resolver.resolve_type(&method.ret, method.span)?,
                    mutating: method.mutating,
                    mutating_this: method.mutating_this,
                    is_override: method.is_override,
                    span: method.span,
                },
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::module::MapFetcher;
    use crate::parser::JsonTreeParser;
    use serde_json::json;

    fn notices() -> Vec<serde_json::Value> {
        vec![
            json!({"type": "copyright", "children": {"text": "(c) test"}}),
            json!({"type": "license", "children": {"text": "MIT"}}),
        ]
    }

    fn tree(mut decls: Vec<serde_json::Value>) -> String {
        let mut all = notices();
        all.append(&mut decls);
        json!({"type": "module", "children": {"declarations": all}}).to_string()
    }

    fn class(name: &str, parents: &[&str]) -> serde_json::Value {
        let parents: Vec<Vec<&str>> = parents.iter().map(|p| vec![*p]).collect();
        json!({"type": "class", "children": {"name": name, "parents": parents, "exported": true, "members": []}})
    }

    fn core() -> String {
        tree(vec![class("Object", &[]), class("Clonable", &[])])
    }

    fn load(fetcher: &MapFetcher, url: &str) -> (Result<ModuleId, ImportError>, ModuleRegistry, Runtime) {
        let options = EngineOptions::default();
        let mut modules = ModuleRegistry::new();
        let mut runtime = Runtime::new(options.runtime.clone());
        let result = ModuleLoader::new(fetcher, &JsonTreeParser, &options, &mut modules, &mut runtime).import(url);
        (result, modules, runtime)
    }

    #[test]
    fn test_import_registers_core_first() {
        let fetcher = MapFetcher::new()
            .with("weft:core", core())
            .with("app", tree(vec![class("Thing", &[])]));
        let (result, modules, runtime) = load(&fetcher, "app");
        let app = result.unwrap();
        assert_eq!(modules.len(), 2);
        assert_eq!(modules.get_by_url("weft:core").unwrap().id, ModuleId::new(0));

        let thing = modules.get(app).unwrap().classes[0];
        let object = runtime.classes().by_prefix("weft:core#Object").unwrap();
        assert_eq!(runtime.classes().get(thing).unwrap().parents, vec![object]);
        // core classes have no implicit parent
        assert!(runtime.classes().get(object).unwrap().parents.is_empty());
    }

    #[test]
    fn test_missing_license_fails_first() {
        let broken = json!({"type": "module", "children": {"declarations": [
            {"type": "copyright", "children": {"text": "(c)"}},
            {"type": "main", "children": {"path": ["Nowhere"]}}
        ]}})
        .to_string();
        let fetcher = MapFetcher::new().with("weft:core", core()).with("app", broken);
        let (result, modules, _) = load(&fetcher, "app");
        assert!(matches!(
            result,
            Err(ImportError::Resolve {
                source: ResolveError::LicenseCount { count: 0, .. },
                ..
            })
        ));
        // core is not even fetched when the notices are wrong
        assert!(modules.is_empty());
    }

    #[test]
    fn test_import_cycle() {
        let a = tree(vec![json!({"type": "import", "children": {"url": "b", "name": "b"}})]);
        let b = tree(vec![json!({"type": "import", "children": {"url": "a", "name": "a"}})]);
        let fetcher = MapFetcher::new().with("weft:core", core()).with("a", a).with("b", b);
        let (result, _, _) = load(&fetcher, "a");
        match result {
            Err(ImportError::Cycle { chain }) => assert_eq!(chain, vec!["a", "b", "a"]),
            other => panic!("expected a cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_inheritance_cycle_and_rollback() {
        let fetcher = MapFetcher::new()
            .with("weft:core", core())
            .with("app", tree(vec![class("A", &["B"]), class("B", &["A"])]));
        let (result, _, runtime) = load(&fetcher, "app");
        assert!(matches!(
            result,
            Err(ImportError::Compose {
                source: ComposeError::InheritanceCycle { .. },
                ..
            })
        ));
        assert_eq!(runtime.classes().len(), 2);
        assert!(runtime.classes().by_prefix("app#A").is_none());
    }

    #[test]
    fn test_ragged_fabric() {
        let fabric = json!({"type": "fabric", "children": {"name": "map", "lines": ["ab", "c"]}});
        let fetcher = MapFetcher::new().with("weft:core", core()).with("app", tree(vec![fabric]));
        let (result, _, _) = load(&fetcher, "app");
        assert!(matches!(
            result,
            Err(ImportError::Resolve {
                source: ResolveError::RaggedFabric { .. },
                ..
            })
        ));
    }

    #[test]
    fn test_wildcard_and_alias() {
        let lib = tree(vec![class("Shape", &[])]);
        let app = tree(vec![
            json!({"type": "import", "children": {"url": "lib", "name": "lib"}}),
            json!({"type": "wildcard", "children": {"path": ["lib"]}}),
            json!({"type": "alias", "children": {"name": "Figure", "path": ["lib", "Shape"], "exported": true}}),
            class("Square", &["Shape"]),
            json!({"type": "main", "children": {"path": ["Square"]}}),
        ]);
        let fetcher = MapFetcher::new()
            .with("weft:core", core())
            .with("lib", lib)
            .with("app", app);
        let (result, modules, runtime) = load(&fetcher, "app");
        let app = modules.get(result.unwrap()).unwrap();
        let shape = runtime.classes().by_prefix("lib#Shape").unwrap();
        assert_eq!(app.exports.get("Figure"), Some(Target::Class(shape)));
        let main = app.main.unwrap();
        assert_eq!(runtime.classes().get(main).unwrap().parents, vec![shape]);
    }

    #[test]
    fn test_main_redeclared() {
        let fetcher = MapFetcher::new().with("weft:core", core()).with(
            "app",
            tree(vec![
                class("A", &[]),
                json!({"type": "main", "children": {"path": ["A"]}}),
                json!({"type": "main", "children": {"path": ["A"]}}),
            ]),
        );
        let (result, _, _) = load(&fetcher, "app");
        assert!(matches!(
            result,
            Err(ImportError::Resolve {
                source: ResolveError::MainRedeclared { .. },
                ..
            })
        ));
    }
}
