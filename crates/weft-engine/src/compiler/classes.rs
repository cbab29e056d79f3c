//! Class registry and multiple-inheritance composition
//!
//! Classes are plain data: merged method and field tables keyed by name,
//! plus the members the class declares itself. Parents are merged in
//! declared order; a name the parents disagree on becomes
//! [`Entry::Conflict`] and only fails when something uses it.

use crate::compiler::ir::Unit;
use crate::compiler::module::ModuleId;
use crate::parser::types::{ClassHierarchy, MethodSig, MethodSlot, Type};
use crate::parser::Span;
use rustc_hash::FxHashMap;
use std::rc::Rc;
use thiserror::Error;

pub use crate::parser::types::ClassId;

/// Storage key of a field: the declaring class and its declaration index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId {
    /// Declaring class
    pub owner: ClassId,
    /// Index into the owner's own fields
    pub index: u32,
}

/// A field visible in a merged table
#[derive(Debug, Clone, PartialEq)]
pub struct FieldInfo {
    /// Storage key
    pub id: FieldId,
    /// Field name
    pub name: String,
    /// Declared type
    pub ty: Type,
}

/// Merged table entry
#[derive(Debug, Clone, PartialEq)]
pub enum Entry<T> {
    /// A usable member
    Member(T),
    /// Parents disagree on this name; any use is an error
    Conflict,
}

impl<T> Entry<T> {
    /// The member, unless conflicted
    pub fn member(&self) -> Option<&T> {
        match self {
            Entry::Member(m) => Some(m),
            Entry::Conflict => None,
        }
    }
}

/// A field declared by the class itself
#[derive(Debug, Clone, PartialEq)]
pub struct OwnField {
    /// Field name
    pub name: String,
    /// Declared type
    pub ty: Type,
    /// Declaration site
    pub span: Span,
}

/// Declared member handed to composition
#[derive(Debug, Clone)]
pub enum MemberSpec {
    /// Field declaration
    Field {
        /// Field name
        name: String,
        /// Resolved type
        ty: Type,
        /// Declaration site
        span: Span,
    },
    /// Method declaration
    Method {
        /// Method name
        name: String,
        /// Resolved parameter types
        params: Vec<Type>,
        /// Resolved return type
        ret: Type,
        /// `mutating`
        mutating: bool,
        /// `mutating this`
        mutating_this: bool,
        /// `override`
        is_override: bool,
        /// Declaration site
        span: Span,
    },
}

/// Composition failures
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ComposeError {
    /// A field name already names an inherited or declared member
    #[error("Field '{name}' of class '{class}' collides with an existing member")]
    MemberCollision {
        /// Class name
        class: String,
        /// Member name
        name: String,
        /// Declaration site
        span: Span,
    },

    /// Member declared twice in the same class
    #[error("Duplicate member '{name}' in class '{class}'")]
    DuplicateMember {
        /// Class name
        class: String,
        /// Member name
        name: String,
        /// Declaration site
        span: Span,
    },

    /// Inherited method redeclared without `override`
    #[error("Method '{name}' of class '{class}' overrides an inherited method and must be marked override")]
    MissingOverride {
        /// Class name
        class: String,
        /// Method name
        name: String,
        /// Declaration site
        span: Span,
    },

    /// Override signature differs from the inherited one
    #[error("Method '{name}' of class '{class}' must have the same signature as the method it overrides")]
    OverrideMismatch {
        /// Class name
        class: String,
        /// Method name
        name: String,
        /// Declaration site
        span: Span,
    },

    /// `override` with no inherited method
    #[error("Method '{name}' of class '{class}' is marked override but overrides nothing")]
    NothingToOverride {
        /// Class name
        class: String,
        /// Method name
        name: String,
        /// Declaration site
        span: Span,
    },

    /// Override of a name the parents disagree on
    #[error("Method '{name}' of class '{class}' overrides a conflicting inherited member")]
    ConflictedOverride {
        /// Class name
        class: String,
        /// Method name
        name: String,
        /// Declaration site
        span: Span,
    },

    /// Class inherits from itself
    #[error("Class '{class}' inherits from itself")]
    InheritanceCycle {
        /// Class name
        class: String,
        /// Declaration site
        span: Span,
    },
}

impl ComposeError {
    /// Location of the offending declaration
    pub fn span(&self) -> Span {
        match self {
            ComposeError::MemberCollision { span, .. }
            | ComposeError::DuplicateMember { span, .. }
            | ComposeError::MissingOverride { span, .. }
            | ComposeError::OverrideMismatch { span, .. }
            | ComposeError::NothingToOverride { span, .. }
            | ComposeError::ConflictedOverride { span, .. }
            | ComposeError::InheritanceCycle { span, .. } => *span,
        }
    }
}

/// A composed class
#[derive(Debug, Clone)]
pub struct ClassDef {
    /// Registry id
    pub id: ClassId,
    /// Declared name
    pub name: String,
    /// Stable identifier prefix, `{module url}#{name}`
    pub prefix: String,
    /// Declaring module
    pub module: ModuleId,
    /// Resolved parents in declared order
    pub parents: Vec<ClassId>,
    /// Merged method table
    pub methods: FxHashMap<String, Entry<MethodSig>>,
    /// Merged field table
    pub fields: FxHashMap<String, Entry<FieldInfo>>,
    own_fields: Vec<OwnField>,
    own_methods: Vec<MethodSig>,
    /// Compiled bodies of the methods this class declares
    pub bodies: FxHashMap<MethodSlot, Rc<Unit>>,
    /// Compiled initializers of the fields this class declares
    pub initializers: FxHashMap<String, Rc<Unit>>,
    /// Declaration site
    pub span: Span,
}

impl ClassDef {
    fn new(id: ClassId, name: String, prefix: String, module: ModuleId, span: Span) -> Self {
        Self {
            id,
            name,
            prefix,
            module,
            parents: Vec::new(),
            methods: FxHashMap::default(),
            fields: FxHashMap::default(),
            own_fields: Vec::new(),
            own_methods: Vec::new(),
            bodies: FxHashMap::default(),
            initializers: FxHashMap::default(),
            span,
        }
    }

    /// Fields this class declares itself, in declaration order
    pub fn own_fields(&self) -> &[OwnField] {
        &self.own_fields
    }

    /// Methods this class declares itself, including overrides
    pub fn own_methods(&self) -> &[MethodSig] {
        &self.own_methods
    }

    /// Storage key of an own field
    pub fn own_field_id(&self, name: &str) -> Option<FieldId> {
        self.own_fields
            .iter()
            .position(|f| f.name == name)
            .map(|index| FieldId {
                owner: self.id,
                index: index as u32,
            })
    }

    /// Usable merged method by name
    pub fn method(&self, name: &str) -> Option<&MethodSig> {
        self.methods.get(name).and_then(Entry::member)
    }

    /// Usable merged field by name
    pub fn field(&self, name: &str) -> Option<&FieldInfo> {
        self.fields.get(name).and_then(Entry::member)
    }
}

fn merge<T: PartialEq + Clone>(table: &mut FxHashMap<String, Entry<T>>, name: &str, incoming: &Entry<T>) {
    match table.get(name) {
        None => {
            table.insert(name.to_string(), incoming.clone());
        }
        Some(existing) if existing == incoming => {}
        Some(_) => {
            table.insert(name.to_string(), Entry::Conflict);
        }
    }
}

/// Registry of every class known to an engine instance
#[derive(Debug, Default)]
pub struct ClassRegistry {
    classes: Vec<ClassDef>,
    by_prefix: FxHashMap<String, ClassId>,
}

impl ClassRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a class shell; members arrive with [`compose`](Self::compose)
    pub fn declare(&mut self, name: &str, module_url: &str, module: ModuleId, span: Span) -> ClassId {
        let id = ClassId::new(self.classes.len() as u32);
        let prefix = format!("{}#{}", module_url, name);
        self.by_prefix.insert(prefix.clone(), id);
        self.classes
            .push(ClassDef::new(id, name.to_string(), prefix, module, span));
        id
    }

    /// Class by id
    pub fn get(&self, id: ClassId) -> Option<&ClassDef> {
        self.classes.get(id.index())
    }

    /// Mutable class by id
    pub fn get_mut(&mut self, id: ClassId) -> Option<&mut ClassDef> {
        self.classes.get_mut(id.index())
    }

    /// Class by identifier prefix
    pub fn by_prefix(&self, prefix: &str) -> Option<ClassId> {
        self.by_prefix.get(prefix).copied()
    }

    /// Number of registered classes
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Whether no class is registered
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Iterate over all classes
    pub fn iter(&self) -> impl Iterator<Item = &ClassDef> {
        self.classes.iter()
    }

    /// Drop every class declared after the first `len`
    pub fn truncate(&mut self, len: usize) {
        for class in self.classes.drain(len.min(self.classes.len())..) {
            self.by_prefix.remove(&class.prefix);
        }
    }

    /// Merge `parents` into class `id`, then layer its own members on top.
    ///
    /// Parents must already be composed.
    pub fn compose(&mut self, id: ClassId, parents: Vec<ClassId>, members: Vec<MemberSpec>) -> Result<(), ComposeError> {
        let mut methods: FxHashMap<String, Entry<MethodSig>> = FxHashMap::default();
        let mut fields: FxHashMap<String, Entry<FieldInfo>> = FxHashMap::default();

        for parent in &parents {
            let Some(def) = self.get(*parent) else { continue };
            for (name, entry) in &def.methods {
                merge(&mut methods, name, entry);
            }
            for (name, entry) in &def.fields {
                merge(&mut fields, name, entry);
            }
        }

        let clashing: Vec<String> = methods
            .keys()
            .filter(|name| fields.contains_key(*name))
            .cloned()
            .collect();
        for name in clashing {
            methods.insert(name.clone(), Entry::Conflict);
            fields.insert(name, Entry::Conflict);
        }

        let class_name = self.classes[id.index()].name.clone();
        let mut own_fields = Vec::new();
        let mut own_methods: Vec<MethodSig> = Vec::new();

        for member in members {
            match member {
                MemberSpec::Field { name, ty, span } => {
                    if own_fields.iter().any(|f: &OwnField| f.name == name) {
                        return Err(ComposeError::DuplicateMember { class: class_name, name, span });
                    }
                    if methods.contains_key(&name) || fields.contains_key(&name) {
                        return Err(ComposeError::MemberCollision { class: class_name, name, span });
                    }
                    let info = FieldInfo {
                        id: FieldId {
                            owner: id,
                            index: own_fields.len() as u32,
                        },
                        name: name.clone(),
                        ty: ty.clone(),
                    };
                    fields.insert(name.clone(), Entry::Member(info));
                    own_fields.push(OwnField { name, ty, span });
                }
                MemberSpec::Method {
                    name,
                    params,
                    ret,
                    mutating,
                    mutating_this,
                    is_override,
                    span,
                } => {
                    if own_methods.iter().any(|m| m.name == name) {
                        return Err(ComposeError::DuplicateMember { class: class_name, name, span });
                    }
                    let mut sig = MethodSig {
                        owner: id,
                        name: name.clone(),
                        mutating,
                        mutating_this: mutating_this || mutating,
                        ret,
                        params,
                    };
                    match methods.get(&name) {
                        None if fields.contains_key(&name) => {
                            return Err(ComposeError::MemberCollision { class: class_name, name, span });
                        }
                        None if is_override => {
                            return Err(ComposeError::NothingToOverride { class: class_name, name, span });
                        }
                        None => {}
                        Some(Entry::Conflict) => {
                            return Err(ComposeError::ConflictedOverride { class: class_name, name, span });
                        }
                        Some(Entry::Member(_)) if !is_override => {
                            return Err(ComposeError::MissingOverride { class: class_name, name, span });
                        }
                        Some(Entry::Member(inherited)) => {
                            if *inherited != sig {
                                return Err(ComposeError::OverrideMismatch { class: class_name, name, span });
                            }
                            sig.owner = inherited.owner;
                        }
                    }
                    methods.insert(name, Entry::Member(sig.clone()));
                    own_methods.push(sig);
                }
            }
        }

        let def = &mut self.classes[id.index()];
        def.parents = parents;
        def.methods = methods;
        def.fields = fields;
        def.own_fields = own_fields;
        def.own_methods = own_methods;
        Ok(())
    }
}

impl ClassHierarchy for ClassRegistry {
    fn parents(&self, class: ClassId) -> &[ClassId] {
        self.get(class).map(|c| c.parents.as_slice()).unwrap_or(&[])
    }

    fn class_name(&self, class: ClassId) -> String {
        self.get(class)
            .map(|c| c.name.clone())
            .unwrap_or_else(|| class.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(name: &str, ty: Type) -> MemberSpec {
        MemberSpec::Field {
            name: name.to_string(),
            ty,
            span: Span::default(),
        }
    }

    fn method(name: &str, params: Vec<Type>, ret: Type, is_override: bool) -> MemberSpec {
        MemberSpec::Method {
            name: name.to_string(),
            params,
            ret,
            mutating: false,
            mutating_this: false,
            is_override,
            span: Span::default(),
        }
    }

    fn declare(reg: &mut ClassRegistry, name: &str) -> ClassId {
        reg.declare(name, "test", ModuleId::new(0), Span::default())
    }

    #[test]
    fn test_declare_assigns_prefix() {
        let mut reg = ClassRegistry::new();
        let id = declare(&mut reg, "Point");
        assert_eq!(reg.get(id).unwrap().prefix, "test#Point");
        assert_eq!(reg.by_prefix("test#Point"), Some(id));
    }

    #[test]
    fn test_inherits_parent_members() {
        let mut reg = ClassRegistry::new();
        let base = declare(&mut reg, "Base");
        reg.compose(base, vec![], vec![field("x", Type::Num), method("get", vec![], Type::Num, false)])
            .unwrap();
        let child = declare(&mut reg, "Child");
        reg.compose(child, vec![base], vec![field("y", Type::Str)]).unwrap();

        let def = reg.get(child).unwrap();
        assert_eq!(def.field("x").unwrap().id.owner, base);
        assert_eq!(def.method("get").unwrap().owner, base);
        assert_eq!(def.own_fields().len(), 1);
        assert_eq!(def.fields.len(), 2);
    }

    #[test]
    fn test_conflicting_parents_defer_error() {
        let mut reg = ClassRegistry::new();
        let a = declare(&mut reg, "A");
        reg.compose(a, vec![], vec![field("x", Type::Num)]).unwrap();
        let b = declare(&mut reg, "B");
        reg.compose(b, vec![], vec![field("x", Type::Str)]).unwrap();
        let c = declare(&mut reg, "C");
        reg.compose(c, vec![a, b], vec![]).unwrap();

        let def = reg.get(c).unwrap();
        assert_eq!(def.fields.get("x"), Some(&Entry::Conflict));
        assert!(def.field("x").is_none());
    }

    #[test]
    fn test_field_method_clash_conflicts_both_tables() {
        let mut reg = ClassRegistry::new();
        let a = declare(&mut reg, "A");
        reg.compose(a, vec![], vec![field("size", Type::Num)]).unwrap();
        let b = declare(&mut reg, "B");
        reg.compose(b, vec![], vec![method("size", vec![], Type::Num, false)])
            .unwrap();
        let c = declare(&mut reg, "C");
        reg.compose(c, vec![a, b], vec![]).unwrap();

        let def = reg.get(c).unwrap();
        assert_eq!(def.fields.get("size"), Some(&Entry::Conflict));
        assert_eq!(def.methods.get("size"), Some(&Entry::Conflict));
    }

    #[test]
    fn test_diamond_shares_members() {
        let mut reg = ClassRegistry::new();
        let root = declare(&mut reg, "Root");
        reg.compose(root, vec![], vec![field("id", Type::Num)]).unwrap();
        let left = declare(&mut reg, "Left");
        reg.compose(left, vec![root], vec![]).unwrap();
        let right = declare(&mut reg, "Right");
        reg.compose(right, vec![root], vec![]).unwrap();
        let both = declare(&mut reg, "Both");
        reg.compose(both, vec![left, right], vec![]).unwrap();

        assert!(reg.get(both).unwrap().field("id").is_some());
    }

    #[test]
    fn test_field_collision_is_immediate() {
        let mut reg = ClassRegistry::new();
        let base = declare(&mut reg, "Base");
        reg.compose(base, vec![], vec![field("x", Type::Num)]).unwrap();
        let child = declare(&mut reg, "Child");
        let err = reg.compose(child, vec![base], vec![field("x", Type::Num)]).unwrap_err();
        assert!(matches!(err, ComposeError::MemberCollision { .. }));
    }

    #[test]
    fn test_override_rules() {
        let mut reg = ClassRegistry::new();
        let base = declare(&mut reg, "Base");
        reg.compose(base, vec![], vec![method("area", vec![], Type::Num, false)])
            .unwrap();

        let missing = declare(&mut reg, "Missing");
        let err = reg
            .compose(missing, vec![base], vec![method("area", vec![], Type::Num, false)])
            .unwrap_err();
        assert!(matches!(err, ComposeError::MissingOverride { .. }));

        let mismatch = declare(&mut reg, "Mismatch");
        let err = reg
            .compose(mismatch, vec![base], vec![method("area", vec![Type::Num], Type::Num, true)])
            .unwrap_err();
        assert!(matches!(err, ComposeError::OverrideMismatch { .. }));

        let nothing = declare(&mut reg, "Nothing");
        let err = reg
            .compose(nothing, vec![base], vec![method("perimeter", vec![], Type::Num, true)])
            .unwrap_err();
        assert!(matches!(err, ComposeError::NothingToOverride { .. }));
    }

    #[test]
    fn test_override_inherits_slot() {
        let mut reg = ClassRegistry::new();
        let base = declare(&mut reg, "Base");
        reg.compose(base, vec![], vec![method("area", vec![], Type::Num, false)])
            .unwrap();
        let child = declare(&mut reg, "Child");
        reg.compose(child, vec![base], vec![method("area", vec![], Type::Num, true)])
            .unwrap();

        let def = reg.get(child).unwrap();
        assert_eq!(def.own_methods()[0].slot(), reg.get(base).unwrap().method("area").unwrap().slot());
    }

    #[test]
    fn test_mutating_implies_mutating_this() {
        let mut reg = ClassRegistry::new();
        let id = declare(&mut reg, "A");
        reg.compose(
            id,
            vec![],
            vec![MemberSpec::Method {
                name: "go".to_string(),
                params: vec![],
                ret: Type::Void,
                mutating: true,
                mutating_this: false,
                is_override: false,
                span: Span::default(),
            }],
        )
        .unwrap();
        assert!(reg.get(id).unwrap().method("go").unwrap().mutating_this);
    }

    #[test]
    fn test_truncate_forgets_prefixes() {
        let mut reg = ClassRegistry::new();
        declare(&mut reg, "Keep");
        declare(&mut reg, "Drop");
        reg.truncate(1);
        assert_eq!(reg.len(), 1);
        assert!(reg.by_prefix("test#Drop").is_none());
        assert!(reg.by_prefix("test#Keep").is_some());
    }
}
