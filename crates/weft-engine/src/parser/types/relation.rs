//! Relations between types: exact equality, subtyping and castability

use super::ty::{ClassId, Type};
use rustc_hash::FxHashSet;

/// Strength of a type comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// Structurally identical
    Exact,
    /// Left may be used where right is expected
    Subtype,
    /// Left may be converted to right with a checked cast
    Castable,
}

/// Read access to the class parent graph
pub trait ClassHierarchy {
    /// Declared parents of a class, in order
    fn parents(&self, class: ClassId) -> &[ClassId];

    /// Display name of a class
    fn class_name(&self, class: ClassId) -> String;
}

/// Whether `class` is `ancestor` or inherits from it (reflexive, transitive)
pub fn is_subclass(classes: &dyn ClassHierarchy, class: ClassId, ancestor: ClassId) -> bool {
    if class == ancestor {
        return true;
    }
    let mut visited = FxHashSet::default();
    let mut stack = vec![class];
    while let Some(current) = stack.pop() {
        if !visited.insert(current) {
            continue;
        }
        for &parent in classes.parents(current) {
            if parent == ancestor {
                return true;
            }
            stack.push(parent);
        }
    }
    false
}

impl Type {
    /// Compare `self` against `other` under `relation`.
    ///
    /// The null type compares equal to every nullable type under the
    /// subtype and castable relations, even though it is not a subtype in
    /// the strict sense.
    pub fn equals(&self, other: &Type, relation: Relation, classes: &dyn ClassHierarchy) -> bool {
        if relation == Relation::Exact {
            return self == other;
        }
        if (*self == Type::Null && other.is_nullable()) || (*other == Type::Null && self.is_nullable()) {
            return true;
        }
        match (self, other) {
            (Type::Object(a), Type::Object(b)) => match relation {
                Relation::Subtype => is_subclass(classes, *a, *b),
                _ => is_subclass(classes, *a, *b) || is_subclass(classes, *b, *a),
            },
            (Type::Array(a), Type::Array(b)) | (Type::Set(a), Type::Set(b)) => {
                a.equals(b, relation, classes)
            }
            (Type::Map(ak, av), Type::Map(bk, bv)) => {
                ak.equals(bk, relation, classes) && av.equals(bv, relation, classes)
            }
            (Type::Tuple(a), Type::Tuple(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.equals(y, relation, classes))
            }
            (from, Type::Str) if relation == Relation::Castable => from.is_value(),
            _ => self == other,
        }
    }

    /// Whether a value of type `value` may be stored where `self` is expected
    pub fn accepts(&self, value: &Type, classes: &dyn ClassHierarchy) -> bool {
        value.equals(self, Relation::Subtype, classes)
    }

    /// Whether `==`/`!=` between the two types is meaningful
    pub fn comparable(&self, other: &Type, classes: &dyn ClassHierarchy) -> bool {
        self.is_value()
            && other.is_value()
            && (self.equals(other, Relation::Subtype, classes)
                || other.equals(self, Relation::Subtype, classes)
                || (matches!((self, other), (Type::Object(_), Type::Object(_)))
                    && self.equals(other, Relation::Castable, classes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 0 <- 1 <- 2, and 3 inherits from both 1 and 4
    struct Graph(Vec<Vec<ClassId>>);

    impl ClassHierarchy for Graph {
        fn parents(&self, class: ClassId) -> &[ClassId] {
            &self.0[class.index()]
        }

        fn class_name(&self, class: ClassId) -> String {
            format!("C{}", class.as_u32())
        }
    }

    fn graph() -> Graph {
        let c = ClassId::new;
        Graph(vec![vec![], vec![c(0)], vec![c(1)], vec![c(1), c(4)], vec![]])
    }

    fn obj(id: u32) -> Type {
        Type::Object(ClassId::new(id))
    }

    #[test]
    fn test_subtype_reflexive() {
        let g = graph();
        let samples = vec![
            Type::Num,
            Type::Str,
            Type::Null,
            obj(3),
            Type::array(obj(2)),
            Type::map(Type::Tuple(vec![Type::Num, Type::Str]), Type::set(Type::Bool)),
            Type::Suggestion,
        ];
        for t in &samples {
            assert!(t.equals(t, Relation::Subtype, &g), "{} not reflexive", t);
            assert!(t.equals(t, Relation::Exact, &g));
        }
    }

    #[test]
    fn test_subtype_transitive_along_parents() {
        let g = graph();
        assert!(obj(2).equals(&obj(1), Relation::Subtype, &g));
        assert!(obj(1).equals(&obj(0), Relation::Subtype, &g));
        assert!(obj(2).equals(&obj(0), Relation::Subtype, &g));
        assert!(obj(3).equals(&obj(0), Relation::Subtype, &g));
        assert!(obj(3).equals(&obj(4), Relation::Subtype, &g));
        assert!(!obj(0).equals(&obj(2), Relation::Subtype, &g));
        assert!(!obj(2).equals(&obj(4), Relation::Subtype, &g));
    }

    #[test]
    fn test_null_against_nullable() {
        let g = graph();
        assert!(Type::Null.equals(&obj(0), Relation::Subtype, &g));
        assert!(Type::array(Type::Num).equals(&Type::Null, Relation::Subtype, &g));
        assert!(!Type::Null.equals(&Type::Num, Relation::Subtype, &g));
        assert!(!Type::Null.equals(&obj(0), Relation::Exact, &g));
    }

    #[test]
    fn test_containers_are_covariant() {
        let g = graph();
        assert!(Type::array(obj(2)).equals(&Type::array(obj(0)), Relation::Subtype, &g));
        assert!(!Type::array(obj(0)).equals(&Type::array(obj(2)), Relation::Subtype, &g));
        assert!(!Type::Tuple(vec![Type::Num]).equals(
            &Type::Tuple(vec![Type::Num, Type::Num]),
            Relation::Subtype,
            &g
        ));
    }

    #[test]
    fn test_castable() {
        let g = graph();
        assert!(obj(0).equals(&obj(2), Relation::Castable, &g));
        assert!(!obj(0).equals(&obj(4), Relation::Castable, &g));
        assert!(Type::Num.equals(&Type::Str, Relation::Castable, &g));
        assert!(obj(4).equals(&Type::Str, Relation::Castable, &g));
        assert!(!Type::Void.equals(&Type::Str, Relation::Castable, &g));
        assert!(!Type::Str.equals(&Type::Num, Relation::Castable, &g));
    }

    #[test]
    fn test_comparable() {
        let g = graph();
        assert!(obj(0).comparable(&obj(2), &g));
        assert!(obj(2).comparable(&Type::Null, &g));
        assert!(!Type::Num.comparable(&Type::Str, &g));
        assert!(!obj(2).comparable(&obj(4), &g));
    }
}
