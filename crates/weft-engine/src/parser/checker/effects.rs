//! Mutation effects
//!
//! A method carries two qualifiers: `mutating` (may mutate anything it can
//! reach) and `mutating this` (may mutate its receiver). Every write and
//! every call of a qualified method is classified by where the mutated
//! location is rooted, and the result is a [`Requirement`] the enclosing
//! method's [`Effects`] must satisfy.

use super::error::CheckError;
use crate::parser::types::MethodSig;
use crate::parser::Span;

/// Qualifiers of the enclosing method
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Effects {
    /// May mutate any reachable object
    pub mutating: bool,
    /// May mutate `this`
    pub mutating_this: bool,
}

impl Effects {
    /// No effects (field initializers)
    pub const NONE: Effects = Effects {
        mutating: false,
        mutating_this: false,
    };

    /// Qualifiers with `mutating` implying `mutating this`
    pub fn new(mutating: bool, mutating_this: bool) -> Self {
        Self {
            mutating,
            mutating_this: mutating_this || mutating,
        }
    }

    /// Qualifiers declared by a signature
    pub fn of(sig: &MethodSig) -> Self {
        Self::new(sig.mutating, sig.mutating_this)
    }

    /// Whether these effects satisfy `requirement`
    pub fn allows(&self, requirement: Requirement) -> bool {
        match requirement {
            Requirement::None => true,
            Requirement::MutatingThis => self.mutating_this,
            Requirement::Mutating => self.mutating,
        }
    }

    /// Fail with [`CheckError::MutationDenied`] unless `requirement` holds
    pub fn require(
        &self,
        requirement: Requirement,
        action: impl FnOnce() -> String,
        span: Span,
    ) -> Result<(), CheckError> {
        if self.allows(requirement) {
            return Ok(());
        }
        Err(CheckError::MutationDenied {
            action: action(),
            required: requirement.qualifier(),
            span,
        })
    }
}

/// Qualifier an operation needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Requirement {
    /// Always allowed
    None,
    /// Needs `mutating this`
    MutatingThis,
    /// Needs `mutating`
    Mutating,
}

impl Requirement {
    /// Qualifier spelling for diagnostics
    pub fn qualifier(&self) -> &'static str {
        match self {
            Requirement::None => "plain",
            Requirement::MutatingThis => "mutating this",
            Requirement::Mutating => "mutating",
        }
    }
}

/// Where an access chain starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Root {
    /// `this` or `super`
    This,
    /// A local variable or parameter
    Local,
    /// A module-level fabric
    Fabric(String),
    /// Anything else (parameters' fields reached through calls, `caller`, ...)
    Other,
}

/// Classification of a mutated location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Place {
    /// Root of the access chain
    pub root: Root,
    /// The chain passes through an object other than its root
    pub crosses_object: bool,
}

impl Place {
    /// A place rooted at `root` without intermediate objects
    pub fn at(root: Root) -> Self {
        Self {
            root,
            crosses_object: false,
        }
    }

    /// Whether the chain starts at `this`
    pub fn is_this_rooted(&self) -> bool {
        self.root == Root::This
    }
}

/// Requirement for writing into `place`.
///
/// `primitive_slot` is set for assignments of a non-object, non-container
/// slot; such writes through a this-rooted chain only need `mutating this`.
pub fn write_requirement(place: &Place, primitive_slot: bool) -> Requirement {
    match place.root {
        Root::This if !place.crosses_object || primitive_slot => Requirement::MutatingThis,
        _ => Requirement::Mutating,
    }
}

/// Requirement for calling `sig` on a receiver at `receiver`
pub fn call_requirement(sig: &MethodSig, receiver: &Place) -> Requirement {
    if sig.mutating {
        return Requirement::Mutating;
    }
    if !sig.mutating_this {
        return Requirement::None;
    }
    match receiver.root {
        Root::This => Requirement::MutatingThis,
        _ => Requirement::Mutating,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::types::{ClassId, Type};

    fn sig(mutating: bool, mutating_this: bool) -> MethodSig {
        MethodSig {
            owner: ClassId::new(0),
            name: "m".to_string(),
            mutating,
            mutating_this,
            ret: Type::Void,
            params: vec![],
        }
    }

    fn crossing(root: Root) -> Place {
        Place {
            root,
            crosses_object: true,
        }
    }

    #[test]
    fn test_mutating_implies_mutating_this() {
        let effects = Effects::new(true, false);
        assert!(effects.allows(Requirement::MutatingThis));
        assert!(!Effects::NONE.allows(Requirement::MutatingThis));
        assert!(Effects::NONE.allows(Requirement::None));
    }

    #[test]
    fn test_call_requirements() {
        let this_field = Place::at(Root::This);
        let other = Place::at(Root::Other);
        assert_eq!(call_requirement(&sig(false, true), &this_field), Requirement::MutatingThis);
        assert_eq!(call_requirement(&sig(false, true), &other), Requirement::Mutating);
        assert_eq!(call_requirement(&sig(true, true), &this_field), Requirement::Mutating);
        assert_eq!(call_requirement(&sig(false, false), &other), Requirement::None);
        assert_eq!(call_requirement(&sig(false, true), &Place::at(Root::Local)), Requirement::Mutating);
    }

    #[test]
    fn test_write_requirements() {
        assert_eq!(write_requirement(&Place::at(Root::This), false), Requirement::MutatingThis);
        assert_eq!(write_requirement(&crossing(Root::This), false), Requirement::Mutating);
        assert_eq!(write_requirement(&crossing(Root::This), true), Requirement::MutatingThis);
        assert_eq!(write_requirement(&Place::at(Root::Other), true), Requirement::Mutating);
        assert_eq!(write_requirement(&Place::at(Root::Local), false), Requirement::Mutating);
        assert_eq!(write_requirement(&Place::at(Root::Local), true), Requirement::Mutating);
    }

    #[test]
    fn test_denial_message() {
        let err = Effects::new(false, true)
            .require(Requirement::Mutating, || "Enforcing a suggestion".to_string(), Span::default())
            .unwrap_err();
        assert_eq!(err.to_string(), "Enforcing a suggestion requires a mutating method");
    }
}
