//! Suggestions and their enforcement
//!
//! A suggestion is an ordered batch of extend, retract and method-call
//! steps. Enforcing it runs every extend first, then every call, then
//! every retract, whatever order the steps were suggested in. A batch can
//! therefore grant a capability, use it, and take it away again.
//!
//! Call steps dispatch by slot against the target's method table at the
//! time the call phase reaches them, with the caller and arguments
//! recorded when the suggestion was built. A null target or a slot the
//! target no longer implements is skipped.

use super::value::Value;
use super::{Runtime, VmResult};
use crate::compiler::classes::ClassId;
use crate::parser::types::MethodSlot;
use tracing::debug;

/// One suggested step
#[derive(Debug, Clone)]
pub enum Step {
    /// Put `class` on `target`
    Extend {
        /// Target object (may be null)
        target: Value,
        /// Class to wear
        class: ClassId,
    },
    /// Take `class` off `target`
    Retract {
        /// Target object (may be null)
        target: Value,
        /// Class to remove
        class: ClassId,
    },
    /// Call a method on `target`
    Call {
        /// Receiver (may be null)
        target: Value,
        /// Object that built the suggestion
        caller: Value,
        /// Dispatch slot
        slot: MethodSlot,
        /// Arguments, evaluated when the suggestion was built
        args: Vec<Value>,
    },
}

/// Ordered batch of steps
#[derive(Debug, Clone, Default)]
pub struct Suggestion {
    steps: Vec<Step>,
}

impl Suggestion {
    /// Empty suggestion
    pub fn new() -> Self {
        Self::default()
    }

    /// Suggestion made of `steps`
    pub fn from_steps(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    /// Steps in suggested order
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Number of steps
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether there is nothing to enforce
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// `self` followed by `other`
    pub fn merged(&self, other: &Suggestion) -> Suggestion {
        let mut steps = Vec::with_capacity(self.len() + other.len());
        steps.extend_from_slice(&self.steps);
        steps.extend_from_slice(&other.steps);
        Suggestion { steps }
    }
}

impl Runtime {
    /// Apply a suggestion: extends, then calls, then retracts
    pub fn enforce(&mut self, suggestion: &Suggestion) -> VmResult<()> {
        debug!(steps = suggestion.len(), "enforcing suggestion");

        for step in suggestion.steps() {
            if let Step::Extend { target, class } = step {
                match target.as_object() {
                    Some(obj) => self.extend(obj, *class)?,
                    None => debug!(class = class.as_u32(), "skipping extend of null target"),
                }
            }
        }

        for step in suggestion.steps() {
            if let Step::Call {
                target,
                caller,
                slot,
                args,
            } = step
            {
                let unit = target.as_object().and_then(|obj| obj.borrow().vtable().get(slot).cloned());
                match unit {
                    Some(unit) => {
                        self.invoke(&unit, target.clone(), caller.clone(), args.clone())?;
                    }
                    None => debug!(method = %slot, "skipping call step without a target method"),
                }
            }
        }

        for step in suggestion.steps() {
            if let Step::Retract { target, class } = step {
                match target.as_object() {
                    Some(obj) => self.retract(obj, *class)?,
                    None => debug!(class = class.as_u32(), "skipping retract of null target"),
                }
            }
        }

        debug!("suggestion enforced");
        Ok(())
    }
}
