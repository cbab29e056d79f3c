//! Interpreter for generated units
//!
//! Units run against a frame of numbered slots. Gaps left by dynamic
//! extend/retract never trap: reading a missing field or element yields
//! the type's default, writing through a null reference is dropped, and a
//! call the receiver cannot answer returns the nil default of the call's
//! type.

use super::keys::MapKey;
use super::manifest::compute_manifest;
use super::suggestion::{Step, Suggestion};
use super::value::Value;
use super::{Runtime, VmError, VmResult};
use crate::compiler::ir::{ArithOp, Code, CompareOp, IndexKind, Op, Slot, StepCode, Unit};
use crate::parser::checker::IterKind;
use crate::parser::types::Type;
use std::cmp::Ordering;
use std::rc::Rc;
use tracing::warn;

/// Activation record of one unit
struct Frame {
    slots: Vec<Value>,
    this: Value,
    caller: Value,
}

impl Frame {
    fn get(&self, slot: Slot) -> Value {
        self.slots.get(slot).cloned().unwrap_or(Value::Null)
    }

    fn set(&mut self, slot: Slot, value: Value) {
        if let Some(target) = self.slots.get_mut(slot) {
            *target = value;
        }
    }
}

/// How a statement finished
enum Flow {
    Next,
    Break,
    Continue,
    Return(Value),
}

fn array_index(index: &Value) -> Option<usize> {
    let n = index.as_num();
    (n.fract() == 0.0 && n >= 0.0).then_some(n as usize)
}

impl Runtime {
    /// Run `unit` with `this`, `caller` and positional `args`
    pub fn invoke(&mut self, unit: &Unit, this: Value, caller: Value, args: Vec<Value>) -> VmResult<Value> {
        let limit = self.options().max_call_depth;
        if self.depth >= limit {
            return Err(VmError::CallDepthExceeded { limit });
        }

        let mut slots = vec![Value::Null; unit.slot_count.max(unit.arity)];
        for (slot, arg) in slots.iter_mut().zip(args).take(unit.arity) {
            *slot = arg;
        }
        let mut frame = Frame { slots, this, caller };

        self.depth += 1;
        let flow = self.exec_block(&mut frame, &unit.body);
        self.depth -= 1;

        match flow? {
            Flow::Return(value) => Ok(value),
            _ => Ok(self.default_value(&unit.ret, false)),
        }
    }

    fn exec_block(&mut self, frame: &mut Frame, ops: &[Op]) -> VmResult<Flow> {
        for op in ops {
            match self.exec(frame, op)? {
                Flow::Next => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Next)
    }

    fn exec(&mut self, frame: &mut Frame, op: &Op) -> VmResult<Flow> {
        match op {
            Op::Eval(code) => {
                self.eval(frame, code)?;
            }

            Op::Store { slot, value } => {
                let value = self.eval(frame, value)?;
                frame.set(*slot, value);
            }

            Op::SetField { object, field, value } => {
                let target = self.eval(frame, object)?;
                let value = self.eval(frame, value)?;
                match target {
                    Value::Object(obj) => {
                        let mut obj = obj.borrow_mut();
                        if obj.types.contains(&field.owner) {
                            obj.fields.insert(*field, value);
                        }
                    }
                    _ => warn!("field write through null reference ignored"),
                }
            }

            Op::SetIndex {
                target,
                kind,
                index,
                value,
            } => {
                let container = self.eval(frame, target)?;
                let index = self.eval(frame, index)?;
                let value = self.eval(frame, value)?;
                self.store_index(container, *kind, index, value);
            }

            Op::Append { target, value } => {
                let container = self.eval(frame, target)?;
                let value = self.eval(frame, value)?;
                match container {
                    Value::Array(array) => array.items_mut().push(value),
                    Value::Set(set) => {
                        set.items_mut().insert(MapKey::of(&value), value);
                    }
                    _ => warn!("append to null container ignored"),
                }
            }

            Op::Remove { target, value } => {
                let container = self.eval(frame, target)?;
                let key = MapKey::of(&self.eval(frame, value)?);
                match container {
                    Value::Map(map) => {
                        map.items_mut().remove(&key);
                    }
                    Value::Set(set) => {
                        set.items_mut().remove(&key);
                    }
                    _ => warn!("removal from null container ignored"),
                }
            }

            Op::If { cond, then, otherwise } => {
                let branch = if self.eval(frame, cond)?.as_bool() { then } else { otherwise };
                return self.exec_block(frame, branch);
            }

            Op::While { cond, body } => {
                while self.eval(frame, cond)?.as_bool() {
                    match self.exec_block(frame, body)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Next | Flow::Continue => {}
                    }
                }
            }

            Op::ForEach {
                source,
                kind,
                first,
                second,
                body,
            } => {
                let source = self.eval(frame, source)?;
                for (a, b) in iteration_items(&source, *kind, second.is_some()) {
                    frame.set(*first, a);
                    if let (Some(slot), Some(b)) = (second, b) {
                        frame.set(*slot, b);
                    }
                    match self.exec_block(frame, body)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Next | Flow::Continue => {}
                    }
                }
            }

            Op::Break => return Ok(Flow::Break),
            Op::Continue => return Ok(Flow::Continue),
            Op::Return(code) => return Ok(Flow::Return(self.eval(frame, code)?)),

            Op::Extend { target, class } => match self.eval(frame, target)? {
                Value::Object(obj) => self.extend(&obj, *class)?,
                _ => warn!("extend of null reference ignored"),
            },

            Op::Retract { target, class } => match self.eval(frame, target)? {
                Value::Object(obj) => self.retract(&obj, *class)?,
                _ => warn!("retract of null reference ignored"),
            },

            Op::Enforce(code) => {
                if let Value::Suggestion(suggestion) = self.eval(frame, code)? {
                    self.enforce(&suggestion)?;
                }
            }

            Op::Release(slots) => {
                for slot in slots {
                    frame.set(*slot, Value::Null);
                }
            }
        }
        Ok(Flow::Next)
    }

    fn store_index(&mut self, container: Value, kind: IndexKind, index: Value, value: Value) {
        match (container, kind) {
            (Value::Array(array), IndexKind::Array) => {
                let mut items = array.items_mut();
                match array_index(&index) {
                    Some(i) if i < items.len() => items[i] = value,
                    Some(i) if i == items.len() => items.push(value),
                    _ => warn!(index = index.as_num(), "array write out of range ignored"),
                }
            }
            (Value::Map(map), IndexKind::Map) => {
                map.items_mut().insert(MapKey::of(&index), (index, value));
            }
            _ => warn!("indexed write through null reference ignored"),
        }
    }

    fn load_index(&mut self, container: Value, kind: IndexKind, index: Value, ty: &Type) -> Value {
        let found = match (container, kind) {
            (Value::Array(array), IndexKind::Array) => {
                array_index(&index).and_then(|i| array.items().get(i).cloned())
            }
            (Value::Map(map), IndexKind::Map) => map.items().get(&MapKey::of(&index)).map(|(_, v)| v.clone()),
            (Value::Str(text), IndexKind::Str) => array_index(&index)
                .and_then(|i| text.chars().nth(i))
                .map(|c| Value::Str(c.to_string().into())),
            _ => None,
        };
        match found {
            Some(value) => value,
            None => self.default_value(ty, false),
        }
    }

    fn eval_all(&mut self, frame: &mut Frame, codes: &[Code]) -> VmResult<Vec<Value>> {
        codes.iter().map(|code| self.eval(frame, code)).collect()
    }

    fn eval(&mut self, frame: &mut Frame, code: &Code) -> VmResult<Value> {
        Ok(match code {
            Code::Num(n) => Value::Num(*n),
            Code::Str(s) => Value::Str(s.clone()),
            Code::Bool(b) => Value::Bool(*b),
            Code::Null => Value::Null,
            Code::Default { ty, constructed } => self.default_value(ty, *constructed),
            Code::Local(slot) => frame.get(*slot),
            Code::Tee { slot, value } => {
                let value = self.eval(frame, value)?;
                frame.set(*slot, value.clone());
                value
            }
            Code::This => frame.this.clone(),
            Code::Caller => frame.caller.clone(),
            Code::Const(value) => value.clone(),

            Code::GetField { object, field, ty } => {
                let stored = match self.eval(frame, object)? {
                    Value::Object(obj) => obj.borrow().field(*field).cloned(),
                    _ => None,
                };
                match stored {
                    Some(value) => value,
                    None => self.default_value(ty, false),
                }
            }

            Code::Index { object, kind, index, ty } => {
                let container = self.eval(frame, object)?;
                let index = self.eval(frame, index)?;
                self.load_index(container, *kind, index, ty)
            }

            Code::TupleGet { tuple, index } => match self.eval(frame, tuple)? {
                Value::Tuple(items) => items.get(*index).cloned().unwrap_or(Value::Null),
                _ => Value::Null,
            },

            Code::Call { object, slot, args, ret } => {
                let target = self.eval(frame, object)?;
                let args = self.eval_all(frame, args)?;
                self.dispatch(&target, slot, frame.this.clone(), args, ret)?
            }

            Code::SuperCall { parent, slot, args } => {
                let args = self.eval_all(frame, args)?;
                let manifest = compute_manifest(&self.classes, &[*parent]);
                let unit = self.manifests.vtable(&self.classes, &manifest).get(slot).cloned();
                match unit {
                    Some(unit) => self.invoke(&unit, frame.this.clone(), frame.caller.clone(), args)?,
                    None => {
                        return Err(VmError::MissingSuperMethod {
                            class: self.classes.get(*parent).map(|c| c.name.clone()).unwrap_or_default(),
                            method: slot.name.clone(),
                        })
                    }
                }
            }

            Code::New(class) => Value::Object(self.instantiate(*class)?),
            Code::NewArray => self.new_array(Vec::new()),
            Code::NewMap => self.new_map(),
            Code::NewSet => self.new_set(),
            Code::ArrayLit(elements) => {
                let items = self.eval_all(frame, elements)?;
                self.new_array(items)
            }
            Code::TupleLit(elements) => Value::Tuple(self.eval_all(frame, elements)?.into()),

            Code::Arith { op, left, right } => {
                let l = self.eval(frame, left)?.as_num();
                let r = self.eval(frame, right)?.as_num();
                Value::Num(match op {
                    ArithOp::Add => l + r,
                    ArithOp::Sub => l - r,
                    ArithOp::Mul => l * r,
                    ArithOp::Div => l / r,
                    ArithOp::Rem => l % r,
                })
            }

            Code::Concat { left, right } => {
                let l = self.eval(frame, left)?;
                let r = self.eval(frame, right)?;
                Value::Str(format!("{}{}", l.to_text(), r.to_text()).into())
            }

            Code::Compare { op, left, right } => {
                let l = self.eval(frame, left)?;
                let r = self.eval(frame, right)?;
                let ordering = match (&l, &r) {
                    (Value::Num(a), Value::Num(b)) => a.partial_cmp(b),
                    (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
                    _ => None,
                };
                Value::Bool(match (op, ordering) {
                    (_, None) => false,
                    (CompareOp::Lt, Some(o)) => o == Ordering::Less,
                    (CompareOp::Le, Some(o)) => o != Ordering::Greater,
                    (CompareOp::Gt, Some(o)) => o == Ordering::Greater,
                    (CompareOp::Ge, Some(o)) => o != Ordering::Less,
                })
            }

            Code::Equal { negate, left, right } => {
                let l = self.eval(frame, left)?;
                let r = self.eval(frame, right)?;
                Value::Bool(l.same(&r) != *negate)
            }

            Code::Logic { and, left, right } => {
                let l = self.eval(frame, left)?.as_bool();
                if l != *and {
                    Value::Bool(l)
                } else {
                    Value::Bool(self.eval(frame, right)?.as_bool())
                }
            }

            Code::Not(operand) => Value::Bool(!self.eval(frame, operand)?.as_bool()),
            Code::Neg(operand) => Value::Num(-self.eval(frame, operand)?.as_num()),

            Code::Merge { left, right } => {
                let l = self.eval(frame, left)?;
                let r = self.eval(frame, right)?;
                let merged = match (l, r) {
                    (Value::Suggestion(a), Value::Suggestion(b)) => a.merged(&b),
                    (Value::Suggestion(a), _) => (*a).clone(),
                    (_, Value::Suggestion(b)) => (*b).clone(),
                    _ => Suggestion::new(),
                };
                Value::Suggestion(Rc::new(merged))
            }

            Code::Cast { value, to } => {
                let value = self.eval(frame, value)?;
                match to {
                    Type::Str if !matches!(value, Value::Str(_)) => Value::Str(value.to_text().into()),
                    Type::Object(class) => match &value {
                        Value::Object(obj) if obj.borrow().has_type(*class) => value.clone(),
                        _ => Value::Null,
                    },
                    _ => value,
                }
            }

            Code::Clone(value) => {
                let value = self.eval(frame, value)?;
                self.clone_value(&value)
            }

            Code::Len(value) => Value::Num(match self.eval(frame, value)? {
                Value::Str(s) => s.chars().count(),
                Value::Array(a) => a.items().len(),
                Value::Map(m) => m.items().len(),
                Value::Set(s) => s.items().len(),
                _ => 0,
            } as f64),

            Code::Has { collection, key } => {
                let collection = self.eval(frame, collection)?;
                let key = MapKey::of(&self.eval(frame, key)?);
                Value::Bool(match collection {
                    Value::Map(m) => m.items().contains_key(&key),
                    Value::Set(s) => s.items().contains_key(&key),
                    _ => false,
                })
            }

            Code::Random => match frame.this.clone() {
                Value::Object(obj) => Value::Num(self.draw_random(&obj)),
                _ => Value::Num(0.0),
            },

            Code::Is { value, class } => Value::Bool(match self.eval(frame, value)? {
                Value::Object(obj) => obj.borrow().has_type(*class),
                _ => false,
            }),

            Code::Suggest(steps) => {
                let mut built = Vec::with_capacity(steps.len());
                for step in steps {
                    built.push(match step {
                        StepCode::Extend { target, class } => Step::Extend {
                            target: self.eval(frame, target)?,
                            class: *class,
                        },
                        StepCode::Retract { target, class } => Step::Retract {
                            target: self.eval(frame, target)?,
                            class: *class,
                        },
                        StepCode::Call { target, slot, args } => Step::Call {
                            target: self.eval(frame, target)?,
                            caller: frame.this.clone(),
                            slot: slot.clone(),
                            args: self.eval_all(frame, args)?,
                        },
                    });
                }
                Value::Suggestion(Rc::new(Suggestion::from_steps(built)))
            }
        })
    }
}

/// Loop variable values over a snapshot of `source`; two-variable string
/// and array loops bind the position first
fn iteration_items(source: &Value, kind: IterKind, pairs: bool) -> Vec<(Value, Option<Value>)> {
    match (source, kind) {
        (Value::Str(text), IterKind::Str) => text
            .chars()
            .enumerate()
            .map(|(i, c)| {
                let c = Value::Str(c.to_string().into());
                if pairs {
                    (Value::Num(i as f64), Some(c))
                } else {
                    (c, None)
                }
            })
            .collect(),
        (Value::Array(array), IterKind::Array) => array
            .items()
            .iter()
            .enumerate()
            .map(|(i, item)| {
                if pairs {
                    (Value::Num(i as f64), Some(item.clone()))
                } else {
                    (item.clone(), None)
                }
            })
            .collect(),
        (Value::Map(map), IterKind::Map) => map
            .items()
            .values()
            .map(|(k, v)| (k.clone(), Some(v.clone())))
            .collect(),
        (Value::Set(set), IterKind::Set) => set.items().values().map(|v| (v.clone(), None)).collect(),
        _ => Vec::new(),
    }
}
