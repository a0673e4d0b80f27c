use gc::{Finalize, Trace};
use std::collections::hash_map;
use std::collections::HashMap;
use std::fmt::{Debug, Error as FmtError, Formatter};

use super::gc::{shared, GcShared};
use crate::symbol::Symbol;

/// A binding frame. Frames are shared by every closure created while they
/// were current, so they live behind a `GcShared` and link to their parent
/// the same way.
pub struct Environment<V: Trace + 'static> {
    pub(super) parent: Option<GcShared<Environment<V>>>,
    pub(super) bindings: HashMap<Symbol, V>,
}

impl<V: Trace> Default for Environment<V> {
    fn default() -> Environment<V> {
        Environment {
            parent: None,
            bindings: HashMap::new(),
        }
    }
}

#[derive(Debug)]
struct FmtEnvironment<'a, V: Trace + Debug + 'static> {
    parent: Option<&'a GcShared<Environment<V>>>,
    bindings: hash_map::Keys<'a, Symbol, V>,
}

impl<V: Trace + Debug> Debug for Environment<V> {
    fn fmt(&self, fmt: &mut Formatter) -> Result<(), FmtError> {
        FmtEnvironment {
            parent: self.parent.as_ref(),
            bindings: self.bindings.keys(),
        }.fmt(fmt)
    }
}

impl<V: Trace> Finalize for Environment<V> {}
unsafe impl<V: Trace> Trace for Environment<V> {
    custom_trace!(this, {
        if let Some(ref env) = this.parent {
            mark(env);
        }
        for v in this.bindings.values() {
            mark(v);
        }
    });
}

impl<V: Trace + Clone> Environment<V> {
    /// A fresh, empty frame whose parent is `parent`
    pub fn child(parent: &GcShared<Environment<V>>) -> GcShared<Environment<V>> {
        shared(Environment {
            parent: Some(parent.clone()),
            bindings: HashMap::new(),
        })
    }

    /// Overwrite the nearest existing binding of `name`. Returns `false`,
    /// leaving every frame untouched, if `name` is not bound anywhere.
    pub fn set(&mut self, name: &Symbol, value: V) -> bool {
        if let Some(slot) = self.bindings.get_mut(name) {
            *slot = value;
            return true;
        }

        let mut env = match self.parent {
            Some(ref parent) => parent.clone(),
            None => return false,
        };

        loop {
            env = {
                let mut envref = env.borrow_mut();

                if let Some(slot) = envref.bindings.get_mut(name) {
                    *slot = value;
                    return true;
                }

                match envref.parent {
                    Some(ref parent) => parent.clone(),
                    None => return false,
                }
            }
        }
    }

    /// Bind `name` in this frame only, replacing a previous binding here
    pub fn define(&mut self, name: Symbol, value: V) {
        self.bindings.insert(name, value);
    }

    pub fn get(&self, name: &Symbol) -> Option<V> {
        if let Some(value) = self.bindings.get(name) {
            return Some(value.clone());
        }

        let mut environment = self.parent.clone()?;
        loop {
            environment = {
                let borrowed = environment.borrow();
                if let Some(value) = borrowed.bindings.get(name) {
                    return Some(value.clone());
                }
                borrowed.parent.clone()?
            }
        }
    }
}
