//! Interned symbols
use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::rc::Rc;

thread_local! {
    static SYMBOL_TABLE: RefCell<HashSet<Rc<str>>> = RefCell::new(HashSet::new());
}

/// An interned name. Two symbols with the same name share one allocation,
/// so comparing and hashing them never looks at the characters.
#[derive(Clone)]
pub struct Symbol(Rc<str>);

impl Symbol {
    pub fn intern(name: &str) -> Symbol {
        SYMBOL_TABLE.with(|table| {
            let mut table = table.borrow_mut();
            if let Some(existing) = table.get(name) {
                return Symbol(existing.clone());
            }
            let interned: Rc<str> = Rc::from(name);
            table.insert(interned.clone());
            Symbol(interned)
        })
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl<'a> From<&'a str> for Symbol {
    fn from(name: &str) -> Symbol {
        Symbol::intern(name)
    }
}

impl From<String> for Symbol {
    fn from(name: String) -> Symbol {
        Symbol::intern(&name)
    }
}

impl Deref for Symbol {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Symbol) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Symbol {}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (self.0.as_ptr() as usize).hash(state)
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "'{}", &*self.0)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}
