//! A small Scheme interpreter: S-expressions are compiled into a tree of
//! nodes which a trampolining VM runs with proper tail calls.
#[macro_use]
extern crate gc;
#[macro_use]
extern crate log;

#[macro_use]
mod helpers;

pub mod compiler;
pub mod interpreter;
pub mod reader;
pub mod symbol;
pub mod vm;
