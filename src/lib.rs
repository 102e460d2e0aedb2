//! # Dexdis
//!
//! A library for reading Android DEX containers and disassembling Dalvik bytecode.
//!
//! A [`dex::DexFile`] decodes every section listed in the file's map and keeps
//! them in a [`dex::ClassManager`], which resolves string, type, field and
//! method references on demand. Method code is disassembled by a linear sweep.
//!
//! # Examples
//!
//! ```no_run
//!  use dexdis::dex::{DexFile, DexOptions};
//!
//!  let bytes = std::fs::read("classes.dex").unwrap();
//!  let dex = DexFile::open(&bytes, DexOptions::default()).unwrap();
//!  for method in dex.methods() {
//!      let mut code = dex.get_method_code(method.method_idx).unwrap();
//!      print!("{}", code.listing());
//!  }
//! ```
pub mod dex;
#[cfg(test)]
mod tests;

pub use crate::dex::{DexError, DexErrorKind, DexFile, DexOptions};
