//! Product catalog domain module.
//!
//! The catalog owns product identity and display attributes. The live
//! `quantity` field is read here but only ever written by the inventory
//! ledger.

pub mod product;

pub use product::{EditProduct, NewProduct, Product, ProductDetails};
