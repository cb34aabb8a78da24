//! sparse factorizations and the orderings they rely on

pub mod ordering;
pub mod qr;
