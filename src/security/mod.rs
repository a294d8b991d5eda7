pub mod crypto;
pub mod keyset;
