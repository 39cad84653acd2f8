pub mod addresses;
pub mod tokens;
pub mod transactions;
