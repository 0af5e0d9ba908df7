pub mod join;
pub mod leave;
