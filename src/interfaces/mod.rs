pub mod csv;
pub mod replay;
pub mod seed;
