pub mod confirm;
pub mod handle;
pub mod scan;
