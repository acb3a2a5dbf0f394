mod algorithm;
mod digest;
mod inventory;
mod record;

pub use algorithm::*;
pub use digest::*;
pub use inventory::*;
pub use record::*;
