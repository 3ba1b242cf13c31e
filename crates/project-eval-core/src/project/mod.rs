pub mod periodicity;
pub mod snapshot;
