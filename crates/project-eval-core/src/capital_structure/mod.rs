pub mod optimizer;
pub mod search_space;
