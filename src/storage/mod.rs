pub mod memory;
pub mod table;

pub use memory::{InMemoryStore, Tables};
pub use table::Table;
