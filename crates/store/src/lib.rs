pub mod locks;
pub mod memory;
pub mod repository;
pub mod sqlite;

pub use locks::*;
pub use memory::*;
pub use repository::*;
pub use sqlite::*;
