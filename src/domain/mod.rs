pub mod product;
pub mod cart;
pub mod events;

pub use product::*;
pub use cart::*;
pub use events::*;
