mod data;
mod server;
mod stream;

pub use data::*;
pub use server::*;
pub use stream::*;
