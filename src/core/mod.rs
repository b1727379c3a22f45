pub mod context;
pub mod server;

pub use context::UrlBuilder;
pub use server::Server;
