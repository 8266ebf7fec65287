pub mod console;
pub mod http;

pub use console::ConsoleMessageDelivery;
pub use http::HttpMessageDelivery;
