mod http_server;

pub use http_server::{HttpServer, EXPOSITION_CONTENT_TYPE};
