pub mod filejump_client;
pub mod http_client;
pub mod models;
pub mod uploader;
