pub mod author;
pub mod db;
pub mod publish;
pub mod server;
pub mod storage;
pub mod version;
pub mod web;
