pub mod auth;
pub mod docs;
pub mod extract;
pub mod modules;
pub mod serializers;
pub mod server;
