pub mod auth;
pub mod middleware;
pub mod rest;
pub mod state;

// Re-export the handlers to make them easily accessible to the binary
// that builds the web server router.
pub use middleware::require_auth;
pub use rest::{
    get_contract_handler, health_handler, reset_admin_handler, root_handler,
    upload_contract_handler,
};
