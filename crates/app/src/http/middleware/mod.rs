pub mod admin_auth;
