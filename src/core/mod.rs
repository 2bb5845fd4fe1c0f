pub mod auth;
pub mod menu;
pub mod session;
pub mod shadow;
pub mod timer;
