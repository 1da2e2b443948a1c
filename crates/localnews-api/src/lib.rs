pub mod admin;
pub mod auth;
pub mod engagement;
pub mod error;
pub mod middleware;
pub mod notify;
pub mod otp;
pub mod routes;
pub mod token;
pub mod videos;
