pub mod api;
pub mod assets;
pub mod auth;
pub mod config;
pub mod external;
pub mod models;
pub mod qr;
pub mod ratelimit;
pub mod scan;
pub mod storage;
