pub mod config;
pub mod directions;
pub mod fetch;
pub mod output;
pub mod route;
pub mod sampler;
pub mod stats;
pub mod store;
pub mod window;
