pub mod timing;

pub use timing::process_time_middleware;
