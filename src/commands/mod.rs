mod capture;
mod common;
mod copy;
mod resolve;
mod share;
mod upload;

pub use capture::run_capture;
pub use copy::run_copy;
pub use resolve::run_resolve;
pub use share::run_share;
pub use upload::run_upload;
