pub mod device;
pub mod extent;
pub mod mount;
pub mod summary;
pub mod target;
