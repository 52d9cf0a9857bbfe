pub mod sync;
pub mod timing;
