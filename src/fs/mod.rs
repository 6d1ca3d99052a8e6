//! FileSystem abstraction so build-history lookups can run against fixtures

#[cfg(test)]
mod mock;
mod real;
mod r#trait;

#[cfg(test)]
pub use mock::MockFileSystem;
pub use r#trait::FileSystem;
pub use real::RealFileSystem;
