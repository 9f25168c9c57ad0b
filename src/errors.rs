//! Error types and handling for trace recording operations

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("trace log lock poisoned by a panicking recorder")]
    LockPoisoned,
}

pub type Result<T> = std::result::Result<T, Error>;
