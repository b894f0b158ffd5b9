// src/check/mod.rs
mod check;
mod descriptor;
mod result;

pub use check::{Check, CheckBuilder, CheckFn, Checker};
pub use descriptor::{Desc, DescBuilder, ValidationError};
pub use result::{CheckError, CheckResult, Failure, Status};
