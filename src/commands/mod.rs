//! Subcommand handlers.
//!
//! Each file in this module corresponds to one user-facing command:
//!
//! | File          | Invocation            | Description                          |
//! |---------------|-----------------------|--------------------------------------|
//! | `init.rs`     | `tf-backend init`     | Scaffold a backend and `terraform init` |
//! | `list.rs`     | `tf-backend list`     | Table of S3 backends in a tree       |

pub mod init;
pub mod list;
