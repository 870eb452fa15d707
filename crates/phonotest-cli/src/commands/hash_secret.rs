//! The `phonotest hash-secret` command.

use anyhow::Result;

pub fn execute(password: String) -> Result<()> {
    println!("{}", phonotest_core::auth::hash_secret(&password));
    Ok(())
}
