//! Prints an `INSERT` for the first admin account.
//!
//! Usage: `seed_admin <username> <password> [display name]`

use anyhow::{anyhow, bail};

#[path = "../password.rs"]
mod password;

fn sql_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let (Some(username), Some(secret)) = (args.next(), args.next()) else {
        bail!("usage: seed_admin <username> <password> [display name]");
    };
    let display_name = args.next().unwrap_or_else(|| "Administrator".to_string());

    if !password::is_long_enough(&secret) {
        bail!(
            "password must be at least {} characters",
            password::MIN_PASSWORD_LEN
        );
    }

    let phc = password::hash(&secret).map_err(|e| anyhow!("hash failed: {e}"))?;

    // role 1 = admin
    println!(
        "INSERT INTO app_user (username, display_name, password_hash, role, is_active) VALUES ({}, {}, {}, 1, true);",
        sql_literal(username.trim()),
        sql_literal(display_name.trim()),
        sql_literal(&phc),
    );
    Ok(())
}
