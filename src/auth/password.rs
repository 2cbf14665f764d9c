use anyhow::Context;
use lazy_static::lazy_static;
use tracing::error;

/// bcrypt work factor for every stored credential.
pub const HASH_COST: u32 = 10;

/// bcrypt reads at most this many bytes of input and ignores the rest.
pub const MAX_PASSWORD_BYTES: usize = 72;

lazy_static! {
    // Stand-in for logins against an email with no account.
    static ref DUMMY_HASH: Option<String> = hash_password("no-such-user-placeholder").ok();
}

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    if plain.len() > MAX_PASSWORD_BYTES {
        anyhow::bail!("password longer than {MAX_PASSWORD_BYTES} bytes");
    }
    bcrypt::hash(plain, HASH_COST).map_err(|e| {
        error!(error = %e, "bcrypt hash error");
        anyhow::anyhow!(e.to_string())
    })
}

/// `Ok(false)` on mismatch; `Err` only when the stored hash is unreadable.
/// Input past the bcrypt limit never matches, since no stored hash covers it.
pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    if plain.len() > MAX_PASSWORD_BYTES {
        return Ok(false);
    }
    bcrypt::verify(plain, hash).map_err(|e| {
        error!(error = %e, "bcrypt verify error");
        anyhow::anyhow!(e.to_string())
    })
}

// bcrypt is deliberately slow; keep it off the async workers.

pub async fn hash_password_blocking(plain: String) -> anyhow::Result<String> {
    tokio::task::spawn_blocking(move || hash_password(&plain))
        .await
        .context("hash task panicked")?
}

pub async fn verify_password_blocking(plain: String, hash: String) -> anyhow::Result<bool> {
    tokio::task::spawn_blocking(move || verify_password(&plain, &hash))
        .await
        .context("verify task panicked")?
}

/// Spends one verification's worth of time and discards the result, so a
/// missing account costs the same as a wrong password.
pub async fn verify_against_dummy(plain: String) {
    let _ = tokio::task::spawn_blocking(move || {
        if let Some(hash) = DUMMY_HASH.as_deref() {
            let _ = verify_password(&plain, hash);
        }
    })
    .await;
}
