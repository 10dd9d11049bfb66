//! Identifier generation

use rand::Rng;
use uuid::Uuid;

/// RFC 3261 magic cookie every branch must start with
pub const BRANCH_MAGIC_COOKIE: &str = "z9hG4bK";

/// Random 8-hex-digit From/To tag
pub fn generate_tag() -> String {
    format!("{:08x}", rand::thread_rng().r#gen::<u32>())
}

/// Fresh transaction branch
pub fn generate_branch() -> String {
    format!("{}{:016x}", BRANCH_MAGIC_COOKIE, rand::thread_rng().r#gen::<u64>())
}

/// Globally unique Call-ID scoped to `host`
pub fn generate_call_id(host: &str) -> String {
    format!("{}@{}", Uuid::new_v4(), host)
}
