// generate_key.rs
// Utility to generate fresh session-cookie keys

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rand::RngCore;

fn generate_key() -> String {
    let mut key = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut key);
    BASE64.encode(key)
}

fn main() {
    println!("Generating session cookie keys (AES-256)...\n");

    let hash_key = generate_key();
    let block_key = generate_key();

    println!("Add these to your .env file:");
    println!("─────────────────────────────────────────────────");
    println!("SESSION_HASH_KEY={}", hash_key);
    println!("SESSION_BLOCK_KEY={}", block_key);
    println!("─────────────────────────────────────────────────");
    println!("\nIMPORTANT:");
    println!("  • Keep these keys secure and never commit them to version control");
    println!("  • Rotating them invalidates every outstanding session cookie");
}
