//! PKCE (RFC 7636) の code_verifier / code_challenge 生成

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{Rng, RngCore, distributions::Alphanumeric, rngs::OsRng};
use sha2::{Digest, Sha256};

/// state パラメータの長さ
pub const STATE_LENGTH: usize = 32;

/// 32バイトのランダム値を Base64 URL-safe（パディングなし）でエンコード
///
/// 認可試行ごとに新しく生成し、使い回さないこと。
pub fn generate_code_verifier() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// code_verifier の SHA-256 を Base64 URL-safe（パディングなし）でエンコード
///
/// 同じ verifier からは常に同じ challenge が得られる。
pub fn generate_code_challenge(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

/// 英数字 32 文字の state を生成
pub fn generate_state() -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(STATE_LENGTH)
        .map(char::from)
        .collect()
}
