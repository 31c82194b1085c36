use aes_gcm::{
    Aes256Gcm, KeyInit, Nonce,
    aead::{Aead, OsRng},
};
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};

use crate::error::AppError;

/// アクセストークン暗号化サービス
///
/// キーは `TOKEN_ENCRYPTION_KEY` 専用。用途はプロバイダーの access_token / refresh_token の
/// 保存時暗号化のみで、他の秘密情報とは共有しない。暗号文は `social_accounts` の
/// `*_encrypted` 列に入る。
///
/// # Security
/// - トークンは AES-256-GCM で暗号化して DB 保存
/// - 保存形式: 96ビット nonce (12バイト) + 暗号文
/// - 平文トークンはログに出力しない
#[derive(Clone)]
pub struct TokenCipher {
    encryption_key: [u8; 32],
}

impl TokenCipher {
    /// 新しい TokenCipher を作成
    ///
    /// # Arguments
    /// * `encryption_key_base64` - Base64エンコードされた32バイトの暗号化キー
    pub fn new(encryption_key_base64: &str) -> Result<Self, AppError> {
        use base64::{Engine as _, engine::general_purpose::STANDARD};

        let key_bytes = STANDARD.decode(encryption_key_base64).map_err(|e| {
            tracing::error!(error = ?e, "トークン暗号化キーのBase64デコードエラー");
            AppError::Internal(anyhow::anyhow!("invalid encryption key format"))
        })?;

        if key_bytes.len() != 32 {
            tracing::error!(
                expected = 32,
                actual = key_bytes.len(),
                "トークン暗号化キーの長さが不正"
            );
            return Err(AppError::Internal(anyhow::anyhow!(
                "encryption key must be 32 bytes"
            )));
        }

        let mut encryption_key = [0u8; 32];
        encryption_key.copy_from_slice(&key_bytes);

        Ok(Self { encryption_key })
    }

    pub fn encrypt(&self, token: &SecretString) -> Result<Vec<u8>, AppError> {
        let cipher = self.cipher()?;

        let mut nonce_bytes = [0u8; 12];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, token.expose_secret().as_bytes())
            .map_err(|e| {
                tracing::error!(error = ?e, "トークン暗号化エラー");
                AppError::Internal(anyhow::anyhow!("encryption error"))
            })?;

        let mut result = Vec::with_capacity(12 + ciphertext.len());
        result.extend_from_slice(&nonce_bytes);
        result.extend_from_slice(&ciphertext);

        Ok(result)
    }

    pub fn decrypt(&self, encrypted: &[u8]) -> Result<SecretString, AppError> {
        if encrypted.len() < 12 {
            tracing::error!(len = encrypted.len(), "暗号化データが短すぎる");
            return Err(AppError::Internal(anyhow::anyhow!(
                "encrypted data too short"
            )));
        }

        let cipher = self.cipher()?;
        let (nonce_bytes, ciphertext) = encrypted.split_at(12);
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext = cipher.decrypt(nonce, ciphertext).map_err(|e| {
            tracing::error!(error = ?e, "トークン復号エラー");
            AppError::Internal(anyhow::anyhow!("decryption error"))
        })?;

        String::from_utf8(plaintext)
            .map(SecretString::from)
            .map_err(|e| {
                tracing::error!(error = ?e, "復号データのUTF-8変換エラー");
                AppError::Internal(anyhow::anyhow!("invalid utf8 after decryption"))
            })
    }

    fn cipher(&self) -> Result<Aes256Gcm, AppError> {
        Aes256Gcm::new_from_slice(&self.encryption_key).map_err(|e| {
            tracing::error!(error = ?e, "AES-GCM暗号化器の初期化エラー");
            AppError::Internal(anyhow::anyhow!("cipher initialization error"))
        })
    }
}
