use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use super::AccountStore;
use crate::error::AppError;
use crate::models::{NewSocialAccount, Platform, SocialAccount, SyncUpdate};
use crate::services::TokenCipher;

/// social_accounts テーブルの行（トークンは暗号化済み）
#[derive(FromRow)]
struct SocialAccountRow {
    id: Uuid,
    user_id: Uuid,
    platform: String,
    platform_user_id: String,
    username: String,
    display_name: Option<String>,
    access_token_encrypted: Vec<u8>,
    refresh_token_encrypted: Option<Vec<u8>>,
    token_expires_at: Option<OffsetDateTime>,
    followers_count: i64,
    is_active: bool,
    connected_at: OffsetDateTime,
    last_sync_at: Option<OffsetDateTime>,
}

const SELECT_COLUMNS: &str = r#"
    id, user_id, platform, platform_user_id, username, display_name,
    access_token_encrypted, refresh_token_encrypted, token_expires_at,
    followers_count, is_active, connected_at, last_sync_at
"#;

/// Postgres のアカウントストア
///
/// # Security
/// access_token / refresh_token は TokenCipher で暗号化して保存する
#[derive(Clone)]
pub struct SocialAccountRepository {
    pool: PgPool,
    cipher: TokenCipher,
}

impl SocialAccountRepository {
    pub fn new(pool: PgPool, cipher: TokenCipher) -> Self {
        Self { pool, cipher }
    }

    fn decode(&self, row: SocialAccountRow) -> Result<SocialAccount, AppError> {
        let platform: Platform = row.platform.parse().map_err(|e| {
            tracing::error!(error = %e, account_id = %row.id, "不正なplatform値");
            AppError::Internal(anyhow::anyhow!("invalid platform in social_accounts"))
        })?;

        let access_token = self.cipher.decrypt(&row.access_token_encrypted)?;
        let refresh_token = row
            .refresh_token_encrypted
            .as_deref()
            .map(|encrypted| self.cipher.decrypt(encrypted))
            .transpose()?;

        Ok(SocialAccount {
            id: row.id,
            user_id: row.user_id,
            platform,
            platform_user_id: row.platform_user_id,
            display_name: row.display_name.unwrap_or_else(|| row.username.clone()),
            username: row.username,
            access_token,
            refresh_token,
            token_expires_at: row.token_expires_at,
            followers_count: row.followers_count,
            is_active: row.is_active,
            connected_at: row.connected_at,
            last_sync_at: row.last_sync_at,
        })
    }
}

#[async_trait]
impl AccountStore for SocialAccountRepository {
    async fn list_active(&self, user_id: Uuid) -> Result<Vec<SocialAccount>, AppError> {
        let rows = sqlx::query_as::<_, SocialAccountRow>(&format!(
            r#"
            SELECT {SELECT_COLUMNS}
            FROM social_accounts
            WHERE user_id = $1 AND is_active = true
            ORDER BY connected_at DESC
            "#
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|row| self.decode(row)).collect()
    }

    async fn find(&self, account_id: Uuid) -> Result<Option<SocialAccount>, AppError> {
        let row = sqlx::query_as::<_, SocialAccountRow>(&format!(
            r#"
            SELECT {SELECT_COLUMNS}
            FROM social_accounts
            WHERE id = $1
            "#
        ))
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| self.decode(row)).transpose()
    }

    /// # Note
    /// (user_id, platform, platform_user_id) の部分ユニークインデックス
    /// （is_active = true のみ）で重複を判定する
    async fn insert(&self, account: NewSocialAccount) -> Result<SocialAccount, AppError> {
        let access_token_encrypted = self.cipher.encrypt(&account.access_token)?;
        let refresh_token_encrypted = account
            .refresh_token
            .as_ref()
            .map(|token| self.cipher.encrypt(token))
            .transpose()?;

        let row = sqlx::query_as::<_, SocialAccountRow>(&format!(
            r#"
            INSERT INTO social_accounts (
                user_id, platform, platform_user_id, username, display_name,
                access_token_encrypted, refresh_token_encrypted, token_expires_at,
                followers_count
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (user_id, platform, platform_user_id) WHERE is_active
            DO UPDATE SET
                username = EXCLUDED.username,
                display_name = EXCLUDED.display_name,
                access_token_encrypted = EXCLUDED.access_token_encrypted,
                refresh_token_encrypted = EXCLUDED.refresh_token_encrypted,
                token_expires_at = EXCLUDED.token_expires_at,
                followers_count = EXCLUDED.followers_count
            RETURNING {SELECT_COLUMNS}
            "#
        ))
        .bind(account.user_id)
        .bind(account.platform.as_str())
        .bind(&account.platform_user_id)
        .bind(&account.username)
        .bind(&account.display_name)
        .bind(access_token_encrypted)
        .bind(refresh_token_encrypted)
        .bind(account.token_expires_at)
        .bind(account.followers_count)
        .fetch_one(&self.pool)
        .await?;

        self.decode(row)
    }

    async fn disconnect(&self, user_id: Uuid, account_id: Uuid) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE social_accounts
            SET is_active = false
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(account_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::AccountNotFound);
        }

        Ok(())
    }

    async fn touch_sync(&self, account_id: Uuid) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE social_accounts
            SET last_sync_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(account_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::AccountNotFound);
        }

        Ok(())
    }

    async fn record_sync(
        &self,
        account_id: Uuid,
        update: SyncUpdate,
    ) -> Result<SocialAccount, AppError> {
        let access_token_encrypted = update
            .access_token
            .as_ref()
            .map(|token| self.cipher.encrypt(token))
            .transpose()?;
        let refresh_token_encrypted = update
            .refresh_token
            .as_ref()
            .map(|token| self.cipher.encrypt(token))
            .transpose()?;

        // access_token が更新された場合のみ有効期限も置き換える
        let row = sqlx::query_as::<_, SocialAccountRow>(&format!(
            r#"
            UPDATE social_accounts
            SET followers_count = COALESCE($2, followers_count),
                token_expires_at = CASE WHEN $3::bytea IS NULL THEN token_expires_at ELSE $5 END,
                access_token_encrypted = COALESCE($3, access_token_encrypted),
                refresh_token_encrypted = COALESCE($4, refresh_token_encrypted),
                last_sync_at = NOW()
            WHERE id = $1
            RETURNING {SELECT_COLUMNS}
            "#
        ))
        .bind(account_id)
        .bind(update.followers_count)
        .bind(access_token_encrypted)
        .bind(refresh_token_encrypted)
        .bind(update.token_expires_at)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::AccountNotFound)?;

        self.decode(row)
    }
}
