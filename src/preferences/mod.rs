/// 로컬 저장 설정
/// 효과음 사용 여부와 로컬 신원 토큰만 저장한다.
/// 화면 마운트 시 읽으며, 없거나 읽지 못해도 초기화를 막지 않는다
// region:    --- Imports
use crate::error::{ClientError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

// endregion: --- Imports

// region:    --- Queries
const CREATE_SCHEMA_SQL: &str = "
    CREATE TABLE IF NOT EXISTS client_preferences (
        key TEXT PRIMARY KEY NOT NULL,
        value TEXT NOT NULL
    );
";

const GET_PREFERENCE: &str = "SELECT value FROM client_preferences WHERE key = ?1";

const UPSERT_PREFERENCE: &str = "
    INSERT INTO client_preferences (key, value) VALUES (?1, ?2)
    ON CONFLICT(key) DO UPDATE SET value = excluded.value
";

const DELETE_PREFERENCE: &str = "DELETE FROM client_preferences WHERE key = ?1";

const SOUND_ENABLED_KEY: &str = "sound_enabled";
const IDENTITY_TOKEN_KEY: &str = "identity_token";

// endregion: --- Queries

// region:    --- Identity
/// 로컬 신원 ("사용자ID:이름" 형태의 토큰에서 복원)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: i64,
    pub user_name: String,
}

impl Identity {
    pub fn new(user_id: i64, user_name: impl Into<String>) -> Self {
        Self {
            user_id,
            user_name: user_name.into(),
        }
    }

    /// 토큰 해석 (형식이 맞지 않으면 None)
    pub fn from_token(token: &str) -> Option<Self> {
        let (id, name) = token.trim().split_once(':')?;
        let user_id = id.trim().parse().ok()?;
        let user_name = name.trim();
        if user_name.is_empty() {
            return None;
        }
        Some(Self::new(user_id, user_name))
    }

    pub fn to_token(&self) -> String {
        format!("{}:{}", self.user_id, self.user_name)
    }
}

// endregion: --- Identity

// region:    --- Local Preferences
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalPreferences {
    pub sound_enabled: bool,
    pub identity_token: Option<String>,
}

impl Default for LocalPreferences {
    fn default() -> Self {
        Self {
            sound_enabled: true,
            identity_token: None,
        }
    }
}

impl LocalPreferences {
    pub fn identity(&self) -> Option<Identity> {
        self.identity_token.as_deref().and_then(Identity::from_token)
    }
}

// endregion: --- Local Preferences

// region:    --- Preference Store
pub struct PreferenceStore {
    pool: Arc<SqlitePool>,
}

impl PreferenceStore {
    /// 저장소 열기 (스키마 생성 포함)
    pub async fn open(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        // 메모리 DB는 연결마다 별개이므로 연결 하나만 사용한다
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let store = Self {
            pool: Arc::new(pool),
        };
        store.initialize().await?;
        info!("{:<12} --> 설정 저장소 열림: {}", "Preferences", database_url);
        Ok(store)
    }

    async fn initialize(&self) -> Result<()> {
        for query in CREATE_SCHEMA_SQL.split(';') {
            let query = query.trim();
            if !query.is_empty() {
                sqlx::query(query).execute(&*self.pool).await?;
            }
        }
        Ok(())
    }

    /// 설정 읽기. 실패해도 기본값을 돌려준다
    pub async fn load(&self) -> LocalPreferences {
        let mut preferences = LocalPreferences::default();

        match self.get(SOUND_ENABLED_KEY).await {
            Ok(Some(value)) => preferences.sound_enabled = value != "false" && value != "0",
            Ok(None) => {}
            Err(e) => warn!("{:<12} --> 효과음 설정 읽기 실패: {}", "Preferences", e),
        }

        match self.get(IDENTITY_TOKEN_KEY).await {
            Ok(token) => preferences.identity_token = token.filter(|t| !t.trim().is_empty()),
            Err(e) => warn!("{:<12} --> 신원 토큰 읽기 실패: {}", "Preferences", e),
        }

        preferences
    }

    pub async fn set_sound_enabled(&self, enabled: bool) -> Result<()> {
        self.set(SOUND_ENABLED_KEY, if enabled { "true" } else { "false" })
            .await
    }

    /// 신원 토큰 저장 (None 이면 삭제)
    pub async fn set_identity_token(&self, token: Option<&str>) -> Result<()> {
        match token {
            Some(token) => {
                if Identity::from_token(token).is_none() {
                    return Err(ClientError::Config(format!(
                        "신원 토큰 형식이 올바르지 않습니다: {token}"
                    )));
                }
                self.set(IDENTITY_TOKEN_KEY, token).await
            }
            None => {
                sqlx::query(DELETE_PREFERENCE)
                    .bind(IDENTITY_TOKEN_KEY)
                    .execute(&*self.pool)
                    .await?;
                Ok(())
            }
        }
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query(GET_PREFERENCE)
            .bind(key)
            .fetch_optional(&*self.pool)
            .await?;
        Ok(row.map(|row| row.get::<String, _>("value")))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(UPSERT_PREFERENCE)
            .bind(key)
            .bind(value)
            .execute(&*self.pool)
            .await?;
        Ok(())
    }
}

// endregion: --- Preference Store
