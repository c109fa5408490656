//! 客人身份解析
//!
//! 每台设备按会话解析出一个稳定的客人身份：首次生成 guest_id 并
//! 持久化，同一会话内复用同一个 id；换桌 (新会话) 得到新身份。
//! 颜色从固定调色板取，同一 guest_id 在所有设备上解析出同一个
//! 颜色 (id 哈希，不依赖任何计数器)。

use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::error::ClientResult;

/// 客人颜色调色板 - 与界面端保持一致
pub const GUEST_PALETTE: [&str; 8] = [
    "#EF4444", // red
    "#F59E0B", // amber
    "#10B981", // emerald
    "#3B82F6", // blue
    "#8B5CF6", // violet
    "#EC4899", // pink
    "#14B8A6", // teal
    "#F97316", // orange
];

/// 客人身份
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuestIdentity {
    pub guest_id: String,
    pub name: String,
    pub color: String,
}

/// 生成新的 guest_id: 时间戳 + 随机后缀
fn generate_guest_id() -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let mut bytes = [0u8; 3];
    rand::thread_rng().fill(&mut bytes);
    format!("guest-{}-{}", millis, hex::encode(bytes))
}

/// guest_id → 调色板颜色 (纯函数: 同一 id 永远同一色)
pub fn palette_color(guest_id: &str) -> &'static str {
    let digest = Sha256::digest(guest_id.as_bytes());
    GUEST_PALETTE[digest[0] as usize % GUEST_PALETTE.len()]
}

/// 身份持久化的接缝 - 按会话存取
///
/// "怎么存" (文件、浏览器存储、内存) 与 "身份是什么" 在这里分开，
/// 浏览器宿主、自助机、测试各自实现。
pub trait IdentityStore: Send + Sync {
    fn load(&self, session_id: &str) -> ClientResult<Option<GuestIdentity>>;
    fn persist(&self, session_id: &str, identity: &GuestIdentity) -> ClientResult<()>;
}

/// 文件持久化 (每个会话一个 JSON 文件)
pub struct FileIdentityStore {
    dir: PathBuf,
}

impl FileIdentityStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, session_id: &str) -> PathBuf {
        // 会话 id 含 ':'，做文件名前先替换
        let safe: String = session_id
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { '_' })
            .collect();
        self.dir.join(format!("identity-{}.json", safe))
    }
}

impl IdentityStore for FileIdentityStore {
    fn load(&self, session_id: &str) -> ClientResult<Option<GuestIdentity>> {
        let path = self.path_for(session_id);
        if !path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&text).ok())
    }

    fn persist(&self, session_id: &str, identity: &GuestIdentity) -> ClientResult<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(session_id);
        std::fs::write(&path, serde_json::to_string_pretty(identity)?)?;
        Ok(())
    }
}

/// 内存持久化 (测试用)
#[derive(Default)]
pub struct MemoryIdentityStore {
    inner: Mutex<HashMap<String, GuestIdentity>>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdentityStore for MemoryIdentityStore {
    fn load(&self, session_id: &str) -> ClientResult<Option<GuestIdentity>> {
        Ok(self
            .inner
            .lock()
            .map(|m| m.get(session_id).cloned())
            .unwrap_or(None))
    }

    fn persist(&self, session_id: &str, identity: &GuestIdentity) -> ClientResult<()> {
        if let Ok(mut guard) = self.inner.lock() {
            guard.insert(session_id.to_string(), identity.clone());
        }
        Ok(())
    }
}

/// 解析本会话的客人身份
///
/// 已有身份直接复用 (可选改名并回写)；没有就生成新的并持久化。
/// 颜色永远从 guest_id 重新推导，不信任存储里的旧值。
pub fn resolve_identity(
    store: &dyn IdentityStore,
    session_id: &str,
    name: Option<&str>,
) -> ClientResult<GuestIdentity> {
    if let Some(mut existing) = store.load(session_id)? {
        existing.color = palette_color(&existing.guest_id).to_string();
        if let Some(new_name) = name
            && new_name != existing.name
        {
            existing.name = new_name.to_string();
            store.persist(session_id, &existing)?;
        }
        return Ok(existing);
    }

    let guest_id = generate_guest_id();
    let identity = GuestIdentity {
        color: palette_color(&guest_id).to_string(),
        guest_id,
        name: name.unwrap_or("Guest").to_string(),
    };
    store.persist(session_id, &identity)?;
    Ok(identity)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SESSION: &str = "table_session:s1";

    #[test]
    fn test_palette_color_is_pure() {
        let a = palette_color("guest-123-abc");
        let b = palette_color("guest-123-abc");
        assert_eq!(a, b);
        assert!(GUEST_PALETTE.contains(&a));
    }

    #[test]
    fn test_palette_color_varies_across_ids() {
        // 8 个槽位、64 个 id: 撞到同一个颜色的概率可以忽略
        let colors: std::collections::HashSet<_> =
            (0..64).map(|i| palette_color(&format!("guest-{}", i))).collect();
        assert!(colors.len() > 1);
    }

    #[test]
    fn test_resolve_creates_then_reuses() {
        let store = MemoryIdentityStore::new();
        let first = resolve_identity(&store, SESSION, Some("Ana")).unwrap();
        assert_eq!(first.name, "Ana");
        assert!(first.guest_id.starts_with("guest-"));

        let second = resolve_identity(&store, SESSION, None).unwrap();
        assert_eq!(second.guest_id, first.guest_id);
        assert_eq!(second.color, first.color);
    }

    #[test]
    fn test_new_session_gets_fresh_identity() {
        let store = MemoryIdentityStore::new();
        let first = resolve_identity(&store, SESSION, Some("Ana")).unwrap();
        let other = resolve_identity(&store, "table_session:s2", Some("Ana")).unwrap();
        assert_ne!(other.guest_id, first.guest_id);
    }

    #[test]
    fn test_resolve_renames_in_place() {
        let store = MemoryIdentityStore::new();
        let first = resolve_identity(&store, SESSION, Some("Ana")).unwrap();
        let renamed = resolve_identity(&store, SESSION, Some("Bob")).unwrap();
        assert_eq!(renamed.guest_id, first.guest_id);
        assert_eq!(renamed.name, "Bob");
        // 回写后的存储也带新名字
        assert_eq!(store.load(SESSION).unwrap().unwrap().name, "Bob");
    }

    #[test]
    fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileIdentityStore::new(dir.path());
        assert!(store.load(SESSION).unwrap().is_none());

        let identity = resolve_identity(&store, SESSION, Some("Ana")).unwrap();
        let loaded = store.load(SESSION).unwrap().unwrap();
        assert_eq!(loaded, identity);
    }
}
