//! 标识生成
//!
//! - 订阅 ID：`sub-` 前缀 + 10 位 62 进制字符串，用于导航订阅与事件监听
//! - 事件 ID：UUID v4，用于导航事件追踪

use rand::Rng;
use std::time::{SystemTime, UNIX_EPOCH};

/// 62 进制字符集
const BASE62_CHARS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// 随机部分长度
const ID_LENGTH: usize = 10;

/// 订阅 ID 前缀
pub const SUBSCRIPTION_PREFIX: &str = "sub-";

/// 生成 10 位 62 进制 ID
///
/// 时间戳与随机数异或后编码，保证同一进程内基本不冲突
pub fn generate_id() -> String {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default();
    let random: u64 = rand::thread_rng().gen();

    let mut value = timestamp ^ random;
    let mut result = String::with_capacity(ID_LENGTH);
    for _ in 0..ID_LENGTH {
        result.push(BASE62_CHARS[(value % 62) as usize] as char);
        value /= 62;
    }
    result.chars().rev().collect()
}

/// 生成订阅 ID
///
/// ```
/// use native_route::utils::id::{generate_subscription_id, is_subscription_id};
///
/// let id = generate_subscription_id();
/// assert!(is_subscription_id(&id));
/// ```
pub fn generate_subscription_id() -> String {
    format!("{}{}", SUBSCRIPTION_PREFIX, generate_id())
}

/// 检查字符串是否为合法订阅 ID
pub fn is_subscription_id(id: &str) -> bool {
    id.strip_prefix(SUBSCRIPTION_PREFIX)
        .map(|rest| rest.len() == ID_LENGTH && rest.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or(false)
}

/// 生成 UUID v4 格式的事件 ID
pub fn generate_uuid() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generate_id_shape() {
        let id = generate_id();
        assert_eq!(id.len(), ID_LENGTH);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_subscription_id_uniqueness() {
        let mut ids = HashSet::new();
        for _ in 0..1000 {
            assert!(ids.insert(generate_subscription_id()), "ID collision detected");
        }
    }

    #[test]
    fn test_is_subscription_id() {
        assert!(is_subscription_id("sub-a1B2c3D4e5"));
        assert!(!is_subscription_id("a1B2c3D4e5"));
        assert!(!is_subscription_id("sub-short"));
        assert!(!is_subscription_id("sub-a1B2c3D4e!"));
    }

    #[test]
    fn test_generate_uuid() {
        let uuid = generate_uuid();
        assert_eq!(uuid.len(), 36);
        assert_eq!(uuid.matches('-').count(), 4);
    }
}
