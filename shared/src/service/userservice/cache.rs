//! 용량/TTL 제한 캐시
//!
//! 유저 서비스 조회 결과를 짧게 보관하는 단순 캐시입니다.
//! 만료된 항목은 조회 시점에 제거되고, 용량 초과 시 가장 오래된 항목을 내보냅니다.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
}

/// 용량과 TTL이 고정된 캐시
pub struct TtlCache<K, V> {
    capacity: usize,
    ttl: Duration,
    entries: Mutex<HashMap<K, CacheEntry<V>>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            capacity,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// 캐시 조회. 만료된 항목은 제거하고 None을 반환합니다.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut entries = self.entries.lock();

        match entries.get(key) {
            Some(entry) if entry.stored_at.elapsed() < self.ttl => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// 캐시 저장. 용량이 가득 차면 가장 오래된 항목을 내보냅니다.
    pub fn insert(&self, key: K, value: V) {
        let mut entries = self.entries.lock();

        if entries.len() >= self.capacity && !entries.contains_key(&key) {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.stored_at)
                .map(|(k, _)| k.clone());
            if let Some(oldest_key) = oldest {
                entries.remove(&oldest_key);
            }
        }

        entries.insert(
            key,
            CacheEntry {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    /// 특정 항목 무효화 (쓰기 작업 후 호출)
    pub fn invalidate(&self, key: &K) {
        self.entries.lock().remove(key);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_and_invalidate() {
        let cache: TtlCache<u32, String> = TtlCache::new(10, Duration::from_secs(15));

        cache.insert(1, "하나".to_string());
        assert_eq!(cache.get(&1), Some("하나".to_string()));

        cache.invalidate(&1);
        assert_eq!(cache.get(&1), None);
    }

    #[test]
    fn test_ttl_expiry() {
        let cache: TtlCache<u32, u32> = TtlCache::new(10, Duration::from_millis(10));

        cache.insert(1, 100);
        assert_eq!(cache.get(&1), Some(100));

        std::thread::sleep(Duration::from_millis(25));
        assert_eq!(cache.get(&1), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let cache: TtlCache<u32, u32> = TtlCache::new(2, Duration::from_secs(15));

        cache.insert(1, 10);
        std::thread::sleep(Duration::from_millis(5));
        cache.insert(2, 20);
        std::thread::sleep(Duration::from_millis(5));
        cache.insert(3, 30);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&1), None); // 가장 오래된 항목이 밀려남
        assert_eq!(cache.get(&2), Some(20));
        assert_eq!(cache.get(&3), Some(30));
    }

    #[test]
    fn test_overwrite_does_not_evict() {
        let cache: TtlCache<u32, u32> = TtlCache::new(2, Duration::from_secs(15));

        cache.insert(1, 10);
        cache.insert(2, 20);
        cache.insert(1, 11);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&1), Some(11));
        assert_eq!(cache.get(&2), Some(20));
    }
}
