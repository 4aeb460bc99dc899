//! 句柄表
//!
//! C ABI 和 JNI 层用整数句柄引用播放器。句柄从 1 开始，0 表示无效。

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

/// 线程安全的句柄表
pub struct HandleTable<T> {
    next: AtomicU64,
    entries: Mutex<HashMap<u64, T>>,
}

impl<T> Default for HandleTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> HandleTable<T> {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn insert(&self, value: T) -> u64 {
        let handle = self.reserve();
        self.entries.lock().insert(handle, value);
        handle
    }

    /// 预留句柄但不放入值；值稍后用 [`HandleTable::get_or_insert_with`] 填入
    pub fn reserve(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// 移除；重复移除返回 `None`
    pub fn remove(&self, handle: u64) -> Option<T> {
        self.entries.lock().remove(&handle)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone> HandleTable<T> {
    pub fn get(&self, handle: u64) -> Option<T> {
        self.entries.lock().get(&handle).cloned()
    }

    /// 已有值时返回已有值，`f` 不会被调用
    pub fn get_or_insert_with(&self, handle: u64, f: impl FnOnce() -> T) -> T {
        self.entries.lock().entry(handle).or_insert_with(f).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_get_remove() {
        let table = HandleTable::new();
        let a = table.insert("a");
        let b = table.insert("b");
        assert_ne!(a, 0);
        assert_ne!(a, b);
        assert_eq!(table.get(a), Some("a"));
        assert_eq!(table.len(), 2);

        assert_eq!(table.remove(a), Some("a"));
        assert_eq!(table.remove(a), None);
        assert_eq!(table.get(a), None);
        assert_eq!(table.get(0), None);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_reserve_then_fill() {
        let table = HandleTable::new();
        let reserved = table.reserve();
        let other = table.insert("other");
        assert_ne!(reserved, other);
        assert_eq!(table.get(reserved), None);

        assert_eq!(table.get_or_insert_with(reserved, || "first"), "first");
        assert_eq!(table.get_or_insert_with(reserved, || "second"), "first");
        assert_eq!(table.get(reserved), Some("first"));
        assert_eq!(table.len(), 2);
    }
}
