//! 临时对象池（避免每帧堆分配）
//!
//! 预分配的 Vec3 / Quat 槽位。每次计算前 acquire，计算后 release，
//! 句柄不可复制，release 会消耗句柄，保证同一槽位不会被重复归还。
//! 池不是线程安全的，也不在引擎实例之间共享。

use std::ops::{Index, IndexMut};

use glam::{Quat, Vec3};

/// Vec3 槽位句柄
#[derive(Debug)]
pub struct Vec3Slot(usize);

/// Quat 槽位句柄
#[derive(Debug)]
pub struct QuatSlot(usize);

/// 临时对象池
#[derive(Debug, Default)]
pub struct ScratchPool {
    vec3s: Vec<Vec3>,
    quats: Vec<Quat>,
    free_vec3s: Vec<usize>,
    free_quats: Vec<usize>,
    /// 超出预分配容量而新建槽位的次数
    grown: usize,
}

impl ScratchPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预分配指定数量的槽位
    pub fn with_capacity(vec3s: usize, quats: usize) -> Self {
        let mut pool = Self {
            vec3s: vec![Vec3::ZERO; vec3s],
            quats: vec![Quat::IDENTITY; quats],
            free_vec3s: Vec::with_capacity(vec3s),
            free_quats: Vec::with_capacity(quats),
            grown: 0,
        };
        // 逆序入栈，先取出低位槽位
        pool.free_vec3s.extend((0..vec3s).rev());
        pool.free_quats.extend((0..quats).rev());
        pool
    }

    /// 取出一个清零的 Vec3 槽位
    pub fn acquire_vec3(&mut self) -> Vec3Slot {
        match self.free_vec3s.pop() {
            Some(i) => Vec3Slot(i),
            None => {
                self.grown += 1;
                self.vec3s.push(Vec3::ZERO);
                Vec3Slot(self.vec3s.len() - 1)
            }
        }
    }

    /// 归还 Vec3 槽位并清零
    pub fn release_vec3(&mut self, slot: Vec3Slot) {
        self.vec3s[slot.0] = Vec3::ZERO;
        self.free_vec3s.push(slot.0);
    }

    /// 取出一个单位四元数槽位
    pub fn acquire_quat(&mut self) -> QuatSlot {
        match self.free_quats.pop() {
            Some(i) => QuatSlot(i),
            None => {
                self.grown += 1;
                self.quats.push(Quat::IDENTITY);
                QuatSlot(self.quats.len() - 1)
            }
        }
    }

    /// 归还 Quat 槽位并重置为单位四元数
    pub fn release_quat(&mut self, slot: QuatSlot) {
        self.quats[slot.0] = Quat::IDENTITY;
        self.free_quats.push(slot.0);
    }

    /// 尚未归还的槽位数
    pub fn outstanding(&self) -> usize {
        (self.vec3s.len() - self.free_vec3s.len()) + (self.quats.len() - self.free_quats.len())
    }

    pub fn grown(&self) -> usize {
        self.grown
    }

    /// 槽位总数
    pub fn capacity(&self) -> (usize, usize) {
        (self.vec3s.len(), self.quats.len())
    }
}

impl Index<&Vec3Slot> for ScratchPool {
    type Output = Vec3;

    #[inline]
    fn index(&self, slot: &Vec3Slot) -> &Vec3 {
        &self.vec3s[slot.0]
    }
}

impl IndexMut<&Vec3Slot> for ScratchPool {
    #[inline]
    fn index_mut(&mut self, slot: &Vec3Slot) -> &mut Vec3 {
        &mut self.vec3s[slot.0]
    }
}

impl Index<&QuatSlot> for ScratchPool {
    type Output = Quat;

    #[inline]
    fn index(&self, slot: &QuatSlot) -> &Quat {
        &self.quats[slot.0]
    }
}

impl IndexMut<&QuatSlot> for ScratchPool {
    #[inline]
    fn index_mut(&mut self, slot: &QuatSlot) -> &mut Quat {
        &mut self.quats[slot.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_release_reuses_slots() {
        let mut pool = ScratchPool::with_capacity(2, 1);
        let a = pool.acquire_vec3();
        let b = pool.acquire_vec3();
        pool[&a] = Vec3::X;
        pool[&b] = Vec3::Y;
        assert_eq!(pool.outstanding(), 2);

        pool.release_vec3(a);
        let c = pool.acquire_vec3();
        // 归还时已清零
        assert_eq!(pool[&c], Vec3::ZERO);
        assert_eq!(pool[&b], Vec3::Y);

        pool.release_vec3(b);
        pool.release_vec3(c);
        assert_eq!(pool.outstanding(), 0);
        assert_eq!(pool.grown(), 0);
    }

    #[test]
    fn test_grows_when_exhausted() {
        let mut pool = ScratchPool::with_capacity(0, 0);
        let q = pool.acquire_quat();
        pool[&q] = Quat::from_rotation_x(1.0);
        assert_eq!(pool.grown(), 1);
        pool.release_quat(q);

        // 新建的槽位归还后被复用，不再增长
        let q = pool.acquire_quat();
        assert_eq!(pool[&q], Quat::IDENTITY);
        pool.release_quat(q);
        assert_eq!(pool.grown(), 1);
        assert_eq!(pool.capacity(), (0, 1));
    }
}
