//! 骨骼节点
//!
//! BoneLink 是 BoneSet 中的单个节点，保存名称、父子关系、
//! 本地变换（由动画驱动或物理写入）以及缓存的世界变换。

use glam::{Vec3, Quat, Mat4};

use super::{BoneIndex, BoneTransform};

/// 骨骼节点
///
/// 设计原则：
/// - 静态数据：骨骼的固有属性（名称、父子关系、初始位置）
/// - 动态数据：每帧更新的本地变换
/// - 变换计算：local_to_world = parent.local_to_world * local_to_parent
#[derive(Clone, Debug)]
pub struct BoneLink {
    // ========================================
    // 静态数据（初始化后不变）
    // ========================================

    /// 骨骼名称
    pub name: String,

    /// 骨骼内部索引
    pub(crate) internal_id: BoneIndex,

    /// 父骨骼索引
    pub(crate) parent: Option<BoneIndex>,

    /// 子骨骼索引（按加入顺序）
    pub(crate) children: Vec<BoneIndex>,

    /// 初始本地位置（相对父骨骼）
    pub initial_position: Vec3,

    /// 初始本地旋转
    pub initial_rotation: Quat,

    // ========================================
    // 动态数据（每帧更新）
    // ========================================

    /// 本地变换
    pub(crate) local: BoneTransform,

    /// 本地变换矩阵 (local_to_parent)
    pub(crate) local_to_parent: Mat4,

    /// 全局变换矩阵 (local_to_world)
    pub(crate) local_to_world: Mat4,
}

impl BoneLink {
    /// 创建新骨骼
    pub fn new(name: String, position: Vec3, rotation: Quat) -> Self {
        let local = BoneTransform {
            translation: position,
            rotation,
            scale: Vec3::ONE,
        };
        let local_to_parent = local.to_matrix();
        Self {
            name,
            internal_id: 0,
            parent: None,
            children: Vec::new(),
            initial_position: position,
            initial_rotation: rotation,
            local,
            local_to_parent,
            local_to_world: local_to_parent,
        }
    }

    // ========================================
    // 访问器
    // ========================================

    /// 骨骼索引
    #[inline]
    pub fn link_id(&self) -> BoneIndex {
        self.internal_id
    }

    /// 父骨骼索引
    #[inline]
    pub fn parent_id(&self) -> Option<BoneIndex> {
        self.parent
    }

    /// 是否为根骨骼
    #[inline]
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// 本地位置
    #[inline]
    pub fn translation(&self) -> Vec3 {
        self.local.translation
    }

    /// 本地旋转
    #[inline]
    pub fn rotation(&self) -> Quat {
        self.local.rotation
    }

    /// 获取世界位置
    #[inline]
    pub fn world_position(&self) -> Vec3 {
        self.local_to_world.col(3).truncate()
    }

    /// 获取世界旋转
    #[inline]
    pub fn world_rotation(&self) -> Quat {
        BoneTransform::from_matrix(self.local_to_world).rotation
    }

    /// 获取全局变换
    #[inline]
    pub fn global_transform(&self) -> Mat4 {
        self.local_to_world
    }

    // ========================================
    // 变换计算
    // ========================================

    /// 重置为初始姿态（仅本地变换，世界变换由 BoneSet 刷新）
    #[inline]
    pub(crate) fn reset_pose(&mut self) {
        self.local.translation = self.initial_position;
        self.local.rotation = self.initial_rotation;
        self.compute_local_transform();
    }

    /// 计算本地变换 (local_to_parent)
    #[inline]
    pub(crate) fn compute_local_transform(&mut self) {
        self.local_to_parent = self.local.to_matrix();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_bone_is_root_leaf() {
        let bone = BoneLink::new("head".to_string(), Vec3::new(0.0, 1.5, 0.0), Quat::IDENTITY);
        assert!(bone.is_root());
        assert!(bone.is_leaf());
        assert!((bone.world_position() - Vec3::new(0.0, 1.5, 0.0)).length() < 1e-6);
    }

    #[test]
    fn test_reset_pose() {
        let mut bone = BoneLink::new("tail".to_string(), Vec3::X, Quat::IDENTITY);
        bone.local.rotation = Quat::from_rotation_z(0.5);
        bone.local.translation = Vec3::Y;
        bone.compute_local_transform();
        bone.reset_pose();
        assert_eq!(bone.translation(), Vec3::X);
        assert_eq!(bone.rotation(), Quat::IDENTITY);
    }
}
