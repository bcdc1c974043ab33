//! 骨骼图适配层
//!
//! 核心设计思想：
//! - BoneGraph: 外部骨骼层次结构的读写视图（引擎只依赖此 trait）
//! - BoneLink: 单个骨骼节点
//! - BoneSet: 内存中的骨骼层次结构，实现 BoneGraph

mod bone_link;
mod bone_set;

pub use bone_link::BoneLink;
pub use bone_set::BoneSet;

use glam::{Vec3, Quat, Mat4};

// ============================================================================
// 公共类型定义
// ============================================================================

/// 骨骼索引
pub type BoneIndex = usize;

/// 骨骼变换数据
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoneTransform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for BoneTransform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl BoneTransform {
    /// 转换为 4x4 矩阵
    #[inline]
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    /// 从矩阵分解
    #[inline]
    pub fn from_matrix(m: Mat4) -> Self {
        let (scale, rotation, translation) = m.to_scale_rotation_translation();
        Self { translation, rotation, scale }
    }
}

// ============================================================================
// 骨骼图 trait
// ============================================================================

/// 外部骨骼层次结构的视图
///
/// 引擎在动画驱动之后、渲染之前调用。实现方必须保证：
/// 写入本地变换后，后续的世界变换查询立即反映该写入。
pub trait BoneGraph {
    /// 骨骼总数
    fn bone_count(&self) -> usize;

    /// 索引是否有效
    #[inline]
    fn contains(&self, bone: BoneIndex) -> bool {
        bone < self.bone_count()
    }

    fn name(&self, bone: BoneIndex) -> &str;

    fn parent(&self, bone: BoneIndex) -> Option<BoneIndex>;

    fn children(&self, bone: BoneIndex) -> &[BoneIndex];

    fn local_position(&self, bone: BoneIndex) -> Vec3;

    fn set_local_position(&mut self, bone: BoneIndex, position: Vec3);

    fn local_rotation(&self, bone: BoneIndex) -> Quat;

    fn set_local_rotation(&mut self, bone: BoneIndex, rotation: Quat);

    fn world_position(&self, bone: BoneIndex) -> Vec3;

    fn world_rotation(&self, bone: BoneIndex) -> Quat;

    /// 世界变换矩阵（默认由世界位置和旋转组合，无缩放）
    fn world_matrix(&self, bone: BoneIndex) -> Mat4 {
        Mat4::from_rotation_translation(self.world_rotation(bone), self.world_position(bone))
    }

    /// 世界坐标 → 父骨骼本地坐标（根骨骼直接返回世界坐标）
    fn world_to_parent_local(&self, bone: BoneIndex, world: Vec3) -> Vec3 {
        match self.parent(bone) {
            Some(parent) => self.world_matrix(parent).inverse().transform_point3(world),
            None => world,
        }
    }

    /// 以 root 为根的先序遍历（显式栈，子骨骼按声明顺序）
    fn descendants_preorder(&self, root: BoneIndex) -> Vec<BoneIndex> {
        let mut order = Vec::new();
        if !self.contains(root) {
            return order;
        }
        let mut stack = vec![root];
        while let Some(bone) = stack.pop() {
            order.push(bone);
            // 逆序压栈，保证出栈顺序与 children 顺序一致
            stack.extend(self.children(bone).iter().rev().copied());
        }
        order
    }
}
