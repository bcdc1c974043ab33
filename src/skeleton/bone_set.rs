//! 骨骼集合 - 内存中的骨骼层次结构
//!
//! 骨骼按"父先于子"的顺序加入，世界变换缓存在每个 BoneLink 中。
//! 任意本地变换写入后，立即刷新该骨骼整棵子树的世界变换。

use std::collections::HashMap;

use glam::{Vec3, Quat, Mat4};

use crate::{Result, SpringError};
use super::{BoneGraph, BoneIndex, BoneLink};

/// 骨骼集合
#[derive(Clone, Debug, Default)]
pub struct BoneSet {
    bones: Vec<BoneLink>,
    name_to_index: HashMap<String, BoneIndex>,
}

impl BoneSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加骨骼，返回其索引
    ///
    /// 父骨骼必须已存在。重名骨骼允许存在，`find` 返回第一个。
    pub fn add_bone(
        &mut self,
        name: impl Into<String>,
        parent: Option<BoneIndex>,
        position: Vec3,
        rotation: Quat,
    ) -> Result<BoneIndex> {
        let index = self.bones.len();
        if let Some(p) = parent {
            if p >= index {
                return Err(SpringError::InvalidParent { bone: index, parent: p });
            }
        }

        let mut bone = BoneLink::new(name.into(), position, rotation);
        bone.internal_id = index;
        bone.parent = parent;
        bone.local_to_world = match parent {
            Some(p) => self.bones[p].local_to_world * bone.local_to_parent,
            None => bone.local_to_parent,
        };

        if let Some(p) = parent {
            self.bones[p].children.push(index);
        }
        self.name_to_index.entry(bone.name.clone()).or_insert(index);
        self.bones.push(bone);
        Ok(index)
    }

    /// 按名称查找骨骼
    pub fn find(&self, name: &str) -> Option<BoneIndex> {
        self.name_to_index.get(name).copied()
    }

    pub fn get(&self, index: BoneIndex) -> Option<&BoneLink> {
        self.bones.get(index)
    }

    pub fn bones(&self) -> &[BoneLink] {
        &self.bones
    }

    pub fn len(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    /// 所有根骨骼
    pub fn roots(&self) -> impl Iterator<Item = BoneIndex> + '_ {
        self.bones.iter().filter(|b| b.is_root()).map(|b| b.internal_id)
    }

    /// 所有骨骼恢复初始姿态
    pub fn reset_pose(&mut self) {
        for bone in &mut self.bones {
            bone.reset_pose();
        }
        // 父先于子，顺序刷新即可
        for i in 0..self.bones.len() {
            self.bones[i].local_to_world = self.parent_to_world(i) * self.bones[i].local_to_parent;
        }
    }

    /// 修改本地变换（平移 + 旋转），只刷新一次子树
    pub fn set_local_transform(&mut self, bone: BoneIndex, position: Vec3, rotation: Quat) {
        let link = &mut self.bones[bone];
        link.local.translation = position;
        link.local.rotation = rotation;
        link.compute_local_transform();
        self.update_global_transform(bone);
    }

    #[inline]
    fn parent_to_world(&self, bone: BoneIndex) -> Mat4 {
        match self.bones[bone].parent {
            Some(p) => self.bones[p].local_to_world,
            None => Mat4::IDENTITY,
        }
    }

    /// 刷新 root 及其全部子孙的世界变换（显式栈，不递归）
    fn update_global_transform(&mut self, root: BoneIndex) {
        let mut stack = vec![root];
        while let Some(i) = stack.pop() {
            self.bones[i].local_to_world = self.parent_to_world(i) * self.bones[i].local_to_parent;
            stack.extend_from_slice(&self.bones[i].children);
        }
    }
}

impl BoneGraph for BoneSet {
    #[inline]
    fn bone_count(&self) -> usize {
        self.bones.len()
    }

    fn name(&self, bone: BoneIndex) -> &str {
        &self.bones[bone].name
    }

    fn parent(&self, bone: BoneIndex) -> Option<BoneIndex> {
        self.bones[bone].parent
    }

    fn children(&self, bone: BoneIndex) -> &[BoneIndex] {
        &self.bones[bone].children
    }

    fn local_position(&self, bone: BoneIndex) -> Vec3 {
        self.bones[bone].translation()
    }

    fn set_local_position(&mut self, bone: BoneIndex, position: Vec3) {
        let rotation = self.bones[bone].rotation();
        self.set_local_transform(bone, position, rotation);
    }

    fn local_rotation(&self, bone: BoneIndex) -> Quat {
        self.bones[bone].rotation()
    }

    fn set_local_rotation(&mut self, bone: BoneIndex, rotation: Quat) {
        let position = self.bones[bone].translation();
        self.set_local_transform(bone, position, rotation);
    }

    fn world_position(&self, bone: BoneIndex) -> Vec3 {
        self.bones[bone].world_position()
    }

    fn world_rotation(&self, bone: BoneIndex) -> Quat {
        self.bones[bone].world_rotation()
    }

    fn world_matrix(&self, bone: BoneIndex) -> Mat4 {
        self.bones[bone].global_transform()
    }
}
