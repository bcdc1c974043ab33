//! 动态骨骼 - 参与二次运动的单个骨骼
//!
//! 骨骼本身的变换仍存放在外部骨骼图中，这里只保存积分器状态、
//! 激活时捕获的静止姿态以及类别决定的材质参数。

use glam::{Quat, Vec3};

use crate::skeleton::{BoneGraph, BoneIndex};
use super::category::{BoneCategory, ClassifiedBone, MaterialParams};

/// 动态骨骼
#[derive(Clone, Debug, PartialEq)]
pub struct DynamicBone {
    // ========================================
    // 静态数据（激活时确定，之后不变）
    // ========================================

    /// 骨骼图中的索引（不与其他动态骨骼共享）
    pub(crate) bone: BoneIndex,

    /// 分类时记录的父骨骼（用于拓扑校验）
    pub(crate) parent: Option<BoneIndex>,

    /// 父骨骼在动态骨骼列表中的位置；None 表示链根（锚点）
    pub(crate) dynamic_parent: Option<usize>,

    pub(crate) category: BoneCategory,

    pub(crate) params: MaterialParams,

    /// 静止本地旋转（弹簧的平衡目标）
    pub(crate) rest_rotation: Quat,

    /// 静止本地位置
    pub(crate) rest_position: Vec3,

    /// 本地空间的骨骼朝向
    ///
    /// 有子骨骼时指向第一个子骨骼；叶骨骼沿父骨骼到自身的方向延伸，
    /// 偏移为零时退化为 +Y。
    pub(crate) rest_direction: Vec3,

    /// 到父骨骼的静止距离，0 表示不受距离约束
    pub(crate) rest_length: f32,

    // ========================================
    // 动态数据（每帧更新）
    // ========================================

    /// 上一帧本地旋转（仅用于诊断）
    pub(crate) prev_rotation: Quat,

    /// 本地（骨骼自身）坐标系下的角速度，rad/s
    pub(crate) angular_velocity: Vec3,

    /// 父骨骼上一帧的世界旋转（惯性力矩用）
    pub(crate) parent_prev_rotation: Option<Quat>,
}

impl DynamicBone {
    /// 从骨骼图的当前姿态捕获静止状态
    pub fn capture<G: BoneGraph + ?Sized>(
        graph: &G,
        classified: &ClassifiedBone,
        params: MaterialParams,
    ) -> Self {
        let bone = classified.bone;
        let parent = graph.parent(bone);
        let rest_rotation = graph.local_rotation(bone);
        let rest_position = graph.local_position(bone);

        let rest_direction = match graph.children(bone).first() {
            Some(&child) => graph.local_position(child).try_normalize(),
            None => (rest_rotation.inverse() * rest_position).try_normalize(),
        }
        .unwrap_or(Vec3::Y);

        let rest_length = if parent.is_some() { rest_position.length() } else { 0.0 };

        Self {
            bone,
            parent,
            dynamic_parent: classified.dynamic_parent,
            category: classified.category,
            params,
            rest_rotation,
            rest_position,
            rest_direction,
            rest_length,
            prev_rotation: rest_rotation,
            angular_velocity: Vec3::ZERO,
            parent_prev_rotation: parent.map(|p| graph.world_rotation(p)),
        }
    }

    // ========================================
    // 访问器
    // ========================================

    #[inline]
    pub fn bone(&self) -> BoneIndex {
        self.bone
    }

    #[inline]
    pub fn parent(&self) -> Option<BoneIndex> {
        self.parent
    }

    #[inline]
    pub fn category(&self) -> BoneCategory {
        self.category
    }

    #[inline]
    pub fn params(&self) -> MaterialParams {
        self.params
    }

    #[inline]
    pub fn rest_rotation(&self) -> Quat {
        self.rest_rotation
    }

    #[inline]
    pub fn rest_position(&self) -> Vec3 {
        self.rest_position
    }

    #[inline]
    pub fn rest_length(&self) -> f32 {
        self.rest_length
    }

    #[inline]
    pub fn prev_rotation(&self) -> Quat {
        self.prev_rotation
    }

    #[inline]
    pub fn angular_velocity(&self) -> Vec3 {
        self.angular_velocity
    }

    /// 链根：父骨骼不是动态骨骼，位置由刚性父骨骼决定，只旋转不平移
    #[inline]
    pub fn is_anchor(&self) -> bool {
        self.dynamic_parent.is_none()
    }

    /// 积分器状态是否有限
    #[inline]
    pub(crate) fn state_is_finite(&self) -> bool {
        self.angular_velocity.is_finite()
    }

    // ========================================
    // 重置
    // ========================================

    /// 数值错误恢复：回到静止姿态并清零角速度
    pub(crate) fn reset_to_rest<G: BoneGraph + ?Sized>(&mut self, graph: &mut G) {
        self.restore_rest_pose(graph);
        self.angular_velocity = Vec3::ZERO;
        self.prev_rotation = self.rest_rotation;
        self.parent_prev_rotation = self.parent.map(|p| graph.world_rotation(p));
    }

    /// 把捕获的静止本地变换写回骨骼图
    pub(crate) fn restore_rest_pose<G: BoneGraph + ?Sized>(&self, graph: &mut G) {
        graph.set_local_rotation(self.bone, self.rest_rotation);
        graph.set_local_position(self.bone, self.rest_position);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skeleton::BoneSet;

    #[test]
    fn test_capture_rest_state() {
        let mut set = BoneSet::new();
        let head = set.add_bone("Head", None, Vec3::new(0.0, 1.5, 0.0), Quat::IDENTITY).unwrap();
        let hair = set
            .add_bone("Hair", Some(head), Vec3::new(0.0, 0.0, -0.05), Quat::from_rotation_x(0.2))
            .unwrap();
        set.add_bone("Hair_1", Some(hair), Vec3::new(0.0, -0.2, 0.0), Quat::IDENTITY).unwrap();

        let classified = ClassifiedBone { bone: hair, category: BoneCategory::Hair, dynamic_parent: None };
        let params = MaterialParams::new(1.5, 2.0, 0.2);
        let bone = DynamicBone::capture(&set, &classified, params);

        assert!(bone.is_anchor());
        assert_eq!(bone.parent(), Some(head));
        assert_eq!(bone.rest_rotation(), Quat::from_rotation_x(0.2));
        assert!((bone.rest_length() - 0.05).abs() < 1e-6);
        assert!((bone.rest_direction - Vec3::NEG_Y).length() < 1e-6);
        assert_eq!(bone.angular_velocity(), Vec3::ZERO);
        assert!(bone.parent_prev_rotation.unwrap().abs_diff_eq(Quat::IDENTITY, 1e-6));
    }

    #[test]
    fn test_leaf_direction_and_root_length() {
        let mut set = BoneSet::new();
        let tail = set.add_bone("Tail", None, Vec3::new(0.0, 1.0, 0.0), Quat::IDENTITY).unwrap();
        let classified = ClassifiedBone { bone: tail, category: BoneCategory::Tail, dynamic_parent: None };
        let bone = DynamicBone::capture(&set, &classified, MaterialParams::new(2.0, 2.5, 0.2));
        assert_eq!(bone.rest_direction, Vec3::Y);
        assert_eq!(bone.rest_length(), 0.0);
        assert_eq!(bone.parent_prev_rotation, None);
    }

    #[test]
    fn test_leaf_direction_follows_parent_offset() {
        let mut set = BoneSet::new();
        let body = set.add_bone("Body", None, Vec3::ZERO, Quat::IDENTITY).unwrap();
        let hair = set.add_bone("Hair", Some(body), Vec3::new(0.0, -0.05, 0.0), Quat::IDENTITY).unwrap();
        let tip = set.add_bone("Hair_tip", Some(hair), Vec3::new(0.0, -0.1, 0.0), Quat::IDENTITY).unwrap();

        // 下垂链末端的叶骨骼朝下，而不是指回链内
        let classified = ClassifiedBone { bone: tip, category: BoneCategory::Hair, dynamic_parent: Some(0) };
        let bone = DynamicBone::capture(&set, &classified, MaterialParams::new(1.5, 2.0, 0.2));
        assert!((bone.rest_direction - Vec3::NEG_Y).length() < 1e-6);

        // 叶骨骼自身带旋转时，方向换算到骨骼本地坐标系
        let rotation = Quat::from_rotation_z(0.5);
        let bent = set.add_bone("Hair_bent", Some(hair), Vec3::new(0.1, 0.0, 0.0), rotation).unwrap();
        let classified = ClassifiedBone { bone: bent, category: BoneCategory::Hair, dynamic_parent: Some(0) };
        let bone = DynamicBone::capture(&set, &classified, MaterialParams::new(1.5, 2.0, 0.2));
        assert!((bone.rest_direction - rotation.inverse() * Vec3::X).length() < 1e-6);
        assert!((rotation * bone.rest_direction - Vec3::X).length() < 1e-6);

        // 与父骨骼重合的叶骨骼退化为 +Y
        let stub = set.add_bone("Hair_stub", Some(hair), Vec3::ZERO, Quat::IDENTITY).unwrap();
        let classified = ClassifiedBone { bone: stub, category: BoneCategory::Hair, dynamic_parent: Some(0) };
        let bone = DynamicBone::capture(&set, &classified, MaterialParams::new(1.5, 2.0, 0.2));
        assert_eq!(bone.rest_direction, Vec3::Y);
    }

    #[test]
    fn test_reset_to_rest() {
        let mut set = BoneSet::new();
        let root = set.add_bone("Root", None, Vec3::ZERO, Quat::IDENTITY).unwrap();
        let tail = set.add_bone("Tail", Some(root), Vec3::new(0.0, 0.1, 0.0), Quat::IDENTITY).unwrap();
        let classified = ClassifiedBone { bone: tail, category: BoneCategory::Tail, dynamic_parent: None };
        let mut bone = DynamicBone::capture(&set, &classified, MaterialParams::new(2.0, 2.5, 0.2));

        bone.angular_velocity = Vec3::new(f32::NAN, 0.0, 0.0);
        set.set_local_rotation(tail, Quat::from_rotation_z(1.0));
        set.set_local_position(tail, Vec3::new(0.3, 0.0, 0.0));
        assert!(!bone.state_is_finite());

        bone.reset_to_rest(&mut set);
        assert!(bone.state_is_finite());
        assert_eq!(set.local_rotation(tail), Quat::IDENTITY);
        assert_eq!(set.local_position(tail), Vec3::new(0.0, 0.1, 0.0));
    }
}
