//! 距离约束（XPBD 风格的软约束）
//!
//! 把非链根骨骼与父骨骼的距离拉回静止长度。链根由刚性父骨骼定位，不参与。

use crate::skeleton::BoneGraph;
use super::config::SpringConfig;
use super::dynamic_bone::DynamicBone;

/// 距离过小时方向不可靠，跳过修正
const MIN_DISTANCE: f32 = 1e-4;

/// 柔度 α 下的单步修正比例：1 / (1 + α/Δt²)
///
/// 配置校验保证 α > 0，比例总是小于 1。
#[inline]
pub fn correction_scale(compliance: f32, dt: f32) -> f32 {
    1.0 / (1.0 + compliance / (dt * dt))
}

/// 求解单根骨骼的距离约束
///
/// 返回 true 表示位置被修正并写回骨骼图。
pub fn solve_distance<G: BoneGraph + ?Sized>(
    bone: &DynamicBone,
    graph: &mut G,
    config: &SpringConfig,
    dt: f32,
) -> bool {
    if bone.is_anchor() || bone.rest_length <= 0.0 {
        return false;
    }
    let Some(parent) = bone.parent else {
        return false;
    };

    let position = graph.world_position(bone.bone);
    let parent_position = graph.world_position(parent);
    let offset = position - parent_position;
    let distance = offset.length();
    if distance < MIN_DISTANCE {
        return false;
    }

    let error = distance - bone.rest_length;
    if error.abs() <= config.length_tolerance {
        return false;
    }

    let corrected = position - offset / distance * (error * correction_scale(config.compliance, dt));
    if !corrected.is_finite() {
        return false;
    }
    let local = graph.world_to_parent_local(bone.bone, corrected);
    graph.set_local_position(bone.bone, local);
    true
}
