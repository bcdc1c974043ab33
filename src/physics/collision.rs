//! 碰撞解析
//!
//! 动态骨骼的位置与身体碰撞体（球体/胶囊体）做穿透检测，
//! 穿透时沿法线推出到表面，同时削减朝向碰撞体内部的角速度。
//! 推出点受最大拉伸限制：如果表面点离父骨骼太远，改取
//! "碰撞体外扩球面"与"以父骨骼为中心、半径为最大长度的球面"的交线上
//! 离原法线方向最近的点。

use glam::Vec3;

use crate::skeleton::BoneGraph;
use super::collider::ColliderPose;
use super::config::SpringConfig;
use super::dynamic_bone::DynamicBone;

/// 骨骼恰好位于碰撞体轴心上时的判定距离
const AXIS_EPSILON: f32 = 1e-6;

/// 计算推出后的位置
///
/// - `axis_point`: 碰撞体轴心上的最近点
/// - `normal`: 推出方向（单位向量）
/// - `reach`: 半径 + 间隙
/// - `pivot`: 父骨骼世界位置
/// - `max_length`: 允许的最大骨骼长度
pub fn push_out(axis_point: Vec3, normal: Vec3, reach: f32, pivot: Vec3, max_length: f32) -> Vec3 {
    let surface = axis_point + normal * reach;
    if surface.distance(pivot) <= max_length {
        return surface;
    }

    // 两球面求交：|X - axis_point| = reach, |X - pivot| = max_length
    let to_pivot = pivot - axis_point;
    let d = to_pivot.length();
    if d < AXIS_EPSILON || d > reach + max_length || d < (reach - max_length).abs() {
        return surface;
    }
    let u = to_pivot / d;
    let a = (reach * reach - max_length * max_length + d * d) / (2.0 * d);
    let h = (reach * reach - a * a).max(0.0).sqrt();
    let v = (normal - u * normal.dot(u))
        .try_normalize()
        .unwrap_or_else(|| u.any_orthonormal_vector());
    axis_point + u * a + v * h
}

/// 对单根骨骼做碰撞解析
///
/// `poses` 为本帧预先计算好的碰撞体世界姿态。返回第一遍检测到的接触数。
/// 链根不参与（只旋转不平移）。
pub fn resolve<G: BoneGraph + ?Sized>(
    bone: &mut DynamicBone,
    graph: &mut G,
    poses: &[ColliderPose],
    config: &SpringConfig,
) -> usize {
    if bone.is_anchor() || poses.is_empty() {
        return 0;
    }
    let Some(parent) = bone.parent else {
        return 0;
    };

    let pivot = graph.world_position(parent);
    let max_length = bone.rest_length * (1.0 + config.max_stretch);
    let inverse_rotation = graph.world_rotation(bone.bone).inverse();
    let mut position = graph.world_position(bone.bone);
    let mut contacts = 0;
    let mut moved = false;

    for pass in 0..config.collision_iterations {
        let mut hit = false;
        for pose in poses {
            let axis_point = pose.closest_axis_point(position);
            let offset = position - axis_point;
            let distance = offset.length();
            let reach = pose.radius + config.contact_skin;
            if distance >= reach {
                continue;
            }

            let normal = if distance > AXIS_EPSILON {
                offset / distance
            } else {
                (pivot - axis_point).try_normalize().unwrap_or(Vec3::Y)
            };
            position = push_out(axis_point, normal, reach, pivot, max_length);
            hit = true;

            if pass == 0 {
                contacts += 1;
                // 削减朝向碰撞体内部的角速度分量
                let local_normal = inverse_rotation * normal;
                let inward = bone.angular_velocity.dot(local_normal);
                if inward < 0.0 {
                    bone.angular_velocity -= local_normal * (inward * config.collision_velocity_damping);
                }
            }
        }
        if !hit {
            break;
        }
        moved = true;
    }

    if moved && position.is_finite() {
        let local = graph.world_to_parent_local(bone.bone, position);
        graph.set_local_position(bone.bone, local);
    }
    contacts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::category::{BoneCategory, ClassifiedBone, MaterialParams};
    use crate::skeleton::BoneSet;
    use glam::Quat;

    fn sphere(center: Vec3, radius: f32) -> ColliderPose {
        ColliderPose { center, tail: None, radius }
    }

    #[test]
    fn test_push_out_to_surface() {
        let p = push_out(Vec3::ZERO, Vec3::X, 0.1, Vec3::new(0.2, 0.0, 0.0), 0.2);
        assert_eq!(p, Vec3::new(0.1, 0.0, 0.0));
    }

    #[test]
    fn test_push_out_respects_max_length() {
        // 父骨骼在球外上方，表面点太远，取两球面交点
        let axis_point = Vec3::ZERO;
        let pivot = Vec3::new(0.0, 0.15, 0.0);
        let reach = 0.1;
        let max_length = 0.1;
        let normal = Vec3::new(1.0, -1.0, 0.0).normalize();
        let p = push_out(axis_point, normal, reach, pivot, max_length);
        assert!((p.distance(axis_point) - reach).abs() < 1e-5);
        assert!((p.distance(pivot) - max_length).abs() < 1e-5);
        // 保持在法线一侧
        assert!(p.x > 0.0);
    }

    #[test]
    fn test_push_out_degenerate_normal() {
        // 法线与连线平行时取任意正交方向
        let p = push_out(Vec3::ZERO, Vec3::NEG_Y, 0.1, Vec3::new(0.0, 0.15, 0.0), 0.1);
        assert!(p.is_finite());
        assert!((p.distance(Vec3::ZERO) - 0.1).abs() < 1e-5);
    }

    fn hanging_bone() -> (BoneSet, DynamicBone) {
        let mut set = BoneSet::new();
        let root = set.add_bone("Root", None, Vec3::ZERO, Quat::IDENTITY).unwrap();
        let tail = set.add_bone("Tail", Some(root), Vec3::new(0.0, 0.0, -0.1), Quat::IDENTITY).unwrap();
        let tip = set.add_bone("Tail_1", Some(tail), Vec3::new(0.0, -0.2, 0.0), Quat::IDENTITY).unwrap();
        let bone = DynamicBone::capture(
            &set,
            &ClassifiedBone { bone: tip, category: BoneCategory::Tail, dynamic_parent: Some(0) },
            MaterialParams::new(2.0, 2.5, 0.2),
        );
        (set, bone)
    }

    #[test]
    fn test_resolve_pushes_out_and_damps() {
        let (mut set, mut bone) = hanging_bone();
        // 骨骼端点 (0, -0.2, -0.1)，球心略偏后方
        let poses = [sphere(Vec3::new(0.0, -0.2, -0.05), 0.1)];
        bone.angular_velocity = Vec3::new(0.0, 0.0, 4.0);

        let config = SpringConfig::default();
        let contacts = resolve(&mut bone, &mut set, &poses, &config);
        assert_eq!(contacts, 1);

        let position = set.world_position(bone.bone());
        assert!(poses[0].signed_distance(position) >= -1e-5);
        assert!(position.distance(Vec3::new(0.0, 0.0, -0.1)) <= 0.2 * 1.1 + 1e-5);
        // 法线为 -Z，向内分量 (ω·n < 0) 被削减一半
        assert!((bone.angular_velocity().z - 2.0).abs() < 1e-4);
    }

    #[test]
    fn test_resolve_no_contact() {
        let (mut set, mut bone) = hanging_bone();
        let before = set.local_position(bone.bone());
        let poses = [sphere(Vec3::new(1.0, 0.0, 0.0), 0.1)];
        assert_eq!(resolve(&mut bone, &mut set, &poses, &SpringConfig::default()), 0);
        assert_eq!(set.local_position(bone.bone()), before);
    }

    #[test]
    fn test_anchor_not_translated() {
        let mut set = BoneSet::new();
        let root = set.add_bone("Root", None, Vec3::ZERO, Quat::IDENTITY).unwrap();
        let tail = set.add_bone("Tail", Some(root), Vec3::new(0.0, -0.1, 0.0), Quat::IDENTITY).unwrap();
        let mut bone = DynamicBone::capture(
            &set,
            &ClassifiedBone { bone: tail, category: BoneCategory::Tail, dynamic_parent: None },
            MaterialParams::new(2.0, 2.5, 0.2),
        );
        let poses = [sphere(Vec3::new(0.0, -0.1, 0.0), 0.1)];
        assert_eq!(resolve(&mut bone, &mut set, &poses, &SpringConfig::default()), 0);
        assert_eq!(set.local_position(tail), Vec3::new(0.0, -0.1, 0.0));
    }
}
