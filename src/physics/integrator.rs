//! 旋转弹簧-阻尼积分器
//!
//! 每帧、每根动态骨骼（父先于子）：
//! 1. 弹簧力矩：拉回静止旋转（很弱，骨骼可以自由摆动）
//! 2. 阻尼力矩：-c·ω，c = 2ζ√(k·m)
//! 3. 重力力矩：把骨骼朝向拉向重力方向
//! 4. 惯性力矩：父骨骼转动时子骨骼滞后
//! 5. ω += Στ / m · Δt
//! 6. 指数映射积分：rotation = rotation · exp(ω·Δt/2)
//!
//! 角速度在骨骼自身坐标系下表示（右乘更新），
//! 世界空间的力矩先用骨骼世界旋转的逆变换到本地。

use glam::{Quat, Vec3};

use crate::skeleton::BoneGraph;
use super::config::SpringConfig;
use super::dynamic_bone::DynamicBone;
use super::pool::ScratchPool;

/// 四元数的最短路径转角和单位转轴（角度不超过 epsilon 时返回 None）
#[inline]
fn shortest_axis_angle(q: Quat, epsilon: f32) -> Option<(Vec3, f32)> {
    let q = if q.w < 0.0 { -q } else { q };
    let angle = 2.0 * q.w.clamp(0.0, 1.0).acos();
    if angle <= epsilon {
        return None;
    }
    Vec3::new(q.x, q.y, q.z).try_normalize().map(|axis| (axis, angle))
}

/// 弹簧力矩：-stiffness · angle · k_spring，方向为 rest → current 的转轴
pub fn spring_torque(current: Quat, rest: Quat, stiffness: f32, config: &SpringConfig) -> Vec3 {
    match shortest_axis_angle(rest.inverse() * current, config.angle_epsilon) {
        Some((axis, angle)) => axis * (-stiffness * angle * config.spring_scale),
        None => Vec3::ZERO,
    }
}

/// 阻尼力矩
#[inline]
pub fn damping_torque(angular_velocity: Vec3, damping_coefficient: f32) -> Vec3 {
    -angular_velocity * damping_coefficient
}

/// 重力力矩（本地坐标系）
///
/// 世界空间中 τ = (dir × g) · strength · Δt，使骨骼朝向转向下垂。
pub fn gravity_torque(world_rotation: Quat, rest_direction: Vec3, config: &SpringConfig, dt: f32) -> Vec3 {
    let direction = world_rotation * rest_direction;
    let torque = direction.cross(config.gravity_dir()) * (config.gravity_strength * dt);
    if torque.length() < config.gravity_epsilon {
        return Vec3::ZERO;
    }
    world_rotation.inverse() * torque
}

/// 惯性力矩（本地坐标系）
///
/// 父骨骼上一帧到本帧的世界旋转变化量取反后按比例施加，子骨骼因此滞后。
pub fn inertia_torque(parent_now: Quat, parent_prev: Quat, world_rotation: Quat, config: &SpringConfig) -> Vec3 {
    match shortest_axis_angle(parent_now * parent_prev.inverse(), config.angle_epsilon) {
        Some((axis, angle)) => world_rotation.inverse() * (axis * (-angle * config.inertia_strength)),
        None => Vec3::ZERO,
    }
}

/// 指数映射：角速度 → 本帧旋转增量
pub fn exp_map(angular_velocity: Vec3, dt: f32, small_angle_threshold: f32) -> Quat {
    let h = angular_velocity * (dt * 0.5);
    let half_angle = h.length();
    if half_angle < small_angle_threshold {
        // 小角度一阶近似
        Quat::from_xyzw(h.x, h.y, h.z, 1.0).normalize()
    } else {
        let s = half_angle.sin() / half_angle;
        Quat::from_xyzw(h.x * s, h.y * s, h.z * s, half_angle.cos())
    }
}

/// 积分一根骨骼并把新旋转写回骨骼图
///
/// 返回 false 表示角速度或旋转出现 NaN/Inf，此时骨骼图未被写入。
pub fn integrate<G: BoneGraph + ?Sized>(
    bone: &mut DynamicBone,
    graph: &mut G,
    config: &SpringConfig,
    dt: f32,
    pool: &mut ScratchPool,
) -> bool {
    let current = graph.local_rotation(bone.bone);
    let world_rotation = graph.world_rotation(bone.bone);
    let params = bone.params;

    let spring = pool.acquire_vec3();
    let damping = pool.acquire_vec3();
    let gravity = pool.acquire_vec3();
    let inertia = pool.acquire_vec3();

    pool[&spring] = spring_torque(current, bone.rest_rotation, params.stiffness, config);
    pool[&damping] = damping_torque(bone.angular_velocity, params.damping_coefficient());
    pool[&gravity] = gravity_torque(world_rotation, bone.rest_direction, config, dt);

    if let (Some(parent), Some(prev)) = (bone.parent, bone.parent_prev_rotation) {
        let parent_now = graph.world_rotation(parent);
        pool[&inertia] = inertia_torque(parent_now, prev, world_rotation, config);
        bone.parent_prev_rotation = Some(parent_now);
    }

    let total = pool[&spring] + pool[&damping] + pool[&gravity] + pool[&inertia];
    pool.release_vec3(spring);
    pool.release_vec3(damping);
    pool.release_vec3(gravity);
    pool.release_vec3(inertia);

    bone.angular_velocity = (bone.angular_velocity + total * (dt / params.mass))
        .clamp_length_max(config.max_angular_velocity);

    let delta = pool.acquire_quat();
    pool[&delta] = exp_map(bone.angular_velocity, dt, config.small_angle_threshold);
    let rotation = (current * pool[&delta]).normalize();
    pool.release_quat(delta);

    if !bone.state_is_finite() || !rotation.is_finite() {
        return false;
    }
    graph.set_local_rotation(bone.bone, rotation);
    true
}
