//! 二次运动物理配置
//!
//! 所有参数扁平化。每个引擎实例持有自己的一份配置（不使用全局单例）。
//! 各常量是经验调参的结果，只有各力项的形状是固定的。

use glam::Vec3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{Result, SpringError};
use super::category::{BoneCategory, CategoryTable};
use super::collider::ColliderPriorities;

/// 物理配置（扁平化，不嵌套）
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SpringConfig {
    // ========== 重力 ==========
    /// 世界空间"向下"方向，默认 (0, -1, 0)
    pub gravity_direction: Vec3,
    /// 重力力矩强度，默认 1.5
    pub gravity_strength: f32,

    // ========== 惯性效果 ==========
    /// 父骨骼旋转变化量的反馈比例，默认 0.7
    /// 0.0 = 无惯性，越大子骨骼越"拖拽"
    pub inertia_strength: f32,

    // ========== 弹簧 ==========
    /// 弹簧力矩缩放，默认 0.01
    /// 让初始姿态只是微弱的回复力而不是刚性固定
    pub spring_scale: f32,

    // ========== 积分 ==========
    /// 单步最大时间步长（秒），默认 0.1（卡顿帧保护）
    pub max_delta_time: f32,
    /// 最大角速度 (rad/s)，默认 50.0
    pub max_angular_velocity: f32,
    /// 弹簧/惯性死区角度（弧度），默认 0.001
    pub angle_epsilon: f32,
    /// 重力力矩小于此值时忽略，默认 0.001
    pub gravity_epsilon: f32,
    /// 指数映射使用一阶近似的半角阈值，默认 0.01
    pub small_angle_threshold: f32,

    // ========== 距离约束 ==========
    /// 软约束柔度，默认 1e-4，必须大于 0（修正永远不会一步到位）
    pub compliance: f32,
    /// 长度偏差小于此值时跳过修正，默认 0.001
    pub length_tolerance: f32,
    /// 碰撞推出时允许的最大相对拉伸，默认 0.1
    pub max_stretch: f32,

    // ========== 碰撞 ==========
    /// 推出时在碰撞体半径外额外保留的间隙，默认 1e-4
    pub contact_skin: f32,
    /// 接触时移除的向内角速度比例，默认 0.5
    pub collision_velocity_damping: f32,
    /// 每根骨骼对碰撞体列表的遍历次数，默认 4
    pub collision_iterations: u32,
    /// 注册哪些优先级的碰撞体，默认全部
    pub collider_priorities: ColliderPriorities,

    // ========== 材质 ==========
    /// 各类别的质量/刚度/阻尼比
    pub categories: CategoryTable,

    // ========== 调试 ==========
    /// 是否输出逐骨骼的调试日志，默认 false
    pub debug_log: bool,
}

impl Default for SpringConfig {
    fn default() -> Self {
        Self {
            // ====== 重力 ======
            gravity_direction: Vec3::NEG_Y,
            // 偏弱的重力让摆动更自然
            gravity_strength: 1.5,

            // ====== 惯性 ======
            // 偏强的惯性让头发更容易甩动
            inertia_strength: 0.7,

            // ====== 弹簧 ======
            spring_scale: 0.01,

            // ====== 积分 ======
            // 最大 100ms（相当于 10fps）
            max_delta_time: 0.1,
            max_angular_velocity: 50.0,
            angle_epsilon: 0.001,
            gravity_epsilon: 0.001,
            small_angle_threshold: 0.01,

            // ====== 距离约束 ======
            // 60fps 时修正比例约为 0.74
            compliance: 1e-4,
            length_tolerance: 0.001,
            max_stretch: 0.1,

            // ====== 碰撞 ======
            contact_skin: 1e-4,
            collision_velocity_damping: 0.5,
            collision_iterations: 4,
            collider_priorities: ColliderPriorities::all(),

            // ====== 材质 ======
            categories: CategoryTable::default(),

            // ====== 调试 ======
            debug_log: false,
        }
    }
}

impl SpringConfig {
    /// 检查配置是否合法
    pub fn validate(&self) -> Result<()> {
        fn check(ok: bool, what: &str) -> Result<()> {
            if ok {
                Ok(())
            } else {
                Err(SpringError::InvalidConfig(what.to_string()))
            }
        }

        check(self.gravity_direction.is_finite(), "gravity_direction must be finite")?;
        check(self.gravity_strength >= 0.0, "gravity_strength must be >= 0")?;
        check(self.inertia_strength >= 0.0, "inertia_strength must be >= 0")?;
        check(self.spring_scale >= 0.0, "spring_scale must be >= 0")?;
        check(self.max_delta_time > 0.0, "max_delta_time must be > 0")?;
        check(self.max_angular_velocity > 0.0, "max_angular_velocity must be > 0")?;
        check(self.angle_epsilon >= 0.0, "angle_epsilon must be >= 0")?;
        check(self.gravity_epsilon >= 0.0, "gravity_epsilon must be >= 0")?;
        check(self.small_angle_threshold >= 0.0, "small_angle_threshold must be >= 0")?;
        check(self.compliance > 0.0, "compliance must be > 0")?;
        check(self.length_tolerance >= 0.0, "length_tolerance must be >= 0")?;
        check(self.max_stretch >= 0.0, "max_stretch must be >= 0")?;
        check(self.contact_skin >= 0.0, "contact_skin must be >= 0")?;
        check(
            (0.0..=1.0).contains(&self.collision_velocity_damping),
            "collision_velocity_damping must be within [0, 1]",
        )?;
        check(self.collision_iterations > 0, "collision_iterations must be > 0")?;

        for category in BoneCategory::ALL {
            let params = self.categories.get(category);
            if !(params.mass > 0.0 && params.stiffness > 0.0 && params.damping_ratio > 0.0) {
                return Err(SpringError::InvalidConfig(format!(
                    "{} parameters must be positive: {:?}",
                    category.label(),
                    params
                )));
            }
        }
        Ok(())
    }

    /// 归一化后的重力方向（零向量时退化为 -Y）
    #[inline]
    pub(crate) fn gravity_dir(&self) -> Vec3 {
        self.gravity_direction.try_normalize().unwrap_or(Vec3::NEG_Y)
    }
}
