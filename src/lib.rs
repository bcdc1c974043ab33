//! Spring Bone - 人形骨骼二次运动物理
//!
//! 在外部动画驱动的骨骼之上，为头发、裙子、尾巴、饰品等骨骼
//! 计算滞后、摆动、回稳的二次运动，并避免穿入角色自身身体。
//!
//! 模块划分：
//! - skeleton: 骨骼图适配层（BoneGraph trait + 内存实现 BoneSet）
//! - physics: 二次运动引擎（分类、碰撞体、积分、约束、碰撞）

pub mod skeleton;
pub mod physics;

use thiserror::Error;

pub use skeleton::{BoneGraph, BoneIndex, BoneLink, BoneSet};
pub use physics::{
    BoneCategory, Collider, ColliderPriorities, ColliderShape, DynamicBone, EngineState,
    MaterialParams, SpringConfig, SpringEngine, StepReport,
};

/// 引擎错误
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SpringError {
    /// 骨骼索引在骨骼图中已不存在（模型被替换）
    #[error("bone {bone} is no longer present in the skeleton")]
    MissingBone { bone: BoneIndex },

    /// 动态骨骼的父骨骼与分类时记录的不一致
    #[error("parent of bone {bone} changed (expected {expected:?}, found {found:?})")]
    ParentChanged {
        bone: BoneIndex,
        expected: Option<BoneIndex>,
        found: Option<BoneIndex>,
    },

    /// 拓扑错误后未调用 reset() 就继续 step()
    #[error("engine faulted by a topology change; call reset() before stepping again")]
    ResetRequired,

    /// 构建 BoneSet 时引用了不存在的骨骼
    #[error("invalid bone index {index}")]
    InvalidBone { index: BoneIndex },

    /// 父骨骼必须先于子骨骼加入
    #[error("bone {bone} references parent {parent} which has not been added yet")]
    InvalidParent { bone: BoneIndex, parent: BoneIndex },

    /// 配置非法
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, SpringError>;
