//! 二次运动物理模块
//!
//! 自研的旋转弹簧-阻尼模拟（不依赖刚体物理引擎）：
//! - category: 按骨骼名称分类动态骨骼并分配材质参数
//! - collider: 从身体骨骼自动生成球体/胶囊体碰撞体
//! - pool: 每帧临时对象池
//! - integrator: 弹簧/阻尼/重力/惯性力矩 + 指数映射积分
//! - constraint: 软距离约束
//! - collision: 穿透检测与推出
//! - engine: 状态机与每帧流程

mod category;
mod collider;
mod config;
mod dynamic_bone;
mod engine;
mod pool;

pub mod collision;
pub mod constraint;
pub mod integrator;

pub use category::{classify, BoneCategory, CategoryTable, Classification, ClassifiedBone, MaterialParams};
pub use collider::{build_colliders, Collider, ColliderPose, ColliderPriorities, ColliderShape, ColliderSummary};
pub use config::SpringConfig;
pub use dynamic_bone::DynamicBone;
pub use engine::{EngineState, SpringEngine, StepReport};
pub use pool::{QuatSlot, ScratchPool, Vec3Slot};
