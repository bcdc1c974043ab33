//! 二次运动引擎
//!
//! 流程：initialize（分类 + 注册碰撞体，每次模型加载一次）
//! → 每帧 step [拓扑校验 → 刷新碰撞体姿态 → 逐骨骼：积分 → 距离约束 → 碰撞]
//!
//! 引擎必须在动画驱动之后、渲染之前运行；它只写入自己持有的动态骨骼。

use crate::skeleton::{BoneGraph, BoneIndex};
use crate::{Result, SpringError};

use super::category::classify;
use super::collider::{build_colliders, Collider, ColliderPose, ColliderShape, ColliderSummary};
use super::collision;
use super::config::SpringConfig;
use super::constraint;
use super::dynamic_bone::DynamicBone;
use super::integrator;
use super::pool::ScratchPool;

/// 引擎状态
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineState {
    /// 没有动态骨骼，骨骼完全由外部动画驱动
    Inactive,
    /// 分类与碰撞体注册已完成，每帧执行物理
    Active,
}

/// 单帧诊断信息
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StepReport {
    /// 本帧是否执行了物理
    pub simulated: bool,
    /// 第一遍碰撞检测到的接触数
    pub contacts: usize,
    /// 距离约束修正次数
    pub constraint_corrections: usize,
    /// 因 NaN/Inf 被重置的骨骼数
    pub numerical_resets: usize,
    /// 实际使用的时间步长（钳制后）
    pub delta_time: f32,
}

/// 二次运动引擎
pub struct SpringEngine {
    config: SpringConfig,
    enabled: bool,
    state: EngineState,
    /// 最近一次 initialize 的骨架根
    root: Option<BoneIndex>,
    /// 动态骨骼（父先于子）
    bones: Vec<DynamicBone>,
    colliders: Vec<Collider>,

    // --- 预分配缓冲区（避免每帧堆分配） ---

    /// 本帧碰撞体世界姿态
    collider_poses: Vec<ColliderPose>,
    /// 积分器临时对象
    pool: ScratchPool,

    /// 拓扑错误后置位，reset() 前拒绝 step()
    faulted: bool,
}

impl SpringEngine {
    /// 创建引擎（默认启用，状态为 Inactive）
    pub fn new(config: SpringConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            enabled: true,
            state: EngineState::Inactive,
            root: None,
            bones: Vec::new(),
            colliders: Vec::new(),
            collider_poses: Vec::new(),
            // 积分器每根骨骼使用 4 个 Vec3 和 1 个 Quat
            pool: ScratchPool::with_capacity(4, 1),
            faulted: false,
        })
    }

    // ========================================
    // 访问器
    // ========================================

    pub fn config(&self) -> &SpringConfig {
        &self.config
    }

    /// 替换配置
    ///
    /// 材质参数在激活时复制到每根动态骨骼，新的类别参数在下次 initialize 后生效。
    pub fn set_config(&mut self, config: SpringConfig) -> Result<()> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_faulted(&self) -> bool {
        self.faulted
    }

    pub fn root(&self) -> Option<BoneIndex> {
        self.root
    }

    pub fn dynamic_bones(&self) -> &[DynamicBone] {
        &self.bones
    }

    pub fn colliders(&self) -> &[Collider] {
        &self.colliders
    }

    pub fn collider_summary(&self) -> ColliderSummary {
        ColliderSummary::of(&self.colliders)
    }

    // ========================================
    // 生命周期
    // ========================================

    /// 模型加载：对 root 下的骨骼做分类并注册碰撞体
    ///
    /// 已激活时视为模型替换，旧状态直接丢弃（旧骨骼属于旧模型，不再写回）。
    /// 引擎被禁用时只记录 root，启用时再激活。返回动态骨骼数量。
    pub fn initialize<G: BoneGraph + ?Sized>(&mut self, graph: &G, root: BoneIndex) -> Result<usize> {
        if !graph.contains(root) {
            return Err(SpringError::MissingBone { bone: root });
        }

        self.discard();
        self.faulted = false;
        self.root = Some(root);

        if !self.enabled {
            log::info!("[SpringBone] 引擎已禁用，记录骨架根 {}，启用时激活", root);
            return Ok(0);
        }
        Ok(self.activate(graph, root))
    }

    /// 启用/禁用
    ///
    /// 禁用时把动态骨骼写回静止姿态并丢弃全部状态；
    /// 重新启用时从静止姿态重新捕获，结果与全新 initialize 相同。
    pub fn set_enabled<G: BoneGraph + ?Sized>(&mut self, graph: &mut G, enabled: bool) -> Result<()> {
        if enabled == self.enabled {
            return Ok(());
        }
        self.enabled = enabled;

        if enabled {
            log::info!("[SpringBone] 启用二次运动");
            if self.faulted {
                return Err(SpringError::ResetRequired);
            }
            if let Some(root) = self.root {
                if !graph.contains(root) {
                    return Err(SpringError::MissingBone { bone: root });
                }
                self.activate(&*graph, root);
            }
        } else {
            log::info!("[SpringBone] 禁用二次运动");
            if !self.faulted {
                self.restore_rest_pose(graph);
            }
            self.discard();
        }
        Ok(())
    }

    /// 丢弃全部动态状态并回到 Inactive
    ///
    /// 拓扑错误后骨骼索引可能已指向新模型的骨骼，此时不写回静止姿态。
    pub fn reset<G: BoneGraph + ?Sized>(&mut self, graph: &mut G) {
        if !self.faulted {
            self.restore_rest_pose(graph);
        }
        self.discard();
        self.root = None;
        self.faulted = false;
        log::info!("[SpringBone] 引擎已重置");
    }

    fn activate<G: BoneGraph + ?Sized>(&mut self, graph: &G, root: BoneIndex) -> usize {
        let classification = classify(graph, root);

        self.bones.reserve(classification.len());
        for classified in &classification.bones {
            let params = self.config.categories.get(classified.category);
            let bone = DynamicBone::capture(graph, classified, params);
            if self.config.debug_log {
                log::debug!(
                    "[SpringBone] 动态骨骼 '{}' ({}) mass={} stiffness={} damping_ratio={}",
                    graph.name(bone.bone),
                    classified.category.label(),
                    params.mass,
                    params.stiffness,
                    params.damping_ratio
                );
            }
            self.bones.push(bone);
        }

        self.colliders = build_colliders(graph, root, &classification, self.config.collider_priorities);
        self.collider_poses = Vec::with_capacity(self.colliders.len());
        if self.config.debug_log {
            for collider in &self.colliders {
                let shape = match collider.shape {
                    ColliderShape::Sphere => "sphere",
                    ColliderShape::Capsule { .. } => "capsule",
                };
                log::debug!(
                    "[SpringBone] 碰撞体 {} → '{}' {} r={}",
                    collider.slot,
                    graph.name(collider.anchor),
                    shape,
                    collider.radius
                );
            }
        }

        if self.bones.is_empty() {
            let names: Vec<&str> = graph
                .descendants_preorder(root)
                .into_iter()
                .take(10)
                .map(|bone| graph.name(bone))
                .collect();
            log::warn!("[SpringBone] 未找到动态骨骼，二次运动不生效。前 10 个骨骼: {:?}", names);
        }

        let summary = self.collider_summary();
        log::info!(
            "[SpringBone] 初始化完成: 动态骨骼={}, 碰撞体={} (必须={}, 次要={}, 可选={})",
            self.bones.len(),
            self.colliders.len(),
            summary.essential,
            summary.secondary,
            summary.optional
        );

        self.state = EngineState::Active;
        self.bones.len()
    }

    fn restore_rest_pose<G: BoneGraph + ?Sized>(&self, graph: &mut G) {
        for bone in &self.bones {
            if graph.contains(bone.bone) {
                bone.restore_rest_pose(graph);
            }
        }
    }

    fn discard(&mut self) {
        self.bones.clear();
        self.colliders.clear();
        self.collider_poses.clear();
        self.state = EngineState::Inactive;
    }

    // ========================================
    // 每帧更新
    // ========================================

    /// 拓扑校验：动态骨骼和碰撞体锚点必须仍然存在，且父骨骼未变
    fn check_topology<G: BoneGraph + ?Sized>(&self, graph: &G) -> Result<()> {
        for bone in &self.bones {
            if !graph.contains(bone.bone) {
                return Err(SpringError::MissingBone { bone: bone.bone });
            }
            let found = graph.parent(bone.bone);
            if found != bone.parent {
                return Err(SpringError::ParentChanged { bone: bone.bone, expected: bone.parent, found });
            }
        }
        for collider in &self.colliders {
            if !graph.contains(collider.anchor) {
                return Err(SpringError::MissingBone { bone: collider.anchor });
            }
        }
        Ok(())
    }

    /// 推进一帧
    ///
    /// `delta_time` 非正或非有限时跳过本帧；超过 `max_delta_time` 时钳制。
    /// 拓扑错误是致命的：返回错误后，reset() 之前的所有调用都返回 `ResetRequired`。
    pub fn step<G: BoneGraph + ?Sized>(&mut self, graph: &mut G, delta_time: f32) -> Result<StepReport> {
        if self.faulted {
            return Err(SpringError::ResetRequired);
        }
        if self.state == EngineState::Inactive || !(delta_time > 0.0) {
            return Ok(StepReport::default());
        }
        let dt = delta_time.min(self.config.max_delta_time);

        if let Err(err) = self.check_topology(&*graph) {
            log::warn!("[SpringBone] 骨骼拓扑已改变，需要 reset(): {}", err);
            self.faulted = true;
            return Err(err);
        }

        let Self { config, bones, colliders, collider_poses, pool, .. } = self;

        collider_poses.clear();
        collider_poses.extend(colliders.iter().map(|collider| collider.pose(&*graph)));

        let mut report = StepReport { simulated: true, delta_time: dt, ..StepReport::default() };

        for bone in bones.iter_mut() {
            if !integrator::integrate(bone, graph, config, dt, pool) {
                log::warn!("[SpringBone] 骨骼 '{}' 数值异常，重置为静止姿态", graph.name(bone.bone));
                bone.reset_to_rest(graph);
                report.numerical_resets += 1;
                continue;
            }

            if constraint::solve_distance(bone, graph, config, dt) {
                report.constraint_corrections += 1;
            }
            report.contacts += collision::resolve(bone, graph, collider_poses, config);

            let rotation = graph.local_rotation(bone.bone);
            if !bone.state_is_finite() || !rotation.is_finite() || !graph.local_position(bone.bone).is_finite() {
                log::warn!("[SpringBone] 骨骼 '{}' 数值异常，重置为静止姿态", graph.name(bone.bone));
                bone.reset_to_rest(graph);
                report.numerical_resets += 1;
                continue;
            }
            bone.prev_rotation = rotation;
        }

        debug_assert_eq!(pool.outstanding(), 0);
        Ok(report)
    }
}
