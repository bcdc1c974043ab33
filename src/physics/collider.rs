//! 碰撞体注册表
//!
//! 模型加载时，按固定的解剖部位槽位表（头、颈、胸、脊椎、腰、四肢……）
//! 匹配身体骨骼名称，每个槽位最多填充一次，生成球体/胶囊体碰撞体。
//! 已被分类器占用的动态骨骼不参与匹配，避免头发、裙子与自身碰撞。

use bitflags::bitflags;
use glam::Vec3;
use once_cell::sync::Lazy;
use regex::Regex;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::skeleton::{BoneGraph, BoneIndex};
use super::category::Classification;

// ============================================================================
// 优先级
// ============================================================================

bitflags! {
    /// 碰撞体优先级掩码
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
    pub struct ColliderPriorities: u8 {
        /// 1：必须（头、颈、胸）
        const ESSENTIAL = 1 << 0;
        /// 2：次要（躯干、腿）
        const SECONDARY = 1 << 1;
        /// 3：可选（肩、手臂、手）
        const OPTIONAL = 1 << 2;
    }
}

impl ColliderPriorities {
    /// 优先级数字 (1..=3) → 掩码位
    pub fn from_priority(priority: u8) -> Self {
        match priority {
            1 => Self::ESSENTIAL,
            2 => Self::SECONDARY,
            3 => Self::OPTIONAL,
            _ => Self::empty(),
        }
    }
}

// ============================================================================
// 碰撞体
// ============================================================================

/// 碰撞体形状
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ColliderShape {
    Sphere,
    /// 胶囊体，tail 为第二端点相对第一端点的偏移（锚点骨骼本地空间）
    Capsule { tail: Vec3 },
}

/// 身体部位的静态碰撞代理
#[derive(Clone, Debug, PartialEq)]
pub struct Collider {
    /// 槽位名
    pub slot: &'static str,
    /// 跟随的刚性骨骼
    pub anchor: BoneIndex,
    pub shape: ColliderShape,
    pub radius: f32,
    /// 锚点骨骼本地空间的偏移
    pub offset: Vec3,
    /// 1 = 必须，2 = 次要，3 = 可选
    pub priority: u8,
}

/// 碰撞体当前帧的世界空间姿态
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColliderPose {
    pub center: Vec3,
    /// 胶囊体第二端点（球体为 None）
    pub tail: Option<Vec3>,
    pub radius: f32,
}

impl Collider {
    /// 跟随锚点骨骼计算世界姿态
    pub fn pose<G: BoneGraph + ?Sized>(&self, graph: &G) -> ColliderPose {
        let position = graph.world_position(self.anchor);
        let rotation = graph.world_rotation(self.anchor);
        let center = position + rotation * self.offset;
        let tail = match self.shape {
            ColliderShape::Sphere => None,
            ColliderShape::Capsule { tail } => Some(center + rotation * tail),
        };
        ColliderPose { center, tail, radius: self.radius }
    }
}

impl ColliderPose {
    /// 碰撞体表面上离 point 最近的轴心点（球心或胶囊线段上的最近点）
    pub fn closest_axis_point(&self, point: Vec3) -> Vec3 {
        let Some(tail) = self.tail else {
            return self.center;
        };
        let axis = tail - self.center;
        let length_sq = axis.length_squared();
        if length_sq < 1e-8 {
            return self.center;
        }
        let t = ((point - self.center).dot(axis) / length_sq).clamp(0.0, 1.0);
        self.center + axis * t
    }

    /// point 到碰撞体表面的有符号距离（负数表示穿透）
    pub fn signed_distance(&self, point: Vec3) -> f32 {
        (point - self.closest_axis_point(point)).length() - self.radius
    }
}

/// 各优先级的碰撞体数量
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ColliderSummary {
    pub essential: usize,
    pub secondary: usize,
    pub optional: usize,
}

impl ColliderSummary {
    pub fn of(colliders: &[Collider]) -> Self {
        let mut summary = Self::default();
        for collider in colliders {
            match collider.priority {
                1 => summary.essential += 1,
                2 => summary.secondary += 1,
                _ => summary.optional += 1,
            }
        }
        summary
    }
}

// ============================================================================
// 槽位表
// ============================================================================

/// 槽位模板
struct SlotTemplate {
    name: &'static str,
    patterns: &'static [&'static str],
    /// 命中后再用此模式排除
    exclude: Option<&'static str>,
    /// None = 球体
    tail: Option<[f32; 3]>,
    radius: f32,
    offset: [f32; 3],
    priority: u8,
}

const fn sphere(name: &'static str, patterns: &'static [&'static str], radius: f32, offset: [f32; 3], priority: u8) -> SlotTemplate {
    SlotTemplate { name, patterns, exclude: None, tail: None, radius, offset, priority }
}

const fn capsule(name: &'static str, patterns: &'static [&'static str], radius: f32, tail: [f32; 3], priority: u8) -> SlotTemplate {
    SlotTemplate { name, patterns, exclude: None, tail: Some(tail), radius, offset: [0.0; 3], priority }
}

const LEG: [f32; 3] = [0.0, -0.4, 0.0];
const ARM: [f32; 3] = [0.0, -0.25, 0.0];

const SLOT_COUNT: usize = 23;

/// 按优先级排列的槽位（VRM 与 MMD 命名都覆盖）
static SLOT_TEMPLATES: [SlotTemplate; SLOT_COUNT] = [
    // Priority 1: 必须（防止头发穿透）
    sphere("head", &[r"(?i)^head$", "頭"], 0.12, [0.0, 0.0, 0.0], 1),
    capsule("neck", &[r"(?i)^neck$", "^首$"], 0.06, [0.0, 0.1, 0.0], 1),
    sphere("chest", &[r"(?i)^chest$", r"(?i)^upperChest$", "胸"], 0.15, [0.0, 0.0, 0.05], 1),
    sphere("upperChest", &["上半身2"], 0.13, [0.0, 0.0, 0.03], 1),
    // Priority 2: 次要（防止裙子等穿透）
    capsule("spine", &[r"(?i)^spine$", "上半身$"], 0.12, [0.0, 0.15, 0.0], 2),
    sphere("hips", &[r"(?i)^hips$", r"(?i)^pelvis$", "下半身"], 0.15, [0.0, 0.0, 0.0], 2),
    SlotTemplate {
        name: "waist",
        patterns: &["腰"],
        exclude: Some("腰.*[上下]"),
        tail: None,
        radius: 0.14,
        offset: [0.0, 0.0, 0.0],
        priority: 2,
    },
    // 向后偏移
    sphere("buttocks", &[r"(?i)お尻|butt|buttock"], 0.12, [0.0, 0.0, -0.05], 2),
    sphere("root", &[r"(?i)グルーヴ|groove|センター|center|root"], 0.08, [0.0, 0.0, 0.0], 2),
    capsule("leftUpperLeg", &[r"(?i)^leftUpperLeg$", "左足$"], 0.08, LEG, 2),
    capsule("rightUpperLeg", &[r"(?i)^rightUpperLeg$", "右足$"], 0.08, LEG, 2),
    capsule("leftLowerLeg", &[r"(?i)^leftLowerLeg$", "左ひざ$"], 0.06, LEG, 2),
    capsule("rightLowerLeg", &[r"(?i)^rightLowerLeg$", "右ひざ$"], 0.06, LEG, 2),
    sphere("leftFoot", &[r"(?i)^leftFoot$", "左足首$"], 0.06, [0.0, 0.0, 0.0], 2),
    sphere("rightFoot", &[r"(?i)^rightFoot$", "右足首$"], 0.06, [0.0, 0.0, 0.0], 2),
    // Priority 3: 可选（长发用）
    sphere("leftShoulder", &[r"(?i)^leftShoulder$", "左肩"], 0.08, [0.0, 0.0, 0.0], 3),
    sphere("rightShoulder", &[r"(?i)^rightShoulder$", "右肩"], 0.08, [0.0, 0.0, 0.0], 3),
    capsule("leftUpperArm", &[r"(?i)^leftUpperArm$", "左腕$"], 0.05, ARM, 3),
    capsule("rightUpperArm", &[r"(?i)^rightUpperArm$", "右腕$"], 0.05, ARM, 3),
    capsule("leftLowerArm", &[r"(?i)^leftLowerArm$", "左ひじ$"], 0.04, ARM, 3),
    capsule("rightLowerArm", &[r"(?i)^rightLowerArm$", "右ひじ$"], 0.04, ARM, 3),
    sphere("leftHand", &[r"(?i)^leftHand$", "左手首$"], 0.04, [0.0, 0.0, 0.0], 3),
    sphere("rightHand", &[r"(?i)^rightHand$", "右手首$"], 0.04, [0.0, 0.0, 0.0], 3),
];

/// 编译后的槽位
struct CompiledSlot {
    template: &'static SlotTemplate,
    pattern: Regex,
    exclude: Option<Regex>,
}

impl CompiledSlot {
    fn matches(&self, name: &str) -> bool {
        self.pattern.is_match(name)
            && !self.exclude.as_ref().is_some_and(|ex| ex.is_match(name))
    }

    fn build(&self, anchor: BoneIndex) -> Collider {
        let t = self.template;
        Collider {
            slot: t.name,
            anchor,
            shape: match t.tail {
                Some(tail) => ColliderShape::Capsule { tail: Vec3::from_array(tail) },
                None => ColliderShape::Sphere,
            },
            radius: t.radius,
            offset: Vec3::from_array(t.offset),
            priority: t.priority,
        }
    }
}

static SLOTS: Lazy<Vec<CompiledSlot>> = Lazy::new(|| {
    SLOT_TEMPLATES
        .iter()
        .map(|template| {
            let joined = template
                .patterns
                .iter()
                .map(|p| format!("(?:{p})"))
                .collect::<Vec<_>>()
                .join("|");
            CompiledSlot {
                template,
                pattern: Regex::new(&joined).expect("static collider pattern"),
                exclude: template
                    .exclude
                    .map(|ex| Regex::new(ex).expect("static collider pattern")),
            }
        })
        .collect()
});

// ============================================================================
// 注册
// ============================================================================

/// 生成碰撞体列表
///
/// 按先序遍历 root 下的骨骼；对每根未被分类器占用的骨骼，
/// 依优先级顺序检查所有尚未填充且在掩码内的槽位。
pub fn build_colliders<G: BoneGraph + ?Sized>(
    graph: &G,
    root: BoneIndex,
    classification: &Classification,
    priorities: ColliderPriorities,
) -> Vec<Collider> {
    let mut filled = [false; SLOT_COUNT];
    let mut colliders = Vec::new();

    for bone in graph.descendants_preorder(root) {
        if classification.is_claimed(bone) {
            continue;
        }
        let name = graph.name(bone);
        for (i, slot) in SLOTS.iter().enumerate() {
            if filled[i] || !priorities.contains(ColliderPriorities::from_priority(slot.template.priority)) {
                continue;
            }
            if slot.matches(name) {
                filled[i] = true;
                colliders.push(slot.build(bone));
            }
        }
    }

    colliders
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::category::classify;
    use crate::skeleton::BoneSet;
    use glam::Quat;

    fn humanoid() -> BoneSet {
        let mut set = BoneSet::new();
        let mut add = |name: &str, parent: Option<BoneIndex>, y: f32| {
            set.add_bone(name, parent, Vec3::new(0.0, y, 0.0), Quat::IDENTITY).unwrap()
        };
        let hips = add("Hips", None, 1.0);
        let spine = add("Spine", Some(hips), 0.1);
        let chest = add("Chest", Some(spine), 0.15);
        let neck = add("Neck", Some(chest), 0.2);
        let head = add("Head", Some(neck), 0.1);
        let hair = add("Hair_root", Some(head), 0.1);
        add("Hair_1", Some(hair), 0.1);
        add("LeftUpperLeg", Some(hips), -0.1);
        add("LeftUpperArm", Some(chest), 0.1);
        set
    }

    #[test]
    fn test_slots_filled_once() {
        let set = humanoid();
        let root = 0;
        let classification = classify(&set, root);
        let colliders = build_colliders(&set, root, &classification, ColliderPriorities::all());

        let slots: Vec<_> = colliders.iter().map(|c| c.slot).collect();
        assert_eq!(slots, vec!["hips", "spine", "chest", "neck", "head", "leftUpperArm", "leftUpperLeg"]);

        let head = colliders.iter().find(|c| c.slot == "head").unwrap();
        assert_eq!(head.anchor, set.find("Head").unwrap());
        assert_eq!(head.radius, 0.12);
        assert_eq!(head.shape, ColliderShape::Sphere);
    }

    #[test]
    fn test_dynamic_bones_excluded() {
        // "Hair_root" 也匹配 root 槽位，但已被分类器占用
        let set = humanoid();
        let classification = classify(&set, 0);
        let colliders = build_colliders(&set, 0, &classification, ColliderPriorities::all());
        assert!(colliders.iter().all(|c| !classification.is_claimed(c.anchor)));
        assert!(colliders.iter().all(|c| c.slot != "root"));
    }

    #[test]
    fn test_priority_mask() {
        let set = humanoid();
        let classification = classify(&set, 0);
        let colliders = build_colliders(&set, 0, &classification, ColliderPriorities::ESSENTIAL);
        assert!(colliders.iter().all(|c| c.priority == 1));
        let summary = ColliderSummary::of(&colliders);
        assert_eq!(summary, ColliderSummary { essential: 3, secondary: 0, optional: 0 });
    }

    #[test]
    fn test_mmd_names() {
        let mut set = BoneSet::new();
        let center = set.add_bone("センター", None, Vec3::ZERO, Quat::IDENTITY).unwrap();
        let lower = set.add_bone("下半身", Some(center), Vec3::ZERO, Quat::IDENTITY).unwrap();
        set.add_bone("左足", Some(lower), Vec3::ZERO, Quat::IDENTITY).unwrap();
        set.add_bone("左足首", Some(lower), Vec3::ZERO, Quat::IDENTITY).unwrap();
        set.add_bone("腰キャンセル上", Some(lower), Vec3::ZERO, Quat::IDENTITY).unwrap();

        let classification = classify(&set, center);
        let colliders = build_colliders(&set, center, &classification, ColliderPriorities::all());
        let slots: Vec<_> = colliders.iter().map(|c| c.slot).collect();
        assert_eq!(slots, vec!["root", "hips", "leftUpperLeg", "leftFoot"]);
    }

    #[test]
    fn test_capsule_pose_follows_anchor() {
        let mut set = BoneSet::new();
        let leg = set.add_bone("LeftUpperLeg", None, Vec3::new(0.1, 1.0, 0.0), Quat::IDENTITY).unwrap();
        let classification = classify(&set, leg);
        let colliders = build_colliders(&set, leg, &classification, ColliderPriorities::all());
        assert_eq!(colliders.len(), 1);

        let pose = colliders[0].pose(&set);
        assert!((pose.tail.unwrap() - Vec3::new(0.1, 0.6, 0.0)).length() < 1e-6);

        // 锚点旋转 180°，胶囊体朝上
        set.set_local_rotation(leg, Quat::from_rotation_z(std::f32::consts::PI));
        let pose = colliders[0].pose(&set);
        assert!((pose.tail.unwrap() - Vec3::new(0.1, 1.4, 0.0)).length() < 1e-5);

        // 线段中点外侧 0.1 处，距表面 0.02
        let d = pose.signed_distance(Vec3::new(0.2, 1.2, 0.0));
        assert!((d - 0.02).abs() < 1e-5);
    }
}
