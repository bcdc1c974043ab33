//! 动态骨骼分类器
//!
//! 模型加载时按骨骼名称一次性选出参与二次运动的骨骼：
//! 名称命中某个类别的骨骼及其全部子孙都成为动态骨骼，
//! 并继承该类别固定的质量/刚度/阻尼比。每帧热路径中不再做字符串匹配。

use once_cell::sync::Lazy;
use regex::Regex;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::skeleton::{BoneGraph, BoneIndex};

// ============================================================================
// 类别与材质参数
// ============================================================================

/// 动态骨骼类别（按匹配优先级排列）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BoneCategory {
    Hair,
    Skirt,
    Chest,
    Tail,
    /// 缎带、袖子、衣服、耳朵、帽子、披风、领带等
    Accessory,
}

impl BoneCategory {
    /// 匹配顺序
    pub const ALL: [BoneCategory; 5] = [
        BoneCategory::Hair,
        BoneCategory::Skirt,
        BoneCategory::Chest,
        BoneCategory::Tail,
        BoneCategory::Accessory,
    ];

    pub fn label(self) -> &'static str {
        match self {
            BoneCategory::Hair => "hair",
            BoneCategory::Skirt => "skirt",
            BoneCategory::Chest => "chest",
            BoneCategory::Tail => "tail",
            BoneCategory::Accessory => "accessory",
        }
    }

    /// 按名称判断类别，第一个命中的类别胜出
    pub fn from_name(name: &str) -> Option<BoneCategory> {
        CATEGORY_PATTERNS
            .iter()
            .find(|(_, pattern)| pattern.is_match(name))
            .map(|(category, _)| *category)
    }
}

/// 材质参数（初始化后不可变）
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MaterialParams {
    pub mass: f32,
    pub stiffness: f32,
    /// < 1 欠阻尼，> 1 过阻尼
    pub damping_ratio: f32,
}

impl MaterialParams {
    pub const fn new(mass: f32, stiffness: f32, damping_ratio: f32) -> Self {
        Self { mass, stiffness, damping_ratio }
    }

    /// 阻尼系数 c = 2ζ√(k·m)
    #[inline]
    pub fn damping_coefficient(&self) -> f32 {
        2.0 * self.damping_ratio * (self.stiffness * self.mass).sqrt()
    }
}

/// 各类别的材质参数表
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CategoryTable {
    pub hair: MaterialParams,
    pub skirt: MaterialParams,
    pub chest: MaterialParams,
    pub tail: MaterialParams,
    pub accessory: MaterialParams,
}

impl Default for CategoryTable {
    fn default() -> Self {
        Self {
            // 头发：刚度极小，轻飘
            hair: MaterialParams::new(1.5, 2.0, 0.2),
            // 裙子：柔软易摆
            skirt: MaterialParams::new(2.5, 3.0, 0.15),
            chest: MaterialParams::new(3.0, 2.5, 0.2),
            tail: MaterialParams::new(2.0, 2.5, 0.2),
            accessory: MaterialParams::new(2.0, 2.0, 0.2),
        }
    }
}

impl CategoryTable {
    pub fn get(&self, category: BoneCategory) -> MaterialParams {
        match category {
            BoneCategory::Hair => self.hair,
            BoneCategory::Skirt => self.skirt,
            BoneCategory::Chest => self.chest,
            BoneCategory::Tail => self.tail,
            BoneCategory::Accessory => self.accessory,
        }
    }
}

// ============================================================================
// 名称模式
// ============================================================================

// 英文短词（ear/hat/cap）需要词边界，避免 ForeArm、Capsule 之类误判；
// 下划线不算边界外字符，所以不能直接用 \b。
// 身体骨骼 Chest/UpperChest 不算胸部软骨骼。
static CATEGORY_PATTERNS: Lazy<Vec<(BoneCategory, Regex)>> = Lazy::new(|| {
    let table: [(BoneCategory, &str); 5] = [
        (BoneCategory::Hair, r"(?i)髪|hair|ponytail|ポニー|ツインテ|twin"),
        (BoneCategory::Skirt, r"(?i)スカート|skirt"),
        (BoneCategory::Chest, r"(?i)胸|breast|bust|おっぱい|乳|mune|oppai|boob"),
        (BoneCategory::Tail, r"(?i)尻尾|しっぽ|tail"),
        (
            BoneCategory::Accessory,
            r"(?i)リボン|ribbon|袖|sleeve|服|衣装|cloth|アクセサリ|accessory|耳|帽子|マント|cloak|cape|ネクタイ|necktie|(?:^|[^a-z])(?:ears?|hat|cap)(?:[^a-z]|$)",
        ),
    ];
    table
        .into_iter()
        .map(|(category, pattern)| (category, Regex::new(pattern).expect("static category pattern")))
        .collect()
});

// ============================================================================
// 分类结果
// ============================================================================

/// 被选中的单根骨骼
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClassifiedBone {
    pub bone: BoneIndex,
    pub category: BoneCategory,
    /// 父骨骼在结果列表中的位置（父骨骼不是动态骨骼时为 None）
    pub dynamic_parent: Option<usize>,
}

/// 分类结果：父先于子的动态骨骼列表 + 已占用骨骼掩码
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Classification {
    pub bones: Vec<ClassifiedBone>,
    claimed: Vec<bool>,
}

impl Classification {
    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bones.len()
    }

    /// 骨骼是否已被分类器占用
    #[inline]
    pub fn is_claimed(&self, bone: BoneIndex) -> bool {
        self.claimed.get(bone).copied().unwrap_or(false)
    }
}

/// 对 root 下的全部骨骼做分类
///
/// 遍历顺序为先序，因此祖先总是先于子孙被检查：命中的骨骼连同其
/// 未被占用的子孙一起加入，结果天然满足"父先于子"。
pub fn classify<G: BoneGraph + ?Sized>(graph: &G, root: BoneIndex) -> Classification {
    let count = graph.bone_count();
    let mut claimed = vec![false; count];
    let mut slot_of: Vec<Option<usize>> = vec![None; count];
    let mut bones = Vec::new();
    let mut stack = Vec::new();

    for candidate in graph.descendants_preorder(root) {
        if claimed[candidate] {
            continue;
        }
        let Some(category) = BoneCategory::from_name(graph.name(candidate)) else {
            continue;
        };

        stack.clear();
        stack.push(candidate);
        while let Some(bone) = stack.pop() {
            if claimed[bone] {
                continue;
            }
            claimed[bone] = true;

            let dynamic_parent = graph.parent(bone).and_then(|p| slot_of[p]);
            slot_of[bone] = Some(bones.len());
            bones.push(ClassifiedBone { bone, category, dynamic_parent });

            stack.extend(graph.children(bone).iter().rev().copied());
        }
    }

    Classification { bones, claimed }
}
