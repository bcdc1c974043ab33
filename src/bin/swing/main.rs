//! 无窗口演示：摇头时头发与裙子的二次运动
//!
//! 运行：RUST_LOG=debug cargo run --features demo --bin swing

use glam::{Quat, Vec3};

use spring_bone::{BoneGraph, BoneIndex, BoneSet, SpringConfig, SpringEngine};

const FPS: f32 = 60.0;
const FRAMES: usize = 240;

/// 最小人形骨架 + 两束头发 + 前后裙摆
fn build_skeleton() -> spring_bone::Result<(BoneSet, BoneIndex, BoneIndex)> {
    let mut set = BoneSet::new();
    let hips = set.add_bone("Hips", None, Vec3::new(0.0, 1.0, 0.0), Quat::IDENTITY)?;
    let spine = set.add_bone("Spine", Some(hips), Vec3::new(0.0, 0.1, 0.0), Quat::IDENTITY)?;
    let chest = set.add_bone("Chest", Some(spine), Vec3::new(0.0, 0.15, 0.0), Quat::IDENTITY)?;
    let neck = set.add_bone("Neck", Some(chest), Vec3::new(0.0, 0.2, 0.0), Quat::IDENTITY)?;
    let head = set.add_bone("Head", Some(neck), Vec3::new(0.0, 0.1, 0.0), Quat::IDENTITY)?;

    for (side, x) in [("L", 0.06), ("R", -0.06)] {
        let mut parent = set.add_bone(format!("Hair_{side}"), Some(head), Vec3::new(x, 0.08, -0.06), Quat::IDENTITY)?;
        for i in 1..=3 {
            parent = set.add_bone(format!("Hair_{side}_{i}"), Some(parent), Vec3::new(0.0, -0.08, -0.03), Quat::IDENTITY)?;
        }
    }

    for (side, x) in [("Left", 0.09), ("Right", -0.09)] {
        let upper = set.add_bone(format!("{side}UpperLeg"), Some(hips), Vec3::new(x, -0.05, 0.0), Quat::IDENTITY)?;
        let lower = set.add_bone(format!("{side}LowerLeg"), Some(upper), Vec3::new(0.0, -0.4, 0.0), Quat::IDENTITY)?;
        set.add_bone(format!("{side}Foot"), Some(lower), Vec3::new(0.0, -0.4, 0.0), Quat::IDENTITY)?;
    }

    for (name, z) in [("Skirt_F", 0.12), ("Skirt_B", -0.12)] {
        let skirt = set.add_bone(name, Some(hips), Vec3::new(0.0, -0.02, z), Quat::IDENTITY)?;
        set.add_bone(format!("{name}_1"), Some(skirt), Vec3::new(0.0, -0.2, z * 0.3), Quat::IDENTITY)?;
    }

    Ok((set, hips, head))
}

fn main() -> spring_bone::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let (mut skeleton, hips, head) = build_skeleton()?;
    let config = SpringConfig { debug_log: true, ..SpringConfig::default() };
    let mut engine = SpringEngine::new(config)?;

    engine.initialize(&skeleton, hips)?;

    let tips: Vec<BoneIndex> = ["Hair_L_3", "Hair_R_3", "Skirt_F_1"]
        .iter()
        .filter_map(|name| skeleton.find(name))
        .collect();

    let dt = 1.0 / FPS;
    for frame in 0..FRAMES {
        // 外部动画：左右摇头
        let t = frame as f32 * dt;
        skeleton.set_local_rotation(head, Quat::from_rotation_y((t * 4.0).sin() * 0.6));

        let report = engine.step(&mut skeleton, dt)?;

        if frame % 30 == 0 {
            let positions: Vec<String> = tips
                .iter()
                .map(|&bone| {
                    let p = skeleton.world_position(bone);
                    format!("{}=({:.3}, {:.3}, {:.3})", skeleton.name(bone), p.x, p.y, p.z)
                })
                .collect();
            println!(
                "frame {:3}: contacts={} corrections={} {}",
                frame,
                report.contacts,
                report.constraint_corrections,
                positions.join(" ")
            );
        }
    }

    engine.set_enabled(&mut skeleton, false)?;
    Ok(())
}
