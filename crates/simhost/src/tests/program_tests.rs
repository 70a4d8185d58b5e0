//! Joints, moves, speeds and program building against the mock host
//!
//! Tests cover:
//! - DOF caching and joint-count validation before the wire
//! - Joint, linear and circular moves on a robot
//! - Moves and instructions appended to a program
//! - Motion state cache and its invalidation by events

use super::fixtures::*;
use crate::events::EventType;
use crate::item::{Instruction, RunType};
use crate::math::Pose;
use crate::{ErrorKind, ItemType, ParamValue, RawItem};

#[tokio::test]
async fn test_joints_cache_dof() {
    let host = MockHost::start();
    let client = host.client();
    let robot = client.item("UR10", ItemType::Robot).await.unwrap().unwrap();

    assert_eq!(robot.joints().await.unwrap(), HOME_JOINTS.to_vec());
    assert_eq!(client.motion_state(&robot).dof, Some(6));

    let before = host.commands().len();
    assert_eq!(robot.dof().await.unwrap(), 6);
    assert_eq!(host.commands().len(), before, "Cached DOF needs no RPC");
}

#[tokio::test]
async fn test_wrong_joint_count_rejected_locally() {
    let host = MockHost::start();
    let client = host.client();
    let robot = client.item("UR10", ItemType::Robot).await.unwrap().unwrap();
    robot.joints().await.unwrap();

    let before = host.commands().len();
    let err = robot.set_joints(&[0.0; 5]).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Input);
    let err = robot.move_j(&[0.0; 7], false).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Input);
    let err = robot.set_joints(&[0.0, f64::NAN, 0.0, 0.0, 0.0, 0.0]).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Input);
    assert_eq!(host.commands().len(), before);
}

#[tokio::test]
async fn test_wrong_joint_count_rejected_by_host() {
    let host = MockHost::start();
    let client = host.client();
    let robot = client.item("UR10", ItemType::Robot).await.unwrap().unwrap();

    // DOF not cached yet, so the host is the one to refuse.
    let err = robot.set_joints(&[1.0, 2.0]).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Input);
    assert!(err.to_string().contains("wrong number of joints"));

    let joints = [10.0, -80.0, 85.0, 5.0, 90.0, 0.0];
    robot.set_joints(&joints).await.unwrap();
    assert_eq!(robot.joints().await.unwrap(), joints.to_vec());
}

#[tokio::test]
async fn test_blocking_joint_move() {
    let host = MockHost::start();
    let client = host.client();
    let robot = client.item("UR10", ItemType::Robot).await.unwrap().unwrap();

    let joints = [20.0, -70.0, 80.0, 0.0, 90.0, 45.0];
    robot.move_j(&joints, true).await.unwrap();
    assert_eq!(host.state().items[&ROBOT].joints, joints.to_vec());

    let commands = host.commands();
    let tail = &commands[commands.len() - 2..];
    assert_eq!(tail, ["MoveX", "WaitMove"]);
}

#[tokio::test]
async fn test_linear_and_circular_moves_to_targets() {
    let host = MockHost::start();
    let client = host.client();
    let robot = client.item("UR10", ItemType::Robot).await.unwrap().unwrap();
    let home = client.item("Home", ItemType::Target).await.unwrap().unwrap();
    let table = client.item("Table", ItemType::Frame).await.unwrap().unwrap();
    let via = table.add_target("Via", Some(&robot)).await.unwrap();

    robot.move_l(&home, false).await.unwrap();
    robot.move_c(&via, &home, false).await.unwrap();
    robot.move_l(&Pose::transl(400.0, 0.0, 300.0), false).await.unwrap();

    let moves = host.commands().iter().filter(|c| *c == "MoveX").count();
    assert_eq!(moves, 3);
}

#[tokio::test]
async fn test_move_on_a_frame_is_refused() {
    let host = MockHost::start();
    let client = host.client();
    let table = client.item("Table", ItemType::Frame).await.unwrap().unwrap();
    let err = table.move_l(&Pose::eye(), false).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Input);
}

#[tokio::test]
async fn test_speed_and_rounding_are_remembered() {
    let host = MockHost::start();
    let client = host.client();
    let robot = client.item("UR10", ItemType::Robot).await.unwrap().unwrap();

    robot.set_speed(250.0, Some(45.0)).await.unwrap();
    robot.set_acceleration(1200.0, None).await.unwrap();
    robot.set_rounding(5.0).await.unwrap();

    let state = client.motion_state(&robot);
    assert_eq!(state.speed.linear, Some(250.0));
    assert_eq!(state.speed.joints, Some(45.0));
    assert_eq!(state.speed.accel_linear, Some(1200.0));
    assert_eq!(state.speed.accel_joints, None);
    assert_eq!(state.rounding, Some(5.0));

    assert!(robot.set_speed(0.0, None).await.is_err());
    assert!(robot.set_rounding(-2.0).await.is_err());
    assert!(!robot.busy().await.unwrap());
}

#[tokio::test]
async fn test_item_changed_event_clears_motion_state_but_keeps_dof() {
    let host = MockHost::start();
    let client = host.client();
    let robot = client.item("UR10", ItemType::Robot).await.unwrap().unwrap();
    robot.joints().await.unwrap();
    robot.set_speed(100.0, None).await.unwrap();

    client.observe(&event_for(EventType::ItemChanged, robot.raw()));
    let state = client.motion_state(&robot);
    assert_eq!(state.dof, Some(6));
    assert_eq!(state.speed.linear, None);

    client.observe(&event_for(EventType::StationChanged, RawItem::NONE));
    assert_eq!(client.motion_state(&robot).dof, None);
}

#[tokio::test]
async fn test_program_moves_need_target_items() {
    let host = MockHost::start();
    let client = host.client();
    let robot = client.item("UR10", ItemType::Robot).await.unwrap().unwrap();
    let home = client.item("Home", ItemType::Target).await.unwrap().unwrap();
    let table = client.item("Table", ItemType::Frame).await.unwrap().unwrap();
    let via = table.add_target("Via", Some(&robot)).await.unwrap();

    let program = robot.add_program("Pick").await.unwrap();
    assert_eq!(program.item_type(), ItemType::Program);

    program.move_j(&home, false).await.unwrap();
    program.move_c(&via, &home, false).await.unwrap();
    let err = program.move_l(&Pose::eye(), false).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Input);

    assert_eq!(program.instruction_count().await.unwrap(), 2);
    let state = host.state();
    let program_state = &state.items[&program.handle()];
    assert_eq!(program_state.instructions, vec!["move1 Home", "move3 Via Home"]);
}

#[tokio::test]
async fn test_program_instructions() {
    let host = MockHost::start();
    let client = host.client();
    let robot = client.item("UR10", ItemType::Robot).await.unwrap().unwrap();
    let program = client.add_program("Glue", Some(&robot)).await.unwrap();

    let instructions = [
        Instruction::Pause { ms: Some(500.0) },
        Instruction::Pause { ms: None },
        Instruction::Comment {
            text: "start bead".into(),
        },
        Instruction::SetDo {
            io: "DO_1".into(),
            value: "1".into(),
        },
        Instruction::WaitDi {
            io: "DI_2".into(),
            value: "1".into(),
            timeout_ms: Some(2000.0),
        },
        Instruction::Call {
            program: "Purge".into(),
        },
        Instruction::Custom {
            code: "GLUE ON".into(),
            name: "Glue on".into(),
        },
    ];
    for instruction in &instructions {
        program.add_instruction(instruction).await.unwrap();
    }

    let recorded = host.state().items[&program.handle()].instructions.clone();
    assert_eq!(
        recorded,
        vec![
            "pause 500".to_string(),
            "pause -1".to_string(),
            format!("code{} start bead", RunType::Comment.code()),
            "setDO DO_1=1".to_string(),
            "waitDI DI_2=1 2000".to_string(),
            format!("code{} Purge", RunType::Call.code()),
            "custom Glue on: GLUE ON".to_string(),
        ]
    );

    let err = program
        .add_instruction(&Instruction::Pause { ms: Some(-5.0) })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Input);
}

#[tokio::test]
async fn test_item_params_and_commands() {
    let host = MockHost::start();
    let client = host.client();
    let robot = client.item("UR10", ItemType::Robot).await.unwrap().unwrap();

    assert_eq!(robot.param("Payload").await.unwrap(), ParamValue::None);
    robot.set_param("Payload", 3.5).await.unwrap();
    assert_eq!(robot.param("Payload").await.unwrap(), ParamValue::Float(3.5));

    robot.set_param("Payload", ParamValue::None).await.unwrap();
    assert!(host.state().items[&ROBOT].params.is_empty());

    assert_eq!(robot.command("Trace", "Off").await.unwrap(), "Trace:Off");
}
