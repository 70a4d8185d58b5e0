//! Station and item tree tests against the mock host
//!
//! Covers lookup by name and type, creation, renames, reparenting,
//! deletion and the errors a stale or zero handle produces.

use simhost_rpc::SessionState;

use super::fixtures::*;
use crate::client::RunMode;
use crate::{Error, ErrorKind, Item, ItemType, ParamValue, RawItem};

#[tokio::test]
async fn test_version_and_lookup() {
    let host = MockHost::start();
    let client = host.client();

    assert_eq!(client.version().await.unwrap(), "simhost-mock 1.0");

    let robot = client.item("UR10", ItemType::Robot).await.unwrap().unwrap();
    assert_eq!(robot.handle(), ROBOT);
    assert_eq!(robot.item_type(), ItemType::Robot);
    assert_eq!(robot.name().await.unwrap(), "UR10");

    assert!(
        client.item("UR10", ItemType::Frame).await.unwrap().is_none(),
        "Type filter should exclude the robot"
    );
    assert!(client.item("Missing", ItemType::Any).await.unwrap().is_none());
}

#[tokio::test]
async fn test_items_by_type() {
    let host = MockHost::start();
    let client = host.client();

    let frames = client.items(ItemType::Frame).await.unwrap();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].handle(), TABLE);

    let all = client.items(ItemType::Any).await.unwrap();
    assert_eq!(all.len(), 4);
}

#[tokio::test]
async fn test_active_station_has_children() {
    let host = MockHost::start();
    let client = host.client();

    let station = client.active_station().await.unwrap().unwrap();
    assert_eq!(station.handle(), STATION);
    assert!(station.parent().await.unwrap().is_none());

    let children: Vec<u64> = station
        .childs()
        .await
        .unwrap()
        .iter()
        .map(Item::handle)
        .collect();
    assert_eq!(children, vec![ROBOT, TABLE]);
}

#[tokio::test]
async fn test_add_frame_and_target() {
    let host = MockHost::start();
    let client = host.client();
    let table = client.item("Table", ItemType::Frame).await.unwrap().unwrap();
    let robot = client.item("UR10", ItemType::Robot).await.unwrap().unwrap();

    let fixture = client.add_frame("Fixture", Some(&table)).await.unwrap();
    assert_eq!(fixture.item_type(), ItemType::Frame);
    assert_eq!(fixture.parent().await.unwrap().unwrap(), table);

    let approach = fixture.add_target("Approach", Some(&robot)).await.unwrap();
    assert_eq!(approach.item_type(), ItemType::Target);
    assert_eq!(approach.parent().await.unwrap().unwrap(), fixture);

    let station_frame = client.add_frame("Loose", None).await.unwrap();
    assert_eq!(
        station_frame.parent().await.unwrap().unwrap().handle(),
        STATION,
        "No parent means the station"
    );
}

#[tokio::test]
async fn test_rename_and_reparent() {
    let host = MockHost::start();
    let client = host.client();
    let home = client.item("Home", ItemType::Target).await.unwrap().unwrap();
    let station = client.active_station().await.unwrap().unwrap();

    home.set_name("Pounce").await.unwrap();
    assert_eq!(home.name().await.unwrap(), "Pounce");
    assert_eq!(host.state().items[&HOME].name, "Pounce");

    home.set_parent(&station).await.unwrap();
    assert_eq!(home.parent().await.unwrap().unwrap(), station);
}

#[tokio::test]
async fn test_delete_removes_subtree_and_stales_handles() {
    let host = MockHost::start();
    let client = host.client();
    let table = client.item("Table", ItemType::Frame).await.unwrap().unwrap();
    let home = client.item("Home", ItemType::Target).await.unwrap().unwrap();

    assert!(home.exists().await.unwrap());
    table.delete().await.unwrap();

    assert!(!table.exists().await.unwrap());
    assert!(!home.exists().await.unwrap(), "Children go with their parent");

    let err = home.set_name("Ghost").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Item);

    // The session survives a failed call.
    assert_eq!(client.version().await.unwrap(), "simhost-mock 1.0");
}

#[tokio::test]
async fn test_invalid_item_never_reaches_the_wire() {
    let host = MockHost::start();
    let _client = host.client();

    let nothing = Item::invalid();
    assert!(!nothing.exists().await.unwrap());
    let err = nothing.name().await.unwrap_err();
    assert!(matches!(err, Error::Item(_)));
    assert!(host.commands().is_empty());
}

#[tokio::test]
async fn test_item_outlives_client_only_as_error() {
    let host = MockHost::start();
    let robot = {
        let client = host.client();
        client.item("UR10", ItemType::Robot).await.unwrap().unwrap()
    };
    let err = robot.name().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Connection);
}

#[tokio::test]
async fn test_station_params() {
    let host = MockHost::start();
    let client = host.client();

    assert_eq!(client.param("Cell/Speed").await.unwrap(), ParamValue::None);
    client.set_param("Cell/Speed", 250.5).await.unwrap();
    assert_eq!(client.param_f64("Cell/Speed").await.unwrap(), Some(250.5));

    client.set_param("Cell/Label", "left").await.unwrap();
    assert_eq!(client.param_str("Cell/Label").await.unwrap().as_deref(), Some("left"));
    assert!(client.param_matrix("Cell/Label").await.is_err());

    client.set_param("Cell/Label", ParamValue::None).await.unwrap();
    assert!(client.param_str("Cell/Label").await.unwrap().is_none());
}

#[tokio::test]
async fn test_without_render_restores_rendering() {
    let host = MockHost::start();
    let client = host.client();

    let frames = client
        .without_render(async |c| {
            c.add_frame("A", None).await?;
            c.add_frame("B", None).await?;
            c.items(ItemType::Frame).await
        })
        .await
        .unwrap();
    assert_eq!(frames.len(), 3);
    assert_eq!(host.state().render, vec![false, true]);

    let err = client
        .without_render(async |c| {
            c.item("Table", ItemType::Frame).await?;
            Err::<(), _>(Error::input("batch failed"))
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Input(_)));
    assert_eq!(host.state().render, vec![false, true, false, true]);
}

#[tokio::test]
async fn test_station_command() {
    let host = MockHost::start();
    let client = host.client();
    let reply = client.command("Trace", "On").await.unwrap();
    assert_eq!(reply, "Trace=On");
}

#[test]
fn test_run_mode_codes() {
    for code in 1..=6 {
        assert_eq!(RunMode::from_code(code).unwrap().code(), code);
    }
    assert!(RunMode::from_code(0).is_none());
}

#[tokio::test]
async fn test_snapshot_size_is_checked_before_sending() {
    let host = MockHost::start();
    let client = host.client();
    client.version().await.unwrap();

    let err = client.snapshot(u32::MAX, 10).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Input);

    assert_eq!(client.version().await.unwrap(), "simhost-mock 1.0");
    assert_eq!(host.commands(), vec!["G_Version", "G_Version"]);
}

#[tokio::test]
async fn test_abandoned_call_starts_a_fresh_connection() {
    let host = MockHost::start();
    let client = host.client();
    client.version().await.unwrap();

    {
        let mut rpc = client.session().rpc("S_Name").await.unwrap();
        rpc.send(&RawItem::new(ROBOT, ItemType::Robot)).unwrap();
        // Dropped here, before the name argument and the reply.
    }
    assert_eq!(client.session().state().await, SessionState::Disconnected);

    assert_eq!(client.version().await.unwrap(), "simhost-mock 1.0");
    assert_eq!(host.commands(), vec!["G_Version", "G_Version"]);
    let robot = client.item("UR10", ItemType::Robot).await.unwrap();
    assert!(robot.is_some(), "Nothing was renamed");
}
