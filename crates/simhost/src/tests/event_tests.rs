//! Event subscriptions against the mock host
//!
//! The mock sends one event of every type to each subscriber, whatever it
//! asked for, so these tests also show that filtering holds on the client.

use std::collections::HashMap;

use futures_util::StreamExt;

use super::fixtures::*;
use crate::events::EventPayload;
use crate::{EventType, ItemType, RawItem};

fn script_all_events(host: &MockHost) {
    let robot = RawItem::new(ROBOT, ItemType::Robot);
    host.state().events = EventType::ALL
        .iter()
        .map(|t| event_for(*t, robot))
        .collect();
}

#[tokio::test]
async fn test_filtered_subscription_gets_only_slider_events() {
    let host = MockHost::start();
    script_all_events(&host);
    let client = host.client();

    let filter = [EventType::ProgSliderChanged, EventType::ProgSliderSet];
    let mut channel = client.open_events(Some(&filter)).await.unwrap();

    let mut seen: HashMap<EventType, usize> = HashMap::new();
    while let Some(event) = channel.next_event().await.unwrap() {
        assert_eq!(event.payload, EventPayload::Slider { index: 7 });
        *seen.entry(event.event_type).or_default() += 1;
    }

    assert_eq!(seen.len(), 2);
    assert_eq!(seen[&EventType::ProgSliderChanged], 1);
    assert_eq!(seen[&EventType::ProgSliderSet], 1);

    let requested = host.state().event_filters.clone();
    assert_eq!(
        requested,
        vec![vec![
            EventType::ProgSliderChanged.code(),
            EventType::ProgSliderSet.code()
        ]]
    );
}

#[tokio::test]
async fn test_unfiltered_subscription_decodes_every_payload() {
    let host = MockHost::start();
    script_all_events(&host);
    let client = host.client();

    let channel = client.open_events(None).await.unwrap();
    let events: Vec<_> = channel.map(Result::unwrap).collect().await;

    assert_eq!(events.len(), EventType::ALL.len());
    for (event, expected) in events.iter().zip(EventType::ALL) {
        assert_eq!(event.event_type, expected);
        assert_eq!(event.item.handle, ROBOT);
        assert_eq!(event, &event_for(expected, event.item));
    }
    assert!(host.state().event_filters.is_empty());
}

#[tokio::test]
async fn test_events_through_queue() {
    let host = MockHost::start();
    script_all_events(&host);
    let client = host.client();

    let channel = client
        .open_events(Some(&[EventType::ItemMovedPose, EventType::Key]))
        .await
        .unwrap();
    let mut rx = channel.subscribe_channel(4);

    let first = rx.recv().await.unwrap().unwrap();
    assert_eq!(first.event_type, EventType::Key);
    let second = rx.recv().await.unwrap().unwrap();
    let EventPayload::MovedPose { pose, extra } = second.payload else {
        panic!("expected a moved pose");
    };
    assert_eq!(pose.pos(), [0.0, 0.0, 5.0]);
    assert_eq!(extra, vec![1.5]);
    assert!(rx.recv().await.is_none(), "Queue ends when the host closes");
}

#[tokio::test]
async fn test_listen_keeps_going_after_handler_error() {
    let host = MockHost::start();
    script_all_events(&host);
    let client = host.client();

    let channel = client.open_events(None).await.unwrap();
    let mut handled = 0;
    channel
        .listen(|event| {
            handled += 1;
            if event.event_type == EventType::Key {
                Err("key events are not supported")
            } else {
                Ok(())
            }
        })
        .await
        .unwrap();
    assert_eq!(handled, EventType::ALL.len());
}

#[tokio::test]
async fn test_events_feed_motion_cache() {
    let host = MockHost::start();
    let robot_raw = RawItem::new(ROBOT, ItemType::Robot);
    host.state().events = vec![event_for(EventType::ItemChanged, robot_raw)];
    let client = host.client();
    let robot = client.item("UR10", ItemType::Robot).await.unwrap().unwrap();
    robot.set_rounding(2.0).await.unwrap();

    let mut channel = client.open_events(None).await.unwrap();
    while let Some(event) = channel.next_event().await.unwrap() {
        client.observe(&event);
    }
    assert_eq!(client.motion_state(&robot).rounding, None);
}
