use std::sync::{Arc, Mutex};

use framebus::broker::{ChannelSpec, ConnectionEvent, MessageBroker, TargetClients};
use serde_json::{Value, json};

type Calls = Arc<Mutex<Vec<(String, String, String, Value)>>>;
type ConnCalls = Arc<Mutex<Vec<(ConnectionEvent, String, Vec<ChannelSpec>)>>>;

#[derive(Default)]
struct Recorder {
    messages: Calls,
    connections: ConnCalls,
}

impl Recorder {
    fn subscribe(&self, broker: &MessageBroker, client_id: &str, channels: &[ChannelSpec]) {
        let messages = self.messages.clone();
        let connections = self.connections.clone();
        broker
            .subscribe(
                client_id,
                channels,
                move |source: &str, channel: &str, name: &str, data: &Value| -> Value {
                    messages.lock().unwrap().push((
                        source.to_string(),
                        channel.to_string(),
                        name.to_string(),
                        data.clone(),
                    ));
                    Value::Bool(true)
                },
                move |event: ConnectionEvent, client: &str, channels: &[ChannelSpec]| {
                    connections
                        .lock()
                        .unwrap()
                        .push((event, client.to_string(), channels.to_vec()));
                },
            )
            .unwrap();
    }

    fn message_count(&self) -> usize {
        self.messages.lock().unwrap().len()
    }

    fn connection_count(&self) -> usize {
        self.connections.lock().unwrap().len()
    }
}

fn ch1() -> Vec<ChannelSpec> {
    vec![ChannelSpec::new("ch1", "1.0")]
}

fn broker() -> MessageBroker {
    MessageBroker::new("http://localhost:8080")
}

#[test]
fn connect_twice_keeps_one_entry() {
    let broker = broker();
    broker.connect("c1").unwrap();

    let err = broker.connect("c1").unwrap_err();

    assert_eq!(err.to_string(), "Client is already connected");
    assert_eq!(broker.get_connected_clients(), vec!["c1".to_string()]);
}

#[test]
fn unconnected_client_is_rejected_without_side_effects() {
    let broker = broker();
    let recorder = Recorder::default();
    broker.connect("member").unwrap();
    recorder.subscribe(&broker, "member", &ch1());
    let before = broker.get_subscribed_clients();

    let sub = broker.subscribe(
        "ghost",
        &ch1(),
        |_: &str, _: &str, _: &str, _: &Value| Value::Null,
        |_: ConnectionEvent, _: &str, _: &[ChannelSpec]| {},
    );
    let unsub = broker.unsubscribe("ghost", &ch1());
    let publish = broker.publish(
        "ch1",
        "ghost",
        "m1",
        "n",
        TargetClients::Broadcast,
        Value::Null,
    );

    for err in [sub.unwrap_err(), unsub.unwrap_err(), publish.unwrap_err()] {
        assert_eq!(err.to_string(), "Client is not connected");
    }
    assert_eq!(broker.get_subscribed_clients(), before);
    assert_eq!(recorder.message_count(), 0);
}

#[test]
fn broadcast_reaches_peer_but_not_publisher() {
    let broker = broker();
    let a = Recorder::default();
    let b = Recorder::default();
    broker.connect("A").unwrap();
    a.subscribe(&broker, "A", &ch1());
    broker.connect("B").unwrap();
    b.subscribe(&broker, "B", &ch1());

    let outcome = broker
        .publish(
            "ch1",
            "A",
            "m1",
            "greet",
            TargetClients::from(vec!["*".to_string()]),
            json!({ "n": 1 }),
        )
        .unwrap();

    assert_eq!(
        *b.messages.lock().unwrap(),
        vec![(
            "A".to_string(),
            "ch1".to_string(),
            "greet".to_string(),
            json!({ "n": 1 })
        )]
    );
    assert_eq!(a.message_count(), 0);
    assert_eq!(outcome.get("B"), Some(&Value::Bool(true)));
}

#[test]
fn unsubscribe_notifies_remaining_peer_once() {
    let broker = broker();
    let a = Recorder::default();
    let b = Recorder::default();
    broker.connect("A").unwrap();
    a.subscribe(&broker, "A", &ch1());
    broker.connect("B").unwrap();
    b.subscribe(&broker, "B", &ch1());

    broker.unsubscribe("A", &ch1()).unwrap();

    assert_eq!(
        *b.connections.lock().unwrap(),
        vec![(ConnectionEvent::ClientUnsubscribed, "A".to_string(), ch1())]
    );
}

#[test]
fn publish_to_unknown_channel_is_rejected() {
    let broker = broker();
    let a = Recorder::default();
    broker.connect("A").unwrap();
    a.subscribe(&broker, "A", &ch1());

    let err = broker
        .publish(
            "never",
            "A",
            "m1",
            "n",
            TargetClients::Broadcast,
            Value::Null,
        )
        .unwrap_err();

    assert_eq!(err.to_string(), "Unknown channel Id: never");
    assert_eq!(a.message_count(), 0);
    assert_eq!(a.connection_count(), 0);
}

#[test]
fn publish_to_unsubscribed_target_is_rejected() {
    let broker = broker();
    let a = Recorder::default();
    broker.connect("A").unwrap();
    a.subscribe(&broker, "A", &ch1());
    broker.connect("C").unwrap();

    let err = broker
        .publish(
            "ch1",
            "A",
            "m1",
            "n",
            TargetClients::literal(["C"]),
            Value::Null,
        )
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "Target client(s) not found in the provided channel"
    );
}

#[test]
fn accepted_origins_round_trip() {
    let broker = broker();
    let initial = broker.get_accepted_origins().len();

    broker.add_accepted_origin("");
    assert_eq!(broker.get_accepted_origins().len(), initial);

    broker.add_accepted_origin("http://host:8081");
    broker.add_accepted_origin("http://host:8081");
    let origins = broker.get_accepted_origins();
    assert_eq!(origins.len(), initial + 1);
    assert_eq!(
        origins.iter().filter(|o| *o == "http://host:8081").count(),
        1
    );
    assert!(broker.is_origin_accepted("http://host:8081"));

    broker.remove_accepted_origin("http://host:8081");
    assert_eq!(broker.get_accepted_origins().len(), initial);
    assert!(!broker.is_origin_accepted("http://host:8081"));
}

#[test]
fn disconnect_leaves_other_subscriber_untouched() {
    let broker = broker();
    let c1 = Recorder::default();
    let c2 = Recorder::default();

    broker.connect("c1").unwrap();
    c1.subscribe(&broker, "c1", &ch1());
    broker.connect("c2").unwrap();
    c2.subscribe(&broker, "c2", &ch1());
    assert_eq!(broker.get_subscribed_clients()["ch1"].len(), 2);
    let c1_connections = c1.connection_count();

    broker.disconnect("c2").unwrap();

    assert_eq!(broker.get_subscribed_clients()["ch1"].len(), 1);
    assert_eq!(broker.get_subscribed_clients()["ch1"][0].client_id, "c1");
    assert_eq!(c1.message_count(), 0);
    assert_eq!(c1.connection_count(), c1_connections);
    assert!(broker.is_connected("c1"));
}

#[test]
fn unconnected_publisher_is_rejected_whatever_the_arguments() {
    let broker = broker();
    let member = Recorder::default();
    broker.connect("member").unwrap();
    member.subscribe(&broker, "member", &ch1());

    for (channel, targets) in [
        ("ch1", TargetClients::literal(Vec::<String>::new())),
        ("", TargetClients::Broadcast),
    ] {
        let err = broker
            .publish(channel, "ghost", "m1", "n", targets, Value::Null)
            .unwrap_err();
        assert_eq!(err.to_string(), "Client is not connected");
    }
    assert_eq!(member.message_count(), 0);
}

#[test]
fn wildcard_from_third_client_reaches_the_other_two() {
    let broker = broker();
    let recorders: Vec<Recorder> = (0..3).map(|_| Recorder::default()).collect();
    for (i, recorder) in recorders.iter().enumerate() {
        let id = format!("client{}", i + 1);
        broker.connect(&id).unwrap();
        recorder.subscribe(&broker, &id, &ch1());
    }

    let outcome = broker
        .publish(
            "ch1",
            "client3",
            "m1",
            "greet",
            TargetClients::Broadcast,
            json!("hi"),
        )
        .unwrap();

    assert_eq!(outcome.target_ids(), vec!["client1", "client2"]);
    for recorder in &recorders[..2] {
        let messages = recorder.messages.lock().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].0, "client3");
    }
    assert_eq!(recorders[2].message_count(), 0);
}

#[test]
fn reset_isolates_runs() {
    let broker = broker();
    broker.connect("c1").unwrap();
    broker.add_accepted_origin("http://host:8081");

    broker.reset();

    assert!(broker.get_connected_clients().is_empty());
    assert!(broker.is_origin_accepted("http://host:8081"));
    broker.connect("c1").unwrap();
}
