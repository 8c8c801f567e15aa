//! End-to-end client tests against the in-process mock engine.
//!
//! The controller plays the audio server: it runs the process callback
//! period by period, feeds capture data, and fires notifications, while the
//! client side below exercises the whole lifecycle and both halves of the
//! block exchange.

use std::thread;
use std::time::Duration;

use puente_client::{
    Client, ClientState, Error, MockController, MockEngine, MockEngineConfig, PortFlags,
    SampleMatrix,
};

fn client_with(config: MockEngineConfig) -> (Client, MockController) {
    let engine = MockEngine::new(config);
    let controller = engine.controller();
    (Client::new(Box::new(engine)), controller)
}

/// Four-frame periods and one physical port per direction.
fn duplex_config() -> MockEngineConfig {
    MockEngineConfig {
        buffer_size: 4,
        ambient_ports: vec![
            (
                "system:capture_1".to_owned(),
                PortFlags::OUTPUT.union(PortFlags::PHYSICAL),
            ),
            (
                "system:playback_1".to_owned(),
                PortFlags::INPUT.union(PortFlags::PHYSICAL),
            ),
        ],
        ..MockEngineConfig::default()
    }
}

fn no_input() -> SampleMatrix {
    SampleMatrix::zeroed(0, 0)
}

#[test]
fn full_duplex_round_trip() {
    let (mut client, controller) = client_with(duplex_config());
    client.attach("duplex").unwrap();
    client.register_port("in", PortFlags::INPUT).unwrap();
    client.register_port("out", PortFlags::OUTPUT).unwrap();
    client.activate().unwrap();

    controller.set_input("duplex:in", &[1.0, 2.0, 3.0, 4.0]);
    controller.run_cycle();

    let playback = SampleMatrix::from_rows(&[&[10.0, 20.0, 30.0, 40.0]]);
    let mut capture = SampleMatrix::zeroed(1, 4);
    client.exchange(&playback, &mut capture).unwrap();
    assert_eq!(capture.row(0), [1.0, 2.0, 3.0, 4.0]);

    // The block offered above reaches the engine on the next period.
    controller.run_cycle();
    assert_eq!(controller.output_of("duplex:out"), [10.0, 20.0, 30.0, 40.0]);
}

#[test]
fn port_capacity_is_enforced_per_direction() {
    let (mut client, _controller) = client_with(MockEngineConfig {
        buffer_size: 4,
        ..MockEngineConfig::default()
    });
    client.attach("cap").unwrap();

    for i in 0..puente_client::MAX_PORTS_PER_DIRECTION {
        client
            .register_port(&format!("in_{i}"), PortFlags::INPUT)
            .unwrap();
    }
    let err = client
        .register_port("in_overflow", PortFlags::INPUT)
        .unwrap_err();
    assert!(matches!(err, Error::Usage(_)));

    // The rejection never reached the engine.
    let names = client.list_ports().unwrap();
    assert_eq!(names.len(), puente_client::MAX_PORTS_PER_DIRECTION);
    assert!(!names.iter().any(|name| name.contains("in_overflow")));

    // The other direction still has room.
    client.register_port("out", PortFlags::OUTPUT).unwrap();
}

#[test]
fn lifecycle_misuse_is_reported() {
    let (mut client, _controller) = client_with(duplex_config());
    client.attach("strict").unwrap();
    client.register_port("in", PortFlags::INPUT).unwrap();

    // Exchange needs an active client.
    let mut capture = SampleMatrix::zeroed(1, 4);
    assert!(matches!(
        client.exchange(&no_input(), &mut capture),
        Err(Error::Usage(_))
    ));
    assert!(matches!(client.deactivate(), Err(Error::Usage(_))));

    client.activate().unwrap();
    assert!(matches!(client.activate(), Err(Error::Usage(_))));
    assert!(matches!(
        client.register_port("late", PortFlags::INPUT),
        Err(Error::Usage(_))
    ));

    client.deactivate().unwrap();
    assert_eq!(client.state(), ClientState::Attached);
    // Registration is legal again once deactivated.
    client.register_port("late", PortFlags::INPUT).unwrap();
}

#[test]
fn input_desync_delivers_the_stale_block_and_recovers() {
    let (mut client, controller) = client_with(duplex_config());
    client.attach("tap").unwrap();
    client.register_port("in", PortFlags::INPUT).unwrap();
    client.activate().unwrap();

    controller.set_input("tap:in", &[1.0, 2.0, 3.0, 4.0]);
    controller.run_cycle();
    // Second period before the client collected: the send finds the channel
    // full and the sync flag drops.
    controller.set_input("tap:in", &[5.0, 6.0, 7.0, 8.0]);
    controller.run_cycle();

    let mut capture = SampleMatrix::zeroed(1, 4);
    let err = client.exchange(&no_input(), &mut capture).unwrap_err();
    assert!(matches!(err, Error::InputDesync));
    // The stale block is still handed over so the caller can see it.
    assert_eq!(capture.row(0), [1.0, 2.0, 3.0, 4.0]);

    // One clean period restores sync.
    controller.run_cycle();
    client.exchange(&no_input(), &mut capture).unwrap();
    assert_eq!(capture.row(0), [5.0, 6.0, 7.0, 8.0]);
}

#[test]
fn output_desync_when_a_block_is_still_in_flight() {
    let (mut client, controller) = client_with(duplex_config());
    client.attach("player").unwrap();
    client.register_port("out", PortFlags::OUTPUT).unwrap();
    client.activate().unwrap();

    // First period primes the sync flag (an empty capture always sends).
    controller.run_cycle();

    let first = SampleMatrix::from_rows(&[&[10.0, 20.0, 30.0, 40.0]]);
    let second = SampleMatrix::from_rows(&[&[50.0, 60.0, 70.0, 80.0]]);
    let mut unused = no_input();

    client.exchange(&first, &mut unused).unwrap();
    // No engine period in between: the channel still holds `first`.
    let err = client.exchange(&second, &mut unused).unwrap_err();
    assert!(matches!(err, Error::OutputDesync));

    controller.run_cycle();
    assert_eq!(controller.output_of("player:out"), [10.0, 20.0, 30.0, 40.0]);
    client.exchange(&second, &mut unused).unwrap();
}

#[test]
fn starved_playback_repeats_the_last_block() {
    let (mut client, controller) = client_with(duplex_config());
    client.attach("player").unwrap();
    client.register_port("out", PortFlags::OUTPUT).unwrap();
    client.activate().unwrap();

    controller.run_cycle();
    let block = SampleMatrix::from_rows(&[&[7.0, 8.0, 9.0, 10.0]]);
    let mut unused = no_input();
    client.exchange(&block, &mut unused).unwrap();

    controller.run_cycle();
    assert_eq!(controller.output_of("player:out"), [7.0, 8.0, 9.0, 10.0]);

    // Nothing new from the client: the engine keeps hearing the last block
    // rather than a dropout.
    controller.run_cycle();
    controller.run_cycle();
    assert_eq!(controller.output_of("player:out"), [7.0, 8.0, 9.0, 10.0]);
}

#[test]
fn shape_violations_fail_before_any_channel_io() {
    let (mut client, controller) = client_with(duplex_config());
    client.attach("shapes").unwrap();
    client.register_port("in_l", PortFlags::INPUT).unwrap();
    client.register_port("in_r", PortFlags::INPUT).unwrap();
    client.register_port("out", PortFlags::OUTPUT).unwrap();
    client.activate().unwrap();

    controller.set_input("shapes:in_l", &[1.0, 2.0, 3.0, 4.0]);
    controller.set_input("shapes:in_r", &[5.0, 6.0, 7.0, 8.0]);
    controller.run_cycle();

    let mut capture = SampleMatrix::zeroed(2, 4);
    // Wrong frame count.
    let short = SampleMatrix::zeroed(1, 3);
    assert!(matches!(
        client.exchange(&short, &mut capture),
        Err(Error::Validation(_))
    ));
    // Wrong port count.
    let wide = SampleMatrix::zeroed(2, 4);
    assert!(matches!(
        client.exchange(&wide, &mut capture),
        Err(Error::Validation(_))
    ));
    let playback = SampleMatrix::zeroed(1, 4);
    let mut narrow = SampleMatrix::zeroed(1, 4);
    assert!(matches!(
        client.exchange(&playback, &mut narrow),
        Err(Error::Validation(_))
    ));

    // The failures above consumed nothing: the queued period is intact and
    // arrives in registration order.
    client.exchange(&playback, &mut capture).unwrap();
    assert_eq!(capture.row(0), [1.0, 2.0, 3.0, 4.0]);
    assert_eq!(capture.row(1), [5.0, 6.0, 7.0, 8.0]);
}

#[test]
fn exchange_blocks_until_the_engine_produces() {
    let (mut client, controller) = client_with(duplex_config());
    client.attach("tap").unwrap();
    client.register_port("in", PortFlags::INPUT).unwrap();
    client.activate().unwrap();

    // Rendezvous after every consumed block keeps the two threads in
    // lockstep without timing assumptions.
    let (ack_tx, ack_rx) = crossbeam_channel::bounded::<()>(0);
    let producer = thread::spawn(move || {
        for k in 0..6u8 {
            let base = f32::from(k) * 10.0;
            controller.set_input("tap:in", &[base, base + 1.0, base + 2.0, base + 3.0]);
            controller.run_cycle();
            if ack_rx.recv().is_err() {
                break;
            }
        }
    });

    let mut seen = Vec::new();
    let mut capture = SampleMatrix::zeroed(1, 4);
    for _ in 0..6 {
        client.exchange(&no_input(), &mut capture).unwrap();
        seen.push(capture.row(0)[0]);
        ack_tx.send(()).unwrap();
    }
    producer.join().unwrap();

    assert_eq!(seen, [0.0, 10.0, 20.0, 30.0, 40.0, 50.0]);
}

#[test]
fn notifications_latch_until_polled() {
    let (mut client, controller) = client_with(duplex_config());
    client.attach("listener").unwrap();

    controller.fire_graph_reorder();
    controller.fire_port_registration();
    controller.fire_graph_reorder();

    let flags = client.poll_events();
    assert!(flags.graph_ordering);
    assert!(flags.port_registration);
    assert!(!flags.shutdown);
    assert!(!flags.hangup);

    // Polling drained the latch.
    assert!(!client.poll_events().any());
}

#[test]
fn sample_rate_changes_are_queried_not_polled() {
    let (mut client, controller) = client_with(duplex_config());
    client.attach("listener").unwrap();
    assert_eq!(client.sample_rate().unwrap(), 48_000);

    controller.set_sample_rate(96_000);
    assert!(!client.poll_events().any());
    assert_eq!(client.sample_rate().unwrap(), 96_000);
}

#[test]
fn engine_shutdown_unblocks_a_waiting_exchange() {
    let (mut client, controller) = client_with(duplex_config());
    client.attach("doomed").unwrap();
    client.register_port("in", PortFlags::INPUT).unwrap();
    client.activate().unwrap();

    let waiter = thread::spawn(move || {
        let mut capture = SampleMatrix::zeroed(1, 4);
        let result = client.exchange(&no_input(), &mut capture);
        (client, result)
    });

    // Give the exchange a moment to block on the engine, then kill the
    // session from the server side.
    thread::sleep(Duration::from_millis(50));
    controller.shutdown();

    let (client, result) = waiter.join().unwrap();
    assert!(matches!(result, Err(Error::NotConnected)));
    assert!(client.poll_events().shutdown);
}

#[test]
fn hangup_kills_the_connection_but_not_the_client() {
    let (mut client, _controller) = client_with(duplex_config());
    client.attach("live").unwrap();
    client.register_port("in", PortFlags::INPUT).unwrap();
    client.activate().unwrap();

    let signal = client.hangup_signal();
    signal.raise();

    assert!(client.poll_events().hangup);
    assert!(matches!(client.list_ports(), Err(Error::NotConnected)));
    let mut capture = SampleMatrix::zeroed(1, 4);
    assert!(matches!(
        client.exchange(&no_input(), &mut capture),
        Err(Error::NotConnected)
    ));

    // The client object survives for a fresh session.
    client.detach();
    client.attach("live").unwrap();
    assert_eq!(client.state(), ClientState::Attached);
}

#[test]
fn detach_while_active_releases_the_engine_footprint() {
    let (mut client, controller) = client_with(duplex_config());
    client.attach("transient").unwrap();
    client.register_port("out", PortFlags::OUTPUT).unwrap();
    client.activate().unwrap();
    client
        .connect("transient:out", "system:playback_1")
        .unwrap();

    client.detach();
    assert_eq!(client.state(), ClientState::Detached);
    assert!(controller.connections().is_empty());

    // The names are free again for the next session.
    client.attach("transient").unwrap();
    client.register_port("out", PortFlags::OUTPUT).unwrap();
}

#[test]
fn own_ports_connect_only_while_active() {
    let (mut client, controller) = client_with(duplex_config());
    client.attach("router").unwrap();
    client.register_port("out", PortFlags::OUTPUT).unwrap();

    let err = client
        .connect("router:out", "system:playback_1")
        .unwrap_err();
    assert!(matches!(err, Error::Usage(_)));

    // Foreign-to-foreign routing is fine while inactive.
    client
        .connect("system:capture_1", "system:playback_1")
        .unwrap();

    client.activate().unwrap();
    client.connect("router:out", "system:playback_1").unwrap();
    assert_eq!(controller.connections().len(), 2);
    assert!(
        client
            .connections("system:playback_1")
            .unwrap()
            .contains(&"router:out".to_owned())
    );

    client
        .disconnect("system:capture_1", "system:playback_1")
        .unwrap();
    assert!(matches!(
        client.disconnect("system:capture_1", "system:playback_1"),
        Err(Error::Engine(_))
    ));
}

#[test]
fn a_port_may_face_both_directions() {
    let (mut client, controller) = client_with(duplex_config());
    client.attach("loop").unwrap();
    client
        .register_port("io", PortFlags::INPUT.union(PortFlags::OUTPUT))
        .unwrap();
    client.activate().unwrap();

    controller.set_input("loop:io", &[1.0, 2.0, 3.0, 4.0]);
    controller.run_cycle();

    let playback = SampleMatrix::from_rows(&[&[9.0, 9.0, 9.0, 9.0]]);
    let mut capture = SampleMatrix::zeroed(1, 4);
    client.exchange(&playback, &mut capture).unwrap();
    assert_eq!(capture.row(0), [1.0, 2.0, 3.0, 4.0]);

    // Capture is gathered before playback is scattered, so the period that
    // plays 9s still captured the buffer's prior contents.
    controller.run_cycle();
    assert_eq!(controller.output_of("loop:io"), [9.0, 9.0, 9.0, 9.0]);
    client.exchange(&playback, &mut capture).unwrap();
    assert_eq!(capture.row(0), [1.0, 2.0, 3.0, 4.0]);
}

#[test]
fn queries_reflect_the_engine_graph() {
    let (mut client, _controller) = client_with(duplex_config());
    client.attach("asker").unwrap();
    client.register_port("in", PortFlags::INPUT).unwrap();

    assert_eq!(client.buffer_size().unwrap(), 4);
    let names = client.list_ports().unwrap();
    assert_eq!(
        names,
        ["system:capture_1", "system:playback_1", "asker:in"]
    );
    assert!(
        client
            .port_flags("system:capture_1")
            .unwrap()
            .contains(PortFlags::OUTPUT.union(PortFlags::PHYSICAL))
    );
    assert!(
        client
            .port_flags("asker:in")
            .unwrap()
            .contains(PortFlags::INPUT)
    );
}
