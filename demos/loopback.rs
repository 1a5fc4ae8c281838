use std::time::Duration;

use chrono::{NaiveDate, Timelike};
use tdma_acomms::network::StaticResolver;
use tdma_acomms::protocol::Fragmenter;
use tdma_acomms::time::util;
use tdma_acomms::{AcousticNode, EstimatedState, Event, Frame, Message, NodeConfig, NodeName, SystemId};
use tokio::sync::mpsc;

/// Relays every frame a node transmitted into the peer node
async fn relay<R: tdma_acomms::SystemResolver>(
    link_rx: &mut mpsc::UnboundedReceiver<Frame>,
    peer: &mut AcousticNode<mpsc::UnboundedSender<Frame>, R>,
) {
    while let Ok(frame) = link_rx.try_recv() {
        let event = Event::Received {
            source: frame.source,
            destination: frame.destination,
            data: frame.data,
        };
        if let Err(e) = peer.handle_event(event).await {
            eprintln!("Relay error: {}", e);
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let resolver: StaticResolver = [
        (NodeName::from("auv-1"), SystemId(0x2001)),
        (NodeName::from("base"), SystemId(0x4001)),
    ]
    .into_iter()
    .collect();

    // The vehicle reports its estimated state, the base station relays operator traffic
    let vehicle_config = NodeConfig {
        system_name: NodeName::from("auv-1"),
        slot_count: 2,
        slot_number: 0,
        slot_duration: 5,
        destination: NodeName::from("base"),
        transmit_estimated_state: true,
        ..Default::default()
    };
    let base_config = NodeConfig {
        system_name: NodeName::from("base"),
        slot_number: 1,
        transmit_estimated_state: false,
        fragment_timeout: Duration::from_secs(30),
        ..vehicle_config.clone()
    };

    let (vehicle_link, mut vehicle_rx) = mpsc::unbounded_channel();
    let (base_link, mut base_rx) = mpsc::unbounded_channel();
    let (vehicle_bus, mut vehicle_deliveries) = mpsc::channel(64);
    let (base_bus, mut base_deliveries) = mpsc::channel(64);

    let mut vehicle = AcousticNode::new(vehicle_config, vehicle_link, resolver.clone(), vehicle_bus)
        .expect("valid vehicle configuration");
    let mut base = AcousticNode::new(base_config, base_link, resolver, base_bus)
        .expect("valid base configuration");

    let date = NaiveDate::from_ymd_opt(2024, 5, 17).expect("valid date");
    let mut state = EstimatedState {
        lat: 41.185_f64.to_radians(),
        lon: (-8.706_f64).to_radians(),
        depth: 2.0,
        ..Default::default()
    };

    // A long mission note is split into fragments and handed to the base as
    // received frames, bypassing the slot schedule
    let note = Message::TextMessage {
        origin: "auv-1".to_string(),
        text: "Survey leg complete, starting lawnmower pattern over sector B at 12 m depth".to_string(),
    };
    let payload = vehicle.codec().encode_unbounded(&note).expect("encodable note");
    let fragments = Fragmenter::new()
        .split(&payload, &NodeName::from("auv-1"), &NodeName::from("base"), 64)
        .expect("note fits in fragments");
    for fragment in fragments {
        let event = Event::Received {
            source: fragment.source,
            destination: fragment.destination,
            data: fragment.data,
        };
        if let Err(e) = base.handle_event(event).await {
            eprintln!("Fragment error: {}", e);
        }
    }

    for second in 0..60u32 {
        let time = util::from_gps_fix(date, 12.0 * 3600.0 + second as f64).expect("valid fix");

        state.depth += 0.2;
        vehicle.handle_event(Event::EstimatedState(state)).await.ok();

        if second % 7 == 0 {
            let request = Event::SendRequest {
                destination: NodeName::from("auv-1"),
                message: Message::Heartbeat,
            };
            base.handle_event(request).await.ok();
        }

        vehicle.handle_event(Event::Tick(time)).await.ok();
        base.handle_event(Event::Tick(time)).await.ok();

        relay(&mut vehicle_rx, &mut base).await;
        relay(&mut base_rx, &mut vehicle).await;

        while let Ok(delivery) = base_deliveries.try_recv() {
            println!("[{:02}] base <- {}: {:?}", time.second(), delivery.source, delivery.message);
        }
        while let Ok(delivery) = vehicle_deliveries.try_recv() {
            println!("[{:02}] auv-1 <- {}: {:?}", time.second(), delivery.source, delivery.message);
        }
    }
}
