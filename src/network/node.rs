use std::time::Instant;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::core::{Error, NodeConfig, NodeName, Result, SystemId};
use crate::protocol::{
    AdmitOutcome, EstimatedState, FragmentAssembler, FragmentHeader, Frame, FrameCodec, Message,
    TransmissionQueue, FRAGMENT_TAG,
};
use crate::time::{util, TdmaSchedule};
use super::{LinkDriver, SystemResolver};

/// Inputs of the node, each handled to completion before the next
#[derive(Debug, Clone)]
pub enum Event {
    /// Raw frame delivered by the modem
    Received {
        source: NodeName,
        destination: NodeName,
        data: Bytes,
    },
    /// Application request to send a message
    SendRequest {
        destination: NodeName,
        message: Message,
    },
    /// Latest navigation estimate of this vehicle
    EstimatedState(EstimatedState),
    /// Absolute time, e.g. from a GPS fix
    Tick(DateTime<Utc>),
}

/// A decoded message published to the bus
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    /// Node the message came from
    pub source: NodeName,
    /// Numeric id of the source, when the resolver knows it
    pub source_id: Option<SystemId>,
    pub message: Message,
}

/// Acoustic networking node
///
/// Owns all protocol state. Events are processed one at a time, so the
/// assembler and queue are never touched concurrently.
pub struct AcousticNode<L, R> {
    /// Configuration
    config: NodeConfig,
    /// Frame codec
    codec: FrameCodec,
    /// In-flight fragment assemblies
    assembler: FragmentAssembler,
    /// TDMA schedule
    schedule: TdmaSchedule,
    /// Pending outbound frames
    queue: TransmissionQueue,
    /// Last received estimated state
    estimate: Option<EstimatedState>,
    /// Destination of last transmission
    last_destination: Option<NodeName>,
    /// Minute and window start of the last slot used
    served_slot: Option<(i64, u32)>,
    /// Modem driver
    link: L,
    /// System name resolver
    resolver: R,
    /// Channel for publishing decoded messages
    delivery_tx: mpsc::Sender<Delivery>,
}

impl<L: LinkDriver, R: SystemResolver> AcousticNode<L, R> {
    /// Creates a node, failing fast on an invalid configuration
    pub fn new(
        config: NodeConfig,
        link: L,
        resolver: R,
        delivery_tx: mpsc::Sender<Delivery>,
    ) -> Result<Self> {
        config.validate()?;
        let schedule =
            TdmaSchedule::configure(config.slot_count, config.slot_number, config.slot_duration)?;

        Ok(AcousticNode {
            codec: FrameCodec::new(config.frame_capacity),
            assembler: FragmentAssembler::new(),
            schedule,
            queue: TransmissionQueue::new(),
            estimate: None,
            last_destination: None,
            served_slot: None,
            link,
            resolver,
            delivery_tx,
            config,
        })
    }

    /// Applies new parameters; on error the node keeps running with the old ones
    pub fn reconfigure(&mut self, config: NodeConfig) -> Result<()> {
        config.validate()?;
        self.schedule
            .reconfigure(config.slot_count, config.slot_number, config.slot_duration)?;
        self.codec.set_capacity(config.frame_capacity);
        self.served_slot = None;

        info!(
            slot_count = config.slot_count,
            slot_number = config.slot_number,
            slot_duration = config.slot_duration,
            "schedule updated"
        );
        self.config = config;
        Ok(())
    }

    /// Processes events until the stream ends
    ///
    /// Pending frames and incomplete assemblies are dropped on return.
    pub async fn run<S>(&mut self, mut events: S) -> Result<()>
    where
        S: Stream<Item = Event> + Unpin,
    {
        while let Some(event) = events.next().await {
            self.handle_event(event).await?;
        }

        info!(
            pending = self.queue.len(),
            assemblies = self.assembler.len(),
            "event stream closed, dropping pending state"
        );
        self.queue.clear();
        self.assembler = FragmentAssembler::new();
        Ok(())
    }

    /// Handles one event
    pub async fn handle_event(&mut self, event: Event) -> Result<()> {
        self.handle_event_at(event, Instant::now()).await
    }

    /// Handles one event at a given monotonic instant
    ///
    /// Only a closed message bus is reported as an error; every protocol
    /// failure is logged and the offending data dropped.
    pub async fn handle_event_at(&mut self, event: Event, now: Instant) -> Result<()> {
        match event {
            Event::Received { source, destination, data } => {
                self.on_receive(source, destination, data, now).await
            }
            Event::SendRequest { destination, message } => {
                self.on_send_request(destination, &message);
                Ok(())
            }
            Event::EstimatedState(state) => {
                self.estimate = Some(state);
                Ok(())
            }
            Event::Tick(time) => {
                self.on_tick(time, now);
                Ok(())
            }
        }
    }

    async fn on_receive(
        &mut self,
        source: NodeName,
        destination: NodeName,
        data: Bytes,
        now: Instant,
    ) -> Result<()> {
        if destination != self.config.system_name {
            debug!(%source, %destination, "ignoring frame for another node");
            return Ok(());
        }

        if data.is_empty() {
            debug!(%source, "ignoring empty frame");
            return Ok(());
        }

        let decoded = if data[0] == FRAGMENT_TAG {
            match self.reassemble(&source, &data, now) {
                Some(payload) => self.codec.decode_payload(&payload),
                None => return Ok(()),
            }
        } else {
            self.codec.decode(&Frame::new(source.clone(), destination, data))
        };

        let message = match decoded {
            Ok(message) => message,
            Err(e) => {
                warn!(%source, "deserialization error: {}", e);
                return Ok(());
            }
        };

        let delivery = Delivery {
            source_id: self.resolver.resolve(&source),
            source,
            message,
        };

        self.delivery_tx
            .send(delivery)
            .await
            .map_err(|e| Error::bus(format!("Failed to publish message: {}", e)))
    }

    /// Admits a fragment frame, returning the payload once the message is whole
    fn reassemble(&mut self, source: &NodeName, data: &[u8], now: Instant) -> Option<Bytes> {
        if data.len() > self.codec.capacity() {
            warn!(
                %source,
                "dropping fragment: {}",
                Error::malformed(format!(
                    "fragment frame of {} bytes exceeds capacity of {}",
                    data.len(),
                    self.codec.capacity()
                ))
            );
            return None;
        }

        let (header, slice) = match FragmentHeader::parse(data) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(%source, "dropping fragment: {}", e);
                return None;
            }
        };

        match self.assembler.admit_fragment(source.clone(), header, slice, now) {
            Ok(AdmitOutcome::Complete(payload)) => Some(payload),
            Ok(AdmitOutcome::Incomplete { missing }) => {
                debug!(%source, uid = header.uid, missing, "fragment stored");
                None
            }
            Ok(AdmitOutcome::AlreadyComplete) => None,
            Err(e) => {
                warn!(%source, "dropping fragment: {}", e);
                None
            }
        }
    }

    fn on_send_request(&mut self, destination: NodeName, message: &Message) {
        match self.codec.encode(message, self.config.system_name.clone(), destination) {
            Ok(frame) => {
                if let Some(replaced) = self.queue.enqueue(frame) {
                    debug!(destination = %replaced.destination, "replacing pending frame");
                }
            }
            Err(e) => warn!(kind = ?message.kind(), "message doesn't fit in one frame: {}", e),
        }
    }

    fn on_tick(&mut self, time: DateTime<Utc>, now: Instant) {
        for expired in self.assembler.sweep_expired(now, self.config.fragment_timeout) {
            debug!(
                source = %expired.key.source,
                uid = expired.key.uid,
                missing = expired.missing,
                "assembly expired"
            );
        }

        let second = util::second_of_minute(time);
        let Some(start) = self.schedule.slot_start(second) else {
            return;
        };

        // One transmission per slot occurrence
        let occurrence = (util::cycle_index(time), start);
        if self.served_slot == Some(occurrence) {
            return;
        }
        self.served_slot = Some(occurrence);

        if self.config.transmit_estimated_state {
            self.transmit_estimate();
        } else {
            self.transmit_pending();
        }
    }

    fn transmit_estimate(&mut self) {
        let Some(state) = self.estimate else {
            debug!("no estimated state to transmit");
            return;
        };

        let frame = self.codec.encode(
            &Message::EstimatedState(state),
            self.config.system_name.clone(),
            self.config.destination.clone(),
        );

        match frame {
            Ok(frame) => self.transmit(frame),
            Err(e) => warn!("failed to encode estimated state: {}", e),
        }
    }

    fn transmit_pending(&mut self) {
        if let Some(frame) = self.queue.drain_one(self.last_destination.as_ref()) {
            self.last_destination = Some(frame.destination.clone());
            self.transmit(frame);
        }
    }

    fn transmit(&mut self, frame: Frame) {
        debug!(destination = %frame.destination, len = frame.len(), "transmitting frame");
        if let Err(e) = self.link.send(&frame) {
            error!(destination = %frame.destination, "failed to transmit frame: {}", e);
        }
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn codec(&self) -> &FrameCodec {
        &self.codec
    }

    pub fn codec_mut(&mut self) -> &mut FrameCodec {
        &mut self.codec
    }

    pub fn schedule(&self) -> &TdmaSchedule {
        &self.schedule
    }

    pub fn queue(&self) -> &TransmissionQueue {
        &self.queue
    }

    pub fn assembler(&self) -> &FragmentAssembler {
        &self.assembler
    }

    pub fn link(&self) -> &L {
        &self.link
    }
}
