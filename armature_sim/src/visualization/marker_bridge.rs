//! Out-of-process visualizer bridge: markers and TF over UDP.
//!
//! The listener is confirmed with a probe/ack handshake before the run. After
//! that every packet is fire-and-forget; failures are counted and logged.

use super::{GeometrySink, SinkStats, VisualizerConfig};
use crate::error::SimResult;
use armature_core::{ArmatureError, NodeContext, ReconnectStrategy, UdpLink};
use armature_library::messages::{Marker, MarkerArray, MarkerPacket, SceneDraw, SceneLoad};
use armature_library::tf::{stamp_from_seconds, TFMessage, TransformStamped};
use armature_library::LogSummary;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::{Duration, Instant};
use uuid::Uuid;

pub const DEFAULT_MARKER_ADDR: SocketAddr =
    SocketAddr::new(std::net::IpAddr::V4(Ipv4Addr::LOCALHOST), 9870);

/// Keeps each marker datagram well under the UDP payload limit
pub const MARKERS_PER_PACKET: usize = 100;

/// Same limit for the per-publish TF packets
pub const TRANSFORMS_PER_PACKET: usize = 100;

const MIN_PROBE_WINDOW: Duration = Duration::from_millis(5);

pub struct MarkerVisualizer {
    name: String,
    namespace: String,
    config: VisualizerConfig,
    link: UdpLink<MarkerPacket>,
    nonce: u64,
    ready: bool,
    stats: SinkStats,
}

impl MarkerVisualizer {
    pub fn new(node: &NodeContext, addr: SocketAddr, config: VisualizerConfig) -> SimResult<Self> {
        if !node.ok() {
            return Err(ArmatureError::NodeShutdown(node.name().to_string()).into());
        }
        let link = UdpLink::connect(addr)?;
        tracing::info!(
            "MarkerVisualizer -> {} (period {}s, world frame '{}')",
            addr,
            config.publish_period,
            config.world_frame
        );
        Ok(Self {
            name: format!("{}/marker_visualizer", node.name()),
            namespace: node.name().to_string(),
            config,
            link,
            nonce: Uuid::new_v4().as_u128() as u64,
            ready: false,
            stats: SinkStats::default(),
        })
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.link.remote_addr()
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    fn send(&mut self, packet: MarkerPacket) {
        if let Err(e) = self.link.send(&packet) {
            self.stats.send_failures += 1;
            tracing::warn!("{}: dropped {}: {}", self.name, packet.log_summary(), e);
        }
    }

    /// Wait up to `window` for an ack carrying our nonce. Other packets and
    /// undecodable datagrams are ignored.
    fn wait_for_ack(&self, window: Duration) -> SimResult<bool> {
        let deadline = Instant::now() + window;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(false);
            }
            match self.link.recv_timeout(remaining) {
                Ok(Some((MarkerPacket::Ack { nonce }, from))) if nonce == self.nonce => {
                    tracing::debug!("{}: ack from {}", self.name, from);
                    return Ok(true);
                }
                Ok(Some((other, from))) => {
                    tracing::debug!("{}: ignoring {} from {}", self.name, other.log_summary(), from);
                }
                Ok(None) => return Ok(false),
                Err(ArmatureError::Serialization(e)) => {
                    tracing::debug!("{}: ignoring malformed datagram: {}", self.name, e);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// One `world -> body` message per chunk of at most `TRANSFORMS_PER_PACKET` bodies.
    fn transforms(&self, draw: &SceneDraw) -> Vec<TFMessage> {
        let stamp = stamp_from_seconds(draw.timestamp);
        draw.poses
            .chunks(TRANSFORMS_PER_PACKET)
            .map(|chunk| {
                let mut message = TFMessage::new();
                for link in chunk {
                    message.push(TransformStamped::new(
                        self.config.world_frame.as_str(),
                        link.frame_name.as_str(),
                        link.pose,
                        stamp,
                    ));
                }
                message
            })
            .collect()
    }
}

impl GeometrySink for MarkerVisualizer {
    fn name(&self) -> &str {
        &self.name
    }

    fn publish_period(&self) -> f64 {
        self.config.publish_period
    }

    fn await_ready(&mut self, strategy: &ReconnectStrategy) -> SimResult<bool> {
        let mut attempt = 0;
        loop {
            if let Err(e) = self.link.send(&MarkerPacket::Probe { nonce: self.nonce }) {
                tracing::debug!("{}: probe {} failed: {}", self.name, attempt, e);
            }

            let window = strategy.backoff_delay(attempt + 1).max(MIN_PROBE_WINDOW);
            if self.wait_for_ack(window)? {
                tracing::info!("{}: listener ready after {} probe(s)", self.name, attempt + 1);
                self.ready = true;
                return Ok(true);
            }

            attempt += 1;
            if !strategy.should_retry(attempt) {
                tracing::debug!("{}: no ack after {} probe(s)", self.name, attempt);
                return Ok(false);
            }
        }
    }

    fn on_initialize(&mut self, load: &SceneLoad) {
        self.stats.initializations += 1;
        let mut markers = vec![Marker::delete_all()];
        markers.extend(
            load.geometries
                .iter()
                .enumerate()
                .map(|(id, geometry)| Marker::for_geometry(&self.namespace, id as u32, geometry)),
        );

        let chunks: Vec<Vec<Marker>> = markers
            .chunks(MARKERS_PER_PACKET)
            .map(|chunk| chunk.to_vec())
            .collect();
        for chunk in chunks {
            self.send(MarkerPacket::Markers(MarkerArray { markers: chunk }));
        }
    }

    fn publish(&mut self, draw: &SceneDraw) {
        self.stats.publishes += 1;
        for message in self.transforms(draw) {
            self.send(MarkerPacket::Transforms(message));
        }
    }

    fn stats(&self) -> SinkStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use armature_core::NodeOptions;
    use armature_library::messages::{GeometryDescription, LinkPose, MarkerAction, Shape};
    use armature_library::Transform;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;

    fn node(name: &str) -> NodeContext {
        NodeContext::init(NodeOptions::new(name).disable_signals(true)).unwrap()
    }

    fn loopback() -> SocketAddr {
        SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 0)
    }

    /// Listener that acks probes and forwards everything else.
    fn spawn_listener(
        stop: Arc<AtomicBool>,
    ) -> (SocketAddr, thread::JoinHandle<Vec<MarkerPacket>>) {
        let link = UdpLink::<MarkerPacket>::bind(loopback()).unwrap();
        let addr = link.local_addr().unwrap();
        let handle = thread::spawn(move || {
            let mut received = Vec::new();
            while !stop.load(Ordering::Relaxed) {
                if let Ok(Some((packet, from))) = link.recv_timeout(Duration::from_millis(20)) {
                    match packet {
                        MarkerPacket::Probe { nonce } => {
                            let _ = link.send_to(&MarkerPacket::Ack { nonce }, from);
                        }
                        other => received.push(other),
                    }
                }
            }
            received
        });
        (addr, handle)
    }

    #[test]
    fn test_handshake_and_packets_reach_listener() {
        let stop = Arc::new(AtomicBool::new(false));
        let (addr, listener) = spawn_listener(stop.clone());
        let node = node("marker_live");
        let mut sink = MarkerVisualizer::new(&node, addr, VisualizerConfig::default()).unwrap();

        assert!(sink.await_ready(&ReconnectStrategy::testing()).unwrap());
        assert!(sink.is_ready());

        sink.on_initialize(&SceneLoad {
            geometries: vec![GeometryDescription {
                name: "arm::base_visual".to_string(),
                frame_name: "arm::base".to_string(),
                shape: Shape::Sphere { radius: 0.1 },
                pose: Transform::identity(),
                color: [1.0; 4],
            }],
        });
        sink.publish(&SceneDraw {
            timestamp: 1.5,
            poses: vec![LinkPose {
                frame_name: "arm::base".to_string(),
                pose: Transform::identity(),
            }],
        });

        thread::sleep(Duration::from_millis(100));
        stop.store(true, Ordering::Relaxed);
        let received = listener.join().unwrap();

        assert_eq!(received.len(), 2);
        match &received[0] {
            MarkerPacket::Markers(array) => {
                assert_eq!(array.markers.len(), 2);
                assert_eq!(array.markers[0].action, MarkerAction::DeleteAll);
                assert_eq!(array.markers[1].frame_id, "arm::base");
            }
            other => panic!("expected markers, got {:?}", other),
        }
        match &received[1] {
            MarkerPacket::Transforms(tf) => {
                assert_eq!(tf.transforms[0].parent_frame, "world");
                assert_eq!(tf.transforms[0].stamp_nanos, 1_500_000_000);
            }
            other => panic!("expected transforms, got {:?}", other),
        }
    }

    #[test]
    fn test_silent_listener_is_not_ready() {
        // Bound but never answers
        let silent = UdpLink::<MarkerPacket>::bind(loopback()).unwrap();
        let node = node("marker_silent");
        let mut sink =
            MarkerVisualizer::new(&node, silent.local_addr().unwrap(), VisualizerConfig::default())
                .unwrap();

        let started = Instant::now();
        assert!(!sink.await_ready(&ReconnectStrategy::testing()).unwrap());
        assert!(!sink.is_ready());
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    /// Answers every probe with undecodable bytes, followed by an ack when `ack` is set.
    fn spawn_garbage_listener(ack: bool, stop: Arc<AtomicBool>) -> (SocketAddr, thread::JoinHandle<()>) {
        let socket = std::net::UdpSocket::bind(loopback()).unwrap();
        socket
            .set_read_timeout(Some(Duration::from_millis(20)))
            .unwrap();
        let addr = socket.local_addr().unwrap();
        let handle = thread::spawn(move || {
            let mut buffer = [0u8; 1024];
            while !stop.load(Ordering::Relaxed) {
                let Ok((size, from)) = socket.recv_from(&mut buffer) else {
                    continue;
                };
                let _ = socket.send_to(&[0xff, 0xff, 0xff], from);
                if let (true, Ok(MarkerPacket::Probe { nonce })) =
                    (ack, bincode::deserialize::<MarkerPacket>(&buffer[..size]))
                {
                    let reply = bincode::serialize(&MarkerPacket::Ack { nonce }).unwrap();
                    let _ = socket.send_to(&reply, from);
                }
            }
        });
        (addr, handle)
    }

    #[test]
    fn test_malformed_reply_is_skipped() {
        let stop = Arc::new(AtomicBool::new(false));
        let (addr, listener) = spawn_garbage_listener(true, stop.clone());
        let node = node("marker_garbage_then_ack");
        let mut sink = MarkerVisualizer::new(&node, addr, VisualizerConfig::default()).unwrap();

        assert!(sink.await_ready(&ReconnectStrategy::testing()).unwrap());

        stop.store(true, Ordering::Relaxed);
        listener.join().unwrap();
    }

    #[test]
    fn test_only_malformed_replies_is_not_ready() {
        let stop = Arc::new(AtomicBool::new(false));
        let (addr, listener) = spawn_garbage_listener(false, stop.clone());
        let node = node("marker_garbage_only");
        let mut sink = MarkerVisualizer::new(&node, addr, VisualizerConfig::default()).unwrap();

        assert!(!sink.await_ready(&ReconnectStrategy::testing()).unwrap());
        assert!(!sink.is_ready());

        stop.store(true, Ordering::Relaxed);
        listener.join().unwrap();
    }

    #[test]
    fn test_many_bodies_split_transform_packets() {
        let stop = Arc::new(AtomicBool::new(false));
        let (addr, listener) = spawn_listener(stop.clone());
        let node = node("marker_tf_chunks");
        let mut sink = MarkerVisualizer::new(&node, addr, VisualizerConfig::default()).unwrap();

        let poses = (0..250)
            .map(|i| LinkPose {
                frame_name: format!("swarm::link_{}", i),
                pose: Transform::from_translation([i as f64, 0.0, 0.0]),
            })
            .collect();
        sink.publish(&SceneDraw { timestamp: 0.5, poses });

        thread::sleep(Duration::from_millis(100));
        stop.store(true, Ordering::Relaxed);
        let received = listener.join().unwrap();
        let sizes: Vec<usize> = received
            .iter()
            .filter_map(|p| match p {
                MarkerPacket::Transforms(tf) => Some(tf.len()),
                _ => None,
            })
            .collect();
        assert_eq!(sizes, vec![100, 100, 50]);
        assert_eq!(sink.stats().publishes, 1);
        assert_eq!(sink.stats().send_failures, 0);
    }

    #[test]
    fn test_large_scene_is_chunked() {
        let stop = Arc::new(AtomicBool::new(false));
        let (addr, listener) = spawn_listener(stop.clone());
        let node = node("marker_chunks");
        let mut sink = MarkerVisualizer::new(&node, addr, VisualizerConfig::default()).unwrap();

        let geometries = (0..150)
            .map(|i| GeometryDescription {
                name: format!("g{}", i),
                frame_name: "arm::base".to_string(),
                shape: Shape::Box { size: [0.1; 3] },
                pose: Transform::identity(),
                color: [1.0; 4],
            })
            .collect();
        sink.on_initialize(&SceneLoad { geometries });

        thread::sleep(Duration::from_millis(100));
        stop.store(true, Ordering::Relaxed);
        let received = listener.join().unwrap();
        let total: usize = received
            .iter()
            .map(|p| match p {
                MarkerPacket::Markers(array) => array.markers.len(),
                _ => 0,
            })
            .sum();
        assert_eq!(received.len(), 2);
        assert_eq!(total, 151);
        assert_eq!(sink.stats().send_failures, 0);
    }
}
