//! Reference listener for the marker transport.
//!
//! Answers readiness probes and keeps the latest marker set and transform
//! tree it has been sent.

use armature_core::{ArmatureResult, UdpLink};
use armature_library::messages::{MarkerAction, MarkerPacket};
use armature_library::{LogSummary, TFTree};
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EchoStats {
    pub probes: u64,
    pub marker_packets: u64,
    pub markers: u64,
    pub transform_packets: u64,
    pub transforms_applied: u64,
}

pub struct MarkerEcho {
    link: UdpLink<MarkerPacket>,
    tf_tree: TFTree,
    stats: EchoStats,
}

impl MarkerEcho {
    pub fn bind(addr: SocketAddr, world_frame: &str) -> ArmatureResult<Self> {
        let link = UdpLink::bind(addr)?;
        tracing::info!("marker_echo listening on {}", link.local_addr()?);
        Ok(Self {
            link,
            tf_tree: TFTree::new(world_frame),
            stats: EchoStats::default(),
        })
    }

    pub fn local_addr(&self) -> ArmatureResult<SocketAddr> {
        self.link.local_addr()
    }

    pub fn tf_tree(&self) -> &TFTree {
        &self.tf_tree
    }

    pub fn stats(&self) -> EchoStats {
        self.stats
    }

    /// Handle at most one packet. Returns false when nothing arrived in `timeout`.
    pub fn poll(&mut self, timeout: Duration) -> ArmatureResult<bool> {
        let Some((packet, from)) = self.link.recv_timeout(timeout)? else {
            return Ok(false);
        };
        tracing::debug!("{} from {}", packet.log_summary(), from);

        match packet {
            MarkerPacket::Probe { nonce } => {
                self.stats.probes += 1;
                self.link.send_to(&MarkerPacket::Ack { nonce }, from)?;
            }
            MarkerPacket::Ack { .. } => {}
            MarkerPacket::Markers(array) => {
                if array.markers.iter().any(|m| m.action == MarkerAction::DeleteAll) {
                    self.tf_tree.clear();
                }
                self.stats.marker_packets += 1;
                self.stats.markers += array.markers.len() as u64;
            }
            MarkerPacket::Transforms(message) => {
                self.stats.transform_packets += 1;
                self.stats.transforms_applied += self.tf_tree.apply_message(&message) as u64;
            }
        }
        Ok(true)
    }
}
