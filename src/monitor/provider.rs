use std::path::Path;
use std::time::Instant;

use async_trait::async_trait;
use sysinfo::{CpuExt, DiskExt, NetworkExt, NetworksExt, System, SystemExt};
use thiserror::Error;

use super::model::{EntityId, EntityReading, EntityStatus, ResourceUsage};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProbeError {
    #[error("{source_name} did not answer within {timeout_ms}ms")]
    Timeout {
        source_name: &'static str,
        timeout_ms: u64,
    },
    #[error("{0}")]
    Unavailable(String),
}

/// Yields host utilization.
#[async_trait]
pub trait HostProbe: Send {
    async fn sample_host(&mut self) -> Result<ResourceUsage, ProbeError>;
}

/// Yields utilization of externally managed game servers.
#[async_trait]
pub trait ResourceProvider: Send {
    async fn sample_entities(&mut self) -> Result<Vec<EntityReading>, ProbeError>;
}

/// Interface list is rescanned this often; counters are refreshed every sample.
const NETWORK_LIST_REFRESH_EVERY: u32 = 60;

/// Turns cumulative interface byte counters into a share of link capacity.
#[derive(Debug)]
pub(crate) struct NetworkMeter {
    capacity_bits: f64,
    last: Option<(u64, Instant)>,
}

impl NetworkMeter {
    pub(crate) fn new(capacity_mbit: u64) -> Option<Self> {
        (capacity_mbit > 0).then(|| Self {
            capacity_bits: capacity_mbit as f64 * 1_000_000.0,
            last: None,
        })
    }

    /// Utilisation since the previous observation. The first call only
    /// primes the counters.
    pub(crate) fn observe(&mut self, total_bytes: u64, at: Instant) -> Option<f32> {
        let (previous_bytes, previous_at) = self.last.replace((total_bytes, at))?;
        let elapsed_secs = at.checked_duration_since(previous_at)?.as_secs_f64();
        if elapsed_secs <= 0.0 {
            return None;
        }

        // Totals drop when an interface goes away.
        let bytes = total_bytes.saturating_sub(previous_bytes);
        let bits_per_sec = bytes as f64 * 8.0 / elapsed_secs;
        Some(((bits_per_sec / self.capacity_bits) * 100.0).clamp(0.0, 100.0) as f32)
    }
}

pub struct SystemHostProbe {
    system: System,
    network_meter: Option<NetworkMeter>,
    samples_since_list_refresh: u32,
}

impl SystemHostProbe {
    pub fn new(network_capacity_mbit: Option<u64>) -> Self {
        Self {
            system: System::new_all(),
            network_meter: network_capacity_mbit.and_then(NetworkMeter::new),
            samples_since_list_refresh: 0,
        }
    }

    fn network_usage(&mut self) -> Option<f32> {
        let meter = self.network_meter.as_mut()?;

        if self.samples_since_list_refresh >= NETWORK_LIST_REFRESH_EVERY {
            self.system.refresh_networks_list();
            self.samples_since_list_refresh = 0;
        } else {
            self.system.refresh_networks();
            self.samples_since_list_refresh += 1;
        }

        let total_bytes: u64 = self
            .system
            .networks()
            .iter()
            .map(|(_, data)| data.total_received().saturating_add(data.total_transmitted()))
            .sum();
        meter.observe(total_bytes, Instant::now())
    }
}

#[async_trait]
impl HostProbe for SystemHostProbe {
    async fn sample_host(&mut self) -> Result<ResourceUsage, ProbeError> {
        self.system.refresh_cpu();
        self.system.refresh_memory();
        self.system.refresh_disks_list();
        self.system.refresh_disks();

        let cpu = self.system.global_cpu_info().cpu_usage();

        let total_memory = self.system.total_memory() as f32;
        let used_memory = self.system.used_memory() as f32;
        let memory = if total_memory > 0.0 {
            (used_memory / total_memory) * 100.0
        } else {
            return Err(ProbeError::Unavailable(
                "host reported zero total memory".to_string(),
            ));
        };

        let disk = self
            .system
            .disks()
            .iter()
            .find(|disk| disk.mount_point() == Path::new("/"))
            .or_else(|| self.system.disks().first())
            .map(|disk| {
                let total_space = disk.total_space() as f32;
                let used_space = disk.total_space().saturating_sub(disk.available_space()) as f32;
                if total_space > 0.0 {
                    (used_space / total_space) * 100.0
                } else {
                    0.0
                }
            })
            .unwrap_or(0.0);

        let network = self.network_usage();

        Ok(ResourceUsage {
            cpu,
            memory,
            disk,
            network,
        })
    }
}

/// Used when no game-server panel is wired in.
pub struct NoResourceProvider;

#[async_trait]
impl ResourceProvider for NoResourceProvider {
    async fn sample_entities(&mut self) -> Result<Vec<EntityReading>, ProbeError> {
        Ok(Vec::new())
    }
}

pub struct SimulatedHostProbe {
    tick: u64,
}

impl SimulatedHostProbe {
    pub fn new() -> Self {
        Self { tick: 0 }
    }
}

impl Default for SimulatedHostProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HostProbe for SimulatedHostProbe {
    async fn sample_host(&mut self) -> Result<ResourceUsage, ProbeError> {
        self.tick = self.tick.saturating_add(1);
        let phase = self.tick as f32 / 8.0;

        let mut cpu = 45.0 + (phase.sin() * 20.0);
        let mut memory = 55.0 + ((phase * 0.7).sin() * 12.0);
        let mut disk = 60.0 + ((phase * 0.2).sin() * 5.0);
        let network = 20.0 + ((phase * 1.3).sin() * 15.0);

        if self.tick.is_multiple_of(30) {
            cpu = 95.0;
        }

        if self.tick.is_multiple_of(47) {
            memory = 93.0;
        }

        if self.tick.is_multiple_of(83) {
            disk = 91.0;
        }

        Ok(ResourceUsage {
            cpu: cpu.clamp(0.0, 100.0),
            memory: memory.clamp(0.0, 100.0),
            disk: disk.clamp(0.0, 100.0),
            network: Some(network.clamp(0.0, 100.0)),
        })
    }
}

/// Game servers following offset waves; every server drops offline for a
/// few ticks now and then so the miss counter gets exercised.
pub struct SimulatedResourceProvider {
    tick: u64,
    server_count: usize,
}

impl SimulatedResourceProvider {
    pub fn new(server_count: usize) -> Self {
        Self {
            tick: 0,
            server_count,
        }
    }
}

#[async_trait]
impl ResourceProvider for SimulatedResourceProvider {
    async fn sample_entities(&mut self) -> Result<Vec<EntityReading>, ProbeError> {
        self.tick = self.tick.saturating_add(1);

        let readings = (0..self.server_count)
            .map(|index| {
                let offset = index as f32 * 1.7;
                let phase = self.tick as f32 / 6.0 + offset;
                let offline = (self.tick + index as u64 * 13) % 120 < 4;

                let (status, usage) = if offline {
                    (EntityStatus::Offline, None)
                } else {
                    let cpu = 35.0 + phase.sin() * 30.0;
                    let memory = 50.0 + (phase * 0.5).sin() * 20.0;
                    let disk = 40.0 + (phase * 0.1).sin() * 4.0;
                    (
                        EntityStatus::Running,
                        Some(ResourceUsage {
                            cpu: cpu.clamp(0.0, 100.0),
                            memory: memory.clamp(0.0, 100.0),
                            disk: disk.clamp(0.0, 100.0),
                            network: None,
                        }),
                    )
                };

                EntityReading {
                    entity_id: EntityId::new(format!("server-{}", index + 1)),
                    name: format!("Simulated server {}", index + 1),
                    status,
                    usage,
                }
            })
            .collect();

        Ok(readings)
    }
}

#[cfg(test)]
pub(crate) struct ScriptedHostProbe {
    sequence: std::collections::VecDeque<Result<ResourceUsage, ProbeError>>,
}

#[cfg(test)]
impl ScriptedHostProbe {
    pub(crate) fn new(sequence: Vec<Result<ResourceUsage, ProbeError>>) -> Self {
        Self {
            sequence: sequence.into(),
        }
    }
}

#[cfg(test)]
#[async_trait]
impl HostProbe for ScriptedHostProbe {
    async fn sample_host(&mut self) -> Result<ResourceUsage, ProbeError> {
        self.sequence
            .pop_front()
            .unwrap_or_else(|| Err(ProbeError::Unavailable("script exhausted".to_string())))
    }
}

#[cfg(test)]
pub(crate) struct ScriptedResourceProvider {
    sequence: std::collections::VecDeque<Result<Vec<EntityReading>, ProbeError>>,
}

#[cfg(test)]
impl ScriptedResourceProvider {
    pub(crate) fn new(sequence: Vec<Result<Vec<EntityReading>, ProbeError>>) -> Self {
        Self {
            sequence: sequence.into(),
        }
    }
}

#[cfg(test)]
#[async_trait]
impl ResourceProvider for ScriptedResourceProvider {
    async fn sample_entities(&mut self) -> Result<Vec<EntityReading>, ProbeError> {
        self.sequence.pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }
}

#[cfg(test)]
pub(crate) fn usage(cpu: f32, memory: f32, disk: f32) -> ResourceUsage {
    ResourceUsage {
        cpu,
        memory,
        disk,
        network: None,
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::{
        EntityStatus, HostProbe, NetworkMeter, ResourceProvider, SimulatedHostProbe,
        SimulatedResourceProvider,
    };

    #[test]
    fn network_meter_measures_traffic_between_observations() {
        let mut meter = NetworkMeter::new(8).expect("non-zero capacity");
        let start = Instant::now();

        assert_eq!(meter.observe(10_000_000, start), None);

        // 500 kB in one second is 4 Mbit/s on an 8 Mbit/s link.
        let usage = meter
            .observe(10_500_000, start + Duration::from_secs(1))
            .expect("second observation yields usage");
        assert!((usage - 50.0).abs() < 0.01, "usage was {usage}");

        // 20 MB in one second saturates the link.
        let usage = meter
            .observe(30_500_000, start + Duration::from_secs(2))
            .expect("third observation yields usage");
        assert_eq!(usage, 100.0);
    }

    #[test]
    fn network_meter_tolerates_counter_drops() {
        let mut meter = NetworkMeter::new(100).expect("non-zero capacity");
        let start = Instant::now();
        meter.observe(5_000_000, start);

        let usage = meter.observe(1_000, start + Duration::from_secs(5));
        assert_eq!(usage, Some(0.0));
        assert!(NetworkMeter::new(0).is_none());
    }

    #[tokio::test]
    async fn simulated_host_spikes_cpu_periodically() {
        let mut probe = SimulatedHostProbe::new();
        let mut spikes = 0;
        for _ in 0..60 {
            let usage = probe.sample_host().await.expect("simulation never fails");
            assert!((0.0..=100.0).contains(&usage.cpu));
            if usage.cpu >= 95.0 {
                spikes += 1;
            }
        }
        assert!(spikes >= 2);
    }

    #[tokio::test]
    async fn simulated_servers_report_offline_without_usage() {
        let mut provider = SimulatedResourceProvider::new(3);
        let mut saw_offline = false;
        for _ in 0..120 {
            let readings = provider.sample_entities().await.expect("simulation never fails");
            assert_eq!(readings.len(), 3);
            for reading in readings {
                if reading.status == EntityStatus::Offline {
                    saw_offline = true;
                    assert!(reading.usage.is_none());
                } else {
                    assert!(reading.usage.is_some());
                }
            }
        }
        assert!(saw_offline);
    }
}
