use crate::drivers::traits::{DriverReading, DriverResult, EquipmentConfig, EquipmentDriver, TagRequest};
use crate::tags::structures::{now_millis, quality_code, ValueVariant};
use async_trait::async_trait;
use std::collections::HashMap;
use std::f64::consts::TAU;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info};

/// Waveform behind a simulated address.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    /// `sine:<amplitude>:<period_ms>`
    Sine { amplitude: f64, period_ms: f64 },
    /// `ramp:<step>`, grows by `step` on every read
    Ramp { step: f64 },
    /// `counter`
    Counter,
    /// `toggle`
    Toggle,
    /// `constant:<value>`
    Constant(ValueVariant),
    /// `noisy:<base>:<jitter>`, deterministic jitter around `base`
    Noisy { base: f64, jitter: f64 },
}

impl FromStr for Signal {
    type Err = String;

    fn from_str(address: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = address.split(':').collect();
        let number = |i: usize| -> Result<f64, String> {
            parts
                .get(i)
                .ok_or_else(|| format!("Address '{}' is missing parameter {}", address, i))?
                .parse::<f64>()
                .map_err(|e| format!("Address '{}': {}", address, e))
        };
        match parts[0] {
            "sine" => Ok(Signal::Sine {
                amplitude: number(1)?,
                period_ms: number(2)?.max(1.0),
            }),
            "ramp" => Ok(Signal::Ramp { step: number(1)? }),
            "counter" => Ok(Signal::Counter),
            "toggle" => Ok(Signal::Toggle),
            "constant" => {
                let raw = address
                    .split_once(':')
                    .map(|(_, v)| v)
                    .ok_or_else(|| format!("Address '{}' has no constant value", address))?;
                Ok(Signal::Constant(parse_constant(raw)))
            }
            "noisy" => Ok(Signal::Noisy {
                base: number(1)?,
                jitter: number(2)?,
            }),
            other => Err(format!("Unknown signal '{}'", other)),
        }
    }
}

fn parse_constant(raw: &str) -> ValueVariant {
    if let Ok(i) = raw.parse::<i64>() {
        ValueVariant::Int(i)
    } else if let Ok(f) = raw.parse::<f64>() {
        ValueVariant::Float(f)
    } else if let Ok(b) = raw.parse::<bool>() {
        ValueVariant::Bool(b)
    } else {
        ValueVariant::String(raw.to_string())
    }
}

// splitmix64, mapped to [-1, 1]
fn pseudo_noise(seed: u64) -> f64 {
    let mut z = seed.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^= z >> 31;
    (z % 2001) as f64 / 1000.0 - 1.0
}

impl Signal {
    fn sample(&self, tick: u64, elapsed_ms: f64) -> ValueVariant {
        match self {
            Signal::Sine { amplitude, period_ms } => {
                ValueVariant::Float(amplitude * (TAU * elapsed_ms / period_ms).sin())
            }
            Signal::Ramp { step } => ValueVariant::Float(step * tick as f64),
            Signal::Counter => ValueVariant::Int(tick as i64),
            Signal::Toggle => ValueVariant::Bool(tick % 2 == 1),
            Signal::Constant(value) => value.clone(),
            Signal::Noisy { base, jitter } => ValueVariant::Float(base + jitter * pseudo_noise(tick)),
        }
    }
}

/// Equipment that generates values instead of talking to hardware.
pub struct SimulatedDriver {
    config: EquipmentConfig,
    connected: AtomicBool,
    reads: AtomicU64,
    started: Instant,
}

impl SimulatedDriver {
    pub fn new(config: EquipmentConfig) -> Self {
        SimulatedDriver {
            config,
            connected: AtomicBool::new(false),
            reads: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    fn read_one(&self, address: &str, tick: u64, elapsed_ms: f64, timestamp: i64) -> DriverReading {
        if self.config.unavailable.iter().any(|a| a == address) {
            return DriverReading::Invalid {
                quality_code: quality_code::DATA_UNAVAILABLE,
                description: format!("Address '{}' is unavailable", address),
            };
        }
        match address.parse::<Signal>() {
            Ok(signal) => DriverReading::Value {
                value: signal.sample(tick, elapsed_ms),
                description: None,
                timestamp,
            },
            Err(e) => DriverReading::Invalid {
                quality_code: quality_code::INCORRECT_NATIVE_ADDRESS,
                description: e,
            },
        }
    }
}

#[async_trait]
impl EquipmentDriver for SimulatedDriver {
    fn config(&self) -> &EquipmentConfig {
        &self.config
    }

    async fn connect(&self) -> DriverResult<()> {
        if !self.connected.swap(true, Ordering::SeqCst) {
            info!("Simulated equipment '{}' connected", self.config.id);
        }
        Ok(())
    }

    async fn disconnect(&self) -> DriverResult<()> {
        if self.connected.swap(false, Ordering::SeqCst) {
            info!("Simulated equipment '{}' disconnected", self.config.id);
        }
        Ok(())
    }

    async fn check_status(&self) -> DriverResult<()> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(format!("Equipment '{}' is not connected", self.config.id).into())
        }
    }

    async fn read_tags(&self, tags: &[TagRequest]) -> DriverResult<HashMap<String, DriverReading>> {
        self.check_status().await?;
        let tick = self.reads.fetch_add(1, Ordering::Relaxed) + 1;
        let elapsed_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        let timestamp = now_millis();

        let results: HashMap<String, DriverReading> = tags
            .iter()
            .map(|request| {
                let reading = self.read_one(&request.address, tick, elapsed_ms, timestamp);
                if let DriverReading::Invalid { description, .. } = &reading {
                    debug!("Equipment '{}': {}", self.config.id, description);
                }
                (request.address.clone(), reading)
            })
            .collect();
        Ok(results)
    }

    fn kind(&self) -> &'static str {
        "simulated"
    }
}
