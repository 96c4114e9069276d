//! Assemblies: logical units composed of several nodes.
//!
//! The kettle couples its thermometers to a steering relay and a heat-plate
//! relay, collects a combined windowed temperature frame, and runs the
//! PD + PWM control loop that turns a temperature setpoint into relay
//! commands. Assemblies resolve their node states by key through the
//! supervisor's registry, so there are no back-pointers.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;

use wb_config::{ControllerConfig, DataCollectConfig, ResolvedAssembly};

use crate::control::{duty_cycle, pd_error};
use crate::error::{RuntimeError, RuntimeResult};
use crate::node_state::{SharedNodeState, ThermReading};
use crate::series::WindowedSeries;
use crate::util::{avg_opt, unix_time};

/// An assembly built from its configured class tag.
#[derive(Clone)]
pub enum Assembly {
    Kettle(KettleAssembly),
}

impl std::fmt::Debug for Assembly {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Assembly::Kettle(k) => f.debug_tuple("Kettle").field(&k.key).finish(),
        }
    }
}

impl Assembly {
    /// Resolve `assembly_class` through the factory table.
    pub async fn from_config(
        conf: &ResolvedAssembly,
        node_states: &HashMap<String, SharedNodeState>,
    ) -> RuntimeResult<Assembly> {
        match conf.assembly_class.as_str() {
            "kettle" => Ok(Assembly::Kettle(
                KettleAssembly::from_config(conf, node_states).await?,
            )),
            other => Err(RuntimeError::UnknownAssemblyClass(other.to_string())),
        }
    }

    pub fn key(&self) -> &str {
        match self {
            Assembly::Kettle(kettle) => &kettle.key,
        }
    }

    pub fn as_kettle(&self) -> Option<&KettleAssembly> {
        match self {
            Assembly::Kettle(kettle) => Some(kettle),
        }
    }
}

/// State shared between the kettle's tasks and the HTTP adapter.
struct KettleShared {
    temp_series: WindowedSeries,
    setpoint: Option<f64>,
}

/// A brew kettle: thermometers, steering motor, heat plate, and the thermal
/// control loop.
#[derive(Clone)]
pub struct KettleAssembly {
    key: String,
    thermometers: Vec<SharedNodeState>,
    steering: SharedNodeState,
    heat_plate: SharedNodeState,
    volume: f64,
    controller: ControllerConfig,
    data_collect: DataCollectConfig,
    shared: Arc<RwLock<KettleShared>>,
}

impl KettleAssembly {
    pub async fn from_config(
        conf: &ResolvedAssembly,
        node_states: &HashMap<String, SharedNodeState>,
    ) -> RuntimeResult<KettleAssembly> {
        let mut thermometers = Vec::new();
        for key in conf.role_many("thermometer")? {
            let state = lookup(node_states, key)?;
            if state.read().await.as_thermometer().is_none() {
                return Err(RuntimeError::NodeKind {
                    node: key.clone(),
                    expected: "thermometer",
                });
            }
            thermometers.push(state);
        }

        let steering = lookup_relay(node_states, conf.role_one("steering")?).await?;
        let heat_plate = lookup_relay(node_states, conf.role_one("heat_plate")?).await?;

        let volume = conf.param_f64("volume")?;
        let controller: ControllerConfig = conf.param_config("controller", "controller")?;
        let data_collect: DataCollectConfig = conf.param_config("data_collect", "data_collect")?;

        let shared = Arc::new(RwLock::new(KettleShared {
            temp_series: WindowedSeries::new(data_collect.window),
            setpoint: None,
        }));

        Ok(KettleAssembly {
            key: conf.key.clone(),
            thermometers,
            steering,
            heat_plate,
            volume,
            controller,
            data_collect,
            shared,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    /// Combined thermometer reading: per-series average with absent and NaN
    /// readings dropped.
    pub async fn temp_state(&self) -> ThermReading {
        let now = unix_time();
        let mut readings = Vec::with_capacity(self.thermometers.len());
        for state in &self.thermometers {
            let state = state.read().await;
            if let Some(therm) = state.as_thermometer() {
                readings.push(therm.reading_at(now));
            }
        }
        ThermReading {
            temp_c: avg_opt(readings.iter().map(|r| r.temp_c)),
            temp_v: avg_opt(readings.iter().map(|r| r.temp_v)),
        }
    }

    /// Last reported heat-plate relay state.
    pub async fn heat_plate_state(&self) -> Option<wb_protocol::Payload> {
        self.heat_plate.read().await.rx_state("relay_state").cloned()
    }

    /// Last reported steering relay state.
    pub async fn steering_state(&self) -> Option<wb_protocol::Payload> {
        self.steering.read().await.rx_state("relay_state").cloned()
    }

    pub async fn set_heat_plate(&self, on: bool) -> RuntimeResult<()> {
        self.heat_plate.write().await.set_relay_cmd(on)
    }

    pub async fn set_steering(&self, on: bool) -> RuntimeResult<()> {
        self.steering.write().await.set_relay_cmd(on)
    }

    pub async fn setpoint(&self) -> Option<f64> {
        self.shared.read().await.setpoint
    }

    pub async fn set_setpoint(&self, r: f64) {
        self.shared.write().await.setpoint = Some(r);
    }

    pub async fn clear_setpoint(&self) {
        self.shared.write().await.setpoint = None;
    }

    /// Data collector: append the combined temperature to the kettle's
    /// windowed frame at the configured rate.
    pub async fn collect_task(self) -> anyhow::Result<()> {
        let period = Duration::from_secs_f64(1.0 / self.data_collect.collect_interval);
        loop {
            let reading = self.temp_state().await;
            if let Some(temp_c) = reading.temp_c {
                self.shared.write().await.temp_series.append(unix_time(), temp_c);
            }
            tokio::time::sleep(period).await;
        }
    }

    /// Heat-plate controller: one PD evaluation and PWM actuation per
    /// interval. Without a setpoint or with an empty window the tick is
    /// skipped entirely.
    pub async fn control_task(self) -> anyhow::Result<()> {
        let interval = 1.0 / self.controller.pwm_interval;
        let low = self.controller.low_jump_thres;
        let high = self.controller.high_jump_thres;
        let eps = 1e-6;

        loop {
            let dc = match self.setpoint().await {
                None => f64::NAN,
                Some(setpoint) => self.calc_duty_cycle(setpoint).await,
            };

            if dc.is_nan() {
                tracing::debug!(assembly = %self.key, "no duty cycle, skipping actuation");
                sleep_secs(interval).await;
            } else if dc < low - eps {
                self.set_heat_plate(false).await?;
                sleep_secs(interval).await;
            } else if dc <= high + eps {
                self.set_heat_plate(true).await?;
                sleep_secs(interval * dc).await;
                self.set_heat_plate(false).await?;
                sleep_secs(interval * (1.0 - dc)).await;
            } else {
                self.set_heat_plate(true).await?;
                sleep_secs(interval).await;
            }
        }
    }

    async fn calc_duty_cycle(&self, setpoint: f64) -> f64 {
        let (p, d) = {
            let shared = self.shared.read().await;
            pd_error(
                setpoint,
                &shared.temp_series,
                unix_time(),
                self.data_collect.window,
            )
        };
        let cs = p * self.controller.p_gain + d * self.controller.d_gain;
        tracing::debug!(
            assembly = %self.key,
            p_comp = p * self.controller.p_gain,
            d_comp = d * self.controller.d_gain,
            cs,
            "control tick"
        );
        duty_cycle(
            cs,
            self.controller.max_cs,
            self.controller.low_jump_thres,
            self.controller.high_jump_thres,
        )
    }
}

async fn sleep_secs(secs: f64) {
    tokio::time::sleep(Duration::from_secs_f64(secs.max(0.0))).await;
}

fn lookup(
    node_states: &HashMap<String, SharedNodeState>,
    key: &str,
) -> RuntimeResult<SharedNodeState> {
    node_states
        .get(key)
        .cloned()
        .ok_or_else(|| RuntimeError::UnknownNode(key.to_string()))
}

async fn lookup_relay(
    node_states: &HashMap<String, SharedNodeState>,
    key: &str,
) -> RuntimeResult<SharedNodeState> {
    let state = lookup(node_states, key)?;
    if state.read().await.as_relay().is_none() {
        return Err(RuntimeError::NodeKind {
            node: key.to_string(),
            expected: "relay",
        });
    }
    Ok(state)
}
