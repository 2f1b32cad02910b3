use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use fleetgate::prelude::*;
use fleetgate::protocol::ArgReader;
use serde::Serialize;
use serde_json::{Value, json};
use tokio::sync::broadcast;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

// ---------------------------------------------------------------------------
// Plant state
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum VehicleState {
    Idle,
    Executing,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum OrderState {
    Raw,
    BeingProcessed,
    Withdrawn,
}

#[derive(Clone, Debug, Serialize)]
struct Vehicle {
    name: String,
    state: VehicleState,
    order: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
struct TransportOrder {
    name: String,
    destination: String,
    state: OrderState,
    vehicle: Option<String>,
}

#[derive(Default)]
struct Plant {
    vehicles: BTreeMap<String, Vehicle>,
    orders: BTreeMap<String, TransportOrder>,
    next_order: u64,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// An in-memory fleet: a few vehicles, orders assigned to the first idle one.
struct SimulatedKernel {
    plant: Mutex<Plant>,
    events: broadcast::Sender<Event>,
}

impl SimulatedKernel {
    fn new(vehicle_names: &[&str]) -> Self {
        let vehicles = vehicle_names
            .iter()
            .map(|name| {
                let vehicle = Vehicle {
                    name: name.to_string(),
                    state: VehicleState::Idle,
                    order: None,
                };
                (name.to_string(), vehicle)
            })
            .collect();
        let (events, _) = broadcast::channel(256);
        Self {
            plant: Mutex::new(Plant {
                vehicles,
                ..Plant::default()
            }),
            events,
        }
    }

    fn emit(&self, kind: &str, payload: Value) {
        // No subscriber yet is fine.
        let _ = self.events.send(Event::new(kind, payload));
    }

    fn create_transport_order(&self, destination: String) -> Result<Value, EngineError> {
        let (order, vehicle) = {
            let mut plant = self.plant.lock().unwrap_or_else(PoisonError::into_inner);
            plant.next_order += 1;
            let name = format!("TOrder-{:04}", plant.next_order);

            let idle = plant
                .vehicles
                .values_mut()
                .find(|v| v.state == VehicleState::Idle);
            let vehicle = idle.map(|v| {
                v.state = VehicleState::Executing;
                v.order = Some(name.clone());
                v.clone()
            });

            let order = TransportOrder {
                name: name.clone(),
                destination,
                state: if vehicle.is_some() {
                    OrderState::BeingProcessed
                } else {
                    OrderState::Raw
                },
                vehicle: vehicle.as_ref().map(|v| v.name.clone()),
            };
            plant.orders.insert(name, order.clone());
            (order, vehicle)
        };

        let order = to_value(&order)?;
        self.emit("order.created", order.clone());
        if let Some(vehicle) = vehicle {
            self.emit("vehicle.updated", to_value(&vehicle)?);
        }
        Ok(order)
    }

    fn withdraw_by_vehicle(
        &self,
        vehicle_name: String,
        immediate: bool,
    ) -> Result<Value, EngineError> {
        let (order, vehicle) = {
            let mut plant = self.plant.lock().unwrap_or_else(PoisonError::into_inner);
            let Plant {
                vehicles, orders, ..
            } = &mut *plant;
            let vehicle = vehicles.get_mut(&vehicle_name).ok_or_else(|| {
                EngineError::InvalidArguments(format!("unknown vehicle {vehicle_name:?}"))
            })?;
            let order_name = vehicle.order.take().ok_or_else(|| {
                EngineError::Failed(format!("{vehicle_name} has no transport order"))
            })?;
            vehicle.state = VehicleState::Idle;

            let order = orders
                .get_mut(&order_name)
                .ok_or_else(|| EngineError::Failed(format!("order {order_name} vanished")))?;
            order.state = OrderState::Withdrawn;
            (order.clone(), vehicle.clone())
        };

        tracing::info!(
            vehicle = %vehicle.name,
            order = %order.name,
            immediate,
            "order withdrawn"
        );
        let payload = json!({ "order": to_value(&order)?, "immediate": immediate });
        self.emit("order.withdrawn", payload);
        self.emit("vehicle.updated", to_value(&vehicle)?);
        Ok(Value::Null)
    }

    fn snapshot<T: Serialize>(
        &self,
        pick: impl FnOnce(&Plant) -> Vec<T>,
    ) -> Result<Value, EngineError> {
        let plant = self.plant.lock().unwrap_or_else(PoisonError::into_inner);
        to_value(&pick(&plant))
    }
}

impl Engine for SimulatedKernel {
    fn operations(&self) -> Vec<EngineOperation> {
        vec![
            EngineOperation::requires("getVehicles", [Permission::ReadData]),
            EngineOperation::requires("getTransportOrders", [Permission::ReadData]),
            EngineOperation::requires("createTransportOrder", [Permission::ModifyOrder]),
            EngineOperation::requires("withdrawByVehicle", [Permission::ModifyVehicles]),
            EngineOperation::undeclared("getKernelState"),
        ]
    }

    async fn invoke(&self, operation: &str, args: Vec<Value>) -> Result<Value, EngineError> {
        let mut args = ArgReader::new(args);
        let bad_args =
            |e: fleetgate::protocol::ProtocolError| EngineError::InvalidArguments(e.to_string());
        match operation {
            "getVehicles" => {
                args.finish().map_err(bad_args)?;
                self.snapshot(|p| p.vehicles.values().cloned().collect())
            }
            "getTransportOrders" => {
                args.finish().map_err(bad_args)?;
                self.snapshot(|p| p.orders.values().cloned().collect())
            }
            "createTransportOrder" => {
                let destination = args.next("destination").map_err(bad_args)?;
                args.finish().map_err(bad_args)?;
                self.create_transport_order(destination)
            }
            "withdrawByVehicle" => {
                let vehicle = args.next("vehicle").map_err(bad_args)?;
                let immediate = args.next("immediate").map_err(bad_args)?;
                args.finish().map_err(bad_args)?;
                self.withdraw_by_vehicle(vehicle, immediate)
            }
            "getKernelState" => Ok(json!("OPERATING")),
            other => Err(EngineError::UnknownOperation(other.to_string())),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }
}

fn to_value<T: Serialize>(value: &T) -> Result<Value, EngineError> {
    serde_json::to_value(value).map_err(|e| EngineError::Failed(e.to_string()))
}

// ---------------------------------------------------------------------------
// Server bootstrap
// ---------------------------------------------------------------------------

fn load_config() -> Result<GatewayConfig, Box<dyn std::error::Error>> {
    match std::env::args().nth(1) {
        Some(path) => {
            let raw = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&raw)?)
        }
        None => Ok(GatewayConfig::default()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .init();

    let config = load_config()?;
    tracing::info!(
        addr = %config.registry.socket_addr(),
        home = %config.home_dir.display(),
        "starting fleet kernel gateway"
    );

    let kernel = Arc::new(SimulatedKernel::new(&["Vehicle-01", "Vehicle-02", "Vehicle-03"]));
    let server = GatewayServerBuilder::new().config(config).build(kernel).await?;

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "cannot listen for ctrl-c");
            }
        })
        .await?;
    Ok(())
}
