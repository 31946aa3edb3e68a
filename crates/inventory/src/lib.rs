//! Inventory lot-costing domain.
//!
//! Pure, deterministic domain logic (no IO, no storage): the lot and movement
//! model, landed-cost math, the FIFO allocation plan, warehouse-fee weighting
//! and read-side valuation. The infra crate runs these inside transactions.

pub mod fee;
pub mod fifo;
pub mod landed_cost;
pub mod lot;
pub mod movement;
mod split;
pub mod valuation;

pub use fee::{
    FeeShare, WarehouseFee, WarehouseFeeDistribution, YearMonth, distribution_base_date,
    plan_fee_distribution, storage_days,
};
pub use fifo::{AllocationPlan, AllocationSlice, plan_outbound};
pub use landed_cost::{HeaderCosts, LandedCost, LandedCostPolicy, ShipmentLine, distribute_header_costs};
pub use lot::{InventoryLot, ReceiveLot, StorageLocation};
pub use movement::{InventoryMovement, MovementDirection, OutboundMovement};
pub use valuation::LotValuation;
