// ==========================================
// FieldOps stock engine - engine layer
// ==========================================
// Business rules: demand, scarce-supply allocation, differential
// stock mutation. No SQL here; data access goes through repositories
// ==========================================

pub mod allocator;
pub mod consumption;
pub mod demand;
pub mod liquidation;
pub mod snapshot;

pub use allocator::{
    allocate_sku, final_quantity, AllocationPlan, ManualOverrides, ScarcityAllocator,
    SkuAllocationSummary,
};
pub use consumption::ConsumptionWindow;
pub use demand::{
    critical_skus, CrewDemandInput, CrewStockStatus, DemandCalculator, DemandMap,
};
pub use liquidation::{
    DifferentialStockMutator, LiquidationDiff, LiquidationOutcome, MaterialDelta, MutationPolicy,
    StockMutation,
};
pub use snapshot::{CrewFilter, CrewStockSnapshot, InventorySnapshot, InventorySnapshotLoader};
