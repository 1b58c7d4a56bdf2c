// ==========================================
// FieldOps stock engine - scarcity allocator
// ==========================================
// Splits scarce warehouse supply across crews in proportion to demand
// Rules per SKU:
// 1) available >= total shortfall -> every crew gets its shortfall
// 2) otherwise base_i = floor(shortfall_i * available / total)
// 3) leftover units go one at a time in remainder order:
//    shortfall descending, then crew_id ascending;
//    a crew never goes above its own shortfall
// 4) total = 0 or available = 0 -> all zero
// ==========================================

use crate::domain::types::{Sku, SkuCounts};
use crate::engine::demand::DemandMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::instrument;

/// Per-SKU summary of one allocation run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkuAllocationSummary {
    pub sku: Sku,
    pub requested: u32,
    pub available: u32,
    pub allocated: u32,
    pub scarce: bool, // demand exceeded supply
}

/// Result of one allocation run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AllocationPlan {
    pub per_crew: BTreeMap<String, SkuCounts>,
    pub summary: Vec<SkuAllocationSummary>,
}

impl AllocationPlan {
    pub fn get(&self, crew_id: &str, sku: Sku) -> u32 {
        self.per_crew.get(crew_id).map(|c| c.get(sku)).unwrap_or(0)
    }

    pub fn total_for(&self, sku: Sku) -> u64 {
        self.per_crew.values().map(|c| c.get(sku) as u64).sum()
    }
}

pub struct ScarcityAllocator {
    skus: Vec<Sku>,
}

impl ScarcityAllocator {
    pub fn new() -> Self {
        Self::for_skus(Sku::EQUIPMENT.to_vec())
    }

    pub fn for_skus(skus: Vec<Sku>) -> Self {
        Self { skus }
    }

    #[instrument(skip_all, fields(crews = demand.len()))]
    pub fn allocate(&self, demand: &DemandMap, available: &SkuCounts) -> AllocationPlan {
        let mut plan = AllocationPlan {
            per_crew: demand.keys().map(|id| (id.clone(), SkuCounts::new())).collect(),
            summary: Vec::with_capacity(self.skus.len()),
        };

        for &sku in &self.skus {
            let needs: Vec<(&str, u32)> = demand
                .iter()
                .map(|(id, row)| (id.as_str(), row.get(sku)))
                .collect();
            let supply = available.get(sku);
            let shares = allocate_sku(&needs, supply);

            let requested: u64 = needs.iter().map(|(_, n)| *n as u64).sum();
            let mut allocated: u64 = 0;
            for (crew_id, qty) in shares {
                allocated += qty as u64;
                if let Some(row) = plan.per_crew.get_mut(crew_id) {
                    row.set(sku, qty);
                }
            }

            let scarce = requested > supply as u64;
            if scarce {
                tracing::debug!(
                    sku = %sku,
                    requested,
                    available = supply,
                    allocated,
                    "demand exceeds warehouse supply, allocating proportionally"
                );
            }
            plan.summary.push(SkuAllocationSummary {
                sku,
                requested: requested.min(u32::MAX as u64) as u32,
                available: supply,
                allocated: allocated as u32,
                scarce,
            });
        }
        plan
    }
}

impl Default for ScarcityAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Allocation of a single SKU; output keeps the input order
pub fn allocate_sku<'a>(needs: &[(&'a str, u32)], available: u32) -> Vec<(&'a str, u32)> {
    let total: u64 = needs.iter().map(|(_, n)| *n as u64).sum();

    if total == 0 || available == 0 {
        return needs.iter().map(|(id, _)| (*id, 0)).collect();
    }
    if available as u64 >= total {
        return needs.to_vec();
    }

    let avail = available as u64;
    let mut shares: Vec<u32> = needs
        .iter()
        .map(|(_, n)| ((*n as u64 * avail) / total) as u32)
        .collect();
    let mut leftover = avail - shares.iter().map(|s| *s as u64).sum::<u64>();

    let mut order: Vec<usize> = (0..needs.len()).collect();
    order.sort_by(|&a, &b| needs[b].1.cmp(&needs[a].1).then_with(|| needs[a].0.cmp(needs[b].0)));

    // each full pass either places a unit or proves every crew is capped
    while leftover > 0 {
        let mut placed = false;
        for &i in &order {
            if leftover == 0 {
                break;
            }
            if shares[i] < needs[i].1 {
                shares[i] += 1;
                leftover -= 1;
                placed = true;
            }
        }
        if !placed {
            break;
        }
    }

    needs
        .iter()
        .zip(shares)
        .map(|((id, _), share)| (*id, share))
        .collect()
}

// ==========================================
// Manual overrides
// ==========================================

/// Operator replacements for suggested quantities: crew_id -> SKU -> value
pub type ManualOverrides = BTreeMap<String, BTreeMap<Sku, i64>>;

/// Final dispatch value: manual value if present, suggestion otherwise,
/// clamped into [0, warehouse available].
pub fn final_quantity(
    plan: &AllocationPlan,
    overrides: &ManualOverrides,
    warehouse: &SkuCounts,
    crew_id: &str,
    sku: Sku,
) -> u32 {
    let suggested = plan.get(crew_id, sku) as i64;
    let value = overrides
        .get(crew_id)
        .and_then(|row| row.get(&sku))
        .copied()
        .unwrap_or(suggested);
    value.clamp(0, warehouse.get(sku) as i64) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demand(rows: &[(&str, &[(Sku, u32)])]) -> DemandMap {
        rows.iter()
            .map(|(id, pairs)| (id.to_string(), pairs.iter().copied().collect()))
            .collect()
    }

    fn supply(pairs: &[(Sku, u32)]) -> SkuCounts {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_fifteen_and_five_over_ten() {
        let plan = ScarcityAllocator::new().allocate(
            &demand(&[("A", &[(Sku::Ont, 15)]), ("B", &[(Sku::Ont, 5)])]),
            &supply(&[(Sku::Ont, 10)]),
        );
        // floors 7 + 2, leftover unit goes to the larger shortfall
        assert_eq!(plan.get("A", Sku::Ont), 8);
        assert_eq!(plan.get("B", Sku::Ont), 2);
        assert_eq!(plan.total_for(Sku::Ont), 10);
    }

    #[test]
    fn test_sufficient_supply_gives_exact_shortfall() {
        let plan = ScarcityAllocator::new().allocate(
            &demand(&[
                ("A", &[(Sku::Mesh, 3), (Sku::Box, 1)]),
                ("B", &[(Sku::Mesh, 2)]),
            ]),
            &supply(&[(Sku::Mesh, 50), (Sku::Box, 1)]),
        );
        assert_eq!(plan.get("A", Sku::Mesh), 3);
        assert_eq!(plan.get("B", Sku::Mesh), 2);
        assert_eq!(plan.get("A", Sku::Box), 1);
        let mesh = plan.summary.iter().find(|s| s.sku == Sku::Mesh).unwrap();
        assert!(!mesh.scarce);
    }

    #[test]
    fn test_zero_supply_or_zero_demand() {
        let needs = [("A", 4), ("B", 0)];
        assert_eq!(allocate_sku(&needs, 0), vec![("A", 0), ("B", 0)]);

        let none = [("A", 0), ("B", 0)];
        assert_eq!(allocate_sku(&none, 9), vec![("A", 0), ("B", 0)]);
    }

    #[test]
    fn test_remainder_tie_break_by_crew_id() {
        // equal shortfalls: floor(1*2/3)=0 each, 2 leftover units go to A then B
        let needs = [("C", 1), ("A", 1), ("B", 1)];
        let out = allocate_sku(&needs, 2);
        assert_eq!(out, vec![("C", 0), ("A", 1), ("B", 1)]);
    }

    #[test]
    fn test_allocation_bounds_hold_on_many_shapes() {
        let shapes: Vec<Vec<u32>> = vec![
            vec![1, 1, 1, 1, 1, 1, 1],
            vec![9, 1],
            vec![100, 3, 3, 3],
            vec![0, 7, 0, 2],
            vec![13, 17, 19, 23],
        ];
        for shape in shapes {
            let ids: Vec<String> = (0..shape.len()).map(|i| format!("CU{:02}", i)).collect();
            let needs: Vec<(&str, u32)> =
                ids.iter().map(|s| s.as_str()).zip(shape.iter().copied()).collect();
            let total: u32 = shape.iter().sum();
            for available in 0..=total + 2 {
                let out = allocate_sku(&needs, available);
                let sum: u32 = out.iter().map(|(_, q)| *q).sum();
                assert!(sum <= available, "over-allocated {:?} / {}", shape, available);
                assert_eq!(sum, available.min(total), "supply left unused {:?}", shape);
                for ((_, need), (_, got)) in needs.iter().zip(out.iter()) {
                    assert!(got <= need);
                }
            }
        }
    }

    #[test]
    fn test_final_quantity_clamps_overrides() {
        let plan = ScarcityAllocator::new().allocate(
            &demand(&[("A", &[(Sku::Ont, 4)])]),
            &supply(&[(Sku::Ont, 6)]),
        );
        let warehouse = supply(&[(Sku::Ont, 6)]);
        let mut overrides = ManualOverrides::new();
        assert_eq!(final_quantity(&plan, &overrides, &warehouse, "A", Sku::Ont), 4);

        overrides.entry("A".to_string()).or_default().insert(Sku::Ont, 99);
        assert_eq!(final_quantity(&plan, &overrides, &warehouse, "A", Sku::Ont), 6);

        overrides.entry("A".to_string()).or_default().insert(Sku::Ont, -3);
        assert_eq!(final_quantity(&plan, &overrides, &warehouse, "A", Sku::Ont), 0);
    }
}
