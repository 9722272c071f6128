//! Payment solving: can a cost be paid, and how.
//!
//! The solver is greedy and does not search alternative assignments:
//! 1. Costs without resources only need enough coins.
//! 2. Fixed own production covers what it can.
//! 3. Each own choice source covers the first still-needed resource it offers.
//! 4. Every unit still missing is bought from the cheaper neighbor (left on a
//!    tie), limited to the fixed units that neighbor produces.
//! 5. The total coin outlay must fit the player's treasury.

use crate::cards::{Cost, Resource};
use crate::player::{Production, TradeDiscounts};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One unit bought from a neighbor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Purchase {
    pub resource: Resource,
    pub cost: u32,
}

/// How a cost gets paid
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    /// Units taken from the player's own production
    #[serde(default)]
    pub own_resources: Vec<Resource>,
    #[serde(default)]
    pub bought_left: Vec<Purchase>,
    #[serde(default)]
    pub bought_right: Vec<Purchase>,
    /// Card coin cost plus every purchase
    pub coins_spent: u32,
}

impl Payment {
    /// Nothing to pay (chain builds, free cards)
    pub fn free() -> Self {
        Self::default()
    }

    /// Coins owed to the left neighbor
    pub fn left_total(&self) -> u32 {
        self.bought_left.iter().map(|p| p.cost).sum()
    }

    /// Coins owed to the right neighbor
    pub fn right_total(&self) -> u32 {
        self.bought_right.iter().map(|p| p.cost).sum()
    }
}

/// What a player can draw on when paying
#[derive(Debug, Clone, Copy)]
pub struct Market<'a> {
    pub coins: u32,
    pub own: &'a Production,
    pub left: &'a Production,
    pub right: &'a Production,
    pub discounts: TradeDiscounts,
}

pub struct ResourceSolver;

impl ResourceSolver {
    /// A payment for `cost`, or `None` when it is unaffordable
    pub fn find_payment(cost: &Cost, market: &Market<'_>) -> Option<Payment> {
        let mut remaining: BTreeMap<Resource, u32> = cost
            .resources
            .iter()
            .filter(|(_, &n)| n > 0)
            .map(|(&r, &n)| (r, n))
            .collect();

        if remaining.is_empty() {
            return (cost.coins <= market.coins).then(|| Payment {
                coins_spent: cost.coins,
                ..Payment::default()
            });
        }

        let mut payment = Payment::default();

        for &resource in &market.own.fixed {
            if take(&mut remaining, resource) {
                payment.own_resources.push(resource);
            }
        }

        for choices in &market.own.choices {
            if let Some(&resource) = choices.iter().find(|r| remaining.contains_key(r)) {
                take(&mut remaining, resource);
                payment.own_resources.push(resource);
            }
        }

        let mut left_stock = stock(market.left);
        let mut right_stock = stock(market.right);
        let mut total = cost.coins;

        for (resource, count) in remaining {
            for _ in 0..count {
                let left_price = market.discounts.left_price(resource);
                let right_price = market.discounts.right_price(resource);
                let left_has = left_stock.get(&resource).is_some_and(|&n| n > 0);
                let right_has = right_stock.get(&resource).is_some_and(|&n| n > 0);

                if left_has && (!right_has || left_price <= right_price) {
                    take(&mut left_stock, resource);
                    payment.bought_left.push(Purchase {
                        resource,
                        cost: left_price,
                    });
                    total += left_price;
                } else if right_has {
                    take(&mut right_stock, resource);
                    payment.bought_right.push(Purchase {
                        resource,
                        cost: right_price,
                    });
                    total += right_price;
                } else {
                    return None;
                }
            }
        }

        if total > market.coins {
            return None;
        }
        payment.coins_spent = total;
        Some(payment)
    }

    /// Whether a declared payment really pays `cost`: totals add up, the
    /// treasury covers them, purchases use the right prices and stay within
    /// each neighbor's fixed production, and own units come from own
    /// production with each choice source used once.
    pub fn accepts(cost: &Cost, payment: &Payment, market: &Market<'_>) -> bool {
        let expected = cost.coins + payment.left_total() + payment.right_total();
        if payment.coins_spent != expected || payment.coins_spent > market.coins {
            return false;
        }

        let fair_left = payment
            .bought_left
            .iter()
            .all(|p| p.cost == market.discounts.left_price(p.resource));
        let fair_right = payment
            .bought_right
            .iter()
            .all(|p| p.cost == market.discounts.right_price(p.resource));
        if !fair_left || !fair_right {
            return false;
        }

        if !within_stock(&payment.bought_left, market.left)
            || !within_stock(&payment.bought_right, market.right)
        {
            return false;
        }

        let mut supplied: BTreeMap<Resource, u32> = BTreeMap::new();
        let bought = payment
            .bought_left
            .iter()
            .chain(&payment.bought_right)
            .map(|p| p.resource);
        for resource in payment.own_resources.iter().copied().chain(bought) {
            *supplied.entry(resource).or_insert(0) += 1;
        }
        let covered = cost
            .resources
            .iter()
            .all(|(r, &n)| supplied.get(r).copied().unwrap_or(0) >= n);

        covered && own_units_available(&payment.own_resources, market.own)
    }
}

/// Fixed units a neighbor can sell, per resource
fn stock(production: &Production) -> BTreeMap<Resource, u32> {
    let mut stock = BTreeMap::new();
    for &resource in &production.fixed {
        *stock.entry(resource).or_insert(0) += 1;
    }
    stock
}

fn within_stock(purchases: &[Purchase], production: &Production) -> bool {
    let mut available = stock(production);
    purchases.iter().all(|p| take(&mut available, p.resource))
}

/// Fixed units are matched first; the rest need distinct choice sources,
/// assigned with augmenting paths.
fn own_units_available(units: &[Resource], production: &Production) -> bool {
    let mut fixed = stock(production);
    let pending: Vec<Resource> = units
        .iter()
        .copied()
        .filter(|&r| !take(&mut fixed, r))
        .collect();

    let mut owner: Vec<Option<usize>> = vec![None; production.choices.len()];
    (0..pending.len()).all(|unit| {
        let mut seen = vec![false; production.choices.len()];
        assign_source(unit, &pending, &production.choices, &mut owner, &mut seen)
    })
}

fn assign_source(
    unit: usize,
    pending: &[Resource],
    choices: &[Vec<Resource>],
    owner: &mut [Option<usize>],
    seen: &mut [bool],
) -> bool {
    for (source, offers) in choices.iter().enumerate() {
        if seen[source] || !offers.contains(&pending[unit]) {
            continue;
        }
        seen[source] = true;
        let free = match owner[source] {
            None => true,
            Some(other) => assign_source(other, pending, choices, owner, seen),
        };
        if free {
            owner[source] = Some(unit);
            return true;
        }
    }
    false
}

/// Decrement one unit of `resource`, dropping exhausted entries. Returns
/// whether a unit was available.
fn take(counts: &mut BTreeMap<Resource, u32>, resource: Resource) -> bool {
    match counts.get_mut(&resource) {
        Some(n) if *n > 0 => {
            *n -= 1;
            if *n == 0 {
                counts.remove(&resource);
            }
            true
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cost(coins: u32, resources: &[(Resource, u32)]) -> Cost {
        Cost {
            coins,
            resources: resources.iter().copied().collect(),
            chain_from: Vec::new(),
        }
    }

    fn fixed(resources: &[Resource]) -> Production {
        Production {
            fixed: resources.to_vec(),
            choices: Vec::new(),
        }
    }

    fn market<'a>(
        coins: u32,
        own: &'a Production,
        left: &'a Production,
        right: &'a Production,
    ) -> Market<'a> {
        Market {
            coins,
            own,
            left,
            right,
            discounts: TradeDiscounts::default(),
        }
    }

    #[test]
    fn test_coin_only_cost() {
        let empty = Production::default();
        let m = market(3, &empty, &empty, &empty);

        let payment = ResourceSolver::find_payment(&cost(1, &[]), &m).unwrap();
        assert_eq!(payment.coins_spent, 1);
        assert!(payment.own_resources.is_empty());

        assert!(ResourceSolver::find_payment(&cost(4, &[]), &m).is_none());
        assert_eq!(
            ResourceSolver::find_payment(&Cost::free(), &m).map(|p| p.coins_spent),
            Some(0)
        );
    }

    #[test]
    fn test_own_fixed_production() {
        let own = fixed(&[Resource::Stone, Resource::Stone, Resource::Wood]);
        let empty = Production::default();
        let m = market(0, &own, &empty, &empty);

        let payment =
            ResourceSolver::find_payment(&cost(0, &[(Resource::Stone, 2)]), &m).unwrap();
        assert_eq!(payment.own_resources, vec![Resource::Stone, Resource::Stone]);
        assert_eq!(payment.coins_spent, 0);
    }

    #[test]
    fn test_choice_production_one_unit_per_source() {
        let own = Production {
            fixed: Vec::new(),
            choices: vec![
                vec![Resource::Wood, Resource::Clay],
                vec![Resource::Clay, Resource::Ore],
            ],
        };
        let empty = Production::default();
        let m = market(0, &own, &empty, &empty);

        let payment = ResourceSolver::find_payment(
            &cost(0, &[(Resource::Wood, 1), (Resource::Clay, 1)]),
            &m,
        )
        .unwrap();
        assert_eq!(payment.own_resources, vec![Resource::Wood, Resource::Clay]);

        assert!(ResourceSolver::find_payment(&cost(0, &[(Resource::Clay, 3)]), &m).is_none());
    }

    #[test]
    fn test_greedy_choice_is_not_exhaustive() {
        // The WOOD/ORE source is spent on WOOD, leaving ORE uncovered even
        // though WOOD + ORE was reachable the other way round.
        let own = Production {
            fixed: Vec::new(),
            choices: vec![vec![Resource::Wood, Resource::Ore], vec![Resource::Wood]],
        };
        let empty = Production::default();
        let m = market(10, &own, &empty, &empty);
        assert!(ResourceSolver::find_payment(
            &cost(0, &[(Resource::Wood, 1), (Resource::Ore, 1)]),
            &m
        )
        .is_none());
    }

    #[test]
    fn test_buy_tie_prefers_left() {
        let empty = Production::default();
        let neighbor = fixed(&[Resource::Ore]);
        let m = market(5, &empty, &neighbor, &neighbor);

        let payment = ResourceSolver::find_payment(&cost(0, &[(Resource::Ore, 1)]), &m).unwrap();
        assert_eq!(
            payment.bought_left,
            vec![Purchase {
                resource: Resource::Ore,
                cost: 2
            }]
        );
        assert!(payment.bought_right.is_empty());
        assert_eq!(payment.coins_spent, 2);
        assert_eq!(payment.left_total(), 2);
    }

    #[test]
    fn test_buy_prefers_discounted_side() {
        let empty = Production::default();
        let neighbor = fixed(&[Resource::Clay]);
        let mut m = market(5, &empty, &neighbor, &neighbor);
        m.discounts.right_raw = true;

        let payment = ResourceSolver::find_payment(&cost(0, &[(Resource::Clay, 1)]), &m).unwrap();
        assert!(payment.bought_left.is_empty());
        assert_eq!(payment.right_total(), 1);
        assert_eq!(payment.coins_spent, 1);
    }

    #[test]
    fn test_neighbor_stock_is_limited() {
        let empty = Production::default();
        let left = fixed(&[Resource::Wood]);
        let right = fixed(&[Resource::Wood]);
        let m = market(10, &empty, &left, &right);

        let payment = ResourceSolver::find_payment(&cost(0, &[(Resource::Wood, 2)]), &m).unwrap();
        assert_eq!(payment.bought_left.len(), 1);
        assert_eq!(payment.bought_right.len(), 1);
        assert_eq!(payment.coins_spent, 4);

        assert!(ResourceSolver::find_payment(&cost(0, &[(Resource::Wood, 3)]), &m).is_none());
    }

    #[test]
    fn test_neighbors_choice_production_is_not_for_sale() {
        let empty = Production::default();
        let left = Production {
            fixed: Vec::new(),
            choices: vec![vec![Resource::Glass]],
        };
        let m = market(10, &empty, &left, &empty);
        assert!(ResourceSolver::find_payment(&cost(0, &[(Resource::Glass, 1)]), &m).is_none());
    }

    #[test]
    fn test_total_must_fit_treasury() {
        let empty = Production::default();
        let neighbor = fixed(&[Resource::Papyrus, Resource::Papyrus]);
        let m = market(3, &empty, &neighbor, &empty);
        assert!(ResourceSolver::find_payment(&cost(0, &[(Resource::Papyrus, 2)]), &m).is_none());

        let m = market(4, &empty, &neighbor, &empty);
        assert_eq!(
            ResourceSolver::find_payment(&cost(0, &[(Resource::Papyrus, 2)]), &m)
                .map(|p| p.coins_spent),
            Some(4)
        );
    }

    #[test]
    fn test_accepts_solver_output() {
        let own = Production {
            fixed: vec![Resource::Wood],
            choices: vec![vec![Resource::Clay, Resource::Ore]],
        };
        let left = fixed(&[Resource::Glass]);
        let empty = Production::default();
        let m = market(5, &own, &left, &empty);
        let c = cost(
            1,
            &[(Resource::Wood, 1), (Resource::Ore, 1), (Resource::Glass, 1)],
        );

        let payment = ResourceSolver::find_payment(&c, &m).unwrap();
        assert_eq!(payment.coins_spent, 3);
        assert!(ResourceSolver::accepts(&c, &payment, &m));
    }

    #[test]
    fn test_accepts_matches_choice_sources() {
        // ORE can only come from the first source, so CLAY must use the second
        let own = Production {
            fixed: Vec::new(),
            choices: vec![
                vec![Resource::Clay, Resource::Ore],
                vec![Resource::Clay],
            ],
        };
        let empty = Production::default();
        let m = market(0, &own, &empty, &empty);
        let c = cost(0, &[(Resource::Clay, 1), (Resource::Ore, 1)]);
        let payment = Payment {
            own_resources: vec![Resource::Clay, Resource::Ore],
            ..Payment::default()
        };
        assert!(ResourceSolver::accepts(&c, &payment, &m));

        let two_ore = cost(0, &[(Resource::Ore, 2)]);
        let payment = Payment {
            own_resources: vec![Resource::Ore, Resource::Ore],
            ..Payment::default()
        };
        assert!(!ResourceSolver::accepts(&two_ore, &payment, &m));
    }

    #[test]
    fn test_accepts_rejects_forged_payments() {
        let empty = Production::default();
        let left = fixed(&[Resource::Stone]);
        let m = market(5, &empty, &left, &empty);
        let c = cost(0, &[(Resource::Stone, 1)]);

        // underpriced
        let cheap = Payment {
            bought_left: vec![Purchase {
                resource: Resource::Stone,
                cost: 1,
            }],
            coins_spent: 1,
            ..Payment::default()
        };
        assert!(!ResourceSolver::accepts(&c, &cheap, &m));

        // bought from a neighbor who has none
        let phantom = Payment {
            bought_right: vec![Purchase {
                resource: Resource::Stone,
                cost: 2,
            }],
            coins_spent: 2,
            ..Payment::default()
        };
        assert!(!ResourceSolver::accepts(&c, &phantom, &m));

        // claims own production it does not have
        let claimed = Payment {
            own_resources: vec![Resource::Stone],
            ..Payment::default()
        };
        assert!(!ResourceSolver::accepts(&c, &claimed, &m));

        // does not cover the cost
        assert!(!ResourceSolver::accepts(&c, &Payment::free(), &m));
    }

    #[test]
    fn test_coin_cost_added_to_purchases() {
        let empty = Production::default();
        let neighbor = fixed(&[Resource::Stone]);
        let m = market(2, &empty, &neighbor, &empty);
        assert!(ResourceSolver::find_payment(&cost(1, &[(Resource::Stone, 1)]), &m).is_none());
    }
}
