//! Cross-chain cost comparison for a hypothetical transfer.
use crate::config::{TRANSFER_GAS_LIMIT, WEI_PER_GWEI};
use crate::data::{Chain, StoreState};

pub const AMOUNT_PRESETS: [f64; 4] = [0.1, 0.5, 1.0, 5.0];

pub const GAS_LIMIT_PRESETS: [(&str, u64); 4] = [
    ("Transfer", 21_000),
    ("ERC20", 65_000),
    ("Swap", 150_000),
    ("NFT Mint", 200_000),
];

/// Fiat cost of `gas_limit` units at the given fees (Gwei).
pub fn gas_cost_usd(base_fee: f64, priority_fee: f64, gas_limit: u64, usd_price: f64) -> f64 {
    let native = (base_fee + priority_fee) * gas_limit as f64 / WEI_PER_GWEI;
    native * usd_price
}

pub fn format_gwei(gwei: f64) -> String {
    if gwei < 1.0 {
        format!("{:.0} mGwei", gwei * 1000.0)
    } else {
        format!("{:.2} Gwei", gwei)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChainCost {
    pub chain: Chain,
    pub total_gwei: f64,
    pub gas_cost_native: f64,
    pub gas_cost_usd: f64,
    pub total_cost_usd: f64,
    /// Gas saved versus the most expensive chain.
    pub savings_usd: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Simulation {
    /// Cheapest first.
    pub costs: Vec<ChainCost>,
    pub max_savings_usd: f64,
}

impl Simulation {
    pub fn cheapest(&self) -> Option<&ChainCost> {
        self.costs.first()
    }
}

pub fn simulate(state: &StoreState, amount: f64, gas_limit: u64) -> Simulation {
    let amount = if amount.is_finite() { amount.max(0.0) } else { 0.0 };
    let gas_limit = if gas_limit == 0 { TRANSFER_GAS_LIMIT } else { gas_limit };
    let price = state.usd_price;

    let mut costs: Vec<ChainCost> = state
        .chains()
        .map(|(chain, data)| {
            let total_gwei = data.total_fee();
            let gas_cost_native = total_gwei * gas_limit as f64 / WEI_PER_GWEI;
            let gas_cost_usd = gas_cost_native * price;
            ChainCost {
                chain,
                total_gwei,
                gas_cost_native,
                gas_cost_usd,
                total_cost_usd: amount * price + gas_cost_usd,
                savings_usd: 0.0,
            }
        })
        .collect();

    let max = costs.iter().map(|c| c.gas_cost_usd).fold(f64::MIN, f64::max);
    let min = costs.iter().map(|c| c.gas_cost_usd).fold(f64::MAX, f64::min);
    for cost in &mut costs {
        cost.savings_usd = max - cost.gas_cost_usd;
    }
    costs.sort_by(|a, b| a.gas_cost_usd.total_cmp(&b.gas_cost_usd));

    Simulation {
        costs,
        max_savings_usd: max - min,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{FeeSample, Mode};

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn state_with(fees: [(Chain, f64); 3], price: f64) -> StoreState {
        let mut state = StoreState::new(Mode::Simulation, price);
        for (chain, fee) in fees {
            state.chain_mut(chain).record(&FeeSample::new(1, fee, 0.0), 1);
        }
        state
    }

    #[test]
    fn test_transfer_cost() {
        let state = state_with(
            [(Chain::Ethereum, 30.0), (Chain::Polygon, 30.0), (Chain::Arbitrum, 30.0)],
            3500.0,
        );
        let sim = simulate(&state, 0.5, 21_000);
        let eth = sim.costs.iter().find(|c| c.chain == Chain::Ethereum).unwrap();
        assert!(approx(eth.gas_cost_usd, 2.205));
        assert!(approx(eth.total_cost_usd, 1752.205));
        assert!(approx(eth.gas_cost_native, 0.00063));
        assert!(approx(sim.max_savings_usd, 0.0));
    }

    #[test]
    fn test_sorted_with_savings() {
        let state = state_with(
            [(Chain::Ethereum, 40.0), (Chain::Polygon, 100.0), (Chain::Arbitrum, 0.1)],
            1000.0,
        );
        let sim = simulate(&state, 1.0, 100_000);
        let order: Vec<Chain> = sim.costs.iter().map(|c| c.chain).collect();
        assert_eq!(order, vec![Chain::Arbitrum, Chain::Ethereum, Chain::Polygon]);
        assert_eq!(sim.cheapest().unwrap().chain, Chain::Arbitrum);
        assert!(approx(sim.costs[2].savings_usd, 0.0));
        assert!(approx(sim.costs[1].savings_usd, 6.0));
        assert!(approx(sim.max_savings_usd, 10.0 - 0.01));
    }

    #[test]
    fn test_zero_gas_limit_falls_back_to_transfer() {
        let state = state_with(
            [(Chain::Ethereum, 10.0), (Chain::Polygon, 10.0), (Chain::Arbitrum, 10.0)],
            2000.0,
        );
        assert_eq!(simulate(&state, 0.1, 0), simulate(&state, 0.1, 21_000));
    }

    #[test]
    fn test_gas_cost_usd() {
        assert!(approx(gas_cost_usd(25.0, 5.0, 21_000, 3500.0), 2.205));
        assert_eq!(gas_cost_usd(0.0, 0.0, 21_000, 3500.0), 0.0);
    }

    #[test]
    fn test_format_gwei() {
        assert_eq!(format_gwei(0.25), "250 mGwei");
        assert_eq!(format_gwei(12.346), "12.35 Gwei");
        assert_eq!(format_gwei(1.0), "1.00 Gwei");
    }
}
