use pf_api_types::{Address, ContractEvent, FunderEntry, Wei};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FunderAggregate {
    /// Highest cumulative contributions first, ties by ascending address.
    pub leaderboard: Vec<FunderEntry>,
    /// Distinct funders in the scanned window, before truncation.
    pub distinct_funders: usize,
}

/// Sums `Funded` events per funder and keeps the top `limit`.
///
/// Events other than `Funded` are ignored. The result does not depend on
/// the order events arrive in.
pub fn aggregate_funders<'a, I>(events: I, limit: usize) -> FunderAggregate
where
    I: IntoIterator<Item = &'a ContractEvent>,
{
    let mut totals: BTreeMap<Address, Wei> = BTreeMap::new();
    for event in events {
        if let ContractEvent::Funded {
            funder, eth_amount, ..
        } = event
        {
            let total = totals.entry(funder.clone()).or_default();
            *total = total.saturating_add(*eth_amount);
        }
    }

    let distinct_funders = totals.len();
    let mut leaderboard: Vec<FunderEntry> = totals
        .into_iter()
        .map(|(address, cumulative_wei)| FunderEntry {
            address,
            cumulative_wei,
        })
        .collect();
    leaderboard.sort_by(|a, b| {
        b.cumulative_wei
            .cmp(&a.cumulative_wei)
            .then_with(|| a.address.cmp(&b.address))
    });
    leaderboard.truncate(limit);

    FunderAggregate {
        leaderboard,
        distinct_funders,
    }
}
