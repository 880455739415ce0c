//! Roster construction.
//!
//! The roster is built once per aggregator: every provider is asked exactly
//! once, in list order, and the transfers they produce are shuffled so no
//! provider is systematically favored as the initial selection.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use peerfetch_core::{ContentShare, ProviderHandle, TransferError, TransferHandle, TransferResult};

/// Ask every provider for a transfer and shuffle the results.
///
/// Fails with `TransferError::NoProviders` when no provider could help.
pub(crate) fn build_roster(
    providers: &[ProviderHandle],
    share: Option<&ContentShare>,
    seed: Option<u64>,
) -> TransferResult<Vec<TransferHandle>> {
    let mut transfers = collect_transfers(providers, share);
    if transfers.is_empty() {
        return Err(TransferError::no_providers(providers.len()));
    }
    shuffle(&mut transfers, seed);
    Ok(transfers)
}

/// Query each provider once, keeping the transfers that were produced.
fn collect_transfers(
    providers: &[ProviderHandle],
    share: Option<&ContentShare>,
) -> Vec<TransferHandle> {
    providers
        .iter()
        .enumerate()
        .filter_map(|(index, provider)| {
            let transfer = provider.retrieve_content(share);
            if transfer.is_none() {
                tracing::debug!(provider = index, "Provider cannot service request");
            }
            transfer
        })
        .collect()
}

/// Uniform random permutation in place.
fn shuffle(transfers: &mut [TransferHandle], seed: Option<u64>) {
    match seed {
        Some(seed) => transfers.shuffle(&mut StdRng::seed_from_u64(seed)),
        None => transfers.shuffle(&mut rand::thread_rng()),
    }
}
