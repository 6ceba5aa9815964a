//! Mapping from decoded events to auction patches.

use auctionindex_core::auction::{AuctionKind, AuctionPatch, AuctionStatus};
use auctionindex_core::error::IndexerError;

use crate::events::{AuctionEvent, AuctionTerms, DecodedEvent};

/// Derive the patch an event applies to its auction.
///
/// Returns `Ok(None)` for events that do not touch the auction row
/// (`MakerJoined`).
pub fn patch_for(chain_id: u64, decoded: &DecodedEvent) -> Result<Option<AuctionPatch>, IndexerError> {
    let (kind, status) = match &decoded.event {
        AuctionEvent::MakerJoined(_) => return Ok(None),
        AuctionEvent::AuctionCreated(_) | AuctionEvent::AuctionLiquidityAdded(_) => {
            (AuctionKind::Solo, AuctionStatus::Active)
        }
        AuctionEvent::CommunityAuctionCreated(_) => (AuctionKind::Community, AuctionStatus::Active),
        AuctionEvent::AuctionFinalized(_) | AuctionEvent::AuctionCancelled(_) => {
            (AuctionKind::Solo, AuctionStatus::Closed)
        }
        AuctionEvent::CommunityAuctionFinalized(_) | AuctionEvent::CommunityAuctionCancelled(_) => {
            (AuctionKind::Community, AuctionStatus::Closed)
        }
    };

    let raw_event = serde_json::to_value(&decoded.event)
        .map_err(|e| IndexerError::Other(format!("serialize {}: {e}", decoded.event.kind())))?;

    let mut patch = AuctionPatch::new(
        chain_id,
        decoded.event.auction_id(),
        kind,
        status,
        raw_event,
        decoded.block_number,
        decoded.tx_hash.clone(),
    );
    patch.maker_position_id = decoded.event.position_id().map(str::to_owned);

    match &decoded.event {
        AuctionEvent::AuctionCreated(e) => with_terms(&mut patch, &e.terms),
        AuctionEvent::CommunityAuctionCreated(e) => with_terms(&mut patch, &e.terms),
        AuctionEvent::AuctionLiquidityAdded(e) => {
            patch.reserve_a = Some(e.reserve_a.clone());
            patch.reserve_b = Some(e.reserve_b.clone());
        }
        AuctionEvent::AuctionFinalized(e) | AuctionEvent::CommunityAuctionFinalized(e) => {
            patch.reserve_a = Some(e.reserve_a.clone());
            patch.reserve_b = Some(e.reserve_b.clone());
        }
        _ => {}
    }

    Ok(Some(patch))
}

fn with_terms(patch: &mut AuctionPatch, terms: &AuctionTerms) {
    patch.pool_id_a = Some(terms.pool_id_a.clone());
    patch.pool_id_b = Some(terms.pool_id_b.clone());
    patch.token_a = Some(terms.token_a.clone());
    patch.token_b = Some(terms.token_b.clone());
    patch.reserve_a = Some(terms.reserve_a.clone());
    patch.reserve_b = Some(terms.reserve_b.clone());
    patch.start_time = Some(terms.start_time);
    patch.end_time = Some(terms.end_time);
    patch.fee_bps = Some(terms.fee_bps);
    patch.fee_asset = Some(terms.fee_asset);
}
